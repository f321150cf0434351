/// MultiVault Kernel: Configuration
///
/// All parameters are injected at construction and immutable afterwards.
/// Fee values are basis points over `general.fee_denominator`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::arithmetic::WAD;
use crate::domain::{Address, CurveId};
use crate::error::{VaultError, VaultResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneralConfig {
    pub admin: Address,
    pub protocol_multisig: Address,
    pub fee_denominator: u128,
    pub min_deposit: u128,
    /// Ghost shares minted into every new vault. Also the smallest
    /// non-ghost residual a partial redemption may leave behind.
    pub min_share: u128,
    pub decimal_precision: u128,
    pub atom_data_max_length: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            admin: Address::from_low_u64_be(1),
            protocol_multisig: Address::from_low_u64_be(2),
            fee_denominator: 10_000,
            min_deposit: 1_000_000_000_000_000, // 0.001 * WAD
            min_share: 1_000_000,
            decimal_precision: WAD,
            atom_data_max_length: 256,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AtomConfig {
    pub atom_creation_protocol_fee: u128,
    pub atom_wallet_deposit_fee: u128,
}

impl Default for AtomConfig {
    fn default() -> Self {
        Self {
            atom_creation_protocol_fee: 1_000_000_000_000_000,
            atom_wallet_deposit_fee: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TripleConfig {
    pub triple_creation_protocol_fee: u128,
    /// Fraction routed into *each* of the three underlying atom vaults.
    pub atom_deposit_fraction_for_triple: u128,
}

impl Default for TripleConfig {
    fn default() -> Self {
        Self {
            triple_creation_protocol_fee: 1_000_000_000_000_000,
            atom_deposit_fraction_for_triple: 900,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VaultFees {
    pub entry_fee: u128,
    pub exit_fee: u128,
    pub protocol_fee: u128,
}

impl Default for VaultFees {
    fn default() -> Self {
        Self {
            entry_fee: 50,
            exit_fee: 75,
            protocol_fee: 100,
        }
    }
}

/// Built-in curve declaration. Registered in list order, ids from 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurveSpec {
    Linear {
        name: String,
    },
    Progressive {
        name: String,
        slope: u128,
    },
    OffsetProgressive {
        name: String,
        slope: u128,
        offset: u128,
    },
}

impl CurveSpec {
    pub fn name(&self) -> &str {
        match self {
            CurveSpec::Linear { name }
            | CurveSpec::Progressive { name, .. }
            | CurveSpec::OffsetProgressive { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BondingCurveConfig {
    pub default_curve_id: CurveId,
    pub curves: Vec<CurveSpec>,
}

impl Default for BondingCurveConfig {
    fn default() -> Self {
        Self {
            default_curve_id: 1,
            curves: vec![
                CurveSpec::Linear {
                    name: "Linear Curve".to_string(),
                },
                CurveSpec::Progressive {
                    name: "Progressive Curve".to_string(),
                    slope: 2_000_000_000_000_000,
                },
                CurveSpec::OffsetProgressive {
                    name: "Offset Progressive Curve".to_string(),
                    slope: 2_000_000_000_000_000,
                    offset: 10_000 * WAD,
                },
            ],
        }
    }
}

/// Complete ledger configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields, default)]
pub struct LedgerConfig {
    pub general: GeneralConfig,
    pub atom: AtomConfig,
    pub triple: TripleConfig,
    pub vault_fees: VaultFees,
    pub bonding_curves: BondingCurveConfig,
}

impl LedgerConfig {
    /// Parse and validate a JSON config. Missing sections take defaults.
    pub fn from_json_str(json: &str) -> VaultResult<Self> {
        let config: LedgerConfig = serde_json::from_str(json)
            .map_err(|e| VaultError::InvalidConfig(format!("malformed config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> VaultResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            VaultError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&content)
    }

    pub fn to_json_string(&self) -> VaultResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| VaultError::Serialization(e.to_string()))
    }

    pub fn validate(&self) -> VaultResult<()> {
        let g = &self.general;
        let denom = g.fee_denominator;
        if denom == 0 {
            return Err(invalid("fee_denominator must be > 0"));
        }
        if g.decimal_precision != WAD {
            return Err(invalid(format!(
                "decimal_precision must be {}, got {}",
                WAD, g.decimal_precision
            )));
        }
        if g.min_share == 0 {
            return Err(invalid("min_share must be > 0"));
        }
        if g.atom_data_max_length == 0 {
            return Err(invalid("atom_data_max_length must be > 0"));
        }
        if g.admin.is_zero() || g.protocol_multisig.is_zero() {
            return Err(invalid("admin and protocol_multisig must be non-zero"));
        }

        let bps = [
            ("entry_fee", self.vault_fees.entry_fee),
            ("exit_fee", self.vault_fees.exit_fee),
            ("protocol_fee", self.vault_fees.protocol_fee),
            ("atom_wallet_deposit_fee", self.atom.atom_wallet_deposit_fee),
            (
                "atom_deposit_fraction_for_triple",
                self.triple.atom_deposit_fraction_for_triple,
            ),
        ];
        for (field, value) in bps {
            if value > denom {
                return Err(invalid(format!(
                    "{} = {} exceeds fee_denominator {}",
                    field, value, denom
                )));
            }
        }
        if self.triple.atom_deposit_fraction_for_triple * 3 > denom {
            return Err(invalid(
                "three atom deposit fractions exceed the whole triple deposit",
            ));
        }

        let curves = &self.bonding_curves;
        if curves.curves.is_empty() {
            return Err(invalid("at least one bonding curve is required"));
        }
        let default_id = curves.default_curve_id as usize;
        if default_id == 0 || default_id > curves.curves.len() {
            return Err(invalid(format!(
                "default_curve_id {} does not name a configured curve",
                curves.default_curve_id
            )));
        }
        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> VaultError {
    VaultError::InvalidConfig(msg.into())
}
