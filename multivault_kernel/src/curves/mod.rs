/// MultiVault Kernel: Bonding Curves
///
/// A curve is a pure pricing function over a vault's `(total_assets,
/// total_shares)`. Curves hold no vault state and are shared read-only by
/// every vault that references them.
///
/// Rounding always favours the vault:
///   - shares minted for assets:     floor
///   - assets required for shares:   ceil
///   - shares burned for assets:     ceil
///   - assets paid for shares:       floor
///   - current price:                floor

use std::fmt;
use std::sync::Arc;

use crate::config::CurveSpec;
use crate::error::{VaultError, VaultResult};

pub mod linear;
pub mod offset_progressive;
pub mod progressive;
pub mod registry;

pub use linear::LinearCurve;
pub use offset_progressive::OffsetProgressiveCurve;
pub use progressive::ProgressiveCurve;
pub use registry::CurveRegistry;

/// Shared contract for every curve variant, built-in or custom.
pub trait BondingCurve: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    fn max_shares(&self) -> u128;

    fn max_assets(&self) -> u128;

    /// Shares minted for depositing `assets`.
    fn preview_deposit(&self, assets: u128, total_assets: u128, total_shares: u128)
        -> VaultResult<u128>;

    /// Assets required to mint exactly `shares`.
    fn preview_mint(&self, shares: u128, total_assets: u128, total_shares: u128)
        -> VaultResult<u128>;

    /// Shares that must be burned to withdraw exactly `assets`.
    fn preview_withdraw(&self, assets: u128, total_assets: u128, total_shares: u128)
        -> VaultResult<u128>;

    /// Assets released by burning `shares`.
    fn preview_redeem(&self, shares: u128, total_assets: u128, total_shares: u128)
        -> VaultResult<u128>;

    fn convert_to_shares(&self, assets: u128, total_assets: u128, total_shares: u128)
        -> VaultResult<u128>;

    fn convert_to_assets(&self, shares: u128, total_assets: u128, total_shares: u128)
        -> VaultResult<u128>;

    /// Marginal price of one whole share, WAD-scaled.
    fn current_price(&self, total_assets: u128, total_shares: u128) -> VaultResult<u128>;
}

/// Instantiate a built-in curve from its config declaration.
pub fn from_spec(spec: &CurveSpec) -> VaultResult<Arc<dyn BondingCurve>> {
    let curve: Arc<dyn BondingCurve> = match spec {
        CurveSpec::Linear { name } => Arc::new(LinearCurve::new(name.clone())),
        CurveSpec::Progressive { name, slope } => {
            Arc::new(ProgressiveCurve::new(name.clone(), *slope)?)
        }
        CurveSpec::OffsetProgressive {
            name,
            slope,
            offset,
        } => Arc::new(OffsetProgressiveCurve::new(name.clone(), *slope, *offset)?),
    };
    Ok(curve)
}

// ---------------------------------------------------------------------------
// Bound checks shared by the built-in curves
// ---------------------------------------------------------------------------

pub(crate) fn check_assets_in(
    max_assets: u128,
    assets: u128,
    total_assets: u128,
) -> VaultResult<()> {
    let would_have = total_assets.checked_add(assets).ok_or(VaultError::Overflow)?;
    if would_have > max_assets {
        return Err(VaultError::AssetsOverflowMax {
            max: max_assets,
            would_have,
        });
    }
    Ok(())
}

pub(crate) fn check_shares_in(
    max_shares: u128,
    shares: u128,
    total_shares: u128,
) -> VaultResult<()> {
    let would_have = total_shares.checked_add(shares).ok_or(VaultError::Overflow)?;
    if would_have > max_shares {
        return Err(VaultError::SharesOverflowMax {
            max: max_shares,
            would_have,
        });
    }
    Ok(())
}

pub(crate) fn check_shares_out(shares: u128, total_shares: u128) -> VaultResult<()> {
    if shares > total_shares {
        return Err(VaultError::SharesExceedTotalShares {
            requested: shares,
            total: total_shares,
        });
    }
    Ok(())
}

pub(crate) fn check_assets_out(assets: u128, total_assets: u128) -> VaultResult<()> {
    if assets > total_assets {
        return Err(VaultError::AssetsExceedTotalAssets {
            requested: assets,
            total: total_assets,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BondingCurveConfig;

    #[test]
    fn default_specs_instantiate_in_order() {
        let names: Vec<String> = BondingCurveConfig::default()
            .curves
            .iter()
            .map(|s| from_spec(s).unwrap().name().to_string())
            .collect();
        assert_eq!(
            names,
            vec!["Linear Curve", "Progressive Curve", "Offset Progressive Curve"]
        );
    }

    #[test]
    fn zero_slope_spec_is_rejected() {
        let spec = CurveSpec::Progressive {
            name: "flat".to_string(),
            slope: 0,
        };
        assert!(matches!(
            from_spec(&spec),
            Err(VaultError::InvalidCurveParameter(_))
        ));
    }

    #[test]
    fn bound_checks() {
        assert!(check_assets_in(10, 5, 5).is_ok());
        assert_eq!(
            check_assets_in(10, 6, 5),
            Err(VaultError::AssetsOverflowMax { max: 10, would_have: 11 })
        );
        assert_eq!(check_shares_in(u128::MAX, 1, u128::MAX), Err(VaultError::Overflow));
        assert_eq!(
            check_shares_out(3, 2),
            Err(VaultError::SharesExceedTotalShares { requested: 3, total: 2 })
        );
        assert!(check_assets_out(2, 2).is_ok());
    }
}
