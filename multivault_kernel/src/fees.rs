/// MultiVault Kernel: Fee Engine
///
/// Stateless fee arithmetic. Every fee is `ceil(amount * bps / denominator)`
/// so fees never round in the payer's favour. Which fees apply to an
/// operation is decided by the engine, not here.

use serde::{Deserialize, Serialize};

use crate::arithmetic::{checked_add, mul_div, Rounding};
use crate::config::LedgerConfig;
use crate::error::VaultResult;

pub fn fee_on_raw(amount: u128, bps: u128, denominator: u128) -> VaultResult<u128> {
    mul_div(amount, bps, denominator, Rounding::Up)
}

/// Fee calculator bound to one configuration.
#[derive(Debug, Clone, Copy)]
pub struct FeeEngine<'a> {
    config: &'a LedgerConfig,
}

impl<'a> FeeEngine<'a> {
    pub fn new(config: &'a LedgerConfig) -> Self {
        Self { config }
    }

    fn fee(&self, amount: u128, bps: u128) -> VaultResult<u128> {
        fee_on_raw(amount, bps, self.config.general.fee_denominator)
    }

    pub fn entry_fee(&self, assets: u128) -> VaultResult<u128> {
        self.fee(assets, self.config.vault_fees.entry_fee)
    }

    pub fn exit_fee(&self, assets: u128) -> VaultResult<u128> {
        self.fee(assets, self.config.vault_fees.exit_fee)
    }

    pub fn protocol_fee(&self, assets: u128) -> VaultResult<u128> {
        self.fee(assets, self.config.vault_fees.protocol_fee)
    }

    pub fn atom_wallet_deposit_fee(&self, assets: u128) -> VaultResult<u128> {
        self.fee(assets, self.config.atom.atom_wallet_deposit_fee)
    }

    /// Amount routed into one underlying atom vault of a triple deposit.
    pub fn atom_deposit_fraction_amount(&self, assets: u128) -> VaultResult<u128> {
        self.fee(assets, self.config.triple.atom_deposit_fraction_for_triple)
    }
}

/// Fees charged by a single deposit or redemption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub protocol_fee: u128,
    pub entry_fee: u128,
    pub exit_fee: u128,
    pub atom_wallet_fee: u128,
}

impl FeeBreakdown {
    pub fn total(&self) -> VaultResult<u128> {
        let sum = checked_add(self.protocol_fee, self.entry_fee)?;
        let sum = checked_add(sum, self.exit_fee)?;
        checked_add(sum, self.atom_wallet_fee)
    }
}
