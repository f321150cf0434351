//! Linear curve: constant-ratio pricing.
//!
//! Shares are priced proportionally to the vault's `total_assets /
//! total_shares`. An empty vault converts 1:1. Fees retained in the vault
//! raise the ratio for every existing holder.

use crate::arithmetic::{mul_div, Rounding, WAD};
use crate::error::VaultResult;

use super::{check_assets_in, check_assets_out, check_shares_in, check_shares_out, BondingCurve};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinearCurve {
    name: String,
    max_shares: u128,
    max_assets: u128,
}

impl LinearCurve {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_limits(name, u128::MAX, u128::MAX)
    }

    pub fn with_limits(name: impl Into<String>, max_shares: u128, max_assets: u128) -> Self {
        Self {
            name: name.into(),
            max_shares,
            max_assets,
        }
    }
}

fn is_empty(total_assets: u128, total_shares: u128) -> bool {
    total_assets == 0 || total_shares == 0
}

impl BondingCurve for LinearCurve {
    fn name(&self) -> &str {
        &self.name
    }

    fn max_shares(&self) -> u128 {
        self.max_shares
    }

    fn max_assets(&self) -> u128 {
        self.max_assets
    }

    fn preview_deposit(&self, assets: u128, total_assets: u128, total_shares: u128) -> VaultResult<u128> {
        check_assets_in(self.max_assets, assets, total_assets)?;
        let shares = self.convert_to_shares(assets, total_assets, total_shares)?;
        check_shares_in(self.max_shares, shares, total_shares)?;
        Ok(shares)
    }

    fn preview_mint(&self, shares: u128, total_assets: u128, total_shares: u128) -> VaultResult<u128> {
        check_shares_in(self.max_shares, shares, total_shares)?;
        let assets = if is_empty(total_assets, total_shares) {
            shares
        } else {
            mul_div(shares, total_assets, total_shares, Rounding::Up)?
        };
        check_assets_in(self.max_assets, assets, total_assets)?;
        Ok(assets)
    }

    fn preview_withdraw(&self, assets: u128, total_assets: u128, total_shares: u128) -> VaultResult<u128> {
        check_assets_out(assets, total_assets)?;
        if is_empty(total_assets, total_shares) {
            return Ok(assets);
        }
        mul_div(assets, total_shares, total_assets, Rounding::Up)
    }

    fn preview_redeem(&self, shares: u128, total_assets: u128, total_shares: u128) -> VaultResult<u128> {
        check_shares_out(shares, total_shares)?;
        self.convert_to_assets(shares, total_assets, total_shares)
    }

    fn convert_to_shares(&self, assets: u128, total_assets: u128, total_shares: u128) -> VaultResult<u128> {
        if is_empty(total_assets, total_shares) {
            return Ok(assets);
        }
        mul_div(assets, total_shares, total_assets, Rounding::Down)
    }

    fn convert_to_assets(&self, shares: u128, total_assets: u128, total_shares: u128) -> VaultResult<u128> {
        if total_shares == 0 {
            return Ok(shares);
        }
        mul_div(shares, total_assets, total_shares, Rounding::Down)
    }

    fn current_price(&self, total_assets: u128, total_shares: u128) -> VaultResult<u128> {
        if is_empty(total_assets, total_shares) {
            return Ok(WAD);
        }
        mul_div(total_assets, WAD, total_shares, Rounding::Down)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VaultError;

    fn curve() -> LinearCurve {
        LinearCurve::new("Linear Curve")
    }

    #[test]
    fn empty_vault_is_one_to_one() {
        let c = curve();
        assert_eq!(c.preview_deposit(5 * WAD, 0, 0), Ok(5 * WAD));
        assert_eq!(c.preview_mint(1_000_000, 0, 0), Ok(1_000_000));
        assert_eq!(c.current_price(0, 0), Ok(WAD));
    }

    #[test]
    fn proportional_pricing_rounds_for_the_vault() {
        let c = curve();
        // 3 assets back 2 shares
        assert_eq!(c.preview_deposit(10, 3, 2), Ok(6)); // 6.66 floored
        assert_eq!(c.preview_mint(7, 3, 2), Ok(11)); // 10.5 ceiled
        assert_eq!(c.preview_redeem(1, 3, 2), Ok(1)); // 1.5 floored
        assert_eq!(c.preview_withdraw(2, 3, 2), Ok(2)); // 1.33 ceiled
        assert_eq!(c.current_price(3, 2), Ok(3 * WAD / 2));
    }

    #[test]
    fn redeem_beyond_supply_fails() {
        assert_eq!(
            curve().preview_redeem(11, 100, 10),
            Err(VaultError::SharesExceedTotalShares { requested: 11, total: 10 })
        );
        assert_eq!(
            curve().preview_withdraw(101, 100, 10),
            Err(VaultError::AssetsExceedTotalAssets { requested: 101, total: 100 })
        );
    }

    #[test]
    fn limits_are_enforced() {
        let c = LinearCurve::with_limits("capped", 1_000, 1_000);
        assert_eq!(
            c.preview_deposit(1_001, 0, 0),
            Err(VaultError::AssetsOverflowMax { max: 1_000, would_have: 1_001 })
        );
        assert_eq!(
            c.preview_mint(600, 500, 500),
            Err(VaultError::SharesOverflowMax { max: 1_000, would_have: 1_100 })
        );
    }
}
