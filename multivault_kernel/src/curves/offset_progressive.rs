//! Offset-progressive curve: the progressive curve evaluated at
//! `total_shares + offset`, so the first shares of a vault are already
//! priced at `slope * offset / WAD`.
//!
//! Bounds (max shares, shares exceeding supply) apply to the real supply.

use crate::arithmetic::{mul_div, Rounding, WAD};
use crate::error::{VaultError, VaultResult};

use super::progressive::{
    area_above, area_below, shares_for_assets, shares_for_withdraw, validate_slope,
    DEFAULT_MAX_ASSETS, DEFAULT_MAX_SHARES,
};
use super::{check_assets_in, check_assets_out, check_shares_in, check_shares_out, BondingCurve};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetProgressiveCurve {
    name: String,
    slope: u128,
    offset: u128,
    max_shares: u128,
    max_assets: u128,
}

impl OffsetProgressiveCurve {
    pub fn new(name: impl Into<String>, slope: u128, offset: u128) -> VaultResult<Self> {
        Self::with_limits(name, slope, offset, DEFAULT_MAX_SHARES, DEFAULT_MAX_ASSETS)
    }

    pub fn with_limits(
        name: impl Into<String>,
        slope: u128,
        offset: u128,
        max_shares: u128,
        max_assets: u128,
    ) -> VaultResult<Self> {
        validate_slope(slope)?;
        if max_shares.checked_add(offset).is_none() {
            return Err(VaultError::InvalidCurveParameter(format!(
                "offset {} overflows the share range",
                offset
            )));
        }
        Ok(Self {
            name: name.into(),
            slope,
            offset,
            max_shares,
            max_assets,
        })
    }

    pub fn slope(&self) -> u128 {
        self.slope
    }

    pub fn offset(&self) -> u128 {
        self.offset
    }

    fn effective(&self, total_shares: u128) -> VaultResult<u128> {
        total_shares
            .checked_add(self.offset)
            .ok_or(VaultError::Overflow)
    }
}

impl BondingCurve for OffsetProgressiveCurve {
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
        let shares = shares_for_assets(self.slope, self.effective(total_shares)?, assets)?;
        check_shares_in(self.max_shares, shares, total_shares)?;
        Ok(shares)
    }

    fn preview_mint(&self, shares: u128, total_assets: u128, total_shares: u128) -> VaultResult<u128> {
        check_shares_in(self.max_shares, shares, total_shares)?;
        let assets = area_above(self.slope, self.effective(total_shares)?, shares, Rounding::Up)?;
        check_assets_in(self.max_assets, assets, total_assets)?;
        Ok(assets)
    }

    fn preview_withdraw(&self, assets: u128, total_assets: u128, total_shares: u128) -> VaultResult<u128> {
        check_assets_out(assets, total_assets)?;
        let shares = shares_for_withdraw(self.slope, self.effective(total_shares)?, assets)?;
        check_shares_out(shares, total_shares)?;
        Ok(shares)
    }

    fn preview_redeem(&self, shares: u128, total_assets: u128, total_shares: u128) -> VaultResult<u128> {
        check_shares_out(shares, total_shares)?;
        let assets = area_below(self.slope, self.effective(total_shares)?, shares, Rounding::Down)?;
        check_assets_out(assets, total_assets)?;
        Ok(assets)
    }

    fn convert_to_shares(&self, assets: u128, _total_assets: u128, total_shares: u128) -> VaultResult<u128> {
        shares_for_assets(self.slope, self.effective(total_shares)?, assets)
    }

    fn convert_to_assets(&self, shares: u128, _total_assets: u128, total_shares: u128) -> VaultResult<u128> {
        check_shares_out(shares, total_shares)?;
        area_below(self.slope, self.effective(total_shares)?, shares, Rounding::Down)
    }

    fn current_price(&self, _total_assets: u128, total_shares: u128) -> VaultResult<u128> {
        mul_div(self.slope, self.effective(total_shares)?, WAD, Rounding::Down)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curves::ProgressiveCurve;

    const SLOPE: u128 = 2_000_000_000_000_000;
    const OFFSET: u128 = 10_000 * WAD;

    fn curve() -> OffsetProgressiveCurve {
        OffsetProgressiveCurve::new("Offset Progressive Curve", SLOPE, OFFSET).unwrap()
    }

    #[test]
    fn empty_vault_already_has_a_price() {
        assert_eq!(curve().current_price(0, 0), Ok(20 * WAD));
    }

    #[test]
    fn ghost_cost_includes_offset() {
        // 2e15 * 1e6 * (2e22 + 1e6) / 2e36 = 2e7 + 1e-9, rounded up
        assert_eq!(curve().preview_mint(1_000_000, 0, 0), Ok(20_000_001));
    }

    #[test]
    fn matches_plain_progressive_at_shifted_supply() {
        let plain = ProgressiveCurve::new("p", SLOPE).unwrap();
        let assets = 3 * WAD;
        let supply = 40 * WAD;
        let offset_shares = curve().preview_deposit(assets, 0, supply).unwrap();
        let plain_shares = plain.preview_deposit(assets, 0, supply + OFFSET).unwrap();
        assert_eq!(offset_shares, plain_shares);
    }

    #[test]
    fn cannot_redeem_the_offset() {
        let c = curve();
        assert_eq!(
            c.preview_redeem(WAD + 1, 100 * WAD, WAD),
            Err(VaultError::SharesExceedTotalShares { requested: WAD + 1, total: WAD })
        );
    }

    #[test]
    fn mint_and_redeem_agree_on_whole_share() {
        let c = curve();
        let cost = c.preview_mint(WAD, 0, 0).unwrap();
        let back = c.preview_redeem(WAD, cost, WAD).unwrap();
        assert!(back <= cost);
        assert!(cost - back <= 1);
    }
}
