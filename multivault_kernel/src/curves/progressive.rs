//! Progressive curve: marginal price rises linearly with supply.
//!
//! `p(s) = slope * s / WAD`. The asset cost of moving the supply from `s`
//! to `s + n` is the area under `p`, `slope * n * (2s + n) / (2 * WAD^2)`.
//! Inverting that area gives the shares for a deposit:
//! `isqrt(s^2 + 2 * assets * WAD^2 / slope) - s`.
//!
//! The integral helpers take the *effective* supply so the offset variant
//! can reuse them unchanged.

use crate::arithmetic::{mul_div, mul_div_wide, Rounding, U256, WAD};
use crate::error::{VaultError, VaultResult};

use super::{check_assets_in, check_assets_out, check_shares_in, check_shares_out, BondingCurve};

/// `2 * WAD^2`, the denominator of the area formula.
pub(crate) const TWO_WAD_SQUARED: u128 = 2 * WAD * WAD;

pub const DEFAULT_MAX_SHARES: u128 = 1_000_000_000_000 * WAD;
pub const DEFAULT_MAX_ASSETS: u128 = 1_000_000_000_000_000_000 * WAD;

/// Area under the price line from `s` to `s + n`.
pub(crate) fn area_above(slope: u128, s: u128, n: u128, rounding: Rounding) -> VaultResult<u128> {
    let span = s
        .checked_mul(2)
        .and_then(|d| d.checked_add(n))
        .ok_or(VaultError::Overflow)?;
    mul_div_wide(U256::full_mul(n, span), slope, TWO_WAD_SQUARED, rounding)
}

/// Area under the price line from `s - n` to `s`. Caller guarantees `n <= s`.
pub(crate) fn area_below(slope: u128, s: u128, n: u128, rounding: Rounding) -> VaultResult<u128> {
    let span = s
        .checked_mul(2)
        .ok_or(VaultError::Overflow)?
        .checked_sub(n)
        .ok_or(VaultError::Underflow)?;
    mul_div_wide(U256::full_mul(n, span), slope, TWO_WAD_SQUARED, rounding)
}

/// `assets * 2 * WAD^2 / slope` as a 256-bit value.
fn scaled_area(slope: u128, assets: u128, rounding: Rounding) -> VaultResult<U256> {
    if slope == 0 {
        return Err(VaultError::DivisionByZero);
    }
    let (q, r) = U256::full_mul(assets, TWO_WAD_SQUARED).div_rem(slope);
    match rounding {
        Rounding::Up if r > 0 => q.checked_add(U256::from_u128(1)).ok_or(VaultError::Overflow),
        _ => Ok(q),
    }
}

/// Shares minted for `assets` at effective supply `s`. Floors.
pub(crate) fn shares_for_assets(slope: u128, s: u128, assets: u128) -> VaultResult<u128> {
    let area = scaled_area(slope, assets, Rounding::Down)?;
    let target = U256::full_mul(s, s)
        .checked_add(area)
        .ok_or(VaultError::Overflow)?;
    target.isqrt().checked_sub(s).ok_or(VaultError::Underflow)
}

/// Shares burned to release `assets` at effective supply `s`. Rounds up.
pub(crate) fn shares_for_withdraw(slope: u128, s: u128, assets: u128) -> VaultResult<u128> {
    let area = scaled_area(slope, assets, Rounding::Up)?;
    // More than the whole area under the curve: surplus assets, not shares.
    let remaining = U256::full_mul(s, s)
        .checked_sub(area)
        .ok_or(VaultError::Underflow)?;
    s.checked_sub(remaining.isqrt()).ok_or(VaultError::Underflow)
}

pub(crate) fn validate_slope(slope: u128) -> VaultResult<()> {
    if slope == 0 {
        return Err(VaultError::InvalidCurveParameter(
            "slope must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressiveCurve {
    name: String,
    slope: u128,
    max_shares: u128,
    max_assets: u128,
}

impl ProgressiveCurve {
    pub fn new(name: impl Into<String>, slope: u128) -> VaultResult<Self> {
        Self::with_limits(name, slope, DEFAULT_MAX_SHARES, DEFAULT_MAX_ASSETS)
    }

    pub fn with_limits(
        name: impl Into<String>,
        slope: u128,
        max_shares: u128,
        max_assets: u128,
    ) -> VaultResult<Self> {
        validate_slope(slope)?;
        Ok(Self {
            name: name.into(),
            slope,
            max_shares,
            max_assets,
        })
    }

    pub fn slope(&self) -> u128 {
        self.slope
    }
}

impl BondingCurve for ProgressiveCurve {
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
        let shares = shares_for_assets(self.slope, total_shares, assets)?;
        check_shares_in(self.max_shares, shares, total_shares)?;
        Ok(shares)
    }

    fn preview_mint(&self, shares: u128, total_assets: u128, total_shares: u128) -> VaultResult<u128> {
        check_shares_in(self.max_shares, shares, total_shares)?;
        let assets = area_above(self.slope, total_shares, shares, Rounding::Up)?;
        check_assets_in(self.max_assets, assets, total_assets)?;
        Ok(assets)
    }

    fn preview_withdraw(&self, assets: u128, total_assets: u128, total_shares: u128) -> VaultResult<u128> {
        check_assets_out(assets, total_assets)?;
        let shares = shares_for_withdraw(self.slope, total_shares, assets)?;
        check_shares_out(shares, total_shares)?;
        Ok(shares)
    }

    fn preview_redeem(&self, shares: u128, total_assets: u128, total_shares: u128) -> VaultResult<u128> {
        check_shares_out(shares, total_shares)?;
        let assets = area_below(self.slope, total_shares, shares, Rounding::Down)?;
        check_assets_out(assets, total_assets)?;
        Ok(assets)
    }

    fn convert_to_shares(&self, assets: u128, _total_assets: u128, total_shares: u128) -> VaultResult<u128> {
        shares_for_assets(self.slope, total_shares, assets)
    }

    fn convert_to_assets(&self, shares: u128, _total_assets: u128, total_shares: u128) -> VaultResult<u128> {
        check_shares_out(shares, total_shares)?;
        area_below(self.slope, total_shares, shares, Rounding::Down)
    }

    fn current_price(&self, _total_assets: u128, total_shares: u128) -> VaultResult<u128> {
        mul_div(self.slope, total_shares, WAD, Rounding::Down)
    }
}
