/// MultiVault Kernel: Arithmetic Primitives
///
/// All amounts: u128 raw units, fixed-point WAD = 1e18.
/// No float. No f64. No f32.
///
/// Products that can leave the u128 range (squared share supplies,
/// amount * WAD^2) go through the 256-bit `U256` intermediate. Every
/// division states its rounding direction explicitly.

use std::cmp::Ordering;

use crate::error::{VaultError, VaultResult};

/// Fixed-point scale factor. One whole token or share is `WAD` raw units.
pub const WAD: u128 = 1_000_000_000_000_000_000;

/// Rounding direction for every division in the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    Down,
    Up,
}

pub fn checked_add(a: u128, b: u128) -> VaultResult<u128> {
    a.checked_add(b).ok_or(VaultError::Overflow)
}

pub fn checked_sub(a: u128, b: u128) -> VaultResult<u128> {
    a.checked_sub(b).ok_or(VaultError::Underflow)
}

pub fn checked_mul(a: u128, b: u128) -> VaultResult<u128> {
    a.checked_mul(b).ok_or(VaultError::Overflow)
}

/// `a * b / denom` with a 256-bit product and explicit rounding.
pub fn mul_div(a: u128, b: u128, denom: u128, rounding: Rounding) -> VaultResult<u128> {
    if denom == 0 {
        return Err(VaultError::DivisionByZero);
    }
    let (q, r) = U256::full_mul(a, b).div_rem(denom);
    let q = q.to_u128().ok_or(VaultError::Overflow)?;
    match rounding {
        Rounding::Up if r > 0 => checked_add(q, 1),
        _ => Ok(q),
    }
}

/// `x * m / denom` for a 256-bit `x`. The result must fit in u128.
///
/// Split as `x = q*denom + r`, so `x*m/denom = q*m + r*m/denom` and the
/// rounding only ever touches the fractional term.
pub fn mul_div_wide(x: U256, m: u128, denom: u128, rounding: Rounding) -> VaultResult<u128> {
    if denom == 0 {
        return Err(VaultError::DivisionByZero);
    }
    let (q, r) = x.div_rem(denom);
    let q = q.to_u128().ok_or(VaultError::Overflow)?;
    let whole = checked_mul(q, m)?;
    let frac = mul_div(r, m, denom, rounding)?;
    checked_add(whole, frac)
}

/// Unsigned 256-bit integer as two u128 limbs. Only the operations the
/// curves need: widening multiply, add/sub, division by u128, sqrt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct U256 {
    hi: u128,
    lo: u128,
}

impl U256 {
    pub const ZERO: U256 = U256 { hi: 0, lo: 0 };

    pub fn from_u128(v: u128) -> Self {
        U256 { hi: 0, lo: v }
    }

    /// Exact product of two u128 values.
    pub fn full_mul(a: u128, b: u128) -> Self {
        const MASK: u128 = u64::MAX as u128;
        let (a1, a0) = (a >> 64, a & MASK);
        let (b1, b0) = (b >> 64, b & MASK);

        let p00 = a0 * b0;
        let p01 = a0 * b1;
        let p10 = a1 * b0;
        let p11 = a1 * b1;

        // Sum of three values below 2^64 each, cannot overflow u128.
        let mid = (p00 >> 64) + (p01 & MASK) + (p10 & MASK);
        let lo = (p00 & MASK) | ((mid & MASK) << 64);
        let hi = p11 + (p01 >> 64) + (p10 >> 64) + (mid >> 64);
        U256 { hi, lo }
    }

    pub fn checked_add(self, other: U256) -> Option<U256> {
        let (lo, carry) = self.lo.overflowing_add(other.lo);
        let hi = self.hi.checked_add(other.hi)?.checked_add(carry as u128)?;
        Some(U256 { hi, lo })
    }

    pub fn checked_sub(self, other: U256) -> Option<U256> {
        let (lo, borrow) = self.lo.overflowing_sub(other.lo);
        let hi = self.hi.checked_sub(other.hi)?.checked_sub(borrow as u128)?;
        Some(U256 { hi, lo })
    }

    /// Quotient and remainder of division by a non-zero u128.
    pub fn div_rem(self, d: u128) -> (U256, u128) {
        debug_assert!(d != 0);
        let q_hi = self.hi / d;
        let (q_lo, r) = div_wide(self.hi % d, self.lo, d);
        (U256 { hi: q_hi, lo: q_lo }, r)
    }

    pub fn to_u128(self) -> Option<u128> {
        if self.hi == 0 {
            Some(self.lo)
        } else {
            None
        }
    }

    /// Floor square root. Always fits in u128.
    pub fn isqrt(self) -> u128 {
        let mut root: u128 = 0;
        for bit in (0..128).rev() {
            let candidate = root | (1u128 << bit);
            if U256::full_mul(candidate, candidate) <= self {
                root = candidate;
            }
        }
        root
    }
}

impl PartialOrd for U256 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for U256 {
    fn cmp(&self, other: &Self) -> Ordering {
        self.hi.cmp(&other.hi).then_with(|| self.lo.cmp(&other.lo))
    }
}

/// Divide the 256-bit value `(hi, lo)` by `d`, given `hi < d`.
/// Restoring long division, one bit at a time.
fn div_wide(hi: u128, lo: u128, d: u128) -> (u128, u128) {
    let mut rem = hi;
    let mut q: u128 = 0;
    for i in (0..128).rev() {
        let carry = rem >> 127;
        rem = (rem << 1) | ((lo >> i) & 1);
        q <<= 1;
        if carry == 1 || rem >= d {
            rem = rem.wrapping_sub(d);
            q |= 1;
        }
    }
    (q, rem)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_add_overflow() {
        assert_eq!(checked_add(3, 4), Ok(7));
        assert_eq!(checked_add(u128::MAX, 1), Err(VaultError::Overflow));
    }

    #[test]
    fn test_checked_sub_underflow() {
        assert_eq!(checked_sub(4, 3), Ok(1));
        assert_eq!(checked_sub(3, 4), Err(VaultError::Underflow));
    }

    #[test]
    fn test_full_mul_small() {
        assert_eq!(U256::full_mul(6, 7), U256::from_u128(42));
    }

    #[test]
    fn test_full_mul_max() {
        // (2^128 - 1)^2 = 2^256 - 2^129 + 1
        let p = U256::full_mul(u128::MAX, u128::MAX);
        assert_eq!(p.hi, u128::MAX - 1);
        assert_eq!(p.lo, 1);
    }

    #[test]
    fn test_mul_div_rounding() {
        assert_eq!(mul_div(10, 1, 3, Rounding::Down), Ok(3));
        assert_eq!(mul_div(10, 1, 3, Rounding::Up), Ok(4));
        assert_eq!(mul_div(9, 1, 3, Rounding::Up), Ok(3));
    }

    #[test]
    fn test_mul_div_wide_intermediate() {
        // big * WAD needs 256 bits before the division brings it back.
        let big = 100 * WAD * WAD;
        assert_eq!(mul_div(big, WAD, WAD, Rounding::Down), Ok(big));
        assert_eq!(mul_div(u128::MAX, u128::MAX, u128::MAX, Rounding::Down), Ok(u128::MAX));
    }

    #[test]
    fn test_mul_div_result_overflow() {
        assert_eq!(
            mul_div(u128::MAX, 2, 1, Rounding::Down),
            Err(VaultError::Overflow)
        );
    }

    #[test]
    fn test_mul_div_zero_denominator() {
        assert_eq!(mul_div(1, 1, 0, Rounding::Down), Err(VaultError::DivisionByZero));
    }

    #[test]
    fn test_mul_div_wide_matches_mul_div() {
        let x = U256::full_mul(123_456_789 * WAD, 987_654_321);
        let direct = mul_div(123_456_789 * WAD, 987_654_321 * 7, 13, Rounding::Up).unwrap();
        assert_eq!(mul_div_wide(x, 7, 13, Rounding::Up), Ok(direct));
    }

    #[test]
    fn test_u256_add_sub() {
        let a = U256::full_mul(u128::MAX, 2);
        let b = U256::from_u128(u128::MAX);
        let c = a.checked_add(b).unwrap();
        assert_eq!(c.checked_sub(b), Some(a));
        assert_eq!(b.checked_sub(a), None);
    }

    #[test]
    fn test_isqrt_exact_and_floor() {
        assert_eq!(U256::from_u128(0).isqrt(), 0);
        assert_eq!(U256::from_u128(15).isqrt(), 3);
        assert_eq!(U256::from_u128(16).isqrt(), 4);
        let s = 1_000_000 * WAD;
        assert_eq!(U256::full_mul(s, s).isqrt(), s);
        let below = U256::full_mul(s, s).checked_sub(U256::from_u128(1)).unwrap();
        assert_eq!(below.isqrt(), s - 1);
    }

    #[test]
    fn test_u256_ordering() {
        let small = U256::from_u128(u128::MAX);
        let large = U256::full_mul(u128::MAX, 2);
        assert!(small < large);
        assert!(large > U256::ZERO);
    }
}
