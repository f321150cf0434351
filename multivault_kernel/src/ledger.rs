/// MultiVault Kernel: Vault Ledger
///
/// (term id, curve id) -> vault. Vaults are created on first deposit and
/// never deleted. Zero balances are pruned so equal states serialize
/// identically.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::arithmetic::{checked_add, checked_sub};
use crate::domain::{Address, CurveId, TermId, VaultPhase, VaultTotals};
use crate::error::{VaultError, VaultResult};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Vault {
    pub total_assets: u128,
    pub total_shares: u128,
    pub balances: BTreeMap<Address, u128>,
}

impl Vault {
    /// A vault holding only its ghost shares.
    pub fn bootstrapped(ghost_shares: u128, ghost_cost: u128) -> Self {
        let mut balances = BTreeMap::new();
        balances.insert(Address::ZERO, ghost_shares);
        Self {
            total_assets: ghost_cost,
            total_shares: ghost_shares,
            balances,
        }
    }

    pub fn totals(&self) -> VaultTotals {
        VaultTotals {
            total_assets: self.total_assets,
            total_shares: self.total_shares,
        }
    }

    pub fn balance_of(&self, account: &Address) -> u128 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// Shares held by real accounts, i.e. everything except the ghost sink.
    pub fn holder_shares(&self) -> u128 {
        self.total_shares
            .saturating_sub(self.balance_of(&Address::ZERO))
    }

    pub fn phase(&self) -> VaultPhase {
        if self.holder_shares() == 0 {
            VaultPhase::Bootstrapped
        } else {
            VaultPhase::Active
        }
    }

    pub fn mint(&mut self, to: Address, shares: u128) -> VaultResult<()> {
        let balance = checked_add(self.balance_of(&to), shares)?;
        self.total_shares = checked_add(self.total_shares, shares)?;
        self.balances.insert(to, balance);
        Ok(())
    }

    pub fn burn(&mut self, from: Address, shares: u128) -> VaultResult<()> {
        let have = self.balance_of(&from);
        let balance = have
            .checked_sub(shares)
            .ok_or(VaultError::InsufficientSharesInVault { have, need: shares })?;
        self.total_shares = checked_sub(self.total_shares, shares)?;
        if balance == 0 {
            self.balances.remove(&from);
        } else {
            self.balances.insert(from, balance);
        }
        Ok(())
    }

    pub fn add_assets(&mut self, assets: u128) -> VaultResult<()> {
        self.total_assets = checked_add(self.total_assets, assets)?;
        Ok(())
    }

    pub fn remove_assets(&mut self, assets: u128) -> VaultResult<()> {
        self.total_assets = checked_sub(self.total_assets, assets)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VaultLedger {
    vaults: BTreeMap<TermId, BTreeMap<CurveId, Vault>>,
}

impl VaultLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, term_id: &TermId, curve_id: CurveId) -> Option<&Vault> {
        self.vaults.get(term_id).and_then(|by_curve| by_curve.get(&curve_id))
    }

    pub fn vault(&self, term_id: &TermId, curve_id: CurveId) -> VaultResult<&Vault> {
        self.get(term_id, curve_id).ok_or(VaultError::VaultDoesNotExist {
            term_id: *term_id,
            curve_id,
        })
    }

    pub fn vault_mut(&mut self, term_id: &TermId, curve_id: CurveId) -> VaultResult<&mut Vault> {
        self.vaults
            .get_mut(term_id)
            .and_then(|by_curve| by_curve.get_mut(&curve_id))
            .ok_or(VaultError::VaultDoesNotExist {
                term_id: *term_id,
                curve_id,
            })
    }

    pub fn exists(&self, term_id: &TermId, curve_id: CurveId) -> bool {
        self.get(term_id, curve_id).is_some()
    }

    /// Insert a freshly bootstrapped vault. Existing vaults are left untouched.
    pub fn bootstrap(
        &mut self,
        term_id: TermId,
        curve_id: CurveId,
        ghost_shares: u128,
        ghost_cost: u128,
    ) -> bool {
        let by_curve = self.vaults.entry(term_id).or_default();
        if by_curve.contains_key(&curve_id) {
            return false;
        }
        by_curve.insert(curve_id, Vault::bootstrapped(ghost_shares, ghost_cost));
        true
    }

    pub fn totals(&self, term_id: &TermId, curve_id: CurveId) -> VaultTotals {
        self.get(term_id, curve_id)
            .map(Vault::totals)
            .unwrap_or_default()
    }

    pub fn phase(&self, term_id: &TermId, curve_id: CurveId) -> VaultPhase {
        self.get(term_id, curve_id)
            .map(Vault::phase)
            .unwrap_or(VaultPhase::Uninitialized)
    }

    pub fn shares_of(&self, account: &Address, term_id: &TermId, curve_id: CurveId) -> u128 {
        self.get(term_id, curve_id)
            .map(|v| v.balance_of(account))
            .unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TermId, CurveId, &Vault)> {
        self.vaults.iter().flat_map(|(term_id, by_curve)| {
            by_curve
                .iter()
                .map(move |(curve_id, vault)| (term_id, *curve_id, vault))
        })
    }

    pub fn len(&self) -> usize {
        self.vaults.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GHOST: u128 = 1_000_000;

    fn alice() -> Address {
        Address::from_low_u64_be(0xa1)
    }

    #[test]
    fn bootstrap_mints_ghost_shares_to_zero() {
        let mut ledger = VaultLedger::new();
        let term = TermId([1u8; 32]);
        assert_eq!(ledger.phase(&term, 1), VaultPhase::Uninitialized);
        assert!(ledger.bootstrap(term, 1, GHOST, 5));
        assert!(!ledger.bootstrap(term, 1, GHOST, 5));

        let vault = ledger.vault(&term, 1).unwrap();
        assert_eq!(vault.balance_of(&Address::ZERO), GHOST);
        assert_eq!(vault.totals(), VaultTotals { total_assets: 5, total_shares: GHOST });
        assert_eq!(ledger.phase(&term, 1), VaultPhase::Bootstrapped);
    }

    #[test]
    fn mint_and_burn_keep_totals_in_step() {
        let mut vault = Vault::bootstrapped(GHOST, 0);
        vault.mint(alice(), 500).unwrap();
        assert_eq!(vault.phase(), VaultPhase::Active);
        assert_eq!(vault.holder_shares(), 500);
        vault.burn(alice(), 200).unwrap();
        assert_eq!(vault.balance_of(&alice()), 300);
        assert_eq!(vault.total_shares, GHOST + 300);
        vault.burn(alice(), 300).unwrap();
        assert!(!vault.balances.contains_key(&alice()));
        assert_eq!(vault.phase(), VaultPhase::Bootstrapped);
    }

    #[test]
    fn burn_more_than_balance_fails() {
        let mut vault = Vault::bootstrapped(GHOST, 0);
        vault.mint(alice(), 10).unwrap();
        assert_eq!(
            vault.burn(alice(), 11),
            Err(VaultError::InsufficientSharesInVault { have: 10, need: 11 })
        );
    }

    #[test]
    fn missing_vault_lookup() {
        let ledger = VaultLedger::new();
        let term = TermId([2u8; 32]);
        assert_eq!(
            ledger.vault(&term, 3),
            Err(VaultError::VaultDoesNotExist { term_id: term, curve_id: 3 })
        );
        assert_eq!(ledger.totals(&term, 3), VaultTotals::default());
        assert_eq!(ledger.shares_of(&alice(), &term, 3), 0);
    }
}
