/// MultiVault Kernel: Ledger State
///
/// The single owned, serializable state value. Every map is a BTreeMap so
/// the canonical serialization is stable.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::curves::CurveRegistry;
use crate::domain::{Address, ApprovalType, CurveId, TermId};
use crate::graph::TermGraph;
use crate::ledger::VaultLedger;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LedgerState {
    pub terms: TermGraph,
    pub vaults: VaultLedger,
    /// Registered curve names by id. The instances live in the registry.
    pub curve_names: BTreeMap<CurveId, String>,
    /// Claimable atom-wallet deposit fees, by atom.
    pub atom_wallet_fees: BTreeMap<TermId, u128>,
    /// owner -> operator -> granted capability. `None` grants are not stored.
    pub approvals: BTreeMap<Address, BTreeMap<Address, ApprovalType>>,
    /// epoch -> account -> signed net volume.
    pub utilization: BTreeMap<u64, BTreeMap<Address, i128>>,
    pub total_utilization: BTreeMap<u64, i128>,
    pub epoch: u64,
    pub paused: bool,
    /// Running total pushed to the protocol fee sink.
    pub protocol_fees_transferred: u128,
}

impl LedgerState {
    pub fn approval(&self, owner: &Address, operator: &Address) -> ApprovalType {
        self.approvals
            .get(owner)
            .and_then(|ops| ops.get(operator))
            .copied()
            .unwrap_or_default()
    }

    pub fn accumulated_atom_wallet_fees(&self, atom_id: &TermId) -> u128 {
        self.atom_wallet_fees.get(atom_id).copied().unwrap_or(0)
    }

    pub fn utilization(&self, epoch: u64, account: &Address) -> i128 {
        self.utilization
            .get(&epoch)
            .and_then(|by_account| by_account.get(account))
            .copied()
            .unwrap_or(0)
    }

    pub fn total_utilization(&self, epoch: u64) -> i128 {
        self.total_utilization.get(&epoch).copied().unwrap_or(0)
    }
}

/// Create a fresh, empty state that knows the registry's curves.
pub fn create_initial_state(curves: &CurveRegistry) -> LedgerState {
    LedgerState {
        curve_names: curves
            .iter()
            .map(|(id, curve)| (id, curve.name().to_string()))
            .collect(),
        ..LedgerState::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BondingCurveConfig;

    #[test]
    fn initial_state_lists_configured_curves() {
        let registry = CurveRegistry::from_config(&BondingCurveConfig::default()).unwrap();
        let state = create_initial_state(&registry);
        assert_eq!(state.curve_names.len(), 3);
        assert_eq!(state.curve_names[&1], "Linear Curve");
        assert!(state.terms.is_empty());
        assert!(state.vaults.is_empty());
        assert_eq!(state.epoch, 0);
        assert!(!state.paused);
    }

    #[test]
    fn missing_entries_read_as_zero() {
        let state = LedgerState::default();
        let a = Address::from_low_u64_be(1);
        let b = Address::from_low_u64_be(2);
        assert_eq!(state.approval(&a, &b), ApprovalType::None);
        assert_eq!(state.utilization(0, &a), 0);
        assert_eq!(state.total_utilization(4), 0);
        assert_eq!(state.accumulated_atom_wallet_fees(&TermId([0u8; 32])), 0);
    }

    #[test]
    fn state_json_roundtrip_keeps_large_amounts() {
        let mut state = LedgerState::default();
        state.protocol_fees_transferred = u128::MAX;
        state.total_utilization.insert(3, i128::MIN);
        let json = serde_json::to_string(&state).unwrap();
        let back: LedgerState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
