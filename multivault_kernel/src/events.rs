/// MultiVault Kernel: Ledger Events
///
/// Notifications queued during a transition and published only after the
/// new state has been committed. They describe what happened; nothing reads
/// them back into the ledger.

use serde::{Deserialize, Serialize};

use crate::domain::{Address, ApprovalType, CurveId, TermId, TermKind, VaultTotals};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEvent {
    AtomCreated {
        creator: Address,
        term_id: TermId,
        atom_wallet: Address,
        curve_id: CurveId,
        after: VaultTotals,
    },
    TripleCreated {
        creator: Address,
        term_id: TermId,
        counter_id: TermId,
        subject_id: TermId,
        predicate_id: TermId,
        object_id: TermId,
        curve_id: CurveId,
    },
    Deposited {
        sender: Address,
        receiver: Address,
        term_id: TermId,
        curve_id: CurveId,
        kind: TermKind,
        assets: u128,
        assets_after_fees: u128,
        shares: u128,
        before: VaultTotals,
        after: VaultTotals,
    },
    Redeemed {
        sender: Address,
        owner: Address,
        term_id: TermId,
        curve_id: CurveId,
        shares: u128,
        gross_assets: u128,
        assets_after_fees: u128,
        exit_fee: u128,
        protocol_fee: u128,
        before: VaultTotals,
        after: VaultTotals,
    },
    ProtocolFeeTransferred {
        sender: Address,
        destination: Address,
        amount: u128,
    },
    AtomWalletDepositFeeCollected {
        term_id: TermId,
        atom_wallet: Address,
        sender: Address,
        amount: u128,
    },
    AtomWalletDepositFeesClaimed {
        term_id: TermId,
        atom_wallet: Address,
        amount: u128,
    },
    ApprovalTypeUpdated {
        owner: Address,
        operator: Address,
        approval: ApprovalType,
    },
    CurveAdded {
        curve_id: CurveId,
        name: String,
    },
    UtilizationRecorded {
        epoch: u64,
        account: Address,
        delta: i128,
        account_total: i128,
        epoch_total: i128,
    },
    EpochAdvanced {
        epoch: u64,
    },
    PauseToggled {
        paused: bool,
    },
    AssetsTransferred {
        to: Address,
        amount: u128,
    },
}

impl LedgerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LedgerEvent::AtomCreated { .. } => "AtomCreated",
            LedgerEvent::TripleCreated { .. } => "TripleCreated",
            LedgerEvent::Deposited { .. } => "Deposited",
            LedgerEvent::Redeemed { .. } => "Redeemed",
            LedgerEvent::ProtocolFeeTransferred { .. } => "ProtocolFeeTransferred",
            LedgerEvent::AtomWalletDepositFeeCollected { .. } => "AtomWalletDepositFeeCollected",
            LedgerEvent::AtomWalletDepositFeesClaimed { .. } => "AtomWalletDepositFeesClaimed",
            LedgerEvent::ApprovalTypeUpdated { .. } => "ApprovalTypeUpdated",
            LedgerEvent::CurveAdded { .. } => "CurveAdded",
            LedgerEvent::UtilizationRecorded { .. } => "UtilizationRecorded",
            LedgerEvent::EpochAdvanced { .. } => "EpochAdvanced",
            LedgerEvent::PauseToggled { .. } => "PauseToggled",
            LedgerEvent::AssetsTransferred { .. } => "AssetsTransferred",
        }
    }

    /// The term the event concerns, if any.
    pub fn term_id(&self) -> Option<TermId> {
        match self {
            LedgerEvent::AtomCreated { term_id, .. }
            | LedgerEvent::TripleCreated { term_id, .. }
            | LedgerEvent::Deposited { term_id, .. }
            | LedgerEvent::Redeemed { term_id, .. }
            | LedgerEvent::AtomWalletDepositFeeCollected { term_id, .. }
            | LedgerEvent::AtomWalletDepositFeesClaimed { term_id, .. } => Some(*term_id),
            _ => None,
        }
    }
}
