/// MultiVault Kernel: Operations
///
/// Operations are pure data. They carry intent and payload only.
/// They contain ZERO transition logic.
///
/// Schema version is locked at 1. Envelopes with another schema_version
/// are rejected by the engine.

use serde::{Deserialize, Serialize};

use crate::config::CurveSpec;
use crate::domain::{hex_bytes_vec, Address, ApprovalType, CurveId, TermId};
use crate::error::{VaultError, VaultResult};

/// Schema version for v1 kernel operations.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    CreateAtoms {
        sender: Address,
        #[serde(with = "hex_bytes_vec")]
        contents: Vec<Vec<u8>>,
        assets: Vec<u128>,
    },
    CreateTriples {
        sender: Address,
        subject_ids: Vec<TermId>,
        predicate_ids: Vec<TermId>,
        object_ids: Vec<TermId>,
        assets: Vec<u128>,
    },
    Deposit {
        sender: Address,
        receiver: Address,
        term_id: TermId,
        curve_id: CurveId,
        assets: u128,
        min_shares: u128,
    },
    DepositBatch {
        sender: Address,
        receiver: Address,
        term_ids: Vec<TermId>,
        curve_ids: Vec<CurveId>,
        assets: Vec<u128>,
        min_shares: Vec<u128>,
    },
    Redeem {
        sender: Address,
        owner: Address,
        term_id: TermId,
        curve_id: CurveId,
        shares: u128,
        min_assets: u128,
    },
    RedeemBatch {
        sender: Address,
        owner: Address,
        term_ids: Vec<TermId>,
        curve_ids: Vec<CurveId>,
        shares: Vec<u128>,
        min_assets: Vec<u128>,
    },
    Approve {
        sender: Address,
        operator: Address,
        approval: ApprovalType,
    },
    ClaimAtomWalletDepositFees {
        sender: Address,
        atom_id: TermId,
    },
    RegisterCurve {
        sender: Address,
        curve: CurveSpec,
    },
    AdvanceEpoch {
        sender: Address,
    },
    SetPaused {
        sender: Address,
        paused: bool,
    },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::CreateAtoms { .. } => "create_atoms",
            Operation::CreateTriples { .. } => "create_triples",
            Operation::Deposit { .. } => "deposit",
            Operation::DepositBatch { .. } => "deposit_batch",
            Operation::Redeem { .. } => "redeem",
            Operation::RedeemBatch { .. } => "redeem_batch",
            Operation::Approve { .. } => "approve",
            Operation::ClaimAtomWalletDepositFees { .. } => "claim_atom_wallet_deposit_fees",
            Operation::RegisterCurve { .. } => "register_curve",
            Operation::AdvanceEpoch { .. } => "advance_epoch",
            Operation::SetPaused { .. } => "set_paused",
        }
    }

    pub fn sender(&self) -> Address {
        match self {
            Operation::CreateAtoms { sender, .. }
            | Operation::CreateTriples { sender, .. }
            | Operation::Deposit { sender, .. }
            | Operation::DepositBatch { sender, .. }
            | Operation::Redeem { sender, .. }
            | Operation::RedeemBatch { sender, .. }
            | Operation::Approve { sender, .. }
            | Operation::ClaimAtomWalletDepositFees { sender, .. }
            | Operation::RegisterCurve { sender, .. }
            | Operation::AdvanceEpoch { sender }
            | Operation::SetPaused { sender, .. } => *sender,
        }
    }
}

/// Sequenced operation, the unit of the append-only log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OperationEnvelope {
    pub sequence: u64,
    pub logical_time: u64,
    pub schema_version: u32,
    pub operation: Operation,
}

impl OperationEnvelope {
    pub fn new(sequence: u64, logical_time: u64, operation: Operation) -> Self {
        Self {
            sequence,
            logical_time,
            schema_version: SCHEMA_VERSION,
            operation,
        }
    }

    pub fn to_json(&self) -> VaultResult<String> {
        serde_json::to_string(self).map_err(|e| VaultError::Serialization(e.to_string()))
    }

    pub fn from_json(json: &str) -> VaultResult<Self> {
        serde_json::from_str(json).map_err(|e| VaultError::Serialization(e.to_string()))
    }
}

/// What a successfully applied operation returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationOutcome {
    TermsCreated(Vec<TermId>),
    SharesMinted(Vec<u128>),
    AssetsRedeemed(Vec<u128>),
    Claimed(u128),
    CurveRegistered(CurveId),
    Done,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_json_roundtrip() {
        let env = OperationEnvelope::new(
            3,
            30,
            Operation::Deposit {
                sender: Address::from_low_u64_be(5),
                receiver: Address::from_low_u64_be(6),
                term_id: TermId([4u8; 32]),
                curve_id: 2,
                assets: u128::MAX,
                min_shares: 0,
            },
        );
        let json = env.to_json().unwrap();
        assert!(json.contains("\"deposit\""));
        assert_eq!(OperationEnvelope::from_json(&json).unwrap(), env);
    }

    #[test]
    fn atom_contents_travel_as_hex() {
        let op = Operation::CreateAtoms {
            sender: Address::from_low_u64_be(5),
            contents: vec![b"hi".to_vec()],
            assets: vec![1],
        };
        let json = serde_json::to_string(&op).unwrap();
        assert!(json.contains("\"6869\""));
        assert_eq!(serde_json::from_str::<Operation>(&json).unwrap(), op);
    }

    #[test]
    fn sender_and_name() {
        let op = Operation::AdvanceEpoch {
            sender: Address::from_low_u64_be(1),
        };
        assert_eq!(op.name(), "advance_epoch");
        assert_eq!(op.sender(), Address::from_low_u64_be(1));
    }
}
