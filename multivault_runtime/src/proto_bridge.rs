//! Proto ↔ Kernel conversion bridge.
//!
//! Converts between protobuf wire types (proto_types.rs) and the kernel's
//! `OperationEnvelope`. Encoding never fails; decoding rejects wrong-length
//! ids, unparsable amounts and envelopes without an operation.

use multivault_kernel::config::CurveSpec;
use multivault_kernel::operations::{Operation, OperationEnvelope};
use multivault_kernel::{Address, ApprovalType, TermId};

use crate::error::{RuntimeError, RuntimeResult};
use crate::proto_types::*;

// ── Scalars ────────────────────────────────────────────────────

fn conversion(msg: String) -> RuntimeError {
    RuntimeError::Conversion(msg)
}

fn address(bytes: &[u8]) -> RuntimeResult<Address> {
    let raw: [u8; 20] = bytes
        .try_into()
        .map_err(|_| conversion(format!("address must be 20 bytes, got {}", bytes.len())))?;
    Ok(Address(raw))
}

fn term_id(bytes: &[u8]) -> RuntimeResult<TermId> {
    let raw: [u8; 32] = bytes
        .try_into()
        .map_err(|_| conversion(format!("term id must be 32 bytes, got {}", bytes.len())))?;
    Ok(TermId(raw))
}

fn term_ids(items: &[Vec<u8>]) -> RuntimeResult<Vec<TermId>> {
    items.iter().map(|b| term_id(b)).collect()
}

fn amount(text: &str) -> RuntimeResult<u128> {
    text.parse::<u128>()
        .map_err(|e| conversion(format!("bad amount {:?}: {}", text, e)))
}

fn amounts(items: &[String]) -> RuntimeResult<Vec<u128>> {
    items.iter().map(|s| amount(s)).collect()
}

fn encode_amounts(items: &[u128]) -> Vec<String> {
    items.iter().map(u128::to_string).collect()
}

fn encode_ids(items: &[TermId]) -> Vec<Vec<u8>> {
    items.iter().map(|id| id.0.to_vec()).collect()
}

fn approval_code(approval: ApprovalType) -> u32 {
    match approval {
        ApprovalType::None => 0,
        ApprovalType::Deposit => 1,
        ApprovalType::Redemption => 2,
        ApprovalType::Both => 3,
    }
}

fn approval_from_code(code: u32) -> RuntimeResult<ApprovalType> {
    match code {
        0 => Ok(ApprovalType::None),
        1 => Ok(ApprovalType::Deposit),
        2 => Ok(ApprovalType::Redemption),
        3 => Ok(ApprovalType::Both),
        other => Err(conversion(format!("unknown approval type {}", other))),
    }
}

fn curve_to_proto(spec: &CurveSpec) -> ProtoCurveSpec {
    match spec {
        CurveSpec::Linear { name } => ProtoCurveSpec {
            kind: "linear".to_string(),
            name: name.clone(),
            slope: String::new(),
            offset: String::new(),
        },
        CurveSpec::Progressive { name, slope } => ProtoCurveSpec {
            kind: "progressive".to_string(),
            name: name.clone(),
            slope: slope.to_string(),
            offset: String::new(),
        },
        CurveSpec::OffsetProgressive {
            name,
            slope,
            offset,
        } => ProtoCurveSpec {
            kind: "offset_progressive".to_string(),
            name: name.clone(),
            slope: slope.to_string(),
            offset: offset.to_string(),
        },
    }
}

fn curve_from_proto(proto: &ProtoCurveSpec) -> RuntimeResult<CurveSpec> {
    let name = proto.name.clone();
    match proto.kind.as_str() {
        "linear" => Ok(CurveSpec::Linear { name }),
        "progressive" => Ok(CurveSpec::Progressive {
            name,
            slope: amount(&proto.slope)?,
        }),
        "offset_progressive" => Ok(CurveSpec::OffsetProgressive {
            name,
            slope: amount(&proto.slope)?,
            offset: amount(&proto.offset)?,
        }),
        other => Err(conversion(format!("unknown curve kind {:?}", other))),
    }
}

// ── Envelopes ──────────────────────────────────────────────────

/// Convert a kernel envelope to its protobuf form.
pub fn kernel_to_proto(envelope: &OperationEnvelope) -> ProtoOperationEnvelope {
    let kind = match &envelope.operation {
        Operation::CreateAtoms {
            sender,
            contents,
            assets,
        } => OperationKind::CreateAtoms(CreateAtoms {
            sender: sender.0.to_vec(),
            contents: contents.clone(),
            assets: encode_amounts(assets),
        }),
        Operation::CreateTriples {
            sender,
            subject_ids,
            predicate_ids,
            object_ids,
            assets,
        } => OperationKind::CreateTriples(CreateTriples {
            sender: sender.0.to_vec(),
            subject_ids: encode_ids(subject_ids),
            predicate_ids: encode_ids(predicate_ids),
            object_ids: encode_ids(object_ids),
            assets: encode_amounts(assets),
        }),
        Operation::Deposit {
            sender,
            receiver,
            term_id,
            curve_id,
            assets,
            min_shares,
        } => OperationKind::Deposit(Deposit {
            sender: sender.0.to_vec(),
            receiver: receiver.0.to_vec(),
            term_id: term_id.0.to_vec(),
            curve_id: *curve_id,
            assets: assets.to_string(),
            min_shares: min_shares.to_string(),
        }),
        Operation::DepositBatch {
            sender,
            receiver,
            term_ids,
            curve_ids,
            assets,
            min_shares,
        } => OperationKind::DepositBatch(DepositBatch {
            sender: sender.0.to_vec(),
            receiver: receiver.0.to_vec(),
            term_ids: encode_ids(term_ids),
            curve_ids: curve_ids.clone(),
            assets: encode_amounts(assets),
            min_shares: encode_amounts(min_shares),
        }),
        Operation::Redeem {
            sender,
            owner,
            term_id,
            curve_id,
            shares,
            min_assets,
        } => OperationKind::Redeem(Redeem {
            sender: sender.0.to_vec(),
            owner: owner.0.to_vec(),
            term_id: term_id.0.to_vec(),
            curve_id: *curve_id,
            shares: shares.to_string(),
            min_assets: min_assets.to_string(),
        }),
        Operation::RedeemBatch {
            sender,
            owner,
            term_ids,
            curve_ids,
            shares,
            min_assets,
        } => OperationKind::RedeemBatch(RedeemBatch {
            sender: sender.0.to_vec(),
            owner: owner.0.to_vec(),
            term_ids: encode_ids(term_ids),
            curve_ids: curve_ids.clone(),
            shares: encode_amounts(shares),
            min_assets: encode_amounts(min_assets),
        }),
        Operation::Approve {
            sender,
            operator,
            approval,
        } => OperationKind::Approve(Approve {
            sender: sender.0.to_vec(),
            operator: operator.0.to_vec(),
            approval: approval_code(*approval),
        }),
        Operation::ClaimAtomWalletDepositFees { sender, atom_id } => {
            OperationKind::ClaimAtomWalletDepositFees(ClaimAtomWalletDepositFees {
                sender: sender.0.to_vec(),
                atom_id: atom_id.0.to_vec(),
            })
        }
        Operation::RegisterCurve { sender, curve } => OperationKind::RegisterCurve(RegisterCurve {
            sender: sender.0.to_vec(),
            curve: Some(curve_to_proto(curve)),
        }),
        Operation::AdvanceEpoch { sender } => OperationKind::AdvanceEpoch(AdvanceEpoch {
            sender: sender.0.to_vec(),
        }),
        Operation::SetPaused { sender, paused } => OperationKind::SetPaused(SetPaused {
            sender: sender.0.to_vec(),
            paused: *paused,
        }),
    };

    ProtoOperationEnvelope {
        sequence: envelope.sequence,
        logical_time: envelope.logical_time,
        schema_version: envelope.schema_version,
        operation: Some(ProtoOperation { kind: Some(kind) }),
    }
}

/// Convert a protobuf envelope back to the kernel's form.
///
/// The schema version is carried through untouched; the kernel decides
/// whether it accepts it.
pub fn proto_to_kernel(proto: &ProtoOperationEnvelope) -> RuntimeResult<OperationEnvelope> {
    let kind = proto
        .operation
        .as_ref()
        .and_then(|op| op.kind.as_ref())
        .ok_or_else(|| conversion(format!("envelope {} has no operation", proto.sequence)))?;

    let operation = match kind {
        OperationKind::CreateAtoms(op) => Operation::CreateAtoms {
            sender: address(&op.sender)?,
            contents: op.contents.clone(),
            assets: amounts(&op.assets)?,
        },
        OperationKind::CreateTriples(op) => Operation::CreateTriples {
            sender: address(&op.sender)?,
            subject_ids: term_ids(&op.subject_ids)?,
            predicate_ids: term_ids(&op.predicate_ids)?,
            object_ids: term_ids(&op.object_ids)?,
            assets: amounts(&op.assets)?,
        },
        OperationKind::Deposit(op) => Operation::Deposit {
            sender: address(&op.sender)?,
            receiver: address(&op.receiver)?,
            term_id: term_id(&op.term_id)?,
            curve_id: op.curve_id,
            assets: amount(&op.assets)?,
            min_shares: amount(&op.min_shares)?,
        },
        OperationKind::DepositBatch(op) => Operation::DepositBatch {
            sender: address(&op.sender)?,
            receiver: address(&op.receiver)?,
            term_ids: term_ids(&op.term_ids)?,
            curve_ids: op.curve_ids.clone(),
            assets: amounts(&op.assets)?,
            min_shares: amounts(&op.min_shares)?,
        },
        OperationKind::Redeem(op) => Operation::Redeem {
            sender: address(&op.sender)?,
            owner: address(&op.owner)?,
            term_id: term_id(&op.term_id)?,
            curve_id: op.curve_id,
            shares: amount(&op.shares)?,
            min_assets: amount(&op.min_assets)?,
        },
        OperationKind::RedeemBatch(op) => Operation::RedeemBatch {
            sender: address(&op.sender)?,
            owner: address(&op.owner)?,
            term_ids: term_ids(&op.term_ids)?,
            curve_ids: op.curve_ids.clone(),
            shares: amounts(&op.shares)?,
            min_assets: amounts(&op.min_assets)?,
        },
        OperationKind::Approve(op) => Operation::Approve {
            sender: address(&op.sender)?,
            operator: address(&op.operator)?,
            approval: approval_from_code(op.approval)?,
        },
        OperationKind::ClaimAtomWalletDepositFees(op) => Operation::ClaimAtomWalletDepositFees {
            sender: address(&op.sender)?,
            atom_id: term_id(&op.atom_id)?,
        },
        OperationKind::RegisterCurve(op) => {
            let curve = op
                .curve
                .as_ref()
                .ok_or_else(|| conversion("register_curve without a curve".to_string()))?;
            Operation::RegisterCurve {
                sender: address(&op.sender)?,
                curve: curve_from_proto(curve)?,
            }
        }
        OperationKind::AdvanceEpoch(op) => Operation::AdvanceEpoch {
            sender: address(&op.sender)?,
        },
        OperationKind::SetPaused(op) => Operation::SetPaused {
            sender: address(&op.sender)?,
            paused: op.paused,
        },
    };

    Ok(OperationEnvelope {
        sequence: proto.sequence,
        logical_time: proto.logical_time,
        schema_version: proto.schema_version,
        operation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn large_amounts_survive_the_wire() {
        let env = OperationEnvelope::new(
            9,
            90,
            Operation::RedeemBatch {
                sender: Address::from_low_u64_be(3),
                owner: Address::from_low_u64_be(4),
                term_ids: vec![TermId([7u8; 32])],
                curve_ids: vec![2],
                shares: vec![u128::MAX],
                min_assets: vec![0],
            },
        );
        let bytes = kernel_to_proto(&env).encode_to_vec();
        let decoded = ProtoOperationEnvelope::decode(bytes.as_slice()).unwrap();
        assert_eq!(proto_to_kernel(&decoded).unwrap(), env);
    }

    #[test]
    fn curve_registration_keeps_parameters() {
        let env = OperationEnvelope::new(
            1,
            0,
            Operation::RegisterCurve {
                sender: Address::from_low_u64_be(1),
                curve: CurveSpec::OffsetProgressive {
                    name: "Offset".to_string(),
                    slope: 5,
                    offset: 7,
                },
            },
        );
        assert_eq!(proto_to_kernel(&kernel_to_proto(&env)).unwrap(), env);
    }

    #[test]
    fn rejects_short_ids_and_bad_amounts() {
        let mut proto = kernel_to_proto(&OperationEnvelope::new(
            1,
            0,
            Operation::Deposit {
                sender: Address::from_low_u64_be(1),
                receiver: Address::from_low_u64_be(1),
                term_id: TermId([1u8; 32]),
                curve_id: 1,
                assets: 10,
                min_shares: 0,
            },
        ));
        if let Some(ProtoOperation {
            kind: Some(OperationKind::Deposit(dep)),
        }) = proto.operation.as_mut()
        {
            dep.term_id.truncate(31);
        }
        assert!(matches!(
            proto_to_kernel(&proto),
            Err(RuntimeError::Conversion(msg)) if msg.contains("32 bytes")
        ));

        if let Some(ProtoOperation {
            kind: Some(OperationKind::Deposit(dep)),
        }) = proto.operation.as_mut()
        {
            dep.term_id = vec![1u8; 32];
            dep.assets = "-4".to_string();
        }
        assert!(matches!(proto_to_kernel(&proto), Err(RuntimeError::Conversion(_))));

        proto.operation = None;
        assert!(proto_to_kernel(&proto).is_err());
    }
}
