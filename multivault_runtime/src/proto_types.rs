//! Hand-written protobuf types for the operation log.
//!
//! Uses prost derive macros for encode/decode without prost-build.
//! Protobuf has no 128-bit integer, so amounts travel as decimal strings.
//! Term ids are 32 raw bytes and addresses 20 raw bytes.

use prost::Message;

// ── Operation Envelope ─────────────────────────────────────────

#[derive(Clone, PartialEq, Message)]
pub struct ProtoOperationEnvelope {
    #[prost(uint64, tag = "1")]
    pub sequence: u64,
    #[prost(uint64, tag = "2")]
    pub logical_time: u64,
    #[prost(uint32, tag = "3")]
    pub schema_version: u32,
    #[prost(message, optional, tag = "4")]
    pub operation: Option<ProtoOperation>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ProtoOperation {
    #[prost(oneof = "OperationKind", tags = "1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11")]
    pub kind: Option<OperationKind>,
}

#[derive(Clone, PartialEq, prost::Oneof)]
pub enum OperationKind {
    #[prost(message, tag = "1")]
    CreateAtoms(CreateAtoms),
    #[prost(message, tag = "2")]
    CreateTriples(CreateTriples),
    #[prost(message, tag = "3")]
    Deposit(Deposit),
    #[prost(message, tag = "4")]
    DepositBatch(DepositBatch),
    #[prost(message, tag = "5")]
    Redeem(Redeem),
    #[prost(message, tag = "6")]
    RedeemBatch(RedeemBatch),
    #[prost(message, tag = "7")]
    Approve(Approve),
    #[prost(message, tag = "8")]
    ClaimAtomWalletDepositFees(ClaimAtomWalletDepositFees),
    #[prost(message, tag = "9")]
    RegisterCurve(RegisterCurve),
    #[prost(message, tag = "10")]
    AdvanceEpoch(AdvanceEpoch),
    #[prost(message, tag = "11")]
    SetPaused(SetPaused),
}

// ── Curve declaration ──────────────────────────────────────────

/// `kind` is one of `linear`, `progressive`, `offset_progressive`.
/// Unused parameters are left empty.
#[derive(Clone, PartialEq, Message)]
pub struct ProtoCurveSpec {
    #[prost(string, tag = "1")]
    pub kind: String,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(string, tag = "3")]
    pub slope: String,
    #[prost(string, tag = "4")]
    pub offset: String,
}

// ── Operation Types ────────────────────────────────────────────

#[derive(Clone, PartialEq, Message)]
pub struct CreateAtoms {
    #[prost(bytes = "vec", tag = "1")]
    pub sender: Vec<u8>,
    #[prost(bytes = "vec", repeated, tag = "2")]
    pub contents: Vec<Vec<u8>>,
    #[prost(string, repeated, tag = "3")]
    pub assets: Vec<String>,
}

#[derive(Clone, PartialEq, Message)]
pub struct CreateTriples {
    #[prost(bytes = "vec", tag = "1")]
    pub sender: Vec<u8>,
    #[prost(bytes = "vec", repeated, tag = "2")]
    pub subject_ids: Vec<Vec<u8>>,
    #[prost(bytes = "vec", repeated, tag = "3")]
    pub predicate_ids: Vec<Vec<u8>>,
    #[prost(bytes = "vec", repeated, tag = "4")]
    pub object_ids: Vec<Vec<u8>>,
    #[prost(string, repeated, tag = "5")]
    pub assets: Vec<String>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Deposit {
    #[prost(bytes = "vec", tag = "1")]
    pub sender: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub receiver: Vec<u8>,
    #[prost(bytes = "vec", tag = "3")]
    pub term_id: Vec<u8>,
    #[prost(uint32, tag = "4")]
    pub curve_id: u32,
    #[prost(string, tag = "5")]
    pub assets: String,
    #[prost(string, tag = "6")]
    pub min_shares: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct DepositBatch {
    #[prost(bytes = "vec", tag = "1")]
    pub sender: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub receiver: Vec<u8>,
    #[prost(bytes = "vec", repeated, tag = "3")]
    pub term_ids: Vec<Vec<u8>>,
    #[prost(uint32, repeated, tag = "4")]
    pub curve_ids: Vec<u32>,
    #[prost(string, repeated, tag = "5")]
    pub assets: Vec<String>,
    #[prost(string, repeated, tag = "6")]
    pub min_shares: Vec<String>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Redeem {
    #[prost(bytes = "vec", tag = "1")]
    pub sender: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub owner: Vec<u8>,
    #[prost(bytes = "vec", tag = "3")]
    pub term_id: Vec<u8>,
    #[prost(uint32, tag = "4")]
    pub curve_id: u32,
    #[prost(string, tag = "5")]
    pub shares: String,
    #[prost(string, tag = "6")]
    pub min_assets: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct RedeemBatch {
    #[prost(bytes = "vec", tag = "1")]
    pub sender: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub owner: Vec<u8>,
    #[prost(bytes = "vec", repeated, tag = "3")]
    pub term_ids: Vec<Vec<u8>>,
    #[prost(uint32, repeated, tag = "4")]
    pub curve_ids: Vec<u32>,
    #[prost(string, repeated, tag = "5")]
    pub shares: Vec<String>,
    #[prost(string, repeated, tag = "6")]
    pub min_assets: Vec<String>,
}

/// `approval`: 0 none, 1 deposit, 2 redemption, 3 both.
#[derive(Clone, PartialEq, Message)]
pub struct Approve {
    #[prost(bytes = "vec", tag = "1")]
    pub sender: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub operator: Vec<u8>,
    #[prost(uint32, tag = "3")]
    pub approval: u32,
}

#[derive(Clone, PartialEq, Message)]
pub struct ClaimAtomWalletDepositFees {
    #[prost(bytes = "vec", tag = "1")]
    pub sender: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub atom_id: Vec<u8>,
}

#[derive(Clone, PartialEq, Message)]
pub struct RegisterCurve {
    #[prost(bytes = "vec", tag = "1")]
    pub sender: Vec<u8>,
    #[prost(message, optional, tag = "2")]
    pub curve: Option<ProtoCurveSpec>,
}

#[derive(Clone, PartialEq, Message)]
pub struct AdvanceEpoch {
    #[prost(bytes = "vec", tag = "1")]
    pub sender: Vec<u8>,
}

#[derive(Clone, PartialEq, Message)]
pub struct SetPaused {
    #[prost(bytes = "vec", tag = "1")]
    pub sender: Vec<u8>,
    #[prost(bool, tag = "2")]
    pub paused: bool,
}
