//! Kernel error taxonomy.
//!
//! Every failure is scoped to the single operation that produced it. The
//! engine discards the working copy of the state on any error, so no variant
//! here ever describes a partially applied operation.

use thiserror::Error;

use crate::domain::{Address, CurveId, TermId};

/// Error during ledger operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VaultError {
    // -- validation --
    #[error("Arrays not same length: expected {expected}, got {got}")]
    ArraysNotSameLength { expected: usize, got: usize },

    #[error("No atom data provided")]
    NoAtomDataProvided,

    #[error("No triples provided")]
    NoTriplesProvided,

    #[error("Empty batch")]
    EmptyBatch,

    #[error("Atom data too long: {len} bytes exceeds max {max}")]
    ContentTooLong { len: usize, max: usize },

    #[error("Atom data is empty")]
    EmptyAtomData,

    #[error("Atom already exists: {0}")]
    AtomExists(TermId),

    #[error("Triple already exists: {0}")]
    TripleExists(TermId),

    #[error("Receiver is the zero address")]
    ReceiverIsZeroAddress,

    #[error("Deposit below minimum: have {have}, need {need}")]
    DepositBelowMinimumDeposit { have: u128, need: u128 },

    #[error("Cannot approve self: {0}")]
    CannotApproveSelf(Address),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    // -- curve-bound --
    #[error("Shares overflow curve max: would have {would_have}, max {max}")]
    SharesOverflowMax { max: u128, would_have: u128 },

    #[error("Assets overflow curve max: would have {would_have}, max {max}")]
    AssetsOverflowMax { max: u128, would_have: u128 },

    #[error("Shares exceed total shares: requested {requested}, total {total}")]
    SharesExceedTotalShares { requested: u128, total: u128 },

    #[error("Assets exceed total assets: requested {requested}, total {total}")]
    AssetsExceedTotalAssets { requested: u128, total: u128 },

    #[error("Invalid curve parameter: {0}")]
    InvalidCurveParameter(String),

    #[error("Curve already registered as id {0}")]
    CurveAlreadyExists(CurveId),

    #[error("Curve name not unique: {0:?}")]
    CurveNameNotUnique(String),

    #[error("Curve name is empty")]
    EmptyCurveName,

    // -- policy --
    #[error("Slippage exceeded: got {got}, minimum {min}")]
    SlippageExceeded { min: u128, got: u128 },

    #[error("Deposit too small to cover ghost shares: have {have}, need more than {need}")]
    DepositTooSmallToCoverGhostShares { have: u128, need: u128 },

    #[error("Deposit or redeem of zero shares")]
    DepositOrRedeemZeroShares,

    #[error("Insufficient shares in vault: have {have}, need {need}")]
    InsufficientSharesInVault { have: u128, need: u128 },

    #[error("Insufficient remaining shares in vault: residual {remaining} below minimum {min}")]
    InsufficientRemainingSharesInVault { remaining: u128, min: u128 },

    #[error("Sender {sender} not approved to deposit for {receiver}")]
    SenderNotApproved { sender: Address, receiver: Address },

    #[error("Sender {sender} not approved to redeem for {owner}")]
    RedeemerNotApproved { sender: Address, owner: Address },

    #[error("Unauthorized: {0}")]
    Unauthorized(Address),

    #[error("Ledger is paused")]
    Paused,

    #[error("Sender {sender} is not the atom wallet of {atom_id}")]
    NotAtomWallet { sender: Address, atom_id: TermId },

    #[error("Nothing to claim for atom {0}")]
    NothingToClaim(TermId),

    // -- integrity --
    #[error("Term does not exist: {0}")]
    TermDoesNotExist(TermId),

    #[error("Atom does not exist: {0}")]
    AtomDoesNotExist(TermId),

    #[error("Triple does not exist: {0}")]
    TripleDoesNotExist(TermId),

    #[error("Vault does not exist: term {term_id}, curve {curve_id}")]
    VaultDoesNotExist { term_id: TermId, curve_id: CurveId },

    #[error("Curve does not exist: {0}")]
    CurveDoesNotExist(CurveId),

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Sequence violation: expected {expected}, got {got}")]
    SequenceViolation { expected: u64, got: u64 },

    #[error("Schema version mismatch: expected {expected}, got {got}")]
    SchemaVersionMismatch { expected: u32, got: u32 },

    #[error("Serialization error: {0}")]
    Serialization(String),

    // -- arithmetic --
    #[error("Arithmetic overflow")]
    Overflow,

    #[error("Arithmetic underflow")]
    Underflow,

    #[error("Division by zero")]
    DivisionByZero,
}

/// Result type for ledger operations
pub type VaultResult<T> = Result<T, VaultError>;
