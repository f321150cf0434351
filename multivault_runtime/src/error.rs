//! Runtime failures.
//!
//! Everything the kernel rejects arrives as `RuntimeError::Ledger`. The other
//! variants cover the persistence layers around it.

use std::io;

use thiserror::Error;

use multivault_kernel::VaultError;

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("ledger rejected operation: {0}")]
    Ledger(#[from] VaultError),

    #[error("malformed log frame: {0}")]
    Frame(String),

    #[error("protobuf decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("proto conversion error: {0}")]
    Conversion(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("snapshot error: {0}")]
    Snapshot(String),

    #[error("sequence violation in operation log: expected {expected}, got {got}")]
    LogSequence { expected: u64, got: u64 },

    #[error("logging setup failed: {0}")]
    Logging(String),

    #[error("session lock poisoned")]
    LockPoisoned,
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;
