#![forbid(unsafe_code)]

/// Kernel v1. Changes to accounting behaviour require kernel_v2.
pub const KERNEL_VERSION: u32 = 1;

pub mod arithmetic;
pub mod error;
pub mod domain;
pub mod config;
pub mod hashing;
pub mod curves;
pub mod fees;
pub mod graph;
pub mod ledger;
pub mod state;
pub mod operations;
pub mod events;
pub mod invariants;
pub mod engine;

pub use config::LedgerConfig;
pub use domain::{Address, ApprovalType, CurveId, TermId};
pub use engine::MultiVault;
pub use error::{VaultError, VaultResult};
