#![forbid(unsafe_code)]

//! MultiVault runtime
//!
//! Wraps the kernel with an append-only operation log, replay, snapshots,
//! sessions and an off-ledger event index.
//!
//! No accounting lives here. Every transition and invariant is delegated
//! to the kernel.

pub mod error;
pub mod proto_types;
pub mod proto_bridge;
pub mod event_store;
pub mod replay;
pub mod snapshot;
pub mod session;
pub mod indexer;
pub mod logging;

pub use error::{RuntimeError, RuntimeResult};
