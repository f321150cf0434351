//! Replay orchestrator: rebuild a ledger from its operation log.
//!
//! Delegates all accounting to the kernel. No shortcuts, no cached state.

use log::info;

use multivault_kernel::config::CurveSpec;
use multivault_kernel::hashing::canonical_hash;
use multivault_kernel::operations::{Operation, OperationEnvelope, OperationOutcome};
use multivault_kernel::{LedgerConfig, MultiVault};

use crate::error::RuntimeResult;
use crate::snapshot::Snapshot;

/// A rebuilt ledger plus what a snapshot of it needs.
#[derive(Debug)]
pub struct Replayed {
    pub ledger: MultiVault,
    /// Curves registered by operations in the log, in order.
    pub custom_curves: Vec<CurveSpec>,
    pub hash: String,
}

/// Apply one envelope and remember any curve it registered.
pub fn apply_envelope(
    ledger: &mut MultiVault,
    custom_curves: &mut Vec<CurveSpec>,
    envelope: &OperationEnvelope,
) -> RuntimeResult<OperationOutcome> {
    let outcome = ledger.apply(envelope)?;
    if let Operation::RegisterCurve { curve, .. } = &envelope.operation {
        custom_curves.push(curve.clone());
    }
    Ok(outcome)
}

/// Rebuild the ledger from a sequence of envelopes.
///
/// 1. Create a fresh ledger from the config
/// 2. Pass each envelope sequentially to the kernel
/// 3. Return the ledger and its canonical hash
///
/// Deterministic by the kernel's guarantee.
pub fn rebuild_ledger(
    config: LedgerConfig,
    envelopes: &[OperationEnvelope],
) -> RuntimeResult<Replayed> {
    let mut ledger = MultiVault::new(config)?;
    let mut custom_curves = Vec::new();
    for envelope in envelopes {
        apply_envelope(&mut ledger, &mut custom_curves, envelope)?;
    }
    finish(ledger, custom_curves)
}

/// Rebuild and return only the canonical hash.
pub fn rebuild_hash(config: LedgerConfig, envelopes: &[OperationEnvelope]) -> RuntimeResult<String> {
    Ok(rebuild_ledger(config, envelopes)?.hash)
}

/// Restore a snapshot, then apply the envelopes that follow it. Envelopes
/// at or below the snapshot's sequence are skipped.
pub fn resume_from_snapshot(
    snapshot: &Snapshot,
    envelopes: &[OperationEnvelope],
) -> RuntimeResult<Replayed> {
    let mut ledger = snapshot.restore()?;
    let mut custom_curves = snapshot.custom_curves.clone();
    for envelope in envelopes.iter().filter(|e| e.sequence > snapshot.sequence) {
        apply_envelope(&mut ledger, &mut custom_curves, envelope)?;
    }
    finish(ledger, custom_curves)
}

fn finish(ledger: MultiVault, custom_curves: Vec<CurveSpec>) -> RuntimeResult<Replayed> {
    let hash = canonical_hash(ledger.state())?;
    info!(
        "event=replay module=replay status=ok last_sequence={} hash={}",
        ledger.last_sequence(),
        hash
    );
    Ok(Replayed {
        ledger,
        custom_curves,
        hash,
    })
}
