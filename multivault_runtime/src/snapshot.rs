//! Snapshot layer: deterministic ledger snapshots.
//!
//! A snapshot carries the canonical JSON of the ledger state, its SHA-256,
//! the config the ledger ran with and the specs of curves registered after
//! construction. No timestamps in snapshot content (determinism).
//!
//! Restoring re-derives the hash, rebuilds the curve registry and validates
//! every invariant before handing back a ledger.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use multivault_kernel::config::CurveSpec;
use multivault_kernel::curves::{self, BondingCurve};
use multivault_kernel::hashing::{canonical_hash, canonical_serialize};
use multivault_kernel::state::LedgerState;
use multivault_kernel::{LedgerConfig, MultiVault, KERNEL_VERSION};

use crate::error::{RuntimeError, RuntimeResult};

/// Snapshot on-disk format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Snapshot {
    /// Last applied sequence number.
    pub sequence: u64,
    pub kernel_version: u32,
    pub config: LedgerConfig,
    /// Curves registered through `register_curve`, in registration order.
    pub custom_curves: Vec<CurveSpec>,
    /// Canonical JSON of the state (UTF-8).
    pub canonical_json: String,
    /// SHA-256 of the canonical JSON.
    pub hash: String,
}

/// Mirror of the kernel's canonical layout, for decoding.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CanonicalLedger {
    kernel_version: u32,
    state: LedgerState,
}

impl Snapshot {
    /// Capture the ledger as it stands.
    pub fn capture(ledger: &MultiVault, custom_curves: &[CurveSpec]) -> RuntimeResult<Self> {
        let bytes = canonical_serialize(ledger.state())?;
        let canonical_json = String::from_utf8(bytes)
            .map_err(|e| RuntimeError::Snapshot(format!("canonical JSON is not UTF-8: {}", e)))?;
        Ok(Self {
            sequence: ledger.last_sequence(),
            kernel_version: KERNEL_VERSION,
            config: ledger.config().clone(),
            custom_curves: custom_curves.to_vec(),
            canonical_json,
            hash: canonical_hash(ledger.state())?,
        })
    }

    /// Returns true if the hash matches the canonical JSON content.
    pub fn verify_hash(&self) -> bool {
        hex::encode(Sha256::digest(self.canonical_json.as_bytes())) == self.hash
    }

    /// Decode the state. Strict: unknown or missing fields fail.
    pub fn decode_state(&self) -> RuntimeResult<LedgerState> {
        let canonical: CanonicalLedger = serde_json::from_str(&self.canonical_json)?;
        if canonical.kernel_version != self.kernel_version {
            return Err(RuntimeError::Snapshot(format!(
                "state written by kernel v{} inside a v{} snapshot",
                canonical.kernel_version, self.kernel_version
            )));
        }
        Ok(canonical.state)
    }

    /// Verify, decode and validate, then rebuild a ledger positioned at
    /// `sequence`.
    pub fn restore(&self) -> RuntimeResult<MultiVault> {
        if self.kernel_version != KERNEL_VERSION {
            return Err(RuntimeError::Snapshot(format!(
                "snapshot from kernel v{}, running v{}",
                self.kernel_version, KERNEL_VERSION
            )));
        }
        if !self.verify_hash() {
            warn!(
                "event=snapshot_restore module=snapshot status=error sequence={} reason=hash_mismatch",
                self.sequence
            );
            return Err(RuntimeError::Snapshot(format!(
                "hash mismatch at sequence {}",
                self.sequence
            )));
        }
        let state = self.decode_state()?;
        let custom = self
            .custom_curves
            .iter()
            .map(curves::from_spec)
            .collect::<Result<Vec<Arc<dyn BondingCurve>>, _>>()?;
        let ledger = MultiVault::restore(self.config.clone(), state, self.sequence, custom)?;
        info!(
            "event=snapshot_restore module=snapshot status=ok sequence={} hash={}",
            self.sequence, self.hash
        );
        Ok(ledger)
    }
}

fn snapshot_path(dir: &Path, sequence: u64) -> PathBuf {
    dir.join(format!("snapshot_{:06}.json", sequence))
}

/// Write a snapshot into `dir`, named by its sequence.
pub fn save_snapshot(dir: &Path, snapshot: &Snapshot) -> RuntimeResult<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = snapshot_path(dir, snapshot.sequence);
    let content = serde_json::to_string(snapshot)?;

    let mut file = File::create(&path)?;
    file.write_all(content.as_bytes())?;
    file.sync_all()?;

    info!(
        "event=snapshot_save module=snapshot status=ok sequence={} path={}",
        snapshot.sequence,
        path.display()
    );
    Ok(path)
}

/// Load a snapshot at a specific sequence number.
/// Returns None if no snapshot exists at that sequence.
pub fn load_snapshot(dir: &Path, sequence: u64) -> RuntimeResult<Option<Snapshot>> {
    let path = snapshot_path(dir, sequence);
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&path)?;
    let snap: Snapshot = serde_json::from_str(&content)
        .map_err(|e| RuntimeError::Snapshot(format!("bad snapshot {}: {}", path.display(), e)))?;
    Ok(Some(snap))
}

/// Load the latest snapshot in a directory.
/// Scans for snapshot_NNNNNN.json files and returns the highest sequence.
pub fn load_latest_snapshot(dir: &Path) -> RuntimeResult<Option<Snapshot>> {
    if !dir.exists() {
        return Ok(None);
    }

    let mut best_seq: Option<u64> = None;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let seq = name
            .to_string_lossy()
            .strip_prefix("snapshot_")
            .and_then(|s| s.strip_suffix(".json"))
            .and_then(|s| s.parse::<u64>().ok());
        if let Some(seq) = seq {
            best_seq = Some(best_seq.map_or(seq, |best| best.max(seq)));
        }
    }

    match best_seq {
        Some(seq) => load_snapshot(dir, seq),
        None => Ok(None),
    }
}
