//! Session manager: isolated ledgers with persist-after-apply semantics.
//!
//! Each session gets its own directory with an operation log and snapshots.
//! Concurrency: Mutex for write serialization, no global mutable state.
//!
//! Apply-before-persist order:
//!   1. apply the envelope to a copy of the ledger: rejected operations stop here
//!   2. store.append(envelope): only if step 1 succeeded
//!   3. swap the copy in once the log holds the envelope
//!   4. snapshot if interval reached

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use log::{info, warn};

use multivault_kernel::config::CurveSpec;
use multivault_kernel::hashing::canonical_hash;
use multivault_kernel::operations::{OperationEnvelope, OperationOutcome};
use multivault_kernel::state::LedgerState;
use multivault_kernel::{LedgerConfig, MultiVault};

use crate::error::{RuntimeError, RuntimeResult};
use crate::event_store::EventStore;
use crate::indexer::EventIndexer;
use crate::replay;
use crate::snapshot::{self, Snapshot};

/// An isolated ledger with its own operation log, snapshots and index.
#[derive(Debug)]
pub struct Session {
    session_id: String,
    dir: PathBuf,
    config: LedgerConfig,
    ledger: MultiVault,
    custom_curves: Vec<CurveSpec>,
    store: EventStore,
    indexer: EventIndexer,
    snapshot_interval: u64,
}

impl Session {
    /// Open (or create) a session in the given base directory.
    ///
    /// Directory structure:
    ///   <base_dir>/<session_id>/events.log
    ///   <base_dir>/<session_id>/snapshots/
    ///
    /// An existing session resumes from its latest snapshot plus the log
    /// tail. The index only covers operations replayed at open time. A
    /// snapshot written under a different config is refused.
    pub fn open(
        base_dir: &Path,
        session_id: &str,
        config: LedgerConfig,
        snapshot_interval: u64,
    ) -> RuntimeResult<Self> {
        let dir = base_dir.join(session_id);
        let store = EventStore::open(&dir.join("events.log"))?;
        let envelopes = store.load_operations()?;

        let latest = snapshot::load_latest_snapshot(&dir.join("snapshots"))?
            .filter(|snap| snap.sequence <= store.last_sequence());
        let (mut ledger, mut custom_curves) = match &latest {
            Some(snap) => (snap.restore()?, snap.custom_curves.clone()),
            None => (MultiVault::new(config.clone())?, Vec::new()),
        };
        if ledger.config() != &config {
            warn!(
                "event=session_open module=session status=error session={} reason=snapshot_config_differs",
                session_id
            );
            return Err(RuntimeError::Snapshot(format!(
                "session {} was snapshotted under a different config",
                session_id
            )));
        }

        let mut indexer = EventIndexer::new();
        let base = ledger.last_sequence();
        for envelope in envelopes.iter().filter(|e| e.sequence > base) {
            replay::apply_envelope(&mut ledger, &mut custom_curves, envelope)?;
            indexer.ingest(envelope.sequence, &ledger.take_events());
        }

        info!(
            "event=session_open module=session status=ok session={} sequence={} from_snapshot={}",
            session_id,
            ledger.last_sequence(),
            latest.is_some()
        );

        Ok(Self {
            session_id: session_id.to_string(),
            dir,
            config: ledger.config().clone(),
            ledger,
            custom_curves,
            store,
            indexer,
            snapshot_interval,
        })
    }

    /// Apply one operation: ledger first, then persist. The live ledger only
    /// moves once the log has accepted the envelope.
    pub fn apply(&mut self, envelope: &OperationEnvelope) -> RuntimeResult<OperationOutcome> {
        let mut ledger = self.ledger.clone();
        let mut custom_curves = self.custom_curves.clone();
        let outcome = replay::apply_envelope(&mut ledger, &mut custom_curves, envelope)?;

        if let Err(err) = self.store.append(envelope) {
            warn!(
                "event=session_apply module=session status=error session={} sequence={} reason=log_append_failed",
                self.session_id, envelope.sequence
            );
            return Err(err);
        }
        self.indexer.ingest(envelope.sequence, &ledger.take_events());
        self.ledger = ledger;
        self.custom_curves = custom_curves;

        if self.snapshot_interval > 0 && envelope.sequence % self.snapshot_interval == 0 {
            self.snapshot()?;
        }
        Ok(outcome)
    }

    /// Write a snapshot of the current ledger.
    pub fn snapshot(&self) -> RuntimeResult<PathBuf> {
        let snap = Snapshot::capture(&self.ledger, &self.custom_curves)?;
        snapshot::save_snapshot(&self.dir.join("snapshots"), &snap)
    }

    /// Full replay from the operation log, ignoring snapshots. The rebuilt
    /// ledger replaces the live one, and the index is rebuilt with it.
    pub fn replay_full(&mut self) -> RuntimeResult<String> {
        let envelopes = self.store.load_operations()?;
        let mut ledger = MultiVault::new(self.config.clone())?;
        let mut custom_curves = Vec::new();
        let mut indexer = EventIndexer::new();
        for envelope in &envelopes {
            replay::apply_envelope(&mut ledger, &mut custom_curves, envelope)?;
            indexer.ingest(envelope.sequence, &ledger.take_events());
        }

        let hash = canonical_hash(ledger.state())?;
        if hash != self.current_hash()? {
            warn!(
                "event=replay_full module=session status=error session={} reason=hash_drift",
                self.session_id
            );
        }
        self.ledger = ledger;
        self.custom_curves = custom_curves;
        self.indexer = indexer;
        Ok(hash)
    }

    pub fn ledger(&self) -> &MultiVault {
        &self.ledger
    }

    pub fn state(&self) -> &LedgerState {
        self.ledger.state()
    }

    pub fn indexer(&self) -> &EventIndexer {
        &self.indexer
    }

    pub fn current_hash(&self) -> RuntimeResult<String> {
        Ok(canonical_hash(self.ledger.state())?)
    }

    pub fn current_sequence(&self) -> u64 {
        self.ledger.last_sequence()
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Thread-safe session handle.
#[derive(Debug)]
pub struct SharedSession {
    inner: Mutex<Session>,
}

impl SharedSession {
    pub fn new(session: Session) -> Self {
        Self {
            inner: Mutex::new(session),
        }
    }

    fn lock(&self) -> RuntimeResult<MutexGuard<'_, Session>> {
        self.inner.lock().map_err(|_| RuntimeError::LockPoisoned)
    }

    /// Apply under lock.
    pub fn apply(&self, envelope: &OperationEnvelope) -> RuntimeResult<OperationOutcome> {
        self.lock()?.apply(envelope)
    }

    pub fn current_hash(&self) -> RuntimeResult<String> {
        self.lock()?.current_hash()
    }

    pub fn current_sequence(&self) -> RuntimeResult<u64> {
        Ok(self.lock()?.current_sequence())
    }

    /// Run a read-only query against the session under lock.
    pub fn read<T>(&self, f: impl FnOnce(&Session) -> T) -> RuntimeResult<T> {
        Ok(f(&*self.lock()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use multivault_kernel::operations::Operation;
    use multivault_kernel::Address;

    fn admin() -> Address {
        Address::from_low_u64_be(1)
    }

    fn epoch(sequence: u64) -> OperationEnvelope {
        OperationEnvelope::new(sequence, sequence, Operation::AdvanceEpoch { sender: admin() })
    }

    #[test]
    fn rejected_operation_is_not_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::open(dir.path(), "s1", LedgerConfig::default(), 0).unwrap();
        session.apply(&epoch(1)).unwrap();

        let intruder = OperationEnvelope::new(
            2,
            2,
            Operation::AdvanceEpoch {
                sender: Address::from_low_u64_be(77),
            },
        );
        assert!(matches!(session.apply(&intruder), Err(RuntimeError::Ledger(_))));
        assert_eq!(session.current_sequence(), 1);
        assert_eq!(session.store.load_operations().unwrap().len(), 1);
    }

    #[test]
    fn failed_log_write_leaves_the_ledger_where_the_log_is() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::open(dir.path(), "s3", LedgerConfig::default(), 0).unwrap();
        session.apply(&epoch(1)).unwrap();
        let hash = session.current_hash().unwrap();

        let log = session.dir().join("events.log");
        let frames = std::fs::read(&log).unwrap();
        std::fs::remove_file(&log).unwrap();
        std::fs::create_dir(&log).unwrap();

        assert!(matches!(session.apply(&epoch(2)), Err(RuntimeError::Io(_))));
        assert_eq!(session.current_sequence(), 1);
        assert_eq!(session.current_hash().unwrap(), hash);
        assert_eq!(session.ledger().current_epoch(), 1);

        std::fs::remove_dir(&log).unwrap();
        std::fs::write(&log, frames).unwrap();
        session.apply(&epoch(2)).unwrap();
        assert_eq!(session.current_sequence(), 2);
        assert_eq!(session.store.load_operations().unwrap(), vec![epoch(1), epoch(2)]);
    }

    #[test]
    fn snapshot_under_another_config_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut session = Session::open(dir.path(), "s4", LedgerConfig::default(), 1).unwrap();
            session.apply(&epoch(1)).unwrap();
        }
        let mut other = LedgerConfig::default();
        other.general.min_deposit += 1;
        assert!(matches!(
            Session::open(dir.path(), "s4", other, 1),
            Err(RuntimeError::Snapshot(_))
        ));
        assert!(Session::open(dir.path(), "s4", LedgerConfig::default(), 1).is_ok());
    }

    #[test]
    fn shared_session_serializes_writers() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::open(dir.path(), "s2", LedgerConfig::default(), 0).unwrap();
        let shared = SharedSession::new(session);
        shared.apply(&epoch(1)).unwrap();
        shared.apply(&epoch(2)).unwrap();
        assert_eq!(shared.current_sequence().unwrap(), 2);
        assert_eq!(shared.read(|s| s.ledger().current_epoch()).unwrap(), 2);
    }
}
