//! Append-only operation log: binary protobuf frames.
//!
//! Storage format: length-prefixed protobuf frames.
//!   [4-byte LE length][protobuf bytes][4-byte LE length][protobuf bytes]...
//!
//! Rules:
//!   - Strict append only: no mutation, no deletion, no reordering
//!   - fsync after every write
//!   - Sequence strictly increasing (validated on append)
//!   - Only operations the ledger accepted are appended

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};
use prost::Message;

use multivault_kernel::operations::OperationEnvelope;

use crate::error::{RuntimeError, RuntimeResult};
use crate::proto_bridge::{kernel_to_proto, proto_to_kernel};
use crate::proto_types::ProtoOperationEnvelope;

const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// Append-only operation log backed by a binary file.
#[derive(Debug)]
pub struct EventStore {
    path: PathBuf,
    last_sequence: u64,
}

impl EventStore {
    /// Open or create a log at the given path.
    /// Reads existing frames to determine the last sequence number.
    pub fn open(path: &Path) -> RuntimeResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let (frames, last_sequence) = if path.exists() {
            let frames = read_all_from_file(path)?;
            let last = frames.last().map(|e| e.sequence).unwrap_or(0);
            (frames.len(), last)
        } else {
            (0, 0)
        };

        info!(
            "event=log_open module=event_store status=ok path={} frames={} last_sequence={}",
            path.display(),
            frames,
            last_sequence
        );

        Ok(Self {
            path: path.to_path_buf(),
            last_sequence,
        })
    }

    /// Append one frame. Validates strict sequence ordering, writes a
    /// length-prefixed protobuf message and fsyncs.
    pub fn append_frame(&mut self, frame: &ProtoOperationEnvelope) -> RuntimeResult<()> {
        let expected = self.last_sequence + 1;
        if frame.sequence != expected {
            return Err(RuntimeError::LogSequence {
                expected,
                got: frame.sequence,
            });
        }

        let buf = frame.encode_to_vec();
        let len = u32::try_from(buf.len())
            .ok()
            .filter(|len| *len as usize <= MAX_FRAME_BYTES)
            .ok_or_else(|| RuntimeError::Frame(format!("frame of {} bytes too large", buf.len())))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let start = file.metadata()?.len();
        if let Err(err) = write_frame(&mut file, len, &buf) {
            // Cut a partial frame so a retry does not land behind it.
            let _ = file.set_len(start);
            return Err(err.into());
        }

        self.last_sequence = frame.sequence;
        debug!(
            "event=log_append module=event_store status=ok sequence={} bytes={}",
            frame.sequence, len
        );
        Ok(())
    }

    /// Append a kernel envelope.
    pub fn append(&mut self, envelope: &OperationEnvelope) -> RuntimeResult<()> {
        self.append_frame(&kernel_to_proto(envelope))
    }

    /// Load all raw frames in sequence order.
    pub fn load_all_frames(&self) -> RuntimeResult<Vec<ProtoOperationEnvelope>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        read_all_from_file(&self.path)
    }

    /// Load and decode every envelope in the log.
    pub fn load_operations(&self) -> RuntimeResult<Vec<OperationEnvelope>> {
        self.load_all_frames()?
            .iter()
            .map(proto_to_kernel)
            .collect()
    }

    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn write_frame(file: &mut File, len: u32, buf: &[u8]) -> io::Result<()> {
    {
        let mut writer = BufWriter::new(&mut *file);
        writer.write_all(&len.to_le_bytes())?;
        writer.write_all(buf)?;
        writer.flush()?;
    }
    file.sync_all()
}

/// Read all frames from a file, validating frame integrity.
fn read_all_from_file(path: &Path) -> RuntimeResult<Vec<ProtoOperationEnvelope>> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut frames = Vec::new();
    let mut len_buf = [0u8; 4];

    loop {
        match reader.read_exact(&mut len_buf) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        }

        let len = u32::from_le_bytes(len_buf) as usize;
        if len == 0 || len > MAX_FRAME_BYTES {
            return Err(RuntimeError::Frame(format!(
                "invalid frame length {} after {} frames",
                len,
                frames.len()
            )));
        }

        let mut buf = vec![0u8; len];
        reader.read_exact(&mut buf).map_err(|e| {
            RuntimeError::Frame(format!("truncated frame {}: {}", frames.len() + 1, e))
        })?;

        frames.push(ProtoOperationEnvelope::decode(buf.as_slice())?);
    }

    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use multivault_kernel::operations::Operation;
    use multivault_kernel::Address;

    fn epoch_op(sequence: u64) -> OperationEnvelope {
        OperationEnvelope::new(
            sequence,
            sequence * 10,
            Operation::AdvanceEpoch {
                sender: Address::from_low_u64_be(1),
            },
        )
    }

    #[test]
    fn reopen_resumes_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("events.log");
        {
            let mut store = EventStore::open(&path).unwrap();
            store.append(&epoch_op(1)).unwrap();
            store.append(&epoch_op(2)).unwrap();
        }
        let store = EventStore::open(&path).unwrap();
        assert_eq!(store.last_sequence(), 2);
        assert_eq!(store.load_operations().unwrap(), vec![epoch_op(1), epoch_op(2)]);
    }

    #[test]
    fn rejects_gaps() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = EventStore::open(&dir.path().join("events.log")).unwrap();
        assert!(matches!(
            store.append(&epoch_op(2)),
            Err(RuntimeError::LogSequence { expected: 1, got: 2 })
        ));
        assert!(store.load_all_frames().unwrap().is_empty());
    }

    #[test]
    fn truncated_tail_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.log");
        let mut store = EventStore::open(&path).unwrap();
        store.append(&epoch_op(1)).unwrap();

        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&40u32.to_le_bytes()).unwrap();
        file.write_all(&[1, 2, 3]).unwrap();

        assert!(matches!(
            EventStore::open(&path),
            Err(RuntimeError::Frame(msg)) if msg.contains("truncated")
        ));
    }
}
