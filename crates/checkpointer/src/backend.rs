//! Storage backends for execution state.
//!
//! The backend is picked once when the checkpointer is built; nothing
//! branches on it per call.  `File` keeps each state as a borsh snapshot
//! file and duplicates the file to make a working copy.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use borsh::{BorshDeserialize, BorshSerialize};
use tracing::warn;

use crate::errors::CheckpointResult;

/// Counts connections currently open against a backend.  The coordinator
/// keeps this at one per chain; tests assert on it.
#[derive(Debug, Default)]
pub struct ConnGauge(AtomicUsize);

impl ConnGauge {
    fn increment(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    fn decrement(&self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// The durable portion of an execution state: command counters plus the
/// key-value entries the execution engine has written.
#[derive(Clone, Debug, Default, Eq, PartialEq, BorshDeserialize, BorshSerialize)]
pub struct StateSnapshot {
    pub(crate) txid: u64,
    pub(crate) cmd_seq: u64,
    pub(crate) entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

/// Execution-state storage backend, one variant per supported backend.
pub enum StateBackend {
    File(FileStateBackend),
}

impl StateBackend {
    pub fn new_file() -> Self {
        Self::File(FileStateBackend {
            gauge: Arc::new(ConnGauge::default()),
        })
    }

    /// Writes a fresh empty state at the given path.
    pub fn init_empty(&self, path: &Path) -> CheckpointResult<()> {
        match self {
            Self::File(b) => b.write_snapshot(path, &StateSnapshot::default()),
        }
    }

    /// Duplicates a persisted segment into a working copy.
    pub fn duplicate(&self, src: &Path, dst: &Path) -> CheckpointResult<()> {
        match self {
            Self::File(_) => {
                fs::copy(src, dst)?;
                Ok(())
            }
        }
    }

    /// Opens a connection against a state file.
    pub fn open(&self, path: &Path) -> CheckpointResult<StateConn> {
        match self {
            Self::File(b) => b.open(path),
        }
    }

    /// Number of connections currently open.
    pub fn open_connections(&self) -> usize {
        match self {
            Self::File(b) => b.gauge.count(),
        }
    }
}

pub struct FileStateBackend {
    gauge: Arc<ConnGauge>,
}

impl FileStateBackend {
    fn write_snapshot(&self, path: &Path, snapshot: &StateSnapshot) -> CheckpointResult<()> {
        let encoded = borsh::to_vec(snapshot)?;
        let mut f = fs::File::create(path)?;
        f.write_all(&encoded)?;
        f.sync_all()?;
        Ok(())
    }

    fn open(&self, path: &Path) -> CheckpointResult<StateConn> {
        let raw = fs::read(path)?;
        let snapshot = StateSnapshot::try_from_slice(&raw)?;
        self.gauge.increment();
        Ok(StateConn::File(FileConn {
            path: path.to_owned(),
            snapshot,
            gauge: self.gauge.clone(),
            closed: false,
        }))
    }
}

/// A live connection to one state segment.  Exactly one of these may be
/// open per coordinator cycle; closing is explicit and single-shot.
pub enum StateConn {
    File(FileConn),
}

impl StateConn {
    pub fn path(&self) -> &Path {
        match self {
            Self::File(c) => &c.path,
        }
    }

    pub fn txid(&self) -> u64 {
        match self {
            Self::File(c) => c.snapshot.txid,
        }
    }

    pub fn cmd_seq(&self) -> u64 {
        match self {
            Self::File(c) => c.snapshot.cmd_seq,
        }
    }

    pub(crate) fn snapshot(&self) -> &StateSnapshot {
        match self {
            Self::File(c) => &c.snapshot,
        }
    }

    pub(crate) fn snapshot_mut(&mut self) -> &mut StateSnapshot {
        match self {
            Self::File(c) => &mut c.snapshot,
        }
    }

    /// Serializes the durable portion.  Must happen before [`close`], which
    /// is enforced by this taking `&self` and close consuming the conn.
    ///
    /// [`close`]: StateConn::close
    pub(crate) fn encode(&self) -> CheckpointResult<Vec<u8>> {
        Ok(borsh::to_vec(self.snapshot())?)
    }

    /// Closes the connection, releasing its gauge slot.
    pub(crate) fn close(self) {
        match self {
            Self::File(mut c) => {
                c.closed = true;
                c.gauge.decrement();
            }
        }
    }
}

pub struct FileConn {
    path: PathBuf,
    snapshot: StateSnapshot,
    gauge: Arc<ConnGauge>,
    closed: bool,
}

impl Drop for FileConn {
    fn drop(&mut self) {
        if !self.closed {
            // Leaked connections mean some path skipped its cleanup
            // obligation.  Release the slot so the process can continue,
            // but loudly.
            warn!(path = %self.path.display(), "state connection dropped without close");
            self.gauge.decrement();
        }
    }
}
