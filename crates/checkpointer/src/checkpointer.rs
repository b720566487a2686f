//! The checkpoint store proper.
//!
//! Lock discipline: the index mutex is held only around index reads and the
//! link step (an existence check, a rename, and the index insert).  The
//! expensive work, serializing state, writing the temp file, copying
//! segments, and opening connections, all happens outside the lock on
//! private files, so restores and saves for unrelated keys proceed
//! concurrently.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chainweb_db::traits::CheckpointDatabase;
use chainweb_db::types::{CheckpointKey, CheckpointRecord};
use chainweb_state::payload::PayloadHash;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::backend::{StateBackend, StateConn};
use crate::errors::{CheckpointError, CheckpointResult};
use crate::state::PactState;

pub struct Checkpointer<D: CheckpointDatabase> {
    db: Arc<D>,
    backend: StateBackend,

    /// Canonical record segments live here, named by key, immutable once
    /// linked into the index.
    store_dir: PathBuf,

    /// Private working copies live here, named uniquely per restore.
    work_dir: PathBuf,

    index_lock: Mutex<()>,
    work_seq: AtomicU64,
}

impl<D: CheckpointDatabase> Checkpointer<D> {
    pub fn new(db: Arc<D>, backend: StateBackend, data_dir: &Path) -> CheckpointResult<Self> {
        let store_dir = data_dir.join("records");
        let work_dir = data_dir.join("work");
        fs::create_dir_all(&store_dir)?;
        fs::create_dir_all(&work_dir)?;

        Ok(Self {
            db,
            backend,
            store_dir,
            work_dir,
            index_lock: Mutex::new(()),
            work_seq: AtomicU64::new(0),
        })
    }

    fn next_seq(&self) -> u64 {
        self.work_seq.fetch_add(1, Ordering::SeqCst)
    }

    fn canonical_name(key: &CheckpointKey) -> String {
        format!(
            "h{:010}-{}.state",
            key.height(),
            short_hex(key.payload_hash())
        )
    }

    /// Fresh empty state for the first block on a chain, before any
    /// checkpoint exists.
    pub fn initial_state(&self) -> CheckpointResult<PactState> {
        let path = self.work_dir.join(format!("genesis-{}.work", self.next_seq()));
        self.backend.init_empty(&path)?;
        let conn = self.backend.open(&path)?;
        debug!(path = %path.display(), "opened initial state");
        Ok(PactState::new(conn))
    }

    /// Opens the state recorded for a key.
    ///
    /// The persisted segment is duplicated into a fresh working copy and
    /// the connection opened against the copy, so the canonical record
    /// stays untouched no matter what the caller does with the handle.
    /// Restores of the same key from different callers each get their own
    /// copy; serialization of cycles per chain happens one level up.
    pub fn restore(&self, height: u64, payload_hash: PayloadHash) -> CheckpointResult<PactState> {
        let key = CheckpointKey::new(height, payload_hash);

        let record = {
            let _guard = self.index_lock.lock();
            self.db.get_record(&key)?
        }
        .ok_or(CheckpointError::RestoreNotFound(height, payload_hash))?;

        let src = self.store_dir.join(record.state_file());
        let dst = self.work_dir.join(format!(
            "{}-{}-{}.work",
            height,
            short_hex(&payload_hash),
            self.next_seq(),
        ));

        self.backend.duplicate(&src, &dst)?;
        let conn = match self.backend.open(&dst) {
            Ok(conn) => conn,
            Err(e) => {
                // Never leave a partial working copy behind.
                remove_file_logged(&dst);
                return Err(e);
            }
        };

        if conn.txid() != record.txid() || conn.cmd_seq() != record.cmd_seq() {
            self.teardown(conn);
            return Err(CheckpointError::CorruptRecord(key));
        }

        debug!(height, payload = %payload_hash, "restored checkpoint");
        Ok(PactState::new(conn))
    }

    /// Persists a state under a key and closes its connection.
    ///
    /// The durable portion is serialized first, while the connection is
    /// still open, and the connection is closed before returning on every
    /// path.  Saving content byte-equal to an existing record is an
    /// idempotent success; differing content under the same key is a
    /// [`CheckpointError::RecordConflict`].
    pub fn save(
        &self,
        height: u64,
        payload_hash: PayloadHash,
        state: PactState,
    ) -> CheckpointResult<()> {
        let key = CheckpointKey::new(height, payload_hash);
        let conn = state.into_conn();

        let res = self.save_inner(&key, &conn);

        // Close-on-departure, success and failure alike.
        self.teardown(conn);
        res
    }

    fn save_inner(&self, key: &CheckpointKey, conn: &StateConn) -> CheckpointResult<()> {
        let encoded = conn.encode()?;
        let record = CheckpointRecord::new(Self::canonical_name(key), conn.txid(), conn.cmd_seq());

        // Stage the segment under a unique temp name so a crash mid-write
        // can't be mistaken for a record.
        let tmp = self.store_dir.join(format!(".tmp-{}", self.next_seq()));
        if let Err(e) = write_and_sync(&tmp, &encoded) {
            remove_file_logged(&tmp);
            return Err(e.into());
        }

        let existing = {
            let _guard = self.index_lock.lock();
            match self.db.get_record(key)? {
                Some(existing) => Some(existing),
                None => {
                    // Link step: move the staged segment to its canonical
                    // name and publish the index entry.  Held under the
                    // lock so two saves of one key can't interleave.
                    let final_path = self.store_dir.join(record.state_file());
                    if let Err(e) = fs::rename(&tmp, &final_path) {
                        remove_file_logged(&tmp);
                        return Err(e.into());
                    }
                    if let Err(e) = self.db.insert_record(*key, record) {
                        remove_file_logged(&final_path);
                        return Err(e.into());
                    }
                    None
                }
            }
        };

        let Some(existing) = existing else {
            debug!(?key, "saved checkpoint");
            return Ok(());
        };

        // Duplicate key: decide idempotent-vs-conflict outside the lock,
        // records are immutable once linked.
        remove_file_logged(&tmp);
        let prior = fs::read(self.store_dir.join(existing.state_file()))?;
        if existing.txid() == record.txid()
            && existing.cmd_seq() == record.cmd_seq()
            && prior == encoded
        {
            debug!(?key, "duplicate checkpoint save, keeping prior record");
            Ok(())
        } else {
            Err(CheckpointError::RecordConflict(*key))
        }
    }

    /// Closes a live handle and removes its working copy without touching
    /// the index.  The failure path's cleanup.
    pub fn discard(&self, state: PactState) {
        let conn = state.into_conn();
        debug!(path = %conn.path().display(), "discarding live state");
        self.teardown(conn);
    }

    /// Removes records (and their segments) strictly below a height.
    pub fn prune_below(&self, height: u64) -> CheckpointResult<usize> {
        let keys = {
            let _guard = self.index_lock.lock();
            self.db.get_keys_below_height(height)?
        };

        let mut removed = 0;
        for key in keys {
            let record = {
                let _guard = self.index_lock.lock();
                let record = self.db.get_record(&key)?;
                self.db.del_record(&key)?;
                record
            };
            if let Some(record) = record {
                remove_file_logged(&self.store_dir.join(record.state_file()));
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Connections currently open through this checkpointer's backend.
    pub fn open_connections(&self) -> usize {
        self.backend.open_connections()
    }

    fn teardown(&self, conn: StateConn) {
        let path = conn.path().to_owned();
        conn.close();
        remove_file_logged(&path);
    }
}

fn short_hex(h: &PayloadHash) -> String {
    hex::encode(&h.as_ref()[..8])
}

fn write_and_sync(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut f = fs::File::create(path)?;
    f.write_all(data)?;
    f.sync_all()?;
    Ok(())
}

fn remove_file_logged(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        warn!(path = %path.display(), err = %e, "failed to remove state file");
    }
}
