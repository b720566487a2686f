//! The live execution-state handle.

use crate::backend::StateConn;

/// Transient handle over exactly one open backend connection plus the
/// command counters execution mutates.  Created by restore or first-block
/// initialization, destroyed by save or discard.  Deliberately not `Clone`;
/// the one-live-handle-per-chain discipline depends on it.
pub struct PactState {
    conn: StateConn,
}

impl PactState {
    pub(crate) fn new(conn: StateConn) -> Self {
        Self { conn }
    }

    pub(crate) fn into_conn(self) -> StateConn {
        self.conn
    }

    /// Transaction counter as of the restored checkpoint plus whatever has
    /// been applied since.
    pub fn txid(&self) -> u64 {
        self.conn.txid()
    }

    /// Command sequence counter.
    pub fn cmd_seq(&self) -> u64 {
        self.conn.cmd_seq()
    }

    /// Allocates the next transaction id.
    pub fn next_txid(&mut self) -> u64 {
        let snap = self.conn.snapshot_mut();
        let id = snap.txid;
        snap.txid += 1;
        id
    }

    /// Allocates the next command sequence number.
    pub fn next_cmd_seq(&mut self) -> u64 {
        let snap = self.conn.snapshot_mut();
        let id = snap.cmd_seq;
        snap.cmd_seq += 1;
        id
    }

    /// Reads an entry the execution engine wrote earlier.
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.conn.snapshot().entries.get(key).map(|v| v.as_slice())
    }

    /// Writes an entry into the journal.
    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.conn.snapshot_mut().entries.insert(key, value);
    }

    /// Number of entries currently journaled.
    pub fn entry_count(&self) -> usize {
        self.conn.snapshot().entries.len()
    }
}
