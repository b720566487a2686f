//! Stub execution capability that we use for testing without having to plug
//! in a real contract runtime.
//!
//! Applies a transaction by journaling its command id under its txid.  Two
//! magic prefixes simulate failure modes: `!bad` rejects the transaction,
//! `!fatal` kills the engine.

use chainweb_checkpointer::PactState;
use chainweb_state::payload::{Transaction, TxOutput};

use crate::errors::ExecError;
use crate::traits::ExecCapability;

pub struct StubExec;

impl ExecCapability for StubExec {
    fn apply(&self, state: &mut PactState, tx: &Transaction) -> Result<TxOutput, ExecError> {
        if tx.raw().starts_with(b"!fatal") {
            return Err(ExecError::Fatal("stub engine poisoned".to_string()));
        }
        if tx.raw().starts_with(b"!bad") {
            return Err(ExecError::Tx("stub rejected command".to_string()));
        }

        let txid = state.next_txid();
        state.next_cmd_seq();
        state.put(tx.txid().as_ref().to_vec(), txid.to_be_bytes().to_vec());

        Ok(TxOutput::applied(
            txid.to_be_bytes().to_vec(),
            vec![tx.raw().to_vec()],
        ))
    }
}
