//! Per-chain execution coordinator.
//!
//! Sequences restore -> execute -> save for block production and block
//! validation, one cycle in flight per chain, with the live state handle
//! closed on every exit path.

mod errors;
mod handle;
mod message;
mod stub;
mod traits;
mod worker;

pub use errors::{ExecError, WorkerError, WorkerResult};
pub use handle::{worker_channel, ChainWorkerHandle, ChainWorkerInput};
pub use message::{BlockEnv, BlockProposal};
pub use stub::StubExec;
pub use traits::{ExecCapability, WorkerContext};
pub use worker::{worker_task, CyclePhase, WorkerState};
