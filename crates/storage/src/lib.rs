//! Async accessor layer over the database traits.
//!
//! Blocking db calls run on a shared thread pool; callers get `*_async`
//! and `*_blocking` pairs for every operation.  Pure pass-through, no
//! validation; validated mutation goes through the consensus layer.

mod exec;
pub mod managers;

pub use managers::checkpoint::CheckpointManager;
pub use managers::headers::HeaderManager;
