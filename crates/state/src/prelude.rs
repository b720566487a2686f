// Reexports from elsewhere in the crate.

pub use crate::header::*;
pub use crate::id::*;
pub use crate::payload::*;
