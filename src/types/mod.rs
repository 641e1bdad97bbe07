//! Core types for the space engine.
//!
//! - [`id`]: identifier types (`SpaceId`, `ThreadId`, `VarId`)
//! - [`outcome`]: outcome values reported by `ask`/`askVerbose`

pub mod id;
pub mod outcome;

pub use id::{SpaceId, ThreadId, VarId};
pub use outcome::{AskOutcome, VerboseOutcome};
