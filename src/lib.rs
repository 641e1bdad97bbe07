//! Ozspace: first-class computation spaces for speculative concurrent
//! constraint execution.
//!
//! # Overview
//!
//! A computation space is a speculative execution context: a tree node
//! owning a single-assignment store, a set of cooperative threads and at
//! most one choice point. Child spaces run concurrently and invisibly
//! until they become *stable*, at which point an ancestor can observe the
//! outcome (`ask`), absorb the result (`merge`), resolve a choice
//! (`commit`), duplicate the subtree (`clone`) or discard it (`kill`).
//! Encapsulated search, deep guards and conditionals all fall out of
//! these six operations.
//!
//! # Core Guarantees
//!
//! - **Isolation**: nothing inside a space is observable before it is
//!   stable; a failure never escapes past `ask`
//! - **Monotonic stores**: a variable is told at most one value per view;
//!   contradiction fails the space, it does not corrupt the store
//! - **Stability is quiescence**: a space is stable exactly when every
//!   thread it transitively owns is blocked or finished
//! - **Deterministic scheduling**: a FIFO scheduler makes every run of a
//!   program produce the same trace and the same outcomes
//!
//! # Module Structure
//!
//! - [`types`]: Core types (identifiers, ask outcomes)
//! - [`store`]: Values and the single-assignment binding store
//! - [`space`]: Space records and the lifecycle state machine
//! - [`thread`]: Thread records and the resumable body contract
//! - [`distributor`]: Choice-point strategies installed by `choose`
//! - [`engine`]: The engine: scheduler, stability, cross-space operations
//! - [`trace`]: Ring-buffered lifecycle events for replay and debugging
//! - [`util`]: Internal utilities (generational arena)
//! - [`error`]: Error types
//!
//! # Example
//!
//! ```
//! use ozspace::{AskOutcome, SpaceEngine};
//! use ozspace::test_utils::BindInt;
//!
//! let mut engine = SpaceEngine::new();
//! let top = engine.top();
//! let space = engine.new_space(top, Box::new(BindInt(42))).unwrap();
//! assert_eq!(engine.ask(space).unwrap(), AskOutcome::Succeeded);
//!
//! let root = engine.root_var(space).unwrap();
//! engine.merge(space).unwrap();
//! assert_eq!(
//!     engine.read_value(top, root).and_then(|v| v.as_int()),
//!     Some(42),
//! );
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

pub mod distributor;
pub mod engine;
pub mod error;
pub mod space;
pub mod store;
pub mod test_utils;
pub mod thread;
pub mod trace;
pub mod types;
pub mod util;

pub use engine::{EngineConfig, SpaceEngine, ThreadCx};
pub use error::{ContextError, Result, SpaceError, UsageError};
pub use space::SpaceState;
pub use store::Value;
pub use thread::{Reg, SpaceReg, Step, ThreadBody, ThreadState};
pub use types::{AskOutcome, SpaceId, ThreadId, VarId, VerboseOutcome};
