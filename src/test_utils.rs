//! Test utilities.
//!
//! Shared helpers for unit and integration tests:
//! - consistent tracing-based logging initialization,
//! - a set of canned thread bodies covering the common space shapes
//!   (telling, conflicting, choosing, nesting).
//!
//! # Example
//! ```
//! use ozspace::test_utils::{init_test_logging, BindInt};
//! use ozspace::SpaceEngine;
//!
//! init_test_logging();
//! let mut engine = SpaceEngine::new();
//! let top = engine.top();
//! let space = engine.new_space(top, Box::new(BindInt(42))).unwrap();
//! assert!(engine.ask(space).unwrap().is_succeeded());
//! ```

use std::sync::Once;

use tracing_subscriber::fmt::format::FmtSpan;

use crate::engine::ThreadCx;
use crate::store::Value;
use crate::thread::{Reg, SpaceReg, Step, ThreadBody};

static INIT_LOGGING: Once = Once::new();

/// Initialize test logging with trace-level output.
///
/// Safe to call multiple times; only initializes once.
pub fn init_test_logging() {
    init_test_logging_with_level(tracing::Level::TRACE);
}

/// Initialize test logging with a custom level.
///
/// The first call wins; later calls are no-ops.
pub fn init_test_logging_with_level(level: tracing::Level) {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_test_writer()
            .with_file(true)
            .with_line_number(true)
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_ansi(false)
            .try_init();
    });
}

/// Root body that binds the root variable (register 0) to an integer.
#[derive(Debug, Clone)]
pub struct BindInt(pub i64);

impl ThreadBody for BindInt {
    fn resume(&mut self, cx: &mut ThreadCx<'_>) -> Step {
        cx.bind_int(0, self.0);
        Step::Done
    }

    fn clone_box(&self) -> Box<dyn ThreadBody> {
        Box::new(self.clone())
    }
}

/// Root body that binds the root variable to an atom.
#[derive(Debug, Clone)]
pub struct BindAtom(pub &'static str);

impl ThreadBody for BindAtom {
    fn resume(&mut self, cx: &mut ThreadCx<'_>) -> Step {
        cx.bind_atom(0, self.0);
        Step::Done
    }

    fn clone_box(&self) -> Box<dyn ThreadBody> {
        Box::new(self.clone())
    }
}

/// Root body that tells two contradictory bindings for the root
/// variable, failing the space on the second tell.
#[derive(Debug, Clone)]
pub struct BindTwice(pub i64, pub i64);

impl ThreadBody for BindTwice {
    fn resume(&mut self, cx: &mut ThreadCx<'_>) -> Step {
        cx.bind_int(0, self.0);
        cx.bind_int(0, self.1);
        Step::Done
    }

    fn clone_box(&self) -> Box<dyn ThreadBody> {
        Box::new(self.clone())
    }
}

/// Sibling body spawned with registers `[result, input]`: waits for the
/// input, then binds the result to input plus one.
#[derive(Debug, Clone, Default)]
pub struct Relay {
    waited: bool,
}

impl ThreadBody for Relay {
    fn resume(&mut self, cx: &mut ThreadCx<'_>) -> Step {
        if !self.waited {
            self.waited = true;
            return Step::Wait(1);
        }
        if let Some(value) = cx.read_int(1) {
            cx.bind_int(0, value + 1);
        }
        Step::Done
    }

    fn clone_box(&self) -> Box<dyn ThreadBody> {
        Box::new(self.clone())
    }
}

/// Root body that spawns a [`Relay`] over a fresh variable, yields once,
/// then feeds the relay. The root variable ends up bound to `input + 1`.
#[derive(Debug, Clone)]
pub struct SpawnRelay {
    /// The value fed to the relay.
    pub input: i64,
    phase: u8,
}

impl SpawnRelay {
    /// Creates the body with the given relay input.
    #[must_use]
    pub const fn new(input: i64) -> Self {
        Self { input, phase: 0 }
    }
}

impl ThreadBody for SpawnRelay {
    fn resume(&mut self, cx: &mut ThreadCx<'_>) -> Step {
        match self.phase {
            0 => {
                let x = cx.fresh();
                self.phase = 1;
                if cx.spawn(Box::new(Relay::default()), &[0, x]).is_err() {
                    return Step::Done;
                }
                Step::Yield
            }
            _ => {
                cx.bind_int(1, self.input);
                Step::Done
            }
        }
    }

    fn clone_box(&self) -> Box<dyn ThreadBody> {
        Box::new(self.clone())
    }
}

/// Root body that chooses among `arity` alternatives, waits for the
/// decision, then binds the root variable to the selected alternative.
#[derive(Debug, Clone)]
pub struct ChooseBind {
    arity: u32,
    decision: Option<Reg>,
}

impl ChooseBind {
    /// Creates the body with the given arity.
    #[must_use]
    pub const fn new(arity: u32) -> Self {
        Self {
            arity,
            decision: None,
        }
    }
}

impl ThreadBody for ChooseBind {
    fn resume(&mut self, cx: &mut ThreadCx<'_>) -> Step {
        match self.decision {
            None => match cx.choose(self.arity) {
                Ok(reg) => {
                    self.decision = Some(reg);
                    Step::Wait(reg)
                }
                Err(_) => Step::Done,
            },
            Some(reg) => {
                if let Some(selected) = cx.read_int(reg) {
                    cx.bind_int(0, selected);
                }
                Step::Done
            }
        }
    }

    fn clone_box(&self) -> Box<dyn ThreadBody> {
        Box::new(self.clone())
    }
}

/// Root body with two sequential binary choices; binds the root variable
/// to `10 * first + second`. Exploring all commits yields 11, 12, 21, 22.
#[derive(Debug, Clone, Default)]
pub struct TwoDigit {
    first: Option<Reg>,
    second: Option<Reg>,
}

impl ThreadBody for TwoDigit {
    fn resume(&mut self, cx: &mut ThreadCx<'_>) -> Step {
        if self.first.is_none() {
            return match cx.choose(2) {
                Ok(reg) => {
                    self.first = Some(reg);
                    Step::Wait(reg)
                }
                Err(_) => Step::Done,
            };
        }
        if self.second.is_none() {
            return match cx.choose(2) {
                Ok(reg) => {
                    self.second = Some(reg);
                    Step::Wait(reg)
                }
                Err(_) => Step::Done,
            };
        }
        let digits = self
            .first
            .and_then(|r| cx.read_int(r))
            .zip(self.second.and_then(|r| cx.read_int(r)));
        if let Some((a, b)) = digits {
            cx.bind_int(0, 10 * a + b);
        }
        Step::Done
    }

    fn clone_box(&self) -> Box<dyn ThreadBody> {
        Box::new(self.clone())
    }
}

/// Root body that runs a child space to completion, merges it, and links
/// its own root variable to the child's result.
#[derive(Debug, Clone)]
pub struct NestAndMerge {
    /// The value the child binds.
    pub value: i64,
    child: Option<SpaceReg>,
    child_root: Option<Reg>,
}

impl NestAndMerge {
    /// Creates the body with the value the child will bind.
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self {
            value,
            child: None,
            child_root: None,
        }
    }
}

impl ThreadBody for NestAndMerge {
    fn resume(&mut self, cx: &mut ThreadCx<'_>) -> Step {
        match self.child {
            None => {
                let Ok(child) = cx.new_space(Box::new(BindInt(self.value))) else {
                    return Step::Done;
                };
                let Ok(root) = cx.root_of(child) else {
                    return Step::Done;
                };
                self.child = Some(child);
                self.child_root = Some(root);
                Step::WaitSpace(child)
            }
            Some(child) => {
                let merged = cx
                    .outcome(child)
                    .is_ok_and(|outcome| outcome.is_succeeded())
                    && cx.merge_space(child).is_ok();
                if merged {
                    if let Some(root) = self.child_root {
                        cx.bind_reg(0, root);
                    }
                }
                Step::Done
            }
        }
    }

    fn clone_box(&self) -> Box<dyn ThreadBody> {
        Box::new(self.clone())
    }
}

/// Root body that binds the child's root variable locally before merging
/// the child, so the merge conflicts and fails this space.
#[derive(Debug, Clone, Default)]
pub struct MergePoison {
    child: Option<SpaceReg>,
    child_root: Option<Reg>,
}

impl ThreadBody for MergePoison {
    fn resume(&mut self, cx: &mut ThreadCx<'_>) -> Step {
        match self.child {
            None => {
                let Ok(child) = cx.new_space(Box::new(BindInt(5))) else {
                    return Step::Done;
                };
                let Ok(root) = cx.root_of(child) else {
                    return Step::Done;
                };
                self.child = Some(child);
                self.child_root = Some(root);
                Step::WaitSpace(child)
            }
            Some(child) => {
                if let Some(root) = self.child_root {
                    // Local store says 6; the child's store says 5. The
                    // merge propagates the contradiction into this space.
                    cx.bind_int(root, 6);
                    let _ = cx.merge_space(child);
                }
                Step::Done
            }
        }
    }

    fn clone_box(&self) -> Box<dyn ThreadBody> {
        Box::new(self.clone())
    }
}

/// Root body binding the root variable to a labeled tuple.
#[derive(Debug, Clone)]
pub struct BindTuple {
    /// The tuple label.
    pub label: &'static str,
    /// The integer fields.
    pub fields: Vec<i64>,
}

impl ThreadBody for BindTuple {
    fn resume(&mut self, cx: &mut ThreadCx<'_>) -> Step {
        let fields = self.fields.iter().map(|n| Value::Int(*n)).collect();
        cx.bind_value(0, Value::Tuple(self.label.to_string(), fields));
        Step::Done
    }

    fn clone_box(&self) -> Box<dyn ThreadBody> {
        Box::new(self.clone())
    }
}
