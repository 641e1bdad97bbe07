//! Error types for the space-operation protocol.
//!
//! Two kinds of programming errors are raised synchronously to the caller
//! and never retried:
//!
//! - [`UsageError`]: a cross-space operation was invoked against a space in
//!   an illegal status (disposed handle, out-of-range selector, double
//!   distributor install, ...).
//! - [`ContextError`]: `choose` was invoked where no resolving ancestor can
//!   exist, outside the deliberate top-level degradation.
//!
//! A binding conflict inside a space is *not* an error; it surfaces as
//! [`AskOutcome::Failed`](crate::types::AskOutcome::Failed).

use thiserror::Error;

/// An operation was invoked against a space in an illegal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum UsageError {
    /// The handle does not name any space known to the engine.
    #[error("handle does not name a known space")]
    UnknownSpace,

    /// The space was already disposed by `merge` or `kill`.
    #[error("space was already disposed by merge or kill")]
    Disposed,

    /// The operation requires a stable space.
    #[error("operation requires a stable space")]
    NotStable,

    /// `merge` was applied to a failed space.
    #[error("cannot merge a failed space")]
    MergeFailed,

    /// `merge` was applied to a space with a pending distributor.
    #[error("cannot merge a space with pending alternatives")]
    MergeAlternatives,

    /// `commit` was applied to a space without pending alternatives.
    #[error("commit requires a space with pending alternatives")]
    NotAlternatives,

    /// `commit` selector outside `1..=arity`.
    #[error("selector {selector} out of range for {arity} alternatives")]
    SelectorOutOfRange {
        /// The selector the caller passed.
        selector: u32,
        /// The arity of the installed distributor.
        arity: u32,
    },

    /// `choose` was called while a distributor is already installed.
    #[error("space already has a distributor installed")]
    DistributorInstalled,

    /// A distributor was requested with zero alternatives.
    #[error("a distributor needs at least one alternative")]
    NoAlternatives,

    /// A cross-space operation targeted the top-level space.
    #[error("operation is illegal on the top-level space")]
    TopLevel,

    /// A thread was spawned into a space that already failed.
    #[error("space has already failed")]
    SpaceFailed,

    /// A body referenced a register it never wrote.
    #[error("register was never written")]
    BadRegister,
}

/// `choose` was invoked where no ancestor can ever resolve the choice.
///
/// The top-level space is the deliberate exception: there `choose`
/// degrades to an always-unset placeholder variable instead of erroring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContextError {
    /// No ancestor exists to commit the distributor.
    #[error("no ancestor exists to resolve this distributor")]
    NoResolvingAncestor,
}

/// The error type for space operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SpaceError {
    /// A protocol misuse by the caller.
    #[error(transparent)]
    Usage(#[from] UsageError),

    /// A distributor was created in a context that can never resolve it.
    #[error(transparent)]
    Context(#[from] ContextError),

    /// The scheduler exhausted its step budget before the target space
    /// became stable. Turns an accidental livelock into a diagnosable
    /// failure instead of a hang.
    #[error("scheduler exhausted {steps} steps before the space became stable")]
    Stalled {
        /// Steps executed before giving up.
        steps: u64,
    },
}

impl SpaceError {
    /// Returns true if this is a caller protocol misuse.
    #[must_use]
    pub const fn is_usage(&self) -> bool {
        matches!(self, Self::Usage(_))
    }

    /// Returns true if this is a distributor-context error.
    #[must_use]
    pub const fn is_context(&self) -> bool {
        matches!(self, Self::Context(_))
    }
}

/// A specialized result type for space operations.
pub type Result<T> = core::result::Result<T, SpaceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_predicates() {
        let usage: SpaceError = UsageError::Disposed.into();
        assert!(usage.is_usage());
        assert!(!usage.is_context());

        let context: SpaceError = ContextError::NoResolvingAncestor.into();
        assert!(context.is_context());
    }

    #[test]
    fn selector_message_carries_both_numbers() {
        let err = UsageError::SelectorOutOfRange {
            selector: 5,
            arity: 3,
        };
        assert_eq!(
            err.to_string(),
            "selector 5 out of range for 3 alternatives"
        );
    }
}
