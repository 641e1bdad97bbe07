//! Outcome types observed by `ask` and `askVerbose`.
//!
//! A conflict inside a space is not an error: it is the expected terminal
//! result of exploring one branch of a search, so it travels as an
//! ordinary value here rather than through the error channel.

use crate::types::VarId;

/// The outcome of asking a stable space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AskOutcome {
    /// The local store became inconsistent.
    Failed,
    /// Stable, consistent, no distributor installed.
    Succeeded,
    /// Stable, consistent, a distributor with this many alternatives is
    /// awaiting `commit`.
    Alternatives(u32),
}

impl AskOutcome {
    /// Returns true for [`AskOutcome::Failed`].
    #[must_use]
    pub const fn is_failed(self) -> bool {
        matches!(self, Self::Failed)
    }

    /// Returns true for [`AskOutcome::Succeeded`].
    #[must_use]
    pub const fn is_succeeded(self) -> bool {
        matches!(self, Self::Succeeded)
    }

    /// Returns the distributor arity, if alternatives are pending.
    #[must_use]
    pub const fn alternatives(self) -> Option<u32> {
        match self {
            Self::Alternatives(n) => Some(n),
            _ => None,
        }
    }
}

/// The outcome of `askVerbose`: the classification plus the variables the
/// space newly entailed relative to its parent's view, in binding order.
///
/// The entailment list is empty for a failed space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerboseOutcome {
    /// The same classification `ask` would report.
    pub outcome: AskOutcome,
    /// Variables bound in the space's local store, oldest first.
    pub entailed: Vec<VarId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicates_match_variant() {
        assert!(AskOutcome::Failed.is_failed());
        assert!(AskOutcome::Succeeded.is_succeeded());
        assert!(!AskOutcome::Alternatives(3).is_succeeded());
        assert_eq!(AskOutcome::Alternatives(3).alternatives(), Some(3));
        assert_eq!(AskOutcome::Succeeded.alternatives(), None);
    }
}
