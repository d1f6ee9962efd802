//! Test lifecycle state machine.
//!
//! Every test node holds exactly one [`TestStatus`]. Statuses only change
//! through [`transition`], a pure function over `(status, action, severity)`.
//! Side effects that accompany a transition (aborting an async operation,
//! flipping severity) are applied by [`crate::test_data::TestData::apply`].
//!
//! ```text
//!              PEND              PASS / FAIL
//! UNTESTED ──────────▶ PENDING ─────────────▶ PASSING | FAILED | WARNING
//!    │                    │
//!    │ SKIP               │ SKIP(force)            OMIT: any → OMITTED
//!    ▼                    ▼                        RESET: any → UNTESTED
//! SKIPPED ◀───────────────┘                        CANCEL: open → CANCELED
//! ```

use crate::test_data::TestSeverity;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a single test node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    #[default]
    Untested,
    Pending,
    Passing,
    Failed,
    Warning,
    Skipped,
    Omitted,
    Canceled,
}

impl TestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Untested => "untested",
            Self::Pending => "pending",
            Self::Passing => "passing",
            Self::Failed => "failed",
            Self::Warning => "warning",
            Self::Skipped => "skipped",
            Self::Omitted => "omitted",
            Self::Canceled => "canceled",
        }
    }

    /// Still able to produce a result: never ran, or running.
    pub fn is_open(self) -> bool {
        matches!(self, Self::Untested | Self::Pending)
    }

    /// Reached a final result for this run.
    pub fn is_settled(self) -> bool {
        matches!(
            self,
            Self::Passing | Self::Failed | Self::Warning | Self::Skipped | Self::Omitted
        )
    }

    /// Produced a failure of either severity.
    pub fn has_failure(self) -> bool {
        matches!(self, Self::Failed | Self::Warning)
    }

    /// Excluded from counting: never ran or was abandoned.
    pub fn is_non_actionable(self) -> bool {
        matches!(self, Self::Skipped | Self::Omitted | Self::Canceled)
    }
}

impl std::fmt::Display for TestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requested status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestAction {
    Pend,
    Pass,
    Fail,
    Warn,
    Skip { force: bool },
    Omit,
    Cancel,
    Reset,
}

/// Outcome of applying an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: TestStatus,
    pub to: TestStatus,
}

impl Transition {
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

/// Static transition table.
///
/// Refused transitions return `from` unchanged. A same-status result is
/// likewise reported as unchanged so callers emit no event for it.
pub fn transition(from: TestStatus, action: TestAction, severity: TestSeverity) -> Transition {
    use TestStatus::*;

    let to = match (from, action) {
        (_, TestAction::Reset) => Untested,
        (Canceled, _) => Canceled,
        (_, TestAction::Omit) => Omitted,
        (_, TestAction::Warn) => from,

        (Untested, TestAction::Pend) => Pending,

        (Untested | Pending, TestAction::Pass) => Passing,
        (Untested | Pending, TestAction::Fail) => match severity {
            TestSeverity::Warning => Warning,
            TestSeverity::Error => Failed,
        },

        (Untested, TestAction::Skip { .. }) => Skipped,
        (Pending, TestAction::Skip { force: true }) => Skipped,
        (Pending, TestAction::Skip { force: false }) => Pending,

        (Untested | Pending, TestAction::Cancel) => Canceled,

        (_, _) => from,
    };

    Transition { from, to }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(from: TestStatus, action: TestAction) -> TestStatus {
        transition(from, action, TestSeverity::Error).to
    }

    #[test]
    fn pend_only_from_untested() {
        assert_eq!(apply(TestStatus::Untested, TestAction::Pend), TestStatus::Pending);
        assert_eq!(apply(TestStatus::Passing, TestAction::Pend), TestStatus::Passing);
    }

    #[test]
    fn fail_resolves_by_severity() {
        let warn = transition(TestStatus::Pending, TestAction::Fail, TestSeverity::Warning);
        assert_eq!(warn.to, TestStatus::Warning);
        assert_eq!(apply(TestStatus::Pending, TestAction::Fail), TestStatus::Failed);
    }

    #[test]
    fn skip_refused_on_pending_without_force() {
        let refused = transition(
            TestStatus::Pending,
            TestAction::Skip { force: false },
            TestSeverity::Error,
        );
        assert!(!refused.changed());
        assert_eq!(
            apply(TestStatus::Pending, TestAction::Skip { force: true }),
            TestStatus::Skipped
        );
    }

    #[test]
    fn settled_statuses_accept_only_omit_and_reset() {
        for settled in [TestStatus::Passing, TestStatus::Failed, TestStatus::Warning] {
            assert_eq!(apply(settled, TestAction::Pass), settled);
            assert_eq!(apply(settled, TestAction::Fail), settled);
            assert_eq!(apply(settled, TestAction::Skip { force: true }), settled);
            assert_eq!(apply(settled, TestAction::Cancel), settled);
            assert_eq!(apply(settled, TestAction::Omit), TestStatus::Omitted);
            assert_eq!(apply(settled, TestAction::Reset), TestStatus::Untested);
        }
    }

    #[test]
    fn canceled_ignores_everything_but_reset() {
        for action in [
            TestAction::Pend,
            TestAction::Pass,
            TestAction::Fail,
            TestAction::Skip { force: true },
            TestAction::Omit,
            TestAction::Cancel,
        ] {
            assert_eq!(apply(TestStatus::Canceled, action), TestStatus::Canceled);
        }
        assert_eq!(
            apply(TestStatus::Canceled, TestAction::Reset),
            TestStatus::Untested
        );
    }

    #[test]
    fn same_status_is_unchanged() {
        let t = transition(TestStatus::Omitted, TestAction::Omit, TestSeverity::Error);
        assert!(!t.changed());
    }
}
