//! Per-test payload carried by test isolates.

use crate::operation::AsyncOperation;
use crate::status::{TestAction, TestStatus, Transition, transition};
use serde::{Deserialize, Serialize};

/// Whether a failing test counts as an error or a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestSeverity {
    #[default]
    Error,
    Warning,
}

/// Data attached to a test node.
///
/// The check's return value is not kept on the node. It is folded into
/// `status` and the failure message, and the declaring call hands the
/// resulting status back to its caller.
#[derive(Debug)]
pub struct TestData {
    field: String,
    group_path: Vec<String>,
    message: Option<String>,
    failure_message: Option<String>,
    status: TestStatus,
    severity: TestSeverity,
    operation: Option<AsyncOperation>,
}

impl TestData {
    pub fn new(field: impl Into<String>, group_path: Vec<String>, message: Option<String>) -> Self {
        Self {
            field: field.into(),
            group_path,
            message,
            failure_message: None,
            status: TestStatus::Untested,
            severity: TestSeverity::Error,
            operation: None,
        }
    }

    /// Rebuild a test from persisted results, bypassing the state machine.
    ///
    /// Only settled statuses are restored; anything still open comes back
    /// as `Untested` since its operation did not survive serialization.
    pub fn seeded(
        field: impl Into<String>,
        group_path: Vec<String>,
        message: Option<String>,
        failure_message: Option<String>,
        status: TestStatus,
        severity: TestSeverity,
    ) -> Self {
        let (status, failure_message) = if status.is_settled() {
            (status, failure_message)
        } else {
            (TestStatus::Untested, None)
        };
        Self {
            status,
            severity,
            failure_message,
            ..Self::new(field, group_path, message)
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn group_path(&self) -> &[String] {
        &self.group_path
    }

    pub fn status(&self) -> TestStatus {
        self.status
    }

    pub fn severity(&self) -> TestSeverity {
        self.severity
    }

    pub fn declared_message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn failure_message(&self) -> Option<&str> {
        self.failure_message.as_deref()
    }

    /// Message reported for a failure: the check's own, else the declared one.
    pub fn message(&self) -> Option<&str> {
        self.failure_message.as_deref().or(self.message.as_deref())
    }

    pub fn set_failure_message(&mut self, message: Option<String>) {
        if message.is_some() {
            self.failure_message = message;
        }
    }

    pub fn is_async(&self) -> bool {
        self.operation.is_some()
    }

    pub fn operation(&self) -> Option<&AsyncOperation> {
        self.operation.as_ref()
    }

    pub fn attach_operation(&mut self, operation: AsyncOperation) {
        self.operation = Some(operation);
    }

    pub fn take_operation(&mut self) -> Option<AsyncOperation> {
        self.operation.take()
    }

    /// Apply an action through the state machine.
    ///
    /// `Warn` flips severity. A transition out of `Pending` into a status
    /// that no longer wants the result aborts the operation; a settling
    /// transition releases it.
    pub fn apply(&mut self, action: TestAction) -> Transition {
        if action == TestAction::Warn && self.status != TestStatus::Canceled {
            self.severity = TestSeverity::Warning;
        }

        let step = transition(self.status, action, self.severity);
        if !step.changed() {
            return step;
        }
        self.status = step.to;

        match step.to {
            TestStatus::Canceled | TestStatus::Skipped | TestStatus::Omitted | TestStatus::Untested => {
                if let Some(op) = self.operation.take() {
                    op.abort(step.to.as_str());
                }
            }
            TestStatus::Passing | TestStatus::Failed | TestStatus::Warning => {
                if let Some(op) = self.operation.take() {
                    op.finish();
                }
            }
            TestStatus::Pending => {}
        }

        if step.to == TestStatus::Untested {
            self.failure_message = None;
        }

        step
    }

    /// Carry state from the same test in a previous run.
    ///
    /// The previous node keeps its status; only the operation leaves it.
    pub fn adopt(&mut self, previous: &mut TestData) {
        self.status = previous.status;
        self.severity = previous.severity;
        self.failure_message = previous.failure_message.clone();
        self.operation = previous.operation.take();
    }
}
