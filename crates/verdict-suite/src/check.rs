//! Check outcomes and the context handed to a running check.

use futures::FutureExt;
use futures::future::LocalBoxFuture;
use std::any::Any;
use std::cell::Cell;
use std::fmt::Display;
use std::future::Future;
use verdict_kernel::AbortSignal;

/// A failed check, with the message to report if it has one.
#[derive(Debug, Clone, Default, PartialEq, Eq, thiserror::Error)]
#[error("{}", .message.as_deref().unwrap_or("check failed"))]
pub struct CheckFailure {
    pub message: Option<String>,
}

impl CheckFailure {
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            message: (!message.is_empty()).then_some(message),
        }
    }

    pub fn silent() -> Self {
        Self::default()
    }

    pub(crate) fn from_panic(payload: &(dyn Any + Send)) -> Self {
        match panic_message(payload) {
            Some(message) => Self::new(message),
            None => Self::silent(),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> Option<String> {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
}

pub type CheckFuture = LocalBoxFuture<'static, Result<(), CheckFailure>>;

/// What a check body returns.
pub enum Check {
    Pass,
    Fail(Option<String>),
    /// Still resolving; an `Err` output fails the test.
    Pending(CheckFuture),
}

impl Check {
    pub fn fail(message: impl Into<String>) -> Self {
        Self::Fail(CheckFailure::new(message).message)
    }

    pub fn pending<F, E>(future: F) -> Self
    where
        F: Future<Output = Result<(), E>> + 'static,
        E: Display,
    {
        Self::Pending(
            future
                .map(|outcome| outcome.map_err(|e| CheckFailure::new(e.to_string())))
                .boxed_local(),
        )
    }
}

impl std::fmt::Debug for Check {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pass => f.write_str("Pass"),
            Self::Fail(message) => f.debug_tuple("Fail").field(message).finish(),
            Self::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

impl From<bool> for Check {
    fn from(passed: bool) -> Self {
        if passed { Self::Pass } else { Self::Fail(None) }
    }
}

impl From<()> for Check {
    fn from((): ()) -> Self {
        Self::Pass
    }
}

impl<E: Display> From<Result<(), E>> for Check {
    fn from(outcome: Result<(), E>) -> Self {
        match outcome {
            Ok(()) => Self::Pass,
            Err(e) => Self::fail(e.to_string()),
        }
    }
}

/// Handed to every check body.
#[derive(Debug)]
pub struct CheckContext {
    signal: AbortSignal,
    warned: Cell<bool>,
}

impl CheckContext {
    pub(crate) fn new(signal: AbortSignal) -> Self {
        Self {
            signal,
            warned: Cell::new(false),
        }
    }

    /// Report a failure of this test as a warning rather than an error.
    pub fn warn(&self) {
        self.warned.set(true);
    }

    pub(crate) fn is_warned(&self) -> bool {
        self.warned.get()
    }

    /// Fires when the test is canceled, skipped or reset while pending.
    pub fn signal(&self) -> &AbortSignal {
        &self.signal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_and_result_conversions() {
        assert!(matches!(Check::from(true), Check::Pass));
        assert!(matches!(Check::from(false), Check::Fail(None)));
        let failed: Check = Err::<(), _>("too short").into();
        assert!(matches!(failed, Check::Fail(Some(ref m)) if m == "too short"));
    }

    #[test]
    fn empty_failure_message_is_dropped() {
        assert_eq!(CheckFailure::new("").message, None);
        assert_eq!(CheckFailure::silent().to_string(), "check failed");
    }

    #[test]
    fn panic_payloads_become_messages() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(
            CheckFailure::from_panic(payload.as_ref()).message.as_deref(),
            Some("boom")
        );
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned boom"));
        assert_eq!(
            CheckFailure::from_panic(payload.as_ref()).message.as_deref(),
            Some("owned boom")
        );
    }
}
