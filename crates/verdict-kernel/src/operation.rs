//! Handles for in-flight async checks.
//!
//! An async check runs as a spawned local task. The task does not hold a
//! reference to the node it reports into; it holds a [`NodeBinding`], a
//! shared cell with the address of whichever node currently owns the
//! operation. Reconciliation moves the operation to a newer run's node by
//! rebinding, and cancellation clears the binding so a late completion
//! finds nothing to write into.

use crate::isolate::NodeAddr;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tokio::task::AbortHandle;
use tracing::debug;

/// Shared cell holding the address an async completion should settle into.
pub type NodeBinding = Rc<Cell<Option<NodeAddr>>>;

#[derive(Debug, Default)]
struct AbortState {
    aborted: Cell<bool>,
    reason: RefCell<Option<String>>,
}

/// Abort signal handed to async checks.
///
/// Cloning shares the signal. Once aborted it stays aborted.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    state: Rc<AbortState>,
}

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the signal. Only the first reason is kept.
    pub fn abort(&self, reason: impl Into<String>) {
        if self.state.aborted.replace(true) {
            return;
        }
        *self.state.reason.borrow_mut() = Some(reason.into());
    }

    pub fn is_aborted(&self) -> bool {
        self.state.aborted.get()
    }

    pub fn reason(&self) -> Option<String> {
        self.state.reason.borrow().clone()
    }
}

/// A live async check attached to a test node.
#[derive(Debug)]
pub struct AsyncOperation {
    signal: AbortSignal,
    binding: NodeBinding,
    task: Option<AbortHandle>,
}

impl AsyncOperation {
    /// Create an operation bound to `addr`.
    pub fn new(signal: AbortSignal, addr: NodeAddr) -> Self {
        Self {
            signal,
            binding: Rc::new(Cell::new(Some(addr))),
            task: None,
        }
    }

    /// Attach the spawned task so aborting also stops it.
    pub fn with_task(mut self, task: AbortHandle) -> Self {
        self.task = Some(task);
        self
    }

    pub fn binding(&self) -> NodeBinding {
        Rc::clone(&self.binding)
    }

    pub fn signal(&self) -> &AbortSignal {
        &self.signal
    }

    /// Address the completion will currently settle into.
    pub fn bound_to(&self) -> Option<NodeAddr> {
        self.binding.get()
    }

    /// Point the completion at a different node.
    pub fn rebind(&self, addr: NodeAddr) {
        self.binding.set(Some(addr));
    }

    /// Fire the abort signal, stop the task and detach from any node.
    pub fn abort(self, reason: &str) {
        debug!(addr = ?self.binding.get(), reason, "aborting async operation");
        self.binding.set(None);
        self.signal.abort(reason);
        if let Some(task) = self.task {
            task.abort();
        }
    }

    /// Release the handle after the operation settled on its own.
    pub fn finish(self) {
        self.binding.set(None);
    }
}
