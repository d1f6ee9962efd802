//! Per-suite runtime: the bus, the persisted state and the run driver.

use crate::check::{CheckFailure, CheckFuture};
use crate::config::SuiteConfig;
use crate::error::SuiteError;
use crate::handlers;
use crate::scope::{RunBuilder, Scope};
use crate::state::{DoneCallback, PersistedState};
use crate::summary::Summary;
use futures::FutureExt;
use std::cell::RefCell;
use std::panic::AssertUnwindSafe;
use std::rc::{Rc, Weak};
use tokio::task::AbortHandle;
use tracing::{debug, warn};
use verdict_kernel::{
    Bus, Event, IsolateKind, IsolateTree, NodeBinding, Reconciler, RunId, TestAction,
};

pub(crate) struct SuiteRuntime {
    pub config: SuiteConfig,
    pub bus: Bus,
    pub state: RefCell<PersistedState>,
}

impl SuiteRuntime {
    pub fn new(config: SuiteConfig) -> Rc<Self> {
        let runtime = Rc::new(Self {
            config,
            bus: Bus::new(),
            state: RefCell::new(PersistedState::default()),
        });
        handlers::wire(&runtime);
        runtime
    }

    pub fn name(&self) -> Option<&str> {
        self.config.name.as_deref()
    }

    /// Memoized summary of the current tree.
    pub fn summary(&self) -> Rc<Summary> {
        if let Some(summary) = self.state.borrow().summary.as_ref() {
            return Rc::clone(summary);
        }
        let summary = {
            let state = self.state.borrow();
            Rc::new(Summary::from_tree(
                state.current.as_ref(),
                &state.optional_fields,
                self.name(),
            ))
        };
        self.state.borrow_mut().summary = Some(Rc::clone(&summary));
        summary
    }

    pub fn expire_summary(&self) {
        self.state.borrow_mut().summary = None;
    }

    pub fn has_pending(&self, field: Option<&str>) -> bool {
        self.state.borrow().has_pending(field)
    }

    /// Run `callback` now if nothing is pending, else once everything settles.
    pub fn register_done(&self, callback: DoneCallback) {
        if self.has_pending(None) {
            self.state.borrow_mut().done_callbacks.push(callback);
        } else {
            callback(&self.summary());
        }
    }

    pub fn register_field_done(&self, field: &str, callback: DoneCallback) {
        if self.has_pending(Some(field)) {
            self.state
                .borrow_mut()
                .field_callbacks
                .entry(field.to_string())
                .or_default()
                .push(callback);
        } else {
            callback(&self.summary());
        }
    }

    pub fn run_done_callbacks(&self) {
        let callbacks = std::mem::take(&mut self.state.borrow_mut().done_callbacks);
        if callbacks.is_empty() {
            return;
        }
        let summary = self.summary();
        for callback in callbacks {
            callback(&summary);
        }
    }

    pub fn run_settled_field_callbacks(&self) {
        let callbacks = self.state.borrow_mut().take_settled_field_callbacks();
        if callbacks.is_empty() {
            return;
        }
        let summary = self.summary();
        for callback in callbacks {
            callback(&summary);
        }
    }

    /// Execute one run of the suite callback.
    ///
    /// The new tree becomes current even when `declare` fails part way. A
    /// panic in `declare` is resumed once the partial tree is in place and
    /// orphaned pending tests are canceled.
    pub fn run(
        self: &Rc<Self>,
        declare: impl FnOnce(&mut Scope<'_>) -> Result<(), SuiteError>,
    ) -> (RunId, Result<(), SuiteError>) {
        let run = self.state.borrow_mut().next_run();
        debug!(suite = self.name(), %run, "suite run started");
        self.bus.emit(&Event::SuiteRunStarted { run });

        let mut tree = IsolateTree::new(run);
        let root = match tree.open_root() {
            Ok(root) => root,
            Err(err) => return (run, Err(err.into())),
        };
        let previous = self.state.borrow_mut().current.take();
        let mut reconciler = Reconciler::new(previous);
        reconciler.map_root(root);
        self.bus.emit(&Event::IsolateOpened {
            run,
            node: root,
            kind: IsolateKind::Suite,
        });

        let mut builder = RunBuilder::new(Rc::clone(self), tree, reconciler);
        let declared = std::panic::catch_unwind(AssertUnwindSafe(|| {
            declare(&mut Scope::new(&mut builder))
        }));
        let RunBuilder {
            mut tree,
            reconciler,
            optional,
            ..
        } = builder;

        if declared.is_err() {
            tree.unwind_to(root);
        }
        if let Err(err) = tree.close(root) {
            warn!(%run, error = %err, "suite context left unbalanced");
        }
        for field in reconciler.finish() {
            debug!(%run, %field, "orphaned pending test canceled");
        }
        {
            let mut state = self.state.borrow_mut();
            state.current = Some(tree);
            state.optional_fields = self.config.optional.iter().cloned().chain(optional).collect();
        }

        let outcome = match declared {
            Ok(outcome) => outcome,
            Err(panic) => {
                warn!(%run, "suite callback panicked, partial run kept");
                self.expire_summary();
                std::panic::resume_unwind(panic);
            }
        };
        match &outcome {
            Ok(()) => debug!(%run, pending = self.has_pending(None), "suite callback finished"),
            Err(err) => warn!(%run, error = %err, "suite callback failed"),
        }
        self.bus.emit(&Event::SuiteCallbackFinished { run });
        (run, outcome)
    }

    /// Deliver an async outcome to whatever node the binding points at.
    pub fn settle(&self, binding: &NodeBinding, outcome: Result<(), CheckFailure>) {
        let Some(addr) = binding.get() else {
            debug!("async check settled after cancellation, ignored");
            return;
        };
        let settled = {
            let mut state = self.state.borrow_mut();
            let test = state
                .current
                .as_mut()
                .filter(|tree| tree.run() == addr.run)
                .and_then(|tree| tree.test_mut(addr.node));
            match test {
                Some(test) => {
                    let step = match outcome {
                        Ok(()) => test.apply(TestAction::Pass),
                        Err(failure) => {
                            test.set_failure_message(failure.message);
                            test.apply(TestAction::Fail)
                        }
                    };
                    Some((test.field().to_string(), step))
                }
                None => None,
            }
        };
        let Some((field, step)) = settled else {
            warn!(run = %addr.run, node = %addr.node, "async check settled into a stale run, ignored");
            return;
        };
        debug!(%field, status = %step.to, "async check settled");
        if step.changed() {
            self.bus.emit(&Event::TestCompleted {
                field: field.clone(),
                status: step.to,
            });
        }
        self.bus.emit(&Event::AsyncTestSettled { field });
    }
}

/// Spawn `future` on the current `LocalSet` and settle its outcome.
///
/// # Panics
/// Outside a `tokio::task::LocalSet`.
pub(crate) fn spawn_settlement(
    runtime: Weak<SuiteRuntime>,
    binding: NodeBinding,
    future: CheckFuture,
) -> AbortHandle {
    tokio::task::spawn_local(async move {
        let outcome = match AssertUnwindSafe(future).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => Err(CheckFailure::from_panic(panic.as_ref())),
        };
        if let Some(runtime) = runtime.upgrade() {
            runtime.settle(&binding, outcome);
        }
    })
    .abort_handle()
}
