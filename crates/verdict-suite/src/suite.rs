//! The public suite handle.

use crate::config::SuiteConfig;
use crate::dump::SuiteDump;
use crate::error::{DumpError, SuiteError};
use crate::runtime::SuiteRuntime;
use crate::scope::Scope;
use crate::summary::Summary;
use std::rc::Rc;
use tokio::sync::oneshot;
use tracing::debug;
use verdict_kernel::{Event, RunId, Subscription, Topic};

type SuiteCallback<D> = dyn Fn(&mut Scope<'_>, &D) -> Result<(), SuiteError>;

/// A validation suite: a declaring callback plus the state it keeps
/// between runs.
///
/// Async checks are spawned with `tokio::task::spawn_local`, so any run
/// that declares one must happen inside a `tokio::task::LocalSet`.
pub struct Suite<D: ?Sized> {
    runtime: Rc<SuiteRuntime>,
    callback: Rc<SuiteCallback<D>>,
}

impl<D: ?Sized + 'static> Suite<D> {
    pub fn new(
        callback: impl Fn(&mut Scope<'_>, &D) -> Result<(), SuiteError> + 'static,
    ) -> Self {
        Self::with_config(SuiteConfig::default(), callback)
    }

    pub fn with_config(
        config: SuiteConfig,
        callback: impl Fn(&mut Scope<'_>, &D) -> Result<(), SuiteError> + 'static,
    ) -> Self {
        Self {
            runtime: SuiteRuntime::new(config),
            callback: Rc::new(callback),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.runtime.name()
    }

    pub fn config(&self) -> &SuiteConfig {
        &self.runtime.config
    }

    /// Run the callback against `data`, reconciling with the previous run.
    pub fn run(&self, data: &D) -> Result<RunResult, SuiteError> {
        run_on(&self.runtime, &self.callback, data)
    }

    /// Run against a throwaway state; this suite's own state is untouched.
    pub fn run_static(&self, data: &D) -> Result<RunResult, SuiteError> {
        let runtime = SuiteRuntime::new(self.runtime.config.clone());
        run_on(&runtime, &self.callback, data)
    }

    /// Memoized summary of the latest run.
    pub fn summary(&self) -> Rc<Summary> {
        self.runtime.summary()
    }

    pub fn is_pending(&self, field: Option<&str>) -> bool {
        self.runtime.has_pending(field)
    }

    /// Call `callback` once no test of the latest run is pending.
    pub fn done(&self, callback: impl FnOnce(&Summary) + 'static) {
        self.runtime.register_done(Box::new(callback));
    }

    /// Call `callback` once no test of `field` is pending.
    pub fn done_field(&self, field: &str, callback: impl FnOnce(&Summary) + 'static) {
        self.runtime.register_field_done(field, Box::new(callback));
    }

    /// Observe the suite's event bus.
    pub fn subscribe(
        &self,
        topic: impl Into<Topic>,
        handler: impl Fn(&Event) + 'static,
    ) -> Subscription {
        self.runtime.bus.on(topic, handler)
    }

    /// Drop all results and callbacks; pending checks are canceled.
    pub fn reset(&self) {
        self.runtime.bus.emit(&Event::SuiteReset);
    }

    /// Return every test of `field` to untested.
    pub fn reset_field(&self, field: &str) {
        self.runtime.bus.emit(&Event::FieldReset {
            field: field.to_string(),
        });
    }

    /// Remove every test of `field` from the current tree.
    pub fn remove(&self, field: &str) {
        self.runtime.bus.emit(&Event::FieldRemoved {
            field: field.to_string(),
        });
    }

    pub fn dump(&self) -> SuiteDump {
        let state = self.runtime.state.borrow();
        SuiteDump::from_tree(state.current.as_ref(), self.name(), &state.optional_fields)
    }

    /// Replace the current results with those of `dump`.
    pub fn resume(&self, dump: &SuiteDump) -> Result<(), DumpError> {
        let run = self.runtime.state.borrow_mut().next_run();
        let tree = dump.into_tree(run)?;
        let digest = dump.digest()?;
        debug!(suite = self.name(), %run, %digest, "resuming suite");
        let mut optional = dump.optional_set();
        optional.extend(self.runtime.config.optional.iter().cloned());
        self.runtime.state.borrow_mut().staged_resume = Some((tree, optional));
        self.runtime.bus.emit(&Event::SuiteResumed);
        Ok(())
    }
}

fn run_on<D: ?Sized>(
    runtime: &Rc<SuiteRuntime>,
    callback: &Rc<SuiteCallback<D>>,
    data: &D,
) -> Result<RunResult, SuiteError> {
    let (run, outcome) = runtime.run(|scope| callback(scope, data));
    outcome?;
    Ok(RunResult {
        runtime: Rc::clone(runtime),
        run,
        summary: runtime.summary(),
    })
}

/// Outcome of one run: the summary as of the end of the synchronous phase,
/// plus completion hooks.
pub struct RunResult {
    runtime: Rc<SuiteRuntime>,
    run: RunId,
    summary: Rc<Summary>,
}

impl RunResult {
    pub fn run(&self) -> RunId {
        self.run
    }

    pub fn summary(&self) -> &Rc<Summary> {
        &self.summary
    }

    /// Summary of the suite now, reflecting async checks settled since.
    pub fn latest(&self) -> Rc<Summary> {
        self.runtime.summary()
    }

    pub fn done(&self, callback: impl FnOnce(&Summary) + 'static) -> &Self {
        self.runtime.register_done(Box::new(callback));
        self
    }

    pub fn done_field(&self, field: &str, callback: impl FnOnce(&Summary) + 'static) -> &Self {
        self.runtime.register_field_done(field, Box::new(callback));
        self
    }

    /// Resolve with the summary once no test of the run is pending.
    ///
    /// If a later run, reset or resume drops the registration first, this
    /// resolves with the suite's summary at that point.
    pub fn settled(&self) -> impl Future<Output = Rc<Summary>> + 'static {
        let (sender, receiver) = oneshot::channel();
        let weak = Rc::downgrade(&self.runtime);
        self.runtime.register_done(Box::new(move |_: &Summary| {
            if let Some(runtime) = weak.upgrade() {
                let _ = sender.send(runtime.summary());
            }
        }));
        let runtime = Rc::clone(&self.runtime);
        async move {
            match receiver.await {
                Ok(summary) => summary,
                Err(_) => runtime.summary(),
            }
        }
    }
}

impl std::ops::Deref for RunResult {
    type Target = Summary;

    fn deref(&self) -> &Summary {
        &self.summary
    }
}

impl std::fmt::Debug for RunResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunResult")
            .field("run", &self.run)
            .field("summary", &self.summary)
            .finish()
    }
}
