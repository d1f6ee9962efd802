//! The declaration surface handed to a suite callback.
//!
//! A [`Scope`] wraps the tree under construction together with the
//! reconciler holding the previous run. Every `test` call opens a Test
//! isolate, decides whether it runs, is skipped or is omitted, claims its
//! previous counterpart and closes it again before returning.

use crate::check::{Check, CheckContext, CheckFailure};
use crate::config::ExecutionMode;
use crate::error::SuiteError;
use crate::runtime::{SuiteRuntime, spawn_settlement};
use std::collections::BTreeSet;
use std::panic::AssertUnwindSafe;
use std::rc::Rc;
use verdict_kernel::{
    AbortSignal, AsyncOperation, Event, IsolateKind, IsolatePayload, IsolateTree, NodeId,
    Reconciler, RunId, TestAction, TestData, TestStatus,
};

/// How a declared test is treated in this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Directive {
    Run,
    Skip { force: bool },
    Omit,
}

/// Mutable state of one run while its callback executes.
pub(crate) struct RunBuilder {
    pub runtime: Rc<SuiteRuntime>,
    pub tree: IsolateTree,
    pub reconciler: Reconciler,
    pub optional: BTreeSet<String>,
    group_path: Vec<String>,
    skip_depth: usize,
    omit_depth: usize,
    only: BTreeSet<String>,
    skipped: BTreeSet<String>,
    failed: BTreeSet<String>,
}

impl RunBuilder {
    pub fn new(runtime: Rc<SuiteRuntime>, tree: IsolateTree, reconciler: Reconciler) -> Self {
        Self {
            runtime,
            tree,
            reconciler,
            optional: BTreeSet::new(),
            group_path: Vec::new(),
            skip_depth: 0,
            omit_depth: 0,
            only: BTreeSet::new(),
            skipped: BTreeSet::new(),
            failed: BTreeSet::new(),
        }
    }

    fn emit(&self, event: Event) {
        self.runtime.bus.emit(&event);
    }

    fn directive(&self, field: &str) -> Directive {
        if self.omit_depth > 0 {
            return Directive::Omit;
        }
        if self.skip_depth > 0 {
            return Directive::Skip { force: true };
        }
        let unfocused = !self.only.is_empty() && !self.only.contains(field);
        let eager_stop =
            self.runtime.config.mode == ExecutionMode::Eager && self.failed.contains(field);
        if unfocused || self.skipped.contains(field) || eager_stop {
            return Directive::Skip { force: false };
        }
        Directive::Run
    }

    fn run_check<C: Into<Check>>(&mut self, id: NodeId, check: impl FnOnce(&CheckContext) -> C) {
        let context = CheckContext::new(AbortSignal::new());
        let outcome =
            std::panic::catch_unwind(AssertUnwindSafe(|| -> Check { check(&context).into() }));
        let addr = self.tree.addr(id);
        let test = self.tree.expect_test_mut(id);
        if context.is_warned() {
            test.apply(TestAction::Warn);
        }
        match outcome {
            Ok(Check::Pass) => {
                test.apply(TestAction::Pass);
            }
            Ok(Check::Fail(message)) => {
                test.set_failure_message(message);
                test.apply(TestAction::Fail);
            }
            Ok(Check::Pending(future)) => {
                let operation = AsyncOperation::new(context.signal().clone(), addr);
                let task = spawn_settlement(
                    Rc::downgrade(&self.runtime),
                    operation.binding(),
                    future,
                );
                test.apply(TestAction::Pend);
                test.attach_operation(operation.with_task(task));
            }
            Err(panic) => {
                test.set_failure_message(CheckFailure::from_panic(panic.as_ref()).message);
                test.apply(TestAction::Fail);
            }
        }
    }
}

/// Declaration handle for one run.
pub struct Scope<'a> {
    builder: &'a mut RunBuilder,
}

impl<'a> Scope<'a> {
    pub(crate) fn new(builder: &'a mut RunBuilder) -> Self {
        Self { builder }
    }

    pub fn run(&self) -> RunId {
        self.builder.tree.run()
    }

    /// Declare a test for `field`. Returns the test's status after declaration.
    pub fn test<C: Into<Check>>(
        &mut self,
        field: &str,
        message: Option<&str>,
        check: impl FnOnce(&CheckContext) -> C,
    ) -> Result<TestStatus, SuiteError> {
        self.declare_test(field, None, message, check)
    }

    /// Declare a test matched against previous runs by `key` rather than position.
    pub fn test_keyed<C: Into<Check>>(
        &mut self,
        field: &str,
        key: &str,
        message: Option<&str>,
        check: impl FnOnce(&CheckContext) -> C,
    ) -> Result<TestStatus, SuiteError> {
        self.declare_test(field, Some(key), message, check)
    }

    /// Declare a named group; tests inside report under it.
    pub fn group<R>(
        &mut self,
        name: &str,
        declare: impl FnOnce(&mut Scope<'_>) -> Result<R, SuiteError>,
    ) -> Result<R, SuiteError> {
        if name.is_empty() {
            return Err(SuiteError::EmptyGroupName);
        }
        let builder = &mut *self.builder;
        let id = builder.tree.open(
            None,
            IsolatePayload::Group {
                name: name.to_string(),
            },
        )?;
        builder.emit(Event::IsolateOpened {
            run: builder.tree.run(),
            node: id,
            kind: IsolateKind::Group,
        });
        builder.reconciler.counterpart(&builder.tree, id);
        builder.group_path.push(name.to_string());

        let output = declare(self);

        self.builder.group_path.pop();
        let closed = self.builder.tree.close(id);
        let output = output?;
        closed?;
        Ok(output)
    }

    /// Force-skip every test declared by `declare` when `condition` holds.
    pub fn skip_when<R>(
        &mut self,
        condition: bool,
        declare: impl FnOnce(&mut Scope<'_>) -> R,
    ) -> R {
        if !condition {
            return declare(self);
        }
        self.builder.skip_depth += 1;
        let output = declare(self);
        self.builder.skip_depth -= 1;
        output
    }

    /// Omit every test declared by `declare` when `condition` holds.
    pub fn omit_when<R>(
        &mut self,
        condition: bool,
        declare: impl FnOnce(&mut Scope<'_>) -> R,
    ) -> R {
        if !condition {
            return declare(self);
        }
        self.builder.omit_depth += 1;
        let output = declare(self);
        self.builder.omit_depth -= 1;
        output
    }

    /// Run only the focused fields from here on.
    pub fn only(&mut self, field: &str) {
        self.builder.only.insert(field.to_string());
    }

    /// Skip `field` from here on.
    pub fn skip(&mut self, field: &str) {
        self.builder.skipped.insert(field.to_string());
    }

    /// Let `field` stay incomplete without invalidating the suite.
    pub fn optional(&mut self, field: &str) {
        self.builder.optional.insert(field.to_string());
    }

    fn declare_test<C: Into<Check>>(
        &mut self,
        field: &str,
        key: Option<&str>,
        message: Option<&str>,
        check: impl FnOnce(&CheckContext) -> C,
    ) -> Result<TestStatus, SuiteError> {
        if field.is_empty() {
            return Err(SuiteError::EmptyFieldName);
        }
        let builder = &mut *self.builder;
        let run = builder.tree.run();
        let data = TestData::new(
            field,
            builder.group_path.clone(),
            message.map(str::to_string),
        );
        let id = builder
            .tree
            .open(key.map(str::to_string), IsolatePayload::Test(data))?;
        builder.emit(Event::IsolateOpened {
            run,
            node: id,
            kind: IsolateKind::Test,
        });

        let previous = builder.reconciler.counterpart(&builder.tree, id);
        let previous_status = previous.and_then(|p| builder.reconciler.previous_status(p));
        let addr = builder.tree.addr(id);

        match builder.directive(field) {
            Directive::Omit => {
                if let (Some(p), Some(TestStatus::Pending)) = (previous, previous_status) {
                    builder.reconciler.cancel(p);
                }
                builder.tree.expect_test_mut(id).apply(TestAction::Omit);
            }
            Directive::Skip { force } => {
                let carried = previous_status
                    .is_some_and(|status| status == TestStatus::Pending || status.is_settled());
                if let (Some(p), true) = (previous, carried) {
                    builder
                        .reconciler
                        .transplant(p, builder.tree.expect_test_mut(id), addr);
                }
                builder
                    .tree
                    .expect_test_mut(id)
                    .apply(TestAction::Skip { force });
            }
            Directive::Run => match (previous, previous_status) {
                (Some(p), Some(TestStatus::Pending)) => {
                    builder
                        .reconciler
                        .transplant(p, builder.tree.expect_test_mut(id), addr);
                }
                _ => builder.run_check(id, check),
            },
        }

        let status = builder
            .tree
            .test(id)
            .map_or(TestStatus::Untested, TestData::status);
        if status == TestStatus::Failed {
            builder.failed.insert(field.to_string());
        }
        let event = if status == TestStatus::Pending {
            Event::TestPending {
                field: field.to_string(),
            }
        } else {
            Event::TestCompleted {
                field: field.to_string(),
                status,
            }
        };
        builder.emit(event);
        builder.tree.close(id)?;
        Ok(status)
    }
}
