//! Bus wiring for a suite runtime.
//!
//! Handlers hold a weak reference to the runtime so the bus (owned by the
//! runtime) never keeps it alive. The summary-expiry handler subscribes
//! first: every other handler sees a stale cache and rebuilds on demand.

use crate::runtime::SuiteRuntime;
use std::rc::{Rc, Weak};
use tracing::debug;
use verdict_kernel::{Event, EventKind, IsolateTree, NodeId, TestAction, TestStatus, Topic};

pub(crate) fn wire(runtime: &Rc<SuiteRuntime>) {
    let weak = Rc::downgrade(runtime);
    let bus = &runtime.bus;

    bus.on(Topic::All, with(&weak, |rt, _| rt.expire_summary()));

    bus.on(
        EventKind::SuiteRunStarted,
        with(&weak, |rt, _| rt.state.borrow_mut().clear_callbacks()),
    );

    bus.on(
        EventKind::AsyncTestSettled,
        with(&weak, |rt, _| notify_settled(rt)),
    );

    bus.on(
        EventKind::SuiteCallbackFinished,
        with(&weak, |rt, _| notify_settled(rt)),
    );

    bus.on(
        EventKind::AllRunningTestsFinished,
        with(&weak, |rt, _| rt.run_done_callbacks()),
    );

    bus.on(
        EventKind::FieldReset,
        with(&weak, |rt, event| {
            if let Some(field) = event.field() {
                if reset_field(rt, field) {
                    notify_settled(rt);
                }
            }
        }),
    );

    bus.on(
        EventKind::FieldRemoved,
        with(&weak, |rt, event| {
            if let Some(field) = event.field() {
                if remove_field(rt, field) {
                    notify_settled(rt);
                }
            }
        }),
    );

    bus.on(EventKind::SuiteReset, with(&weak, |rt, _| reset_suite(rt)));

    bus.on(EventKind::SuiteResumed, with(&weak, |rt, _| resume_suite(rt)));
}

fn with(
    runtime: &Weak<SuiteRuntime>,
    handler: impl Fn(&SuiteRuntime, &Event) + 'static,
) -> impl Fn(&Event) + 'static {
    let runtime = Weak::clone(runtime);
    move |event| {
        if let Some(runtime) = runtime.upgrade() {
            handler(&runtime, event);
        }
    }
}

/// Fire the callbacks whose scope has nothing pending any more.
fn notify_settled(runtime: &SuiteRuntime) {
    runtime.run_settled_field_callbacks();
    if !runtime.has_pending(None) {
        runtime.bus.emit(&Event::AllRunningTestsFinished);
    }
}

/// Returns whether a pending test of `field` was stopped.
fn reset_field(runtime: &SuiteRuntime, field: &str) -> bool {
    let mut state = runtime.state.borrow_mut();
    let Some(tree) = state.current.as_mut() else {
        return false;
    };
    let stopped = tree.has_pending(Some(field));
    for id in tree.test_ids(Some(field)) {
        tree.expect_test_mut(id).apply(TestAction::Reset);
    }
    debug!(field, stopped, "field reset");
    stopped
}

/// Returns whether a pending test of `field` was stopped.
fn remove_field(runtime: &SuiteRuntime, field: &str) -> bool {
    let mut state = runtime.state.borrow_mut();
    state.field_callbacks.remove(field);
    state.optional_fields.remove(field);
    let Some(tree) = state.current.as_mut() else {
        return false;
    };
    let stopped = tree.has_pending(Some(field));
    for id in tree.test_ids(Some(field)) {
        if let Some(operation) = tree.expect_test_mut(id).take_operation() {
            operation.abort("removed");
        }
        tree.detach(id);
    }
    debug!(field, stopped, "field removed");
    stopped
}

fn cancel_pending(tree: &mut IsolateTree) {
    let pending: Vec<NodeId> = tree
        .tests()
        .filter(|(_, test)| test.status() == TestStatus::Pending)
        .map(|(id, _)| id)
        .collect();
    for id in pending {
        tree.expect_test_mut(id).apply(TestAction::Cancel);
    }
}

fn reset_suite(runtime: &SuiteRuntime) {
    let mut state = runtime.state.borrow_mut();
    if let Some(mut tree) = state.current.take() {
        cancel_pending(&mut tree);
    }
    state.clear_callbacks();
    state.optional_fields.clear();
    debug!(suite = runtime.name(), "suite reset");
}

fn resume_suite(runtime: &SuiteRuntime) {
    let mut state = runtime.state.borrow_mut();
    let Some((tree, optional)) = state.staged_resume.take() else {
        return;
    };
    if let Some(mut previous) = state.current.replace(tree) {
        cancel_pending(&mut previous);
    }
    state.optional_fields = optional;
    state.clear_callbacks();
    debug!(suite = runtime.name(), "suite resumed from dump");
}
