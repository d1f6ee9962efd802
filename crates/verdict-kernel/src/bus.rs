//! Synchronous in-process event bus.
//!
//! One bus per suite runtime. `emit` calls every handler subscribed to the
//! event's kind plus every [`Topic::All`] handler, in subscription order.
//! There is no queue: a handler that emits runs the nested dispatch to
//! completion before the outer one continues.

use crate::isolate::{IsolateKind, NodeId, RunId};
use crate::status::TestStatus;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use tracing::trace;

/// Something that happened inside a suite runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    SuiteRunStarted { run: RunId },
    IsolateOpened {
        run: RunId,
        node: NodeId,
        kind: IsolateKind,
    },
    TestPending { field: String },
    TestCompleted { field: String, status: TestStatus },
    AsyncTestSettled { field: String },
    SuiteCallbackFinished { run: RunId },
    AllRunningTestsFinished,
    FieldReset { field: String },
    FieldRemoved { field: String },
    SuiteReset,
    SuiteResumed,
}

/// Payload-free discriminator of [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    SuiteRunStarted,
    IsolateOpened,
    TestPending,
    TestCompleted,
    AsyncTestSettled,
    SuiteCallbackFinished,
    AllRunningTestsFinished,
    FieldReset,
    FieldRemoved,
    SuiteReset,
    SuiteResumed,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::SuiteRunStarted { .. } => EventKind::SuiteRunStarted,
            Self::IsolateOpened { .. } => EventKind::IsolateOpened,
            Self::TestPending { .. } => EventKind::TestPending,
            Self::TestCompleted { .. } => EventKind::TestCompleted,
            Self::AsyncTestSettled { .. } => EventKind::AsyncTestSettled,
            Self::SuiteCallbackFinished { .. } => EventKind::SuiteCallbackFinished,
            Self::AllRunningTestsFinished => EventKind::AllRunningTestsFinished,
            Self::FieldReset { .. } => EventKind::FieldReset,
            Self::FieldRemoved { .. } => EventKind::FieldRemoved,
            Self::SuiteReset => EventKind::SuiteReset,
            Self::SuiteResumed => EventKind::SuiteResumed,
        }
    }

    /// Field the event concerns, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::TestPending { field }
            | Self::TestCompleted { field, .. }
            | Self::AsyncTestSettled { field }
            | Self::FieldReset { field }
            | Self::FieldRemoved { field } => Some(field),
            Self::SuiteRunStarted { .. }
            | Self::IsolateOpened { .. }
            | Self::SuiteCallbackFinished { .. }
            | Self::AllRunningTestsFinished
            | Self::SuiteReset
            | Self::SuiteResumed => None,
        }
    }
}

/// What a handler subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    All,
    Kind(EventKind),
}

impl Topic {
    fn matches(self, kind: EventKind) -> bool {
        match self {
            Self::All => true,
            Self::Kind(k) => k == kind,
        }
    }
}

impl From<EventKind> for Topic {
    fn from(kind: EventKind) -> Self {
        Self::Kind(kind)
    }
}

pub type Handler = Rc<dyn Fn(&Event)>;

struct Registration {
    id: u64,
    topic: Topic,
    handler: Handler,
}

#[derive(Default)]
struct BusInner {
    handlers: RefCell<Vec<Registration>>,
    next_id: Cell<u64>,
}

/// Cheaply cloneable handle to one bus.
#[derive(Clone, Default)]
pub struct Bus {
    inner: Rc<BusInner>,
}

impl std::fmt::Debug for Bus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bus")
            .field("handlers", &self.inner.handlers.borrow().len())
            .finish()
    }
}

impl Bus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `topic`.
    pub fn on(&self, topic: impl Into<Topic>, handler: impl Fn(&Event) + 'static) -> Subscription {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner.handlers.borrow_mut().push(Registration {
            id,
            topic: topic.into(),
            handler: Rc::new(handler),
        });
        Subscription {
            id,
            bus: Rc::downgrade(&self.inner),
        }
    }

    /// Dispatch `event` to every matching handler.
    ///
    /// Handlers registered or removed during dispatch take effect from the
    /// next emit.
    pub fn emit(&self, event: &Event) {
        let kind = event.kind();
        let matching: Vec<Handler> = self
            .inner
            .handlers
            .borrow()
            .iter()
            .filter(|r| r.topic.matches(kind))
            .map(|r| Rc::clone(&r.handler))
            .collect();
        trace!(?kind, handlers = matching.len(), "bus emit");
        for handler in matching {
            handler(event);
        }
    }

    pub fn handler_count(&self) -> usize {
        self.inner.handlers.borrow().len()
    }
}

/// Returned by [`Bus::on`]; `off` unsubscribes.
///
/// Dropping a subscription keeps the handler registered.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    bus: Weak<BusInner>,
}

impl Subscription {
    pub fn off(self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.handlers.borrow_mut().retain(|r| r.id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder(log: &Rc<RefCell<Vec<String>>>, tag: &str) -> impl Fn(&Event) + 'static {
        let log = Rc::clone(log);
        let tag = tag.to_string();
        move |event: &Event| log.borrow_mut().push(format!("{tag}:{:?}", event.kind()))
    }

    #[test]
    fn wildcard_and_exact_handlers_run_in_subscription_order() {
        let bus = Bus::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        bus.on(Topic::All, recorder(&log, "all"));
        bus.on(EventKind::SuiteReset, recorder(&log, "reset"));
        bus.on(EventKind::SuiteResumed, recorder(&log, "resumed"));

        bus.emit(&Event::SuiteReset);

        assert_eq!(
            *log.borrow(),
            vec!["all:SuiteReset".to_string(), "reset:SuiteReset".to_string()]
        );
    }

    #[test]
    fn off_removes_the_handler() {
        let bus = Bus::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let sub = bus.on(Topic::All, recorder(&log, "all"));
        sub.off();
        bus.emit(&Event::SuiteReset);
        assert!(log.borrow().is_empty());
        assert_eq!(bus.handler_count(), 0);
    }

    #[test]
    fn nested_emit_completes_depth_first() {
        let bus = Bus::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let inner_bus = bus.clone();
        let outer_log = Rc::clone(&log);
        bus.on(EventKind::SuiteCallbackFinished, move |_| {
            outer_log.borrow_mut().push("outer:start".to_string());
            inner_bus.emit(&Event::AllRunningTestsFinished);
            outer_log.borrow_mut().push("outer:end".to_string());
        });
        bus.on(EventKind::AllRunningTestsFinished, recorder(&log, "inner"));

        bus.emit(&Event::SuiteCallbackFinished { run: RunId(1) });

        assert_eq!(
            *log.borrow(),
            vec![
                "outer:start".to_string(),
                "inner:AllRunningTestsFinished".to_string(),
                "outer:end".to_string(),
            ]
        );
    }

    #[test]
    fn handler_may_subscribe_during_dispatch() {
        let bus = Bus::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let registering_bus = bus.clone();
        let late_log = Rc::clone(&log);
        bus.on(EventKind::SuiteReset, move |_| {
            registering_bus.on(Topic::All, recorder(&late_log, "late"));
        });

        bus.emit(&Event::SuiteReset);
        assert!(log.borrow().is_empty());

        bus.emit(&Event::SuiteResumed);
        assert_eq!(*log.borrow(), vec!["late:SuiteResumed".to_string()]);
    }
}
