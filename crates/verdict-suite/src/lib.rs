//! # Verdict Suite
//!
//! The runtime around the kernel: a [`Suite`] owns a callback that declares
//! checks through a [`Scope`], and the state that carries results from one
//! run to the next.
//!
//! ```text
//! Suite::run(data)
//!   └─ SuiteRuntime::run        new IsolateTree + Reconciler(previous tree)
//!        └─ callback(Scope)     test / group / skip_when / omit_when ...
//!             └─ check          Pass | Fail | Pending(future) → spawn_local
//!   └─ SuiteCallbackFinished    bus → done callbacks once nothing is pending
//!
//! Suite::summary()              memoized Rc<Summary>, dropped on any event
//! Suite::dump() / resume()      settled results across a process boundary
//! ```
//!
//! Everything is single-threaded: the runtime uses `Rc`/`RefCell`, and async
//! checks must run inside a `tokio::task::LocalSet`.

pub mod check;
pub mod config;
pub mod dump;
pub mod error;
mod handlers;
mod runtime;
pub mod scope;
mod state;
pub mod suite;
pub mod summary;

pub use check::{Check, CheckContext, CheckFailure, CheckFuture};
pub use config::{ExecutionMode, SuiteConfig};
pub use dump::{IsolateDump, SUITE_DUMP_SCHEMA, SuiteDump};
pub use error::{ConfigError, DumpError, SuiteError};
pub use scope::Scope;
pub use state::DoneCallback;
pub use suite::{RunResult, Suite};
pub use summary::{FieldSummary, Summary};
pub use verdict_kernel::{AbortSignal, Event, EventKind, Subscription, TestStatus, Topic};
