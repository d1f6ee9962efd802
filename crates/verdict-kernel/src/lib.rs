//! # Verdict Kernel
//!
//! The execution core of a declarative validation runtime. A validation
//! routine is re-run from scratch on every invocation, yet checks that are
//! still resolving asynchronously must keep their results. The kernel owns
//! the pieces that make that work:
//!
//! ## Architecture
//!
//! ```text
//! Bus                 ← synchronous pub/sub, wildcard topics
//!     │
//! TestStatus          ← per-test finite state machine
//!     │
//! IsolateTree         ← suite → group → test arena + context stack
//!     │
//! AsyncOperation      ← abort signal + task handle + rebindable node address
//!     │
//! Reconciler          ← matches a run's nodes against the previous run
//! ```
//!
//! Aggregation and the declaration surface live in `verdict-suite`.

pub mod bus;
pub mod error;
pub mod isolate;
pub mod operation;
pub mod reconcile;
pub mod status;
pub mod test_data;

pub use bus::{Bus, Event, EventKind, Handler, Subscription, Topic};
pub use error::KernelError;
pub use isolate::{Isolate, IsolateKind, IsolatePayload, IsolateTree, NodeAddr, NodeId, RunId};
pub use operation::{AbortSignal, AsyncOperation, NodeBinding};
pub use reconcile::Reconciler;
pub use status::{TestAction, TestStatus, Transition, transition};
pub use test_data::{TestData, TestSeverity};
