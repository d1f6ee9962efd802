//! Error types for kernel operations.

use crate::isolate::NodeId;

/// Errors raised while building an isolate tree.
///
/// These are declaration errors: they surface synchronously to whoever is
/// declaring nodes. Broken tree invariants inside the runtime panic instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KernelError {
    /// A node was opened while no suite context is active.
    #[error("no active context: {operation} requires an open suite")]
    NoActiveContext { operation: &'static str },

    /// A second suite root was opened on the same tree.
    #[error("suite root already open at {0}")]
    RootAlreadyOpen(NodeId),

    /// The context stack was popped out of order.
    #[error("context mismatch: expected {expected} on top of the stack, found {found}")]
    ContextMismatch { expected: NodeId, found: NodeId },
}
