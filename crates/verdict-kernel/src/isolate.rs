//! The per-run isolate tree and its context stack.
//!
//! A run builds one [`IsolateTree`]: a Suite root, Group subtrees and Test
//! leaves, stored in an arena in creation order. Forward edges are owned by
//! the tree (`children`); each node keeps a plain [`NodeId`] back to its
//! parent. The context stack records which node is "current" while the
//! suite callback declares children; it is part of the tree under
//! construction rather than global state, so independent suites never see
//! each other's context.

use crate::error::KernelError;
use crate::status::TestStatus;
use crate::test_data::TestData;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

/// Index of a node within one tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Monotonic identifier of one run of a suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunId(pub u64);

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "run#{}", self.0)
    }
}

/// A node address that stays meaningful across runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeAddr {
    pub run: RunId,
    pub node: NodeId,
}

/// Discriminator of [`IsolatePayload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolateKind {
    Suite,
    Group,
    Test,
}

/// Kind-specific node data.
#[derive(Debug)]
pub enum IsolatePayload {
    Suite,
    Group { name: String },
    Test(TestData),
}

impl IsolatePayload {
    pub fn kind(&self) -> IsolateKind {
        match self {
            Self::Suite => IsolateKind::Suite,
            Self::Group { .. } => IsolateKind::Group,
            Self::Test(_) => IsolateKind::Test,
        }
    }

    /// Name that must agree for two unkeyed nodes to be the same slot.
    pub fn identity(&self) -> Option<&str> {
        match self {
            Self::Suite => None,
            Self::Group { name } => Some(name),
            Self::Test(data) => Some(data.field()),
        }
    }
}

/// One node of the work-unit tree.
#[derive(Debug)]
pub struct Isolate {
    id: NodeId,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    ordinal: usize,
    key: Option<String>,
    payload: IsolatePayload,
}

impl Isolate {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Position among siblings at creation time.
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn kind(&self) -> IsolateKind {
        self.payload.kind()
    }

    pub fn payload(&self) -> &IsolatePayload {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut IsolatePayload {
        &mut self.payload
    }

    pub fn as_test(&self) -> Option<&TestData> {
        match &self.payload {
            IsolatePayload::Test(data) => Some(data),
            IsolatePayload::Suite | IsolatePayload::Group { .. } => None,
        }
    }

    pub fn as_test_mut(&mut self) -> Option<&mut TestData> {
        match &mut self.payload {
            IsolatePayload::Test(data) => Some(data),
            IsolatePayload::Suite | IsolatePayload::Group { .. } => None,
        }
    }
}

/// Arena-backed tree for one run.
#[derive(Debug)]
pub struct IsolateTree {
    run: RunId,
    nodes: Vec<Isolate>,
    stack: Vec<NodeId>,
}

impl IsolateTree {
    pub fn new(run: RunId) -> Self {
        Self {
            run,
            nodes: Vec::new(),
            stack: Vec::new(),
        }
    }

    pub fn run(&self) -> RunId {
        self.run
    }

    pub fn root(&self) -> Option<NodeId> {
        self.nodes.first().map(|node| node.id)
    }

    pub fn addr(&self, id: NodeId) -> NodeAddr {
        NodeAddr {
            run: self.run,
            node: id,
        }
    }

    /// Whether a node is currently open on the context stack.
    pub fn is_building(&self) -> bool {
        !self.stack.is_empty()
    }

    /// The node new children attach to.
    pub fn current(&self) -> Result<NodeId, KernelError> {
        self.stack
            .last()
            .copied()
            .ok_or(KernelError::NoActiveContext {
                operation: "current",
            })
    }

    /// Open the Suite root and make it current.
    pub fn open_root(&mut self) -> Result<NodeId, KernelError> {
        if let Some(root) = self.root() {
            return Err(KernelError::RootAlreadyOpen(root));
        }
        let id = NodeId(0);
        self.nodes.push(Isolate {
            id,
            parent: None,
            children: Vec::new(),
            ordinal: 0,
            key: None,
            payload: IsolatePayload::Suite,
        });
        self.stack.push(id);
        trace!(run = self.run.0, "suite root opened");
        Ok(id)
    }

    /// Open a child of the current node and make it current.
    pub fn open(
        &mut self,
        key: Option<String>,
        payload: IsolatePayload,
    ) -> Result<NodeId, KernelError> {
        let parent = self
            .stack
            .last()
            .copied()
            .ok_or(KernelError::NoActiveContext { operation: "open" })?;
        let id = NodeId(self.nodes.len());
        let ordinal = self.nodes[parent.0].children.len();
        let kind = payload.kind();
        if let Some(key) = key.as_deref() {
            if let Some(first) = self.keyed_child(parent, key) {
                warn!(key, run = %self.run, %first, "duplicate sibling key declared");
            }
        }
        self.nodes.push(Isolate {
            id,
            parent: Some(parent),
            children: Vec::new(),
            ordinal,
            key,
            payload,
        });
        self.nodes[parent.0].children.push(id);
        self.stack.push(id);
        trace!(run = self.run.0, node = id.0, parent = parent.0, kind = ?kind, "isolate opened");
        Ok(id)
    }

    /// First child of `parent` carrying `key`.
    pub fn keyed_child(&self, parent: NodeId, key: &str) -> Option<NodeId> {
        self.get(parent)?
            .children()
            .iter()
            .copied()
            .find(|child| self.get(*child).and_then(Isolate::key) == Some(key))
    }

    /// Pop `expected` off the context stack.
    pub fn close(&mut self, expected: NodeId) -> Result<(), KernelError> {
        let found = self
            .stack
            .last()
            .copied()
            .ok_or(KernelError::NoActiveContext { operation: "close" })?;
        if found != expected {
            return Err(KernelError::ContextMismatch { expected, found });
        }
        self.stack.pop();
        Ok(())
    }

    /// Pop the context stack down to `target`, leaving it current.
    pub fn unwind_to(&mut self, target: NodeId) {
        while let Some(top) = self.stack.last().copied() {
            if top == target {
                break;
            }
            self.stack.pop();
        }
    }

    /// Open a node, run `f` with it current, close it.
    ///
    /// The callback's output is handed back alongside the node id.
    pub fn create_isolate<R>(
        &mut self,
        key: Option<String>,
        payload: IsolatePayload,
        f: impl FnOnce(&mut Self, NodeId) -> R,
    ) -> Result<(NodeId, R), KernelError> {
        let id = self.open(key, payload)?;
        let output = f(self, id);
        self.close(id)?;
        Ok((id, output))
    }

    pub fn get(&self, id: NodeId) -> Option<&Isolate> {
        self.nodes.get(id.0)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Isolate> {
        self.nodes.get_mut(id.0)
    }

    /// Node lookup for ids handed out by this tree.
    ///
    /// # Panics
    /// On an id from another tree: the caller has broken tree ownership.
    pub fn node(&self, id: NodeId) -> &Isolate {
        match self.nodes.get(id.0) {
            Some(node) => node,
            None => panic!("{id} does not belong to {}", self.run),
        }
    }

    pub fn test(&self, id: NodeId) -> Option<&TestData> {
        self.get(id).and_then(Isolate::as_test)
    }

    pub fn test_mut(&mut self, id: NodeId) -> Option<&mut TestData> {
        self.get_mut(id).and_then(Isolate::as_test_mut)
    }

    /// Test data of a node known to be a test.
    ///
    /// # Panics
    /// If `id` is not a test node of this tree.
    pub fn expect_test_mut(&mut self, id: NodeId) -> &mut TestData {
        let run = self.run;
        match self.test_mut(id) {
            Some(data) => data,
            None => panic!("{id} in {run} is not a test isolate"),
        }
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map_or(&[], |node| node.children.as_slice())
    }

    /// Reachable nodes in declaration (pre-)order.
    pub fn preorder(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<NodeId> = self.root().into_iter().collect();
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        order
    }

    /// Reachable test nodes in declaration order.
    pub fn tests(&self) -> impl Iterator<Item = (NodeId, &TestData)> + '_ {
        self.preorder()
            .into_iter()
            .filter_map(|id| self.test(id).map(|data| (id, data)))
    }

    /// Ids of reachable tests, optionally restricted to one field.
    pub fn test_ids(&self, field: Option<&str>) -> Vec<NodeId> {
        self.tests()
            .filter(|(_, data)| field.is_none_or(|f| data.field() == f))
            .map(|(id, _)| id)
            .collect()
    }

    /// Whether any reachable test (of `field`, if given) is still pending.
    pub fn has_pending(&self, field: Option<&str>) -> bool {
        self.tests().any(|(_, data)| {
            data.status() == TestStatus::Pending && field.is_none_or(|f| data.field() == f)
        })
    }

    /// Unlink a node from its parent. The arena slot stays but is unreachable.
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.get(id).and_then(Isolate::parent) else {
            return;
        };
        if let Some(parent_node) = self.nodes.get_mut(parent.0) {
            parent_node.children.retain(|child| *child != id);
        }
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.parent = None;
        }
    }
}
