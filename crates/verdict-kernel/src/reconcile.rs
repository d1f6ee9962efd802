//! Cross-run node matching.
//!
//! The suite callback rebuilds its tree from scratch on every run. The
//! [`Reconciler`] owns the previous run's tree while the new one is built and
//! answers, node by node, which previous node (if any) occupies the same
//! slot. Matching is hierarchical: a node can only match a child of its
//! parent's counterpart.
//!
//! Slot rules, per sibling list:
//! - keyed node: the first previous sibling with the same key and kind;
//!   if that sibling is already taken the node stays unmatched;
//! - unkeyed node: the previous sibling at the same ordinal, provided it is
//!   unkeyed and agrees on kind and identity.
//!
//! What happens to a matched test (transplant, copy, cancel) is decided by
//! the caller; `finish` cancels every pending test nobody claimed.

use crate::isolate::{IsolateTree, NodeAddr, NodeId};
use crate::status::{TestAction, TestStatus};
use crate::test_data::TestData;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

pub struct Reconciler {
    previous: Option<IsolateTree>,
    mapping: HashMap<NodeId, NodeId>,
    consumed: HashSet<NodeId>,
}

impl Reconciler {
    pub fn new(previous: Option<IsolateTree>) -> Self {
        Self {
            previous,
            mapping: HashMap::new(),
            consumed: HashSet::new(),
        }
    }

    pub fn previous(&self) -> Option<&IsolateTree> {
        self.previous.as_ref()
    }

    /// Pair the new root with the previous root.
    pub fn map_root(&mut self, new_root: NodeId) {
        if let Some(prev_root) = self.previous.as_ref().and_then(IsolateTree::root) {
            self.mapping.insert(new_root, prev_root);
            self.consumed.insert(prev_root);
        }
    }

    /// Find and claim the previous node occupying `node`'s slot.
    ///
    /// `node` must already be attached to `tree` so its key, ordinal and
    /// identity are known.
    pub fn counterpart(&mut self, tree: &IsolateTree, node: NodeId) -> Option<NodeId> {
        let previous = self.previous.as_ref()?;
        let isolate = tree.get(node)?;
        let prev_parent = *self.mapping.get(&isolate.parent()?)?;
        let siblings = previous.children(prev_parent);
        let kind = isolate.kind();

        let found = match isolate.key() {
            Some(key) => {
                let first = siblings.iter().copied().find(|id| {
                    let candidate = previous.node(*id);
                    candidate.key() == Some(key) && candidate.kind() == kind
                })?;
                if self.consumed.contains(&first) {
                    warn!(key, run = %tree.run(), "duplicate sibling key, node left unmatched");
                    return None;
                }
                first
            }
            None => {
                let identity = isolate.payload().identity();
                siblings.iter().copied().find(|id| {
                    let candidate = previous.node(*id);
                    candidate.ordinal() == isolate.ordinal()
                        && candidate.key().is_none()
                        && candidate.kind() == kind
                        && candidate.payload().identity() == identity
                        && !self.consumed.contains(id)
                })?
            }
        };

        self.consumed.insert(found);
        self.mapping.insert(node, found);
        Some(found)
    }

    pub fn previous_status(&self, prev: NodeId) -> Option<TestStatus> {
        self.previous.as_ref()?.test(prev).map(TestData::status)
    }

    /// Move the previous test's state and live operation onto `target`.
    ///
    /// The operation is rebound so its completion settles into `addr`. The
    /// previous node is abandoned as-is.
    pub fn transplant(&mut self, prev: NodeId, target: &mut TestData, addr: NodeAddr) {
        let Some(previous) = self.previous.as_mut().and_then(|tree| tree.test_mut(prev)) else {
            return;
        };
        target.adopt(previous);
        if let Some(op) = target.operation() {
            op.rebind(addr);
            debug!(field = target.field(), addr = ?addr, "pending test transplanted");
        }
    }

    /// Cancel a previous test. Returns its field if the status changed.
    pub fn cancel(&mut self, prev: NodeId) -> Option<String> {
        let test = self.previous.as_mut()?.test_mut(prev)?;
        let step = test.apply(TestAction::Cancel);
        step.changed().then(|| {
            debug!(field = test.field(), from = %step.from, "previous test canceled");
            test.field().to_string()
        })
    }

    /// Cancel every previous pending test left unclaimed and drop the
    /// previous tree. Returns the canceled fields in declaration order.
    pub fn finish(mut self) -> Vec<String> {
        let Some(previous) = self.previous.as_ref() else {
            return Vec::new();
        };
        let orphans: Vec<NodeId> = previous
            .tests()
            .filter(|(id, data)| {
                data.status() == TestStatus::Pending && !self.consumed.contains(id)
            })
            .map(|(id, _)| id)
            .collect();
        orphans
            .into_iter()
            .filter_map(|id| self.cancel(id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isolate::{IsolatePayload, RunId};
    use crate::operation::{AbortSignal, AsyncOperation};

    fn test_payload(field: &str) -> IsolatePayload {
        IsolatePayload::Test(TestData::new(field, Vec::new(), None))
    }

    /// Build a flat tree of `(key, field)` tests under the root.
    fn flat_tree(run: u64, tests: &[(Option<&str>, &str)]) -> (IsolateTree, Vec<NodeId>) {
        let mut tree = IsolateTree::new(RunId(run));
        let root = tree.open_root().expect("root opens");
        let ids = tests
            .iter()
            .map(|(key, field)| {
                let id = tree
                    .open(key.map(str::to_string), test_payload(field))
                    .expect("test opens");
                tree.close(id).expect("test closes");
                id
            })
            .collect();
        tree.close(root).expect("root closes");
        (tree, ids)
    }

    fn pend(tree: &mut IsolateTree, id: NodeId, signal: &AbortSignal) {
        let addr = tree.addr(id);
        let test = tree.expect_test_mut(id);
        test.apply(TestAction::Pend);
        test.attach_operation(AsyncOperation::new(signal.clone(), addr));
    }

    /// Match each test of `next` against `previous`.
    fn match_all(previous: IsolateTree, next: &IsolateTree) -> (Reconciler, Vec<Option<NodeId>>) {
        let mut reconciler = Reconciler::new(Some(previous));
        let root = next.root().expect("next has a root");
        reconciler.map_root(root);
        let matches = next
            .children(root)
            .iter()
            .map(|id| reconciler.counterpart(next, *id))
            .collect();
        (reconciler, matches)
    }

    #[test]
    fn unkeyed_nodes_match_by_position_and_field() {
        let (previous, prev_ids) = flat_tree(1, &[(None, "a"), (None, "b")]);
        let (next, _) = flat_tree(2, &[(None, "a"), (None, "c")]);
        let (_, matches) = match_all(previous, &next);
        assert_eq!(matches, vec![Some(prev_ids[0]), None]);
    }

    #[test]
    fn keyed_nodes_match_across_reordering() {
        let (previous, prev_ids) = flat_tree(1, &[(Some("k1"), "a"), (Some("k2"), "b")]);
        let (next, _) = flat_tree(2, &[(Some("k2"), "b"), (Some("k1"), "a")]);
        let (_, matches) = match_all(previous, &next);
        assert_eq!(matches, vec![Some(prev_ids[1]), Some(prev_ids[0])]);
    }

    #[test]
    fn duplicate_key_leaves_later_node_unmatched() {
        let (previous, prev_ids) = flat_tree(1, &[(Some("k"), "a"), (Some("k"), "a")]);
        let (next, _) = flat_tree(2, &[(Some("k"), "a"), (Some("k"), "a")]);
        let (_, matches) = match_all(previous, &next);
        assert_eq!(matches, vec![Some(prev_ids[0]), None]);
    }

    #[test]
    fn transplant_rebinds_operation_to_new_node() {
        let (mut previous, prev_ids) = flat_tree(1, &[(None, "f")]);
        let signal = AbortSignal::new();
        pend(&mut previous, prev_ids[0], &signal);
        let binding = previous
            .test(prev_ids[0])
            .and_then(TestData::operation)
            .map(AsyncOperation::binding)
            .expect("operation attached");

        let (mut next, next_ids) = flat_tree(2, &[(None, "f")]);
        let (mut reconciler, matches) = match_all(previous, &next);
        let prev = matches[0].expect("matched");
        let addr = next.addr(next_ids[0]);
        reconciler.transplant(prev, next.expect_test_mut(next_ids[0]), addr);

        assert_eq!(binding.get(), Some(addr));
        assert_eq!(
            next.test(next_ids[0]).map(TestData::status),
            Some(TestStatus::Pending)
        );
        assert!(reconciler.finish().is_empty());
        assert!(!signal.is_aborted());
    }

    #[test]
    fn finish_cancels_unclaimed_pending_tests() {
        let (mut previous, prev_ids) = flat_tree(1, &[(None, "f"), (None, "g")]);
        let signal = AbortSignal::new();
        pend(&mut previous, prev_ids[1], &signal);

        let (next, _) = flat_tree(2, &[(None, "f")]);
        let (reconciler, _) = match_all(previous, &next);

        assert_eq!(reconciler.finish(), vec!["g".to_string()]);
        assert!(signal.is_aborted());
    }
}
