//! State that survives from one run of a suite to the next.

use crate::summary::Summary;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;
use verdict_kernel::{IsolateTree, RunId};

pub type DoneCallback = Box<dyn FnOnce(&Summary)>;

#[derive(Default)]
pub(crate) struct PersistedState {
    /// Tree of the last completed run.
    pub current: Option<IsolateTree>,
    pub last_run: u64,
    pub done_callbacks: Vec<DoneCallback>,
    pub field_callbacks: BTreeMap<String, Vec<DoneCallback>>,
    /// Fields declared optional by the last run.
    pub optional_fields: BTreeSet<String>,
    pub summary: Option<Rc<Summary>>,
    /// Tree rebuilt from a dump, swapped in by the resume handler.
    pub staged_resume: Option<(IsolateTree, BTreeSet<String>)>,
}

impl PersistedState {
    pub fn next_run(&mut self) -> RunId {
        self.last_run += 1;
        RunId(self.last_run)
    }

    pub fn has_pending(&self, field: Option<&str>) -> bool {
        self.current
            .as_ref()
            .is_some_and(|tree| tree.has_pending(field))
    }

    /// Callbacks of fields that no longer have pending tests.
    pub fn take_settled_field_callbacks(&mut self) -> Vec<DoneCallback> {
        let settled: Vec<String> = self
            .field_callbacks
            .keys()
            .filter(|field| !self.has_pending(Some(field)))
            .cloned()
            .collect();
        settled
            .into_iter()
            .filter_map(|field| self.field_callbacks.remove(&field))
            .flatten()
            .collect()
    }

    pub fn clear_callbacks(&mut self) {
        self.done_callbacks.clear();
        self.field_callbacks.clear();
    }
}

impl std::fmt::Debug for PersistedState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistedState")
            .field("current", &self.current.as_ref().map(IsolateTree::run))
            .field("last_run", &self.last_run)
            .field("done_callbacks", &self.done_callbacks.len())
            .field("field_callbacks", &self.field_callbacks.len())
            .field("optional_fields", &self.optional_fields)
            .field("summary_cached", &self.summary.is_some())
            .field("resume_staged", &self.staged_resume.is_some())
            .finish()
    }
}
