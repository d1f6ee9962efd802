//! Serializable snapshot of a suite's settled results.
//!
//! A dump mirrors the isolate tree. It is produced on one side of a process
//! boundary and fed into [`crate::Suite::resume`] on the other, seeding the
//! fresh suite as if its fields had already been tested. Canceled tests are
//! left out; pending and untested ones come back as untested.

use crate::error::DumpError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::path::Path;
use verdict_kernel::{
    IsolatePayload, IsolateTree, NodeId, RunId, TestData, TestSeverity, TestStatus,
};

pub const SUITE_DUMP_SCHEMA: &str = "verdict.suite_dump.v1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiteDump {
    pub schema: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suite_name: Option<String>,
    #[serde(default)]
    pub optional_fields: Vec<String>,
    pub root: IsolateDump,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IsolateDump {
    Suite {
        #[serde(default)]
        children: Vec<IsolateDump>,
    },
    Group {
        name: String,
        #[serde(default)]
        children: Vec<IsolateDump>,
    },
    #[serde(rename_all = "camelCase")]
    Test {
        field: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        failure_message: Option<String>,
        status: TestStatus,
        #[serde(default)]
        severity: TestSeverity,
    },
}

impl SuiteDump {
    /// Snapshot `tree`. A suite that never ran dumps an empty root.
    pub fn from_tree(
        tree: Option<&IsolateTree>,
        suite_name: Option<&str>,
        optional_fields: &BTreeSet<String>,
    ) -> Self {
        let root = tree
            .and_then(|tree| tree.root().and_then(|root| dump_node(tree, root)))
            .unwrap_or(IsolateDump::Suite {
                children: Vec::new(),
            });
        Self {
            schema: SUITE_DUMP_SCHEMA.to_string(),
            suite_name: suite_name.map(str::to_string),
            optional_fields: optional_fields.iter().cloned().collect(),
            root,
        }
    }

    /// Rebuild a tree for `run`, bypassing the state machine.
    pub fn into_tree(&self, run: RunId) -> Result<IsolateTree, DumpError> {
        if self.schema != SUITE_DUMP_SCHEMA {
            return Err(DumpError::Schema {
                expected: SUITE_DUMP_SCHEMA,
                found: self.schema.clone(),
            });
        }
        let IsolateDump::Suite { children } = &self.root else {
            return Err(DumpError::RootNotSuite);
        };
        let mut tree = IsolateTree::new(run);
        let root = tree.open_root()?;
        let mut group_path = Vec::new();
        for child in children {
            restore_node(&mut tree, child, &mut group_path)?;
        }
        tree.close(root)?;
        Ok(tree)
    }

    pub fn optional_set(&self) -> BTreeSet<String> {
        self.optional_fields.iter().cloned().collect()
    }

    pub fn to_json(&self) -> Result<String, DumpError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self, DumpError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn read_from(path: &Path) -> Result<Self, DumpError> {
        let raw = std::fs::read_to_string(path).map_err(|source| DumpError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn write_to(&self, path: &Path) -> Result<(), DumpError> {
        let mut rendered = self.to_json()?;
        rendered.push('\n');
        std::fs::write(path, rendered).map_err(|source| DumpError::WriteFile {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Content reference over the compact JSON encoding.
    pub fn digest(&self) -> Result<String, DumpError> {
        let bytes = serde_json::to_vec(self)?;
        let output = Sha256::digest(&bytes);
        let mut rendered = String::with_capacity(7 + output.len() * 2);
        rendered.push_str("sha256:");
        for byte in output {
            rendered.push_str(format!("{byte:02x}").as_str());
        }
        Ok(rendered)
    }
}

fn dump_node(tree: &IsolateTree, id: NodeId) -> Option<IsolateDump> {
    let node = tree.get(id)?;
    let children = || -> Vec<IsolateDump> {
        node.children()
            .iter()
            .filter_map(|child| dump_node(tree, *child))
            .collect()
    };
    match node.payload() {
        IsolatePayload::Suite => Some(IsolateDump::Suite {
            children: children(),
        }),
        IsolatePayload::Group { name } => Some(IsolateDump::Group {
            name: name.clone(),
            children: children(),
        }),
        IsolatePayload::Test(test) if test.status() == TestStatus::Canceled => None,
        IsolatePayload::Test(test) => Some(IsolateDump::Test {
            field: test.field().to_string(),
            key: node.key().map(str::to_string),
            message: test.declared_message().map(str::to_string),
            failure_message: test.failure_message().map(str::to_string),
            status: test.status(),
            severity: test.severity(),
        }),
    }
}

fn restore_node(
    tree: &mut IsolateTree,
    dump: &IsolateDump,
    group_path: &mut Vec<String>,
) -> Result<(), DumpError> {
    match dump {
        IsolateDump::Suite { .. } => Err(DumpError::NestedSuite),
        IsolateDump::Group { name, children } => {
            let id = tree.open(None, IsolatePayload::Group { name: name.clone() })?;
            group_path.push(name.clone());
            let restored: Result<(), DumpError> = children
                .iter()
                .try_for_each(|child| restore_node(tree, child, group_path));
            group_path.pop();
            restored?;
            tree.close(id).map_err(DumpError::from)
        }
        IsolateDump::Test {
            field,
            key,
            message,
            failure_message,
            status,
            severity,
        } => {
            let data = TestData::seeded(
                field.as_str(),
                group_path.clone(),
                message.clone(),
                failure_message.clone(),
                *status,
                *severity,
            );
            let id = tree.open(key.clone(), IsolatePayload::Test(data))?;
            tree.close(id).map_err(DumpError::from)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use verdict_kernel::TestAction;

    fn settled_tree() -> IsolateTree {
        let mut tree = IsolateTree::new(RunId(4));
        let root = tree.open_root().expect("root opens");
        let group = tree
            .open(
                None,
                IsolatePayload::Group {
                    name: "account".to_string(),
                },
            )
            .expect("group opens");
        let email = tree
            .open(
                Some("email-format".to_string()),
                IsolatePayload::Test(TestData::new(
                    "email",
                    vec!["account".to_string()],
                    Some("malformed".to_string()),
                )),
            )
            .expect("test opens");
        tree.expect_test_mut(email).apply(TestAction::Fail);
        tree.close(email).expect("test closes");
        tree.close(group).expect("group closes");
        let token = tree
            .open(
                None,
                IsolatePayload::Test(TestData::new("token", Vec::new(), None)),
            )
            .expect("test opens");
        tree.expect_test_mut(token).apply(TestAction::Pend);
        tree.expect_test_mut(token).apply(TestAction::Cancel);
        tree.close(token).expect("test closes");
        tree.close(root).expect("root closes");
        tree
    }

    #[test]
    fn dump_format_is_stable() {
        let tree = settled_tree();
        let optional: BTreeSet<String> = ["nickname".to_string()].into_iter().collect();
        let dump = SuiteDump::from_tree(Some(&tree), Some("signup"), &optional);

        insta::assert_json_snapshot!(dump, @r###"
        {
          "schema": "verdict.suite_dump.v1",
          "suiteName": "signup",
          "optionalFields": [
            "nickname"
          ],
          "root": {
            "kind": "suite",
            "children": [
              {
                "kind": "group",
                "name": "account",
                "children": [
                  {
                    "kind": "test",
                    "field": "email",
                    "key": "email-format",
                    "message": "malformed",
                    "status": "failed",
                    "severity": "error"
                  }
                ]
              }
            ]
          }
        }
        "###);
    }

    #[test]
    fn restored_tree_keeps_group_paths_and_statuses() {
        let dump = SuiteDump::from_tree(Some(&settled_tree()), None, &BTreeSet::new());
        let restored = dump.into_tree(RunId(9)).expect("dump restores");

        let tests: Vec<_> = restored.tests().map(|(_, t)| t).collect();
        assert_eq!(tests.len(), 1);
        assert_eq!(tests[0].group_path(), ["account".to_string()]);
        assert_eq!(tests[0].status(), TestStatus::Failed);
        assert_eq!(restored.run(), RunId(9));
    }

    #[test]
    fn unknown_schema_is_rejected() {
        let mut dump = SuiteDump::from_tree(None, None, &BTreeSet::new());
        dump.schema = "verdict.suite_dump.v0".to_string();
        assert!(matches!(
            dump.into_tree(RunId(1)),
            Err(DumpError::Schema { .. })
        ));
    }

    #[test]
    fn digest_tracks_content() {
        let empty = SuiteDump::from_tree(None, None, &BTreeSet::new());
        let named = SuiteDump::from_tree(None, Some("signup"), &BTreeSet::new());
        let digest = empty.digest().expect("empty dump hashes");
        assert!(digest.starts_with("sha256:"));
        assert_eq!(digest.len(), "sha256:".len() + 64);
        assert_ne!(digest, named.digest().expect("named dump hashes"));
        assert_eq!(digest, empty.clone().digest().expect("clone hashes"));
    }
}
