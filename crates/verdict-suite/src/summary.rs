//! Result aggregation.
//!
//! A [`Summary`] is derived from the current tree's test leaves and nothing
//! else. The runtime memoizes one `Rc<Summary>` and drops it on every bus
//! event, so an unchanged suite keeps handing out the same instance.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use verdict_kernel::{IsolateTree, TestData, TestStatus};

/// Aggregate for one field, suite-wide or within one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSummary {
    pub valid: bool,
    pub error_count: usize,
    pub warn_count: usize,
    pub test_count: usize,
    pub pending_count: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl FieldSummary {
    fn empty() -> Self {
        Self {
            valid: true,
            error_count: 0,
            warn_count: 0,
            test_count: 0,
            pending_count: 0,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn record(&mut self, test: &TestData, optional: bool) {
        let status = test.status();
        if !status.is_non_actionable() {
            self.test_count += 1;
        }
        match status {
            TestStatus::Failed => {
                self.error_count += 1;
                self.errors.extend(test.message().map(str::to_string));
            }
            TestStatus::Warning => {
                self.warn_count += 1;
                self.warnings.extend(test.message().map(str::to_string));
            }
            TestStatus::Pending => self.pending_count += 1,
            TestStatus::Untested
            | TestStatus::Passing
            | TestStatus::Skipped
            | TestStatus::Omitted
            | TestStatus::Canceled => {}
        }
        self.valid &= satisfies(status, optional);
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    /// Warnings present and nothing failed.
    pub fn has_warnings(&self) -> bool {
        self.warn_count > 0 && self.error_count == 0
    }
}

/// Whether one test lets its field stay valid.
///
/// Optional fields excuse tests that never finished, not failures.
fn satisfies(status: TestStatus, optional: bool) -> bool {
    match status {
        TestStatus::Passing
        | TestStatus::Warning
        | TestStatus::Skipped
        | TestStatus::Omitted
        | TestStatus::Canceled => true,
        TestStatus::Untested | TestStatus::Pending => optional,
        TestStatus::Failed => false,
    }
}

/// Queryable result of a suite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suite_name: Option<String>,
    pub valid: bool,
    pub error_count: usize,
    pub warn_count: usize,
    pub test_count: usize,
    pub pending_count: usize,
    pub tests: BTreeMap<String, FieldSummary>,
    pub groups: BTreeMap<String, BTreeMap<String, FieldSummary>>,
}

impl Summary {
    /// Aggregate every non-canceled test of `tree` in declaration order.
    pub fn from_tree(
        tree: Option<&IsolateTree>,
        optional: &BTreeSet<String>,
        suite_name: Option<&str>,
    ) -> Self {
        let mut summary = Self {
            suite_name: suite_name.map(str::to_string),
            valid: false,
            error_count: 0,
            warn_count: 0,
            test_count: 0,
            pending_count: 0,
            tests: BTreeMap::new(),
            groups: BTreeMap::new(),
        };
        let Some(tree) = tree else {
            return summary;
        };

        for (_, test) in tree.tests() {
            if test.status() == TestStatus::Canceled {
                continue;
            }
            let is_optional = optional.contains(test.field());
            summary
                .tests
                .entry(test.field().to_string())
                .or_insert_with(FieldSummary::empty)
                .record(test, is_optional);
            for group in test.group_path() {
                summary
                    .groups
                    .entry(group.clone())
                    .or_default()
                    .entry(test.field().to_string())
                    .or_insert_with(FieldSummary::empty)
                    .record(test, is_optional);
            }
        }

        for field in summary.tests.values() {
            summary.error_count += field.error_count;
            summary.warn_count += field.warn_count;
            summary.test_count += field.test_count;
            summary.pending_count += field.pending_count;
        }
        summary.valid =
            !summary.tests.is_empty() && summary.tests.values().all(|field| field.valid);
        summary
    }

    pub fn field(&self, field: &str) -> Option<&FieldSummary> {
        self.tests.get(field)
    }

    pub fn group(&self, group: &str) -> Option<&BTreeMap<String, FieldSummary>> {
        self.groups.get(group)
    }

    pub fn has_errors(&self, field: Option<&str>) -> bool {
        match field {
            Some(field) => self.field(field).is_some_and(FieldSummary::has_errors),
            None => self.error_count > 0,
        }
    }

    /// Some field (or `field`) has a warning and no failure.
    pub fn has_warnings(&self, field: Option<&str>) -> bool {
        match field {
            Some(field) => self.field(field).is_some_and(FieldSummary::has_warnings),
            None => self.tests.values().any(FieldSummary::has_warnings),
        }
    }

    /// Error messages per field, fields without errors left out.
    pub fn errors(&self) -> BTreeMap<&str, &[String]> {
        collect_messages(&self.tests, |f| &f.errors)
    }

    pub fn field_errors(&self, field: &str) -> &[String] {
        self.field(field).map_or(&[], |f| f.errors.as_slice())
    }

    pub fn first_error(&self, field: Option<&str>) -> Option<&str> {
        first_message(&self.tests, field, |f| &f.errors)
    }

    pub fn warnings(&self) -> BTreeMap<&str, &[String]> {
        collect_messages(&self.tests, |f| &f.warnings)
    }

    pub fn field_warnings(&self, field: &str) -> &[String] {
        self.field(field).map_or(&[], |f| f.warnings.as_slice())
    }

    pub fn first_warning(&self, field: Option<&str>) -> Option<&str> {
        first_message(&self.tests, field, |f| &f.warnings)
    }

    pub fn is_valid(&self, field: Option<&str>) -> bool {
        match field {
            Some(field) => self.field(field).is_some_and(|f| f.valid),
            None => self.valid,
        }
    }

    pub fn has_errors_by_group(&self, group: &str, field: Option<&str>) -> bool {
        self.group(group).is_some_and(|fields| match field {
            Some(field) => fields.get(field).is_some_and(FieldSummary::has_errors),
            None => fields.values().any(FieldSummary::has_errors),
        })
    }

    pub fn has_warnings_by_group(&self, group: &str, field: Option<&str>) -> bool {
        self.group(group).is_some_and(|fields| match field {
            Some(field) => fields.get(field).is_some_and(FieldSummary::has_warnings),
            None => fields.values().any(FieldSummary::has_warnings),
        })
    }

    pub fn errors_by_group(&self, group: &str) -> BTreeMap<&str, &[String]> {
        self.group(group)
            .map(|fields| collect_messages(fields, |f| &f.errors))
            .unwrap_or_default()
    }

    pub fn warnings_by_group(&self, group: &str) -> BTreeMap<&str, &[String]> {
        self.group(group)
            .map(|fields| collect_messages(fields, |f| &f.warnings))
            .unwrap_or_default()
    }

    /// Error messages of `field` from tests declared inside `group`.
    pub fn field_errors_by_group(&self, group: &str, field: &str) -> &[String] {
        self.group(group)
            .and_then(|fields| fields.get(field))
            .map_or(&[], |f| f.errors.as_slice())
    }

    pub fn field_warnings_by_group(&self, group: &str, field: &str) -> &[String] {
        self.group(group)
            .and_then(|fields| fields.get(field))
            .map_or(&[], |f| f.warnings.as_slice())
    }

    pub fn is_valid_by_group(&self, group: &str, field: Option<&str>) -> bool {
        self.group(group).is_some_and(|fields| match field {
            Some(field) => fields.get(field).is_some_and(|f| f.valid),
            None => !fields.is_empty() && fields.values().all(|f| f.valid),
        })
    }
}

fn collect_messages<'a>(
    fields: &'a BTreeMap<String, FieldSummary>,
    pick: impl Fn(&'a FieldSummary) -> &'a Vec<String>,
) -> BTreeMap<&'a str, &'a [String]> {
    fields
        .iter()
        .map(|(name, summary)| (name.as_str(), pick(summary).as_slice()))
        .filter(|(_, messages)| !messages.is_empty())
        .collect()
}

fn first_message<'a>(
    fields: &'a BTreeMap<String, FieldSummary>,
    field: Option<&str>,
    pick: impl Fn(&'a FieldSummary) -> &'a Vec<String>,
) -> Option<&'a str> {
    let first = match field {
        Some(field) => fields.get(field).and_then(|f| pick(f).first()),
        None => fields.values().find_map(|f| pick(f).first()),
    };
    first.map(String::as_str)
}
