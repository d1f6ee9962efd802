use crate::support::{
    digest_or_exit, load_config_or_exit, load_dump_or_exit, print_field_line, print_json_or_exit,
    resume_or_exit, yes_no,
};
use serde_json::json;
use std::collections::BTreeMap;
use verdict_suite::FieldSummary;

pub fn run(
    dump_path: String,
    config: Option<String>,
    field: Option<String>,
    group: Option<String>,
    json_output: bool,
) {
    let dump = load_dump_or_exit(&dump_path);
    let config = load_config_or_exit(config.as_deref());
    let suite = resume_or_exit(&dump, config);
    let summary = suite.summary();
    let digest = digest_or_exit(&dump);

    let fields: BTreeMap<&str, &FieldSummary> = match (&field, &group) {
        (Some(field), _) => summary
            .field(field)
            .map(|s| (field.as_str(), s))
            .into_iter()
            .collect(),
        (None, Some(group)) => summary
            .group(group)
            .map(|fields| fields.iter().map(|(k, v)| (k.as_str(), v)).collect())
            .unwrap_or_default(),
        (None, None) => summary.tests.iter().map(|(k, v)| (k.as_str(), v)).collect(),
    };
    let valid = match (&field, &group) {
        (Some(field), _) => summary.is_valid(Some(field.as_str())),
        (None, Some(group)) => summary.is_valid_by_group(group, None),
        (None, None) => summary.is_valid(None),
    };

    if json_output {
        let payload = json!({
            "dump_path": dump_path,
            "digest": digest,
            "suite_name": summary.suite_name,
            "field": field,
            "group": group,
            "valid": valid,
            "error_count": summary.error_count,
            "warn_count": summary.warn_count,
            "test_count": summary.test_count,
            "pending_count": summary.pending_count,
            "fields": fields,
        });
        print_json_or_exit(&payload);
    } else {
        println!("verdict summary {dump_path}");
        if let Some(name) = summary.suite_name.as_deref() {
            println!("  Suite: {name}");
        }
        println!("  Digest: {digest}");
        if let Some(group) = group.as_deref() {
            println!("  Group: {group}");
        }
        println!("  Valid: {}", yes_no(valid));
        println!(
            "  Tests: {} (errors {}, warnings {}, pending {})",
            summary.test_count, summary.error_count, summary.warn_count, summary.pending_count
        );
        if fields.is_empty() {
            println!("  Fields: none");
        } else {
            println!("  Fields:");
            for (name, field_summary) in &fields {
                print_field_line(name, field_summary);
            }
        }
    }
}
