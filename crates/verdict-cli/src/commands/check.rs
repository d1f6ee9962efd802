use crate::support::{
    load_config_or_exit, load_dump_or_exit, print_json_or_exit, resume_or_exit, yes_no,
};
use serde_json::json;

pub fn run(dump_path: String, config: Option<String>, field: Option<String>, json_output: bool) {
    let dump = load_dump_or_exit(&dump_path);
    let config = load_config_or_exit(config.as_deref());
    let suite = resume_or_exit(&dump, config);
    let summary = suite.summary();

    let field = field.as_deref();
    let valid = summary.is_valid(field);
    let errors: Vec<(String, String)> = match field {
        Some(field) => summary
            .field_errors(field)
            .iter()
            .map(|message| (field.to_string(), message.clone()))
            .collect(),
        None => summary
            .errors()
            .into_iter()
            .flat_map(|(field, messages)| {
                messages
                    .iter()
                    .map(move |message| (field.to_string(), message.clone()))
            })
            .collect(),
    };

    if json_output {
        let payload = json!({
            "dump_path": dump_path,
            "suite_name": summary.suite_name,
            "field": field,
            "valid": valid,
            "pending": suite.is_pending(field),
            "errors": errors
                .iter()
                .map(|(field, message)| json!({ "field": field, "message": message }))
                .collect::<Vec<_>>(),
        });
        print_json_or_exit(&payload);
    } else {
        match field {
            Some(field) => println!("verdict check {dump_path} --field {field}"),
            None => println!("verdict check {dump_path}"),
        }
        println!("  Valid: {}", yes_no(valid));
        for (field, message) in &errors {
            println!("  - {field}: {message}");
        }
    }

    if !valid {
        std::process::exit(1);
    }
}
