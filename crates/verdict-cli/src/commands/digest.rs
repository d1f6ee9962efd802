use crate::support::{digest_or_exit, load_dump_or_exit, print_json_or_exit};
use serde_json::json;

pub fn run(dump_path: String, json_output: bool) {
    let dump = load_dump_or_exit(&dump_path);
    let digest = digest_or_exit(&dump);

    if json_output {
        let payload = json!({
            "dump_path": dump_path,
            "schema": dump.schema,
            "digest": digest,
        });
        print_json_or_exit(&payload);
    } else {
        println!("{digest}");
    }
}
