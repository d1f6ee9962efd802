use serde_json::{Value, json};
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

struct TempDirGuard {
    path: PathBuf,
}

impl TempDirGuard {
    fn new(prefix: &str) -> Self {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        let path = std::env::temp_dir().join(format!(
            "verdict-cli-{prefix}-{}-{unique}",
            std::process::id()
        ));
        fs::create_dir_all(&path).expect("temp dir should be created");
        Self { path }
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempDirGuard {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

fn run_verdict<I, S>(args: I) -> Output
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let bin = env!("CARGO_BIN_EXE_verdict");
    Command::new(bin)
        .args(args)
        .output()
        .expect("verdict command should execute")
}

fn assert_success(output: &Output) {
    if !output.status.success() {
        panic!(
            "command failed with status {:?}\nstdout:\n{}\nstderr:\n{}",
            output.status.code(),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
        );
    }
}

fn assert_failure(output: &Output) {
    if output.status.success() {
        panic!(
            "command unexpectedly succeeded\nstdout:\n{}\nstderr:\n{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
        );
    }
}

fn stdout_text(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn parse_json_stdout(output: &Output) -> Value {
    serde_json::from_slice::<Value>(&output.stdout).unwrap_or_else(|e| {
        panic!(
            "expected valid JSON stdout, got error: {e}\nstdout:\n{}",
            String::from_utf8_lossy(&output.stdout)
        )
    })
}

fn test_entry(field: &str, status: &str, message: &str) -> Value {
    json!({
        "kind": "test",
        "field": field,
        "message": message,
        "status": status,
        "severity": if status == "warning" { "warning" } else { "error" },
    })
}

fn write_dump(path: &Path, email_status: &str) {
    let dump = json!({
        "schema": "verdict.suite_dump.v1",
        "suiteName": "signup",
        "root": {
            "kind": "suite",
            "children": [
                test_entry("username", "passing", "username is required"),
                {
                    "kind": "group",
                    "name": "account",
                    "children": [
                        test_entry("email", email_status, "email is taken"),
                        test_entry("password", "warning", "password is weak"),
                    ],
                },
                test_entry("nickname", "untested", "nickname is too long"),
            ],
        },
    });
    fs::write(
        path,
        serde_json::to_string_pretty(&dump).expect("dump should serialize"),
    )
    .expect("dump should be written");
}

fn write_config(path: &Path) {
    fs::write(path, "name = \"signup-form\"\noptional = [\"nickname\"]\n")
        .expect("config should be written");
}

#[test]
fn summary_json_reports_fields_and_digest() {
    let tmp = TempDirGuard::new("summary-json");
    let dump = tmp.path().join("dump.json");
    write_dump(&dump, "failed");

    let output = run_verdict([
        OsStr::new("summary"),
        dump.as_os_str(),
        OsStr::new("--json"),
    ]);
    assert_success(&output);
    let payload = parse_json_stdout(&output);

    assert_eq!(payload["suite_name"], "signup");
    assert_eq!(payload["valid"], false);
    assert_eq!(payload["error_count"], 1);
    assert_eq!(payload["warn_count"], 1);
    assert_eq!(payload["fields"]["email"]["errors"], json!(["email is taken"]));
    assert_eq!(payload["fields"]["nickname"]["valid"], false);
    assert!(
        payload["digest"]
            .as_str()
            .is_some_and(|digest| digest.starts_with("sha256:"))
    );
}

#[test]
fn summary_group_filter_and_text_output() {
    let tmp = TempDirGuard::new("summary-group");
    let dump = tmp.path().join("dump.json");
    write_dump(&dump, "failed");

    let grouped = run_verdict([
        OsStr::new("summary"),
        dump.as_os_str(),
        OsStr::new("--group"),
        OsStr::new("account"),
        OsStr::new("--json"),
    ]);
    assert_success(&grouped);
    let payload = parse_json_stdout(&grouped);
    let fields = payload["fields"].as_object().expect("fields object");
    assert_eq!(fields.len(), 2);
    assert!(fields.contains_key("email"));
    assert!(fields.contains_key("password"));
    assert_eq!(payload["valid"], false);

    let text = run_verdict([OsStr::new("summary"), dump.as_os_str()]);
    assert_success(&text);
    let stdout = stdout_text(&text);
    assert!(stdout.contains("Suite: signup"));
    assert!(stdout.contains("Valid: no"));
    assert!(stdout.contains("error: email is taken"));
}

#[test]
fn check_fails_on_errors_and_names_them() {
    let tmp = TempDirGuard::new("check-fail");
    let dump = tmp.path().join("dump.json");
    write_dump(&dump, "failed");

    let output = run_verdict([
        OsStr::new("check"),
        dump.as_os_str(),
        OsStr::new("--json"),
    ]);
    assert_failure(&output);
    let payload = parse_json_stdout(&output);
    assert_eq!(payload["valid"], false);
    assert_eq!(
        payload["errors"],
        json!([{ "field": "email", "message": "email is taken" }])
    );

    let username = run_verdict([
        OsStr::new("check"),
        dump.as_os_str(),
        OsStr::new("--field"),
        OsStr::new("username"),
    ]);
    assert_success(&username);
    assert!(stdout_text(&username).contains("Valid: yes"));
}

#[test]
fn config_optional_fields_make_untested_fields_pass() {
    let tmp = TempDirGuard::new("check-config");
    let dump = tmp.path().join("dump.json");
    let config = tmp.path().join("verdict.toml");
    write_dump(&dump, "passing");
    write_config(&config);

    let without = run_verdict([OsStr::new("check"), dump.as_os_str()]);
    assert_failure(&without);

    let with = run_verdict([
        OsStr::new("check"),
        dump.as_os_str(),
        OsStr::new("--config"),
        config.as_os_str(),
        OsStr::new("--json"),
    ]);
    assert_success(&with);
    let payload = parse_json_stdout(&with);
    assert_eq!(payload["valid"], true);
    assert_eq!(payload["suite_name"], "signup-form");
}

#[test]
fn digest_is_stable_across_invocations() {
    let tmp = TempDirGuard::new("digest");
    let dump = tmp.path().join("dump.json");
    write_dump(&dump, "failed");

    let first = run_verdict([OsStr::new("digest"), dump.as_os_str()]);
    let second = run_verdict([
        OsStr::new("digest"),
        dump.as_os_str(),
        OsStr::new("--json"),
    ]);
    assert_success(&first);
    assert_success(&second);
    let payload = parse_json_stdout(&second);
    assert_eq!(stdout_text(&first).trim(), payload["digest"]);
    assert_eq!(payload["schema"], "verdict.suite_dump.v1");
}

#[test]
fn malformed_inputs_exit_with_an_error() {
    let tmp = TempDirGuard::new("malformed");
    let dump = tmp.path().join("dump.json");
    fs::write(
        &dump,
        r#"{"schema":"verdict.suite_dump.v0","root":{"kind":"suite"}}"#,
    )
    .expect("dump should be written");

    let output = run_verdict([OsStr::new("check"), dump.as_os_str()]);
    assert_failure(&output);
    assert!(String::from_utf8_lossy(&output.stderr).contains("error:"));

    let missing = run_verdict([
        OsStr::new("summary"),
        tmp.path().join("absent.json").as_os_str(),
    ]);
    assert_failure(&missing);
}
