use serde_json::Value;
use std::path::Path;
use tracing::debug;
use verdict_suite::{FieldSummary, Suite, SuiteConfig, SuiteDump};

pub fn load_dump_or_exit(path: &str) -> SuiteDump {
    let dump = SuiteDump::read_from(Path::new(path)).unwrap_or_else(|e| {
        eprintln!("error: {e}");
        std::process::exit(1);
    });
    debug!(path, schema = %dump.schema, "loaded suite dump");
    dump
}

pub fn digest_or_exit(dump: &SuiteDump) -> String {
    dump.digest().unwrap_or_else(|e| {
        eprintln!("error: {e}");
        std::process::exit(1);
    })
}

pub fn load_config_or_exit(path: Option<&str>) -> SuiteConfig {
    let Some(path) = path else {
        return SuiteConfig::default();
    };
    SuiteConfig::from_path(Path::new(path)).unwrap_or_else(|e| {
        eprintln!("error: {e}");
        std::process::exit(1);
    })
}

/// A suite with no declarations, seeded from `dump`.
///
/// The config's name wins over the dumped one; optional fields are merged.
pub fn resume_or_exit(dump: &SuiteDump, mut config: SuiteConfig) -> Suite<()> {
    if config.name.is_none() {
        config.name = dump.suite_name.clone();
    }
    let suite: Suite<()> = Suite::with_config(config, |_, _| Ok(()));
    if let Err(e) = suite.resume(dump) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
    suite
}

pub fn print_json_or_exit(payload: &Value) {
    match serde_json::to_string_pretty(payload) {
        Ok(rendered) => println!("{rendered}"),
        Err(e) => {
            eprintln!("error: failed to render json: {e}");
            std::process::exit(1);
        }
    }
}

pub fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

pub fn print_field_line(field: &str, summary: &FieldSummary) {
    println!(
        "    {field}: {} (tests {}, errors {}, warnings {}, pending {})",
        if summary.valid { "valid" } else { "invalid" },
        summary.test_count,
        summary.error_count,
        summary.warn_count,
        summary.pending_count
    );
    for error in &summary.errors {
        println!("      error: {error}");
    }
    for warning in &summary.warnings {
        println!("      warning: {warning}");
    }
}
