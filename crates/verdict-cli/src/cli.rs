use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "verdict",
    about = "Verdict: inspect and gate on dumped validation suite results",
    version
)]
pub struct Cli {
    /// Tracing filter directive (e.g. `info`, `verdict_suite=debug`)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Summarize the results recorded in a suite dump
    Summary {
        /// Path to a suite dump JSON file
        dump: String,

        /// Optional suite config TOML (name, optional fields)
        #[arg(long)]
        config: Option<String>,

        /// Only report this field
        #[arg(long, conflicts_with = "group")]
        field: Option<String>,

        /// Only report fields tested inside this group
        #[arg(long)]
        group: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Exit non-zero unless the dumped results are valid
    Check {
        /// Path to a suite dump JSON file
        dump: String,

        /// Optional suite config TOML (name, optional fields)
        #[arg(long)]
        config: Option<String>,

        /// Gate on a single field instead of the whole suite
        #[arg(long)]
        field: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the content digest of a suite dump
    Digest {
        /// Path to a suite dump JSON file
        dump: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
