//! Verdict CLI: the `verdict` command.

mod cli;
mod commands;
mod support;

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Summary {
            dump,
            config,
            field,
            group,
            json,
        } => commands::summary::run(dump, config, field, group, json),

        Commands::Check {
            dump,
            config,
            field,
            json,
        } => commands::check::run(dump, config, field, json),

        Commands::Digest { dump, json } => commands::digest::run(dump, json),
    }
}
