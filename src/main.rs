mod agents;
mod cli;
mod config;
mod error;
mod gomod;
mod oracle;
mod report;
mod utils;
mod workflow;

use clap::Parser;
use cli::Cli;
use colored::Colorize;
use config::AuditConfig;
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    let result = AuditConfig::from_cli(&cli).and_then(|config| workflow::execute_audit(&config));

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        process::exit(1);
    }
}

/// Diagnostics go to stderr; `RUST_LOG` wins over `--verbose`
fn init_tracing(verbose: bool) {
    let default_level = if verbose {
        "gomod_outdated=debug"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
