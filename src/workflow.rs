use crate::agents::{
    GitSourceFetcher, LocalSourceFetcher, ProjectScannerAgent, SourceFetcher, VersionResolver,
    resolution_progress,
};
use crate::cli::OutputFormat;
use crate::config::{AuditConfig, SourceMode};
use crate::error::Result;
use crate::gomod::{ManifestParser, ModuleDescriptor};
use crate::oracle::{OracleFactory, VersionOracle};
use crate::report::{JsonReport, ReportBuilder, ReportLine};
use colored::Colorize;
use std::io::{self, IsTerminal, Write};
use std::sync::Arc;
use tracing::{debug, info};

/// Execute the audit with the real fetcher and oracle, printing to stdout
pub fn execute_audit(config: &AuditConfig) -> Result<()> {
    let fetcher: Box<dyn SourceFetcher> = match &config.source {
        SourceMode::Clone { branch } => {
            Box::new(GitSourceFetcher::new(&config.git_binary, branch.clone()))
        }
        SourceMode::Local => Box::new(LocalSourceFetcher),
    };
    let oracle = OracleFactory::create(config)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    run_audit(config, fetcher.as_ref(), oracle, &mut out)?;
    Ok(())
}

/// Fetch, parse, resolve and report.
///
/// Nothing is written to `out` unless every fatal step succeeded. The
/// acquired source is released before returning on every path.
pub fn run_audit(
    config: &AuditConfig,
    fetcher: &dyn SourceFetcher,
    oracle: Arc<dyn VersionOracle>,
    out: &mut dyn Write,
) -> Result<ModuleDescriptor> {
    // Step 1: Acquire the module tree
    let step = match config.source {
        SourceMode::Clone { .. } => "1. Cloning repository...",
        SourceMode::Local => "1. Opening local module...",
    };
    eprintln!("{}", step.yellow());
    let source = fetcher.fetch(&config.repository)?;
    info!("Module source at {}", source.root().display());

    // Step 2: Locate and parse go.mod
    eprintln!("{}", "2. Reading go.mod...".yellow());
    let project = ProjectScannerAgent::new(source.root()).locate(config.subdir.as_deref())?;
    let data = project.read_manifest()?;
    let mut module = ManifestParser::new().parse(&data, &project.manifest_path)?;
    let found = format!("✓ Found {} direct dependencies", module.dependencies.len());
    eprintln!("{}", found.green());

    // Step 3: Check each dependency for updates
    eprintln!("{}", "3. Checking for newer versions...".yellow());
    let resolver = VersionResolver::new(oracle, config.jobs);
    let progress = resolution_progress(module.dependencies.len(), io::stderr().is_terminal());
    resolver.resolve_all(&project.module_root, &mut module, &progress);
    progress.finish_and_clear();

    // The clone is no longer needed once every query has finished.
    if source.is_temporary() {
        debug!("Removing {}", source.root().display());
    }
    drop(source);

    // Step 4: Report
    match config.format {
        OutputFormat::Text => {
            write_text_report(&module, out)?;
            if let Some(summary) = ReportBuilder::summary(&module) {
                eprintln!("{}", summary.to_string().bold());
            }
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, &JsonReport::from_module(&module))?;
            writeln!(out)?;
        }
    }

    Ok(module)
}

fn write_text_report(module: &ModuleDescriptor, out: &mut dyn Write) -> Result<()> {
    for line in ReportBuilder::build(module) {
        let text = line.to_string();
        let styled = match line {
            ReportLine::UpdateAvailable { .. } => text.green().to_string(),
            ReportLine::CheckFailed { .. } => text.yellow().to_string(),
            _ => text,
        };
        writeln!(out, "{}", styled)?;
    }
    Ok(())
}
