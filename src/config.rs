use crate::cli::{Cli, OracleKind, OutputFormat};
use crate::error::{AuditError, Result};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

const DEFAULT_PROXY: &str = "https://proxy.golang.org";

/// How the module tree is obtained
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceMode {
    Clone { branch: Option<String> },
    Local,
}

/// Settings for one audit run, validated once at startup
#[derive(Debug, Clone)]
pub struct AuditConfig {
    pub repository: String,
    pub source: SourceMode,
    pub subdir: Option<PathBuf>,
    /// Upper bound on concurrent version queries
    pub jobs: usize,
    pub timeout: Duration,
    pub oracle: OracleKind,
    pub goproxy: String,
    pub go_binary: PathBuf,
    pub git_binary: PathBuf,
    pub format: OutputFormat,
}

impl AuditConfig {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let jobs = match cli.jobs {
            Some(0) => {
                return Err(AuditError::Config("--jobs must be at least 1".to_string()));
            }
            Some(n) => n,
            None => thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
        };

        if cli.timeout == 0 {
            return Err(AuditError::Config(
                "--timeout must be at least 1 second".to_string(),
            ));
        }

        let goproxy = match &cli.goproxy {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => proxy_from_env(std::env::var("GOPROXY").ok().as_deref()),
        };

        let source = if cli.local {
            SourceMode::Local
        } else {
            SourceMode::Clone {
                branch: cli.branch.clone(),
            }
        };

        Ok(Self {
            repository: cli.repository.clone(),
            source,
            subdir: cli.subdir.clone(),
            jobs,
            timeout: Duration::from_secs(cli.timeout),
            oracle: cli.oracle,
            goproxy,
            go_binary: cli.go_binary.clone(),
            git_binary: cli.git_binary.clone(),
            format: cli.format,
        })
    }
}

/// First HTTP(S) entry of a GOPROXY list (`,` or `|` separated), else the public proxy
fn proxy_from_env(value: Option<&str>) -> String {
    value
        .into_iter()
        .flat_map(|v| v.split([',', '|']))
        .map(str::trim)
        .find(|entry| entry.starts_with("https://") || entry.starts_with("http://"))
        .map(|entry| entry.trim_end_matches('/').to_string())
        .unwrap_or_else(|| DEFAULT_PROXY.to_string())
}
