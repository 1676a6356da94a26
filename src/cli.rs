use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "gomod-outdated",
    about = "Report which direct dependencies of a Go module have newer versions",
    version,
    author
)]
pub struct Cli {
    /// Git repository to clone (URL, scp-like address or path)
    #[arg(value_name = "REPOSITORY")]
    pub repository: String,

    /// Branch or tag to clone instead of the default branch
    #[arg(short, long)]
    pub branch: Option<String>,

    /// Analyse REPOSITORY as an existing local directory instead of cloning it
    #[arg(long, conflicts_with = "branch")]
    pub local: bool,

    /// Directory of the module inside the repository
    #[arg(long, value_name = "DIR")]
    pub subdir: Option<PathBuf>,

    /// Maximum number of concurrent version queries (defaults to CPU count)
    #[arg(short, long, env = "GOMOD_OUTDATED_JOBS")]
    pub jobs: Option<usize>,

    /// Timeout for each version query, in seconds
    #[arg(long, value_name = "SECS", env = "GOMOD_OUTDATED_TIMEOUT", default_value_t = 60)]
    pub timeout: u64,

    /// Where to look up newer versions
    #[arg(long, value_enum, default_value_t = OracleKind::GoList)]
    pub oracle: OracleKind,

    /// Module proxy for the go-proxy oracle (defaults to the first GOPROXY entry)
    #[arg(long, value_name = "URL")]
    pub goproxy: Option<String>,

    /// Go binary used by the go-list oracle
    #[arg(long = "go", value_name = "PATH", default_value = "go")]
    pub go_binary: PathBuf,

    /// Git binary used for cloning
    #[arg(long = "git", value_name = "PATH", default_value = "git")]
    pub git_binary: PathBuf,

    /// Report format written to stdout
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OracleKind {
    /// `go list -m -u -json` inside the module
    GoList,
    /// Query the Go module proxy over HTTP
    GoProxy,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_repository_argument() {
        let err = Cli::try_parse_from(["gomod-outdated"]).unwrap_err();
        assert_eq!(
            err.kind(),
            clap::error::ErrorKind::MissingRequiredArgument
        );
    }

    #[test]
    fn parses_defaults() {
        let cli = Cli::try_parse_from(["gomod-outdated", "https://github.com/x/y"]).unwrap();
        assert_eq!(cli.repository, "https://github.com/x/y");
        assert_eq!(cli.oracle, OracleKind::GoList);
        assert_eq!(cli.format, OutputFormat::Text);
        assert_eq!(cli.timeout, 60);
        assert!(!cli.local);
    }

    #[test]
    fn local_conflicts_with_branch() {
        let result =
            Cli::try_parse_from(["gomod-outdated", "--local", "--branch", "main", "."]);
        assert!(result.is_err());
    }

    #[test]
    fn parses_oracle_and_format() {
        let cli = Cli::try_parse_from([
            "gomod-outdated",
            "--oracle",
            "go-proxy",
            "--format",
            "json",
            "-j",
            "3",
            "repo",
        ])
        .unwrap();
        assert_eq!(cli.oracle, OracleKind::GoProxy);
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.jobs, Some(3));
    }
}
