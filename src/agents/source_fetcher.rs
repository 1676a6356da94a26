use crate::error::{AuditError, Result};
use crate::utils::path_validator::PathValidator;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;
use tracing::debug;
use url::Url;

const ALLOWED_SCHEMES: &[&str] = &["https", "http", "ssh", "git", "file"];

/// Obtains a module source tree for analysis
pub trait SourceFetcher {
    fn fetch(&self, location: &str) -> Result<AcquiredSource>;
}

/// A source tree on disk. Temporary trees are deleted when this value is dropped.
#[derive(Debug)]
pub struct AcquiredSource {
    root: PathBuf,
    _temp: Option<TempDir>,
}

impl AcquiredSource {
    pub fn temporary(dir: TempDir) -> Self {
        Self {
            root: dir.path().to_path_buf(),
            _temp: Some(dir),
        }
    }

    /// A tree owned by the caller; nothing is removed on drop
    pub fn borrowed(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            _temp: None,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_temporary(&self) -> bool {
        self._temp.is_some()
    }
}

/// Clones a Git repository into a fresh temporary directory.
pub struct GitSourceFetcher {
    git_binary: PathBuf,
    branch: Option<String>,
    temp_parent: Option<PathBuf>,
}

impl GitSourceFetcher {
    pub fn new(git_binary: impl Into<PathBuf>, branch: Option<String>) -> Self {
        Self {
            git_binary: git_binary.into(),
            branch,
            temp_parent: None,
        }
    }

    /// Create clones under `parent` instead of the system temp directory
    #[cfg(test)]
    pub fn with_temp_parent(mut self, parent: impl Into<PathBuf>) -> Self {
        self.temp_parent = Some(parent.into());
        self
    }

    fn create_temp_dir(&self) -> Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("gomod-outdated-");

        let dir = match &self.temp_parent {
            Some(parent) => builder.tempdir_in(parent),
            None => builder.tempdir(),
        };

        dir.map_err(|e| {
            AuditError::Acquisition(format!("Failed to create temporary directory: {e}"))
        })
    }

    fn run_git(&self, args: &[&str], target: &Path) -> Result<Output> {
        Command::new(&self.git_binary)
            .args(args)
            .arg(target)
            .output()
            .map_err(|e| {
                AuditError::Acquisition(format!(
                    "Failed to execute {} '{}': {e}",
                    self.git_binary.display(),
                    args.join(" ")
                ))
            })
    }

    fn ensure_success(output: &Output, command: &str) -> Result<()> {
        if output.status.success() {
            return Ok(());
        }

        Err(AuditError::Acquisition(format!(
            "{} failed: {}",
            command,
            String::from_utf8_lossy(&output.stderr).trim()
        )))
    }
}

impl SourceFetcher for GitSourceFetcher {
    fn fetch(&self, location: &str) -> Result<AcquiredSource> {
        validate_location(location)?;
        if let Some(branch) = &self.branch {
            validate_argument(branch, "branch")?;
        }

        // Dropping `dir` on any early return below removes the partial clone.
        let dir = self.create_temp_dir()?;
        debug!("Cloning {} into {}", location, dir.path().display());

        let mut args = vec!["clone", "--quiet", "--depth", "1"];
        if let Some(branch) = &self.branch {
            args.push("--branch");
            args.push(branch);
        }
        args.push("--");
        args.push(location);

        let output = self.run_git(&args, dir.path())?;
        Self::ensure_success(&output, "git clone")?;

        Ok(AcquiredSource::temporary(dir))
    }
}

/// Uses an existing directory in place.
pub struct LocalSourceFetcher;

impl SourceFetcher for LocalSourceFetcher {
    fn fetch(&self, location: &str) -> Result<AcquiredSource> {
        let root = PathValidator::existing_directory(location)
            .map_err(|e| AuditError::Acquisition(e.to_string()))?;
        Ok(AcquiredSource::borrowed(root))
    }
}

/// Rejects repository locations that git could mistake for options or that
/// use transports other than the common ones.
pub fn validate_location(location: &str) -> Result<()> {
    validate_argument(location, "repository location")?;

    if location.contains("::") {
        return Err(AuditError::Acquisition(format!(
            "Remote helper addresses are not supported: '{location}'"
        )));
    }

    if let Ok(url) = Url::parse(location) {
        // Single-letter schemes are Windows drive letters, not URLs.
        if url.scheme().len() > 1 && !ALLOWED_SCHEMES.contains(&url.scheme()) {
            return Err(AuditError::Acquisition(format!(
                "Unsupported repository scheme '{}'",
                url.scheme()
            )));
        }
    }

    Ok(())
}

fn validate_argument(value: &str, what: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AuditError::Acquisition(format!("Empty {what}")));
    }

    if value.starts_with('-') {
        return Err(AuditError::Acquisition(format!(
            "Invalid {what} '{value}': must not start with '-'"
        )));
    }

    if value.chars().any(char::is_control) {
        return Err(AuditError::Acquisition(format!(
            "Invalid {what}: contains control characters"
        )));
    }

    Ok(())
}
