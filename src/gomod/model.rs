/// Parsed view of a go.mod file, limited to what the audit needs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleDescriptor {
    /// Module path from the `module` directive, empty when absent
    pub name: String,
    /// Version from the `go` directive, empty when absent
    pub go_version: String,
    pub toolchain: Option<String>,
    /// Direct requirements in declaration order
    pub dependencies: Vec<DependencyRecord>,
    pub replaces: Vec<Replacement>,
    pub excludes: Vec<ModuleVersion>,
}

impl ModuleDescriptor {
    /// Returns the replacement that applies to `path` at `version`, if any.
    ///
    /// A replacement without an old version applies to every version of the module.
    pub fn replacement_for(&self, path: &str, version: &str) -> Option<&Replacement> {
        self.replaces.iter().find(|r| {
            r.old.path == path && r.old.version.as_deref().is_none_or(|v| v == version)
        })
    }

    pub fn is_excluded(&self, path: &str, version: &str) -> bool {
        self.excludes
            .iter()
            .any(|e| e.path == path && e.version.as_deref() == Some(version))
    }
}

/// A direct requirement together with the outcome of its update check
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyRecord {
    pub path: String,
    pub current_version: String,
    /// `None` until the resolver has checked this dependency
    pub status: Option<UpdateStatus>,
}

impl DependencyRecord {
    pub fn new(path: impl Into<String>, current_version: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            current_version: current_version.into(),
            status: None,
        }
    }

    /// The newer version, when one was found.
    pub fn latest_version(&self) -> Option<&str> {
        match &self.status {
            Some(UpdateStatus::UpdateAvailable(version)) => Some(version),
            _ => None,
        }
    }
}

/// Outcome of checking a single dependency for updates
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateStatus {
    UpToDate,
    UpdateAvailable(String),
    /// The check itself failed; carries the reason
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleVersion {
    pub path: String,
    pub version: Option<String>,
}

/// A `replace` directive: `old [version] => new [version]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub old: ModuleVersion,
    pub new_path: String,
    /// Absent when the target is a filesystem path
    pub new_version: Option<String>,
}

impl Replacement {
    pub fn target(&self) -> String {
        match &self.new_version {
            Some(version) => format!("{} {}", self.new_path, version),
            None => self.new_path.clone(),
        }
    }
}
