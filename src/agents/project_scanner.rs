use crate::error::{AuditError, Result};
use crate::utils::path_validator::PathValidator;
use std::fs;
use std::path::{Path, PathBuf};

const MANIFEST_NAME: &str = "go.mod";

/// ProjectScannerAgent locates the module manifest inside an acquired tree
pub struct ProjectScannerAgent {
    source_root: PathBuf,
}

impl ProjectScannerAgent {
    pub fn new<P: AsRef<Path>>(source_root: P) -> Self {
        Self {
            source_root: source_root.as_ref().to_path_buf(),
        }
    }

    /// Finds go.mod in the tree root or in `subdir`
    pub fn locate(&self, subdir: Option<&Path>) -> Result<ProjectInfo> {
        let module_root = match subdir {
            Some(subdir) => {
                let joined = PathValidator::join_relative(&self.source_root, subdir)?;
                if !joined.is_dir() {
                    return Err(AuditError::ProjectValidation(format!(
                        "Sub-directory '{}' not found in repository",
                        subdir.display()
                    )));
                }
                PathValidator::ensure_within(&joined, &self.source_root)?
            }
            None => self.source_root.clone(),
        };

        let manifest_path = module_root.join(MANIFEST_NAME);
        if !manifest_path.is_file() {
            return Err(AuditError::NotFound(format!(
                "{} not found in {}",
                MANIFEST_NAME,
                module_root.display()
            )));
        }

        let manifest_path = PathValidator::ensure_within(&manifest_path, &self.source_root)?;

        Ok(ProjectInfo {
            module_root,
            manifest_path,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ProjectInfo {
    /// Directory holding go.mod; version queries run here
    pub module_root: PathBuf,
    pub manifest_path: PathBuf,
}

impl ProjectInfo {
    pub fn read_manifest(&self) -> Result<Vec<u8>> {
        fs::read(&self.manifest_path).map_err(|e| {
            AuditError::NotFound(format!(
                "Failed to read {}: {}",
                self.manifest_path.display(),
                e
            ))
        })
    }
}
