use crate::error::{AuditError, Result};
use std::path::{Component, Path, PathBuf};

/// Path checks for the acquired module tree.
pub struct PathValidator;

impl PathValidator {
    /// Canonicalises `path` and requires it to be a directory.
    pub fn existing_directory(path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref();

        let canonical = path.canonicalize().map_err(|e| {
            AuditError::ProjectValidation(format!("Invalid path '{}': {e}", path.display()))
        })?;

        if !canonical.is_dir() {
            return Err(AuditError::ProjectValidation(format!(
                "Path '{}' is not a directory",
                canonical.display()
            )));
        }

        Ok(canonical)
    }

    /// Joins a relative `subdir` onto `base`, refusing anything that could leave `base`.
    pub fn join_relative(base: &Path, subdir: &Path) -> Result<PathBuf> {
        let escapes = subdir.components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });

        if escapes {
            return Err(AuditError::ProjectValidation(format!(
                "Sub-directory '{}' must be relative and stay inside the repository",
                subdir.display()
            )));
        }

        Ok(base.join(subdir))
    }

    /// Ensures `path` resolves (following symlinks) to a location inside `base`.
    pub fn ensure_within(path: impl AsRef<Path>, base: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref();
        let base = base.as_ref();

        let canonical = path.canonicalize().map_err(|e| {
            AuditError::ProjectValidation(format!("Invalid path '{}': {e}", path.display()))
        })?;

        let canonical_base = base.canonicalize().map_err(|e| {
            AuditError::ProjectValidation(format!(
                "Invalid base directory '{}': {e}",
                base.display()
            ))
        })?;

        if !canonical.starts_with(&canonical_base) {
            return Err(AuditError::ProjectValidation(format!(
                "'{}' resolves outside the repository",
                path.display()
            )));
        }

        Ok(canonical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn existing_directory_accepts_directory() {
        let dir = tempdir().unwrap();
        assert!(PathValidator::existing_directory(dir.path()).is_ok());
    }

    #[test]
    fn existing_directory_rejects_file_and_missing_path() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("go.mod");
        fs::write(&file_path, "module m").unwrap();

        assert!(matches!(
            PathValidator::existing_directory(&file_path),
            Err(AuditError::ProjectValidation(_))
        ));
        assert!(PathValidator::existing_directory(dir.path().join("missing")).is_err());
    }

    #[test]
    fn join_relative_rejects_traversal() {
        let base = Path::new("/tmp/repo");
        assert!(PathValidator::join_relative(base, Path::new("../other")).is_err());
        assert!(PathValidator::join_relative(base, Path::new("/etc")).is_err());
        assert_eq!(
            PathValidator::join_relative(base, Path::new("services/api")).unwrap(),
            base.join("services/api")
        );
    }

    #[test]
    fn ensure_within_rejects_outside_path() {
        let dir = tempdir().unwrap();
        let other = tempdir().unwrap();
        assert!(PathValidator::ensure_within(other.path(), dir.path()).is_err());
        assert!(PathValidator::ensure_within(dir.path(), dir.path()).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn ensure_within_follows_symlinks() {
        let dir = tempdir().unwrap();
        let outside = tempdir().unwrap();
        let target = outside.path().join("go.mod");
        fs::write(&target, "module evil").unwrap();
        let link = dir.path().join("go.mod");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        assert!(PathValidator::ensure_within(&link, dir.path()).is_err());
    }
}
