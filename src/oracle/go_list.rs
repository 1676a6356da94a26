use crate::agents::GoCommandAgent;
use crate::error::{AuditError, Result};
use crate::gomod::DependencyRecord;
use crate::oracle::{QueryContext, VersionOracle};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Asks the Go toolchain (`go list -m -u -json`), which applies the module's
/// own replace and exclude directives.
pub struct GoListOracle {
    agent: GoCommandAgent,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ModuleInfo {
    #[serde(default)]
    update: Option<ModuleUpdate>,
    #[serde(default)]
    error: Option<ModuleError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ModuleUpdate {
    version: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ModuleError {
    err: String,
}

impl GoListOracle {
    pub fn new(go_binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            agent: GoCommandAgent::new(go_binary, timeout),
        }
    }
}

impl VersionOracle for GoListOracle {
    fn latest_version(
        &self,
        context: &QueryContext<'_>,
        dependency: &DependencyRecord,
    ) -> Result<Option<String>> {
        let output = self
            .agent
            .list_module_with_update(context.module_root, &dependency.path)?;
        let latest = parse_module_info(&output)?;
        debug!("go list {}: update {:?}", dependency.path, latest);
        Ok(latest)
    }
}

fn parse_module_info(output: &str) -> Result<Option<String>> {
    let info: ModuleInfo = serde_json::from_str(output)
        .map_err(|e| AuditError::Oracle(format!("Malformed go list output: {}", e)))?;

    if let Some(error) = info.error {
        return Err(AuditError::Oracle(error.err));
    }

    Ok(info.update.map(|u| u.version))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_update_version() {
        let output = r#"{
	"Path": "golang.org/x/text",
	"Version": "v0.14.0",
	"Update": {
		"Path": "golang.org/x/text",
		"Version": "v0.21.0",
		"Time": "2024-12-04T17:36:48Z"
	},
	"Time": "2023-10-11T20:35:14Z",
	"GoMod": "/root/go/pkg/mod/cache/download/golang.org/x/text/@v/v0.14.0.mod",
	"GoVersion": "1.18"
}"#;
        assert_eq!(
            parse_module_info(output).unwrap(),
            Some("v0.21.0".to_string())
        );
    }

    #[test]
    fn missing_update_means_no_update() {
        let output = r#"{"Path": "golang.org/x/text", "Version": "v0.21.0"}"#;
        assert_eq!(parse_module_info(output).unwrap(), None);
    }

    #[test]
    fn error_field_is_an_oracle_error() {
        let output = r#"{
	"Path": "example.com/gone",
	"Version": "v1.0.0",
	"Error": {"Err": "module example.com/gone: reading https://proxy.golang.org/example.com/gone/@v/list: 404 Not Found"}
}"#;
        let err = parse_module_info(output).unwrap_err();
        assert!(err.to_string().contains("404 Not Found"));
    }

    #[test]
    fn malformed_output_is_an_oracle_error() {
        assert!(matches!(
            parse_module_info("go: not a json document"),
            Err(AuditError::Oracle(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn queries_through_go_binary() {
        use crate::gomod::ModuleDescriptor;
        use std::fs;
        use std::os::unix::fs::PermissionsExt;
        use tempfile::tempdir;

        let dir = tempdir().unwrap();
        let go = dir.path().join("go");
        fs::write(
            &go,
            "#!/bin/sh\necho '{\"Path\":\"'$5'\",\"Version\":\"v1.0.0\",\"Update\":{\"Version\":\"v1.2.0\"}}'\n",
        )
        .unwrap();
        fs::set_permissions(&go, fs::Permissions::from_mode(0o755)).unwrap();

        let module = ModuleDescriptor::default();
        let context = QueryContext {
            module_root: dir.path(),
            module: &module,
        };
        let oracle = GoListOracle::new(&go, Duration::from_secs(10));

        let latest = oracle
            .latest_version(&context, &DependencyRecord::new("libA", "v1.0.0"))
            .unwrap();

        assert_eq!(latest, Some("v1.2.0".to_string()));
    }
}
