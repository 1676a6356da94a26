//! Go module proxy oracle
//!
//! Implements the `$GOPROXY/<module>/@v/list` and `$GOPROXY/<module>/@latest`
//! endpoints, for machines without a Go toolchain.

use crate::error::{AuditError, Result};
use crate::gomod::{DependencyRecord, VersionComparator};
use crate::oracle::{QueryContext, VersionOracle};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::io::Read;
use std::time::Duration;
use tracing::{debug, warn};

const MAX_LIST_BYTES: usize = 4 * 1024 * 1024;

pub struct GoProxyOracle {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LatestInfo {
    version: String,
}

impl GoProxyOracle {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("gomod-outdated/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch `path` below the module's proxy directory; `None` for 404/410
    fn fetch(&self, module_path: &str, endpoint: &str) -> Result<Option<String>> {
        let url = format!(
            "{}/{}/{}",
            self.base_url,
            escape_module_path(module_path),
            endpoint
        );
        debug!("Fetching: {}", url);

        let response = self.client.get(&url).send()?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return Ok(None);
        }

        if !status.is_success() {
            warn!("Go proxy returned status {}: {}", status, url);
            return Err(AuditError::Oracle(format!(
                "{} returned HTTP {}",
                url, status
            )));
        }

        let mut body = Vec::new();
        response
            .take(MAX_LIST_BYTES as u64 + 1)
            .read_to_end(&mut body)?;
        if body.len() > MAX_LIST_BYTES {
            return Err(AuditError::Oracle(format!(
                "{} response exceeded {} bytes",
                url, MAX_LIST_BYTES
            )));
        }

        String::from_utf8(body)
            .map(Some)
            .map_err(|_| AuditError::Oracle(format!("{} response is not valid UTF-8", url)))
    }
}

impl VersionOracle for GoProxyOracle {
    fn latest_version(
        &self,
        context: &QueryContext<'_>,
        dependency: &DependencyRecord,
    ) -> Result<Option<String>> {
        let module = context.module;
        let path = dependency.path.as_str();
        let current = dependency.current_version.as_str();

        if let Some(replacement) = module.replacement_for(path, current) {
            if replacement.new_version.is_none() {
                return Err(AuditError::Oracle(format!(
                    "replaced by local directory {}",
                    replacement.new_path
                )));
            }
            debug!(
                "{} is replaced by {}; checking the original path",
                path,
                replacement.target()
            );
        }

        let Some(list) = self.fetch(path, "@v/list")? else {
            return Err(AuditError::Oracle(format!("module {} not found", path)));
        };

        let listed: Vec<&str> = list
            .lines()
            .map(str::trim)
            .filter(|v| !v.is_empty() && !module.is_excluded(path, v))
            .collect();

        if !listed.is_empty() {
            return Ok(VersionComparator::select_update(current, listed));
        }

        // Modules with no tagged releases only expose a pseudo-version via @latest.
        let Some(latest) = self.fetch(path, "@latest")? else {
            return Ok(None);
        };
        let info: LatestInfo = serde_json::from_str(&latest)
            .map_err(|e| AuditError::Oracle(format!("Malformed @latest response: {}", e)))?;

        if module.is_excluded(path, &info.version) {
            return Ok(None);
        }

        Ok(VersionComparator::select_update(
            current,
            [info.version.as_str()],
        ))
    }
}

/// Uppercase letters in module paths are escaped as `!` + lowercase.
fn escape_module_path(path: &str) -> String {
    let mut result = String::with_capacity(path.len());
    for c in path.chars() {
        if c.is_ascii_uppercase() {
            result.push('!');
            result.push(c.to_ascii_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}
