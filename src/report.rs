use crate::gomod::{DependencyRecord, ModuleDescriptor, UpdateStatus};
use serde::Serialize;
use std::fmt;

/// One line of the text report
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportLine {
    Module(String),
    GoVersion(String),
    DependenciesHeader,
    NoDependencies,
    UpdateAvailable {
        path: String,
        current: String,
        latest: String,
    },
    NoUpdate {
        path: String,
        current: String,
    },
    /// Reported as "no update", with the reason the check failed
    CheckFailed {
        path: String,
        current: String,
        reason: String,
    },
    Summary {
        outdated: usize,
        total: usize,
        unchecked: usize,
    },
}

impl fmt::Display for ReportLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportLine::Module(name) => write!(f, "Module: {}", name),
            ReportLine::GoVersion(version) => write!(f, "Go version: {}", version),
            ReportLine::DependenciesHeader => f.write_str("Dependencies:"),
            ReportLine::NoDependencies => f.write_str("  (no direct dependencies found)"),
            ReportLine::UpdateAvailable {
                path,
                current,
                latest,
            } => write!(f, "- {}: current {} → available {}", path, current, latest),
            ReportLine::NoUpdate { path, current } => {
                write!(f, "- {}: version {} (no update)", path, current)
            }
            ReportLine::CheckFailed {
                path,
                current,
                reason,
            } => write!(
                f,
                "- {}: version {} (no update; check failed: {})",
                path, current, reason
            ),
            ReportLine::Summary {
                outdated,
                total,
                unchecked,
            } => {
                write!(
                    f,
                    "{} of {} direct dependencies can be updated",
                    outdated, total
                )?;
                if *unchecked > 0 {
                    write!(f, ", {} could not be checked", unchecked)?;
                }
                Ok(())
            }
        }
    }
}

pub struct ReportBuilder;

impl ReportBuilder {
    /// Turn a resolved module into report lines, dependencies in manifest order
    pub fn build(module: &ModuleDescriptor) -> Vec<ReportLine> {
        let mut lines = vec![
            ReportLine::Module(module.name.clone()),
            ReportLine::GoVersion(module.go_version.clone()),
            ReportLine::DependenciesHeader,
        ];

        if module.dependencies.is_empty() {
            lines.push(ReportLine::NoDependencies);
            return lines;
        }

        lines.extend(module.dependencies.iter().map(Self::dependency_line));
        lines
    }

    /// Count of updatable and unchecked dependencies; `None` when there are none
    pub fn summary(module: &ModuleDescriptor) -> Option<ReportLine> {
        if module.dependencies.is_empty() {
            return None;
        }

        let mut outdated = 0;
        let mut unchecked = 0;
        for dependency in &module.dependencies {
            match Self::dependency_line(dependency) {
                ReportLine::UpdateAvailable { .. } => outdated += 1,
                ReportLine::CheckFailed { .. } => unchecked += 1,
                _ => {}
            }
        }

        Some(ReportLine::Summary {
            outdated,
            total: module.dependencies.len(),
            unchecked,
        })
    }

    fn dependency_line(dependency: &DependencyRecord) -> ReportLine {
        let path = dependency.path.clone();
        let current = dependency.current_version.clone();

        match &dependency.status {
            // A "latest" equal to the current version is not an update.
            Some(UpdateStatus::UpdateAvailable(latest)) if *latest != current => {
                ReportLine::UpdateAvailable {
                    path,
                    current,
                    latest: latest.clone(),
                }
            }
            Some(UpdateStatus::Unknown(reason)) => ReportLine::CheckFailed {
                path,
                current,
                reason: reason.clone(),
            },
            _ => ReportLine::NoUpdate { path, current },
        }
    }
}

/// Machine-readable form of the report
#[derive(Debug, Serialize)]
pub struct JsonReport<'a> {
    pub module: &'a str,
    pub go_version: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub toolchain: Option<&'a str>,
    pub dependencies: Vec<JsonDependency<'a>>,
}

#[derive(Debug, Serialize)]
pub struct JsonDependency<'a> {
    pub path: &'a str,
    pub current: &'a str,
    pub latest: Option<&'a str>,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'a str>,
}

impl<'a> JsonReport<'a> {
    pub fn from_module(module: &'a ModuleDescriptor) -> Self {
        let dependencies = module
            .dependencies
            .iter()
            .map(|d| {
                let (status, reason) = match &d.status {
                    Some(UpdateStatus::UpdateAvailable(latest)) if *latest != d.current_version => {
                        ("update_available", None)
                    }
                    Some(UpdateStatus::Unknown(reason)) => ("unknown", Some(reason.as_str())),
                    Some(_) => ("up_to_date", None),
                    None => ("unchecked", None),
                };
                JsonDependency {
                    path: &d.path,
                    current: &d.current_version,
                    latest: d.latest_version(),
                    status,
                    reason,
                }
            })
            .collect();

        Self {
            module: &module.name,
            go_version: &module.go_version,
            toolchain: module.toolchain.as_deref(),
            dependencies,
        }
    }
}
