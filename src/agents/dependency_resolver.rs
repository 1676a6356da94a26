use crate::error::AuditError;
use crate::gomod::{DependencyRecord, ModuleDescriptor, UpdateStatus};
use crate::oracle::{QueryContext, VersionOracle};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use tracing::{debug, warn};

/// VersionResolver determines the update status of each direct dependency
pub struct VersionResolver {
    oracle: Arc<dyn VersionOracle>,
    jobs: usize,
}

impl VersionResolver {
    pub fn new(oracle: Arc<dyn VersionOracle>, jobs: usize) -> Self {
        Self {
            oracle,
            jobs: jobs.max(1),
        }
    }

    /// Check one dependency. Never fails: a failed check becomes `Unknown`.
    pub fn resolve(&self, context: &QueryContext<'_>, record: &DependencyRecord) -> UpdateStatus {
        match self.oracle.latest_version(context, record) {
            Ok(Some(latest)) if latest != record.current_version => {
                UpdateStatus::UpdateAvailable(latest)
            }
            Ok(_) => UpdateStatus::UpToDate,
            Err(err) => {
                warn!("Could not check {}: {}", record.path, err);
                UpdateStatus::Unknown(failure_reason(err))
            }
        }
    }

    /// Check every dependency of `module` and store each status on its record.
    ///
    /// Queries run on at most `jobs` worker threads; statuses are written back
    /// by index so declaration order is kept.
    pub fn resolve_all(
        &self,
        module_root: &Path,
        module: &mut ModuleDescriptor,
        progress: &ProgressBar,
    ) {
        let statuses = {
            let context = QueryContext {
                module_root,
                module: &*module,
            };
            self.resolve_statuses(&context, progress)
        };

        for (record, status) in module.dependencies.iter_mut().zip(statuses) {
            record.status = Some(status);
        }
    }

    fn resolve_statuses(
        &self,
        context: &QueryContext<'_>,
        progress: &ProgressBar,
    ) -> Vec<UpdateStatus> {
        let records = &context.module.dependencies;
        if records.is_empty() {
            return Vec::new();
        }

        let jobs = self.jobs.min(records.len());
        debug!(
            "Resolving {} dependencies with {} workers",
            records.len(),
            jobs
        );

        let next = AtomicUsize::new(0);
        let mut slots: Vec<Option<UpdateStatus>> = vec![None; records.len()];

        thread::scope(|scope| {
            let (tx, rx) = mpsc::channel();

            for _ in 0..jobs {
                let tx = tx.clone();
                let next = &next;
                scope.spawn(move || {
                    loop {
                        let index = next.fetch_add(1, Ordering::Relaxed);
                        let Some(record) = records.get(index) else {
                            break;
                        };
                        let status = self.resolve(context, record);
                        if tx.send((index, status)).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(tx);

            for (index, status) in rx {
                progress.set_message(records[index].path.clone());
                progress.inc(1);
                slots[index] = Some(status);
            }
        });

        slots
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| UpdateStatus::Unknown("check did not complete".to_string()))
            })
            .collect()
    }
}

/// Progress bar for the resolution phase, drawn on stderr
pub fn resolution_progress(total: usize, visible: bool) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    if !visible {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    }
    if let Ok(style) = ProgressStyle::default_bar().template("  [{bar:40}] {pos}/{len} {msg}") {
        pb.set_style(style.progress_chars("=>-"));
    }
    pb
}

fn failure_reason(err: AuditError) -> String {
    match err {
        AuditError::Oracle(reason) => reason,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Oracle answering from a fixed table; paths not in the table fail
    struct TableOracle {
        answers: HashMap<String, Option<String>>,
        delay: Duration,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        calls: Mutex<Vec<String>>,
    }

    impl TableOracle {
        fn new(answers: &[(&str, Option<&str>)]) -> Self {
            Self {
                answers: answers
                    .iter()
                    .map(|(path, latest)| (path.to_string(), latest.map(str::to_string)))
                    .collect(),
                delay: Duration::ZERO,
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    impl VersionOracle for TableOracle {
        fn latest_version(
            &self,
            _context: &QueryContext<'_>,
            dependency: &DependencyRecord,
        ) -> Result<Option<String>> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.calls.lock().unwrap().push(dependency.path.clone());
            thread::sleep(self.delay);
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match self.answers.get(dependency.path.as_str()) {
                Some(answer) => Ok(answer.clone()),
                None => Err(AuditError::Oracle(format!(
                    "unknown module {}",
                    dependency.path
                ))),
            }
        }
    }

    fn module(deps: &[(&str, &str)]) -> ModuleDescriptor {
        ModuleDescriptor {
            name: "example.com/app".to_string(),
            dependencies: deps
                .iter()
                .map(|(p, v)| DependencyRecord::new(*p, *v))
                .collect(),
            ..ModuleDescriptor::default()
        }
    }

    fn statuses(module: &ModuleDescriptor) -> Vec<Option<UpdateStatus>> {
        module.dependencies.iter().map(|d| d.status.clone()).collect()
    }

    #[test]
    fn maps_oracle_answers_to_statuses() {
        let oracle = TableOracle::new(&[
            ("libA", Some("v1.2.0")),
            ("libB", None),
            ("libC", Some("v0.3.0")),
        ]);
        let resolver = VersionResolver::new(Arc::new(oracle), 2);
        let mut module = module(&[
            ("libA", "v1.0.0"),
            ("libB", "v2.0.0"),
            ("libC", "v0.3.0"),
            ("libD", "v0.1.0"),
        ]);

        resolver.resolve_all(Path::new("."), &mut module, &ProgressBar::hidden());

        assert_eq!(
            statuses(&module),
            vec![
                Some(UpdateStatus::UpdateAvailable("v1.2.0".to_string())),
                Some(UpdateStatus::UpToDate),
                // equal to current counts as no update
                Some(UpdateStatus::UpToDate),
                Some(UpdateStatus::Unknown("unknown module libD".to_string())),
            ]
        );
        assert_eq!(module.dependencies[0].latest_version(), Some("v1.2.0"));
        assert_eq!(module.dependencies[2].latest_version(), None);
    }

    #[test]
    fn keeps_declaration_order_under_concurrency() {
        let names: Vec<String> = (0..24).map(|i| format!("example.com/dep{i:02}")).collect();
        let answers: Vec<(&str, Option<&str>)> =
            names.iter().map(|n| (n.as_str(), Some("v9.9.9"))).collect();
        let oracle = Arc::new(TableOracle::new(&answers).with_delay(Duration::from_millis(5)));
        let resolver = VersionResolver::new(oracle.clone(), 4);
        let deps: Vec<(&str, &str)> = names.iter().map(|n| (n.as_str(), "v1.0.0")).collect();
        let mut module = module(&deps);

        resolver.resolve_all(Path::new("."), &mut module, &ProgressBar::hidden());

        let paths: Vec<&str> = module.dependencies.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(paths, names.iter().map(String::as_str).collect::<Vec<_>>());
        assert!(module
            .dependencies
            .iter()
            .all(|d| d.latest_version() == Some("v9.9.9")));
        assert!(oracle.max_in_flight.load(Ordering::SeqCst) <= 4);
        assert_eq!(oracle.calls.lock().unwrap().len(), 24);
    }

    #[test]
    fn queries_each_dependency_exactly_once() {
        let oracle = Arc::new(TableOracle::new(&[("libA", None)]));
        let resolver = VersionResolver::new(oracle.clone(), 8);
        let mut module = module(&[("libA", "v1.0.0"), ("libB", "v1.0.0")]);

        resolver.resolve_all(Path::new("."), &mut module, &ProgressBar::hidden());

        let mut calls = oracle.calls.lock().unwrap().clone();
        calls.sort();
        assert_eq!(calls, vec!["libA", "libB"]);
    }

    #[test]
    fn empty_module_makes_no_queries() {
        let oracle = Arc::new(TableOracle::new(&[]));
        let resolver = VersionResolver::new(oracle.clone(), 4);
        let mut module = module(&[]);

        resolver.resolve_all(Path::new("."), &mut module, &ProgressBar::hidden());

        assert!(oracle.calls.lock().unwrap().is_empty());
    }
}
