use crate::error::Result;
use crate::gomod::{DependencyRecord, ModuleDescriptor};
use std::path::Path;

pub mod factory;
pub mod go_list;
pub mod go_proxy;

pub use factory::OracleFactory;
pub use go_list::GoListOracle;
pub use go_proxy::GoProxyOracle;

/// What an oracle may consult besides the dependency itself: the module
/// directory and the parsed manifest (for replace and exclude directives).
#[derive(Debug, Clone, Copy)]
pub struct QueryContext<'a> {
    pub module_root: &'a Path,
    pub module: &'a ModuleDescriptor,
}

/// Source of truth for newer dependency versions.
///
/// `Ok(None)` means the oracle knows of no newer version; an error means the
/// check could not be completed.
pub trait VersionOracle: Send + Sync {
    fn latest_version(
        &self,
        context: &QueryContext<'_>,
        dependency: &DependencyRecord,
    ) -> Result<Option<String>>;
}
