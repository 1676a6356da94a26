pub mod model;
pub mod parser;
pub mod version;

pub use model::{DependencyRecord, ModuleDescriptor, UpdateStatus};
pub use parser::ManifestParser;
pub use version::VersionComparator;
