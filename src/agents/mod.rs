pub mod dependency_resolver;
pub mod go_command;
pub mod project_scanner;
pub mod source_fetcher;

pub use dependency_resolver::{VersionResolver, resolution_progress};
pub use go_command::GoCommandAgent;
pub use project_scanner::ProjectScannerAgent;
pub use source_fetcher::{GitSourceFetcher, LocalSourceFetcher, SourceFetcher};
