//! Repository sources.
//!
//! Sources list the versions they hold for a symbolic name and materialize
//! one version as a file. They are consulted in registration order.

pub mod blocker;
pub mod directory;
pub mod flat;
pub mod registry;
pub mod source;

pub use blocker::{BlockerState, DownloadBlocker};
pub use directory::DirectoryRepository;
pub use flat::FlatRepository;
pub use registry::SourceRegistry;
pub use source::{Fetched, PutOptions, RepositorySource};
