//! Building and incremental rebuild decisions.
//!
//! Producing artifacts is delegated to an [`ArtifactProducer`]; this module
//! decides when to call it and remembers what it wrote.

pub mod archive;
pub mod buildfiles;
pub mod producer;
pub mod staleness;

use std::path::PathBuf;

pub use archive::ArchiveProducer;
pub use buildfiles::BuildFilesRecord;
pub use producer::{ArtifactProducer, OutputTarget, ProduceOutcome, ProduceRequest};
pub use staleness::is_stale;

/// What `Project::build` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// The project produces nothing
    NoOutput,
    /// Outputs were current and kept
    Fresh(Vec<PathBuf>),
    /// Outputs were produced now
    Built(Vec<PathBuf>),
}

impl BuildOutcome {
    pub fn was_built(&self) -> bool {
        matches!(self, BuildOutcome::Built(_))
    }

    pub fn files(&self) -> &[PathBuf] {
        match self {
            BuildOutcome::NoOutput => &[],
            BuildOutcome::Fresh(files) | BuildOutcome::Built(files) => files,
        }
    }

    pub fn into_files(self) -> Vec<PathBuf> {
        match self {
            BuildOutcome::NoOutput => Vec::new(),
            BuildOutcome::Fresh(files) | BuildOutcome::Built(files) => files,
        }
    }
}
