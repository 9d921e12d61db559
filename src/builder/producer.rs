//! Artifact production interface.
//!
//! Turning resolved inputs into artifacts is owned by an external
//! collaborator. The orchestrator hands it fully resolved, de-duplicated
//! paths and gets back the produced files and an ok/not-ok status.

use std::path::PathBuf;

use anyhow::Result;
use serde::Serialize;

use crate::core::Version;

/// One artifact the producer is asked to write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputTarget {
    pub bsn: String,
    pub version: Version,
    /// Where the artifact must be written
    pub file: PathBuf,
}

/// Everything a producer needs to build one project.
#[derive(Debug, Clone, Serialize)]
pub struct ProduceRequest {
    pub project: String,
    pub base: PathBuf,
    pub output_dir: PathBuf,
    pub target_dir: PathBuf,
    pub targets: Vec<OutputTarget>,
    pub buildpath: Vec<PathBuf>,
    pub testpath: Vec<PathBuf>,
    pub bootclasspath: Vec<PathBuf>,
    pub sourcepath: Vec<PathBuf>,
    /// Build for testing rather than release
    pub under_test: bool,
}

/// Result of a production run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProduceOutcome {
    pub ok: bool,
    pub artifacts: Vec<PathBuf>,
    pub messages: Vec<String>,
}

impl ProduceOutcome {
    pub fn success(artifacts: Vec<PathBuf>) -> Self {
        ProduceOutcome {
            ok: true,
            artifacts,
            messages: Vec::new(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        ProduceOutcome {
            ok: false,
            artifacts: Vec::new(),
            messages: vec![message.into()],
        }
    }
}

/// Produces a project's artifacts from resolved inputs.
///
/// `Err` is reserved for infrastructure failures; a build that ran but
/// failed returns `Ok` with `ok == false`.
pub trait ArtifactProducer: Send + Sync {
    fn name(&self) -> &str;

    fn produce(&self, request: &ProduceRequest) -> Result<ProduceOutcome>;
}
