//! Test utilities for quay unit tests.
//!
//! Provides a temporary-workspace builder, an in-memory-counted repository
//! and a producer that records what it was asked to build.
//!
//! # Example
//!
//! ```rust,ignore
//! use crate::test_support::{CountingRepository, WorkspaceFixture};
//!
//! let fx = WorkspaceFixture::new();
//! fx.project("app", "[paths]\nbuildpath = \"util;version=1.0\"\n");
//! let repo = Arc::new(CountingRepository::new("R", &fx.root().join("R")).with("util", &["1.0"]));
//! let ws = fx.open_with_repos(&[repo.clone()]);
//! ```

pub mod fixtures;

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::SystemTime;

use anyhow::Result;
use parking_lot::Mutex;

use crate::builder::producer::{ArtifactProducer, ProduceOutcome, ProduceRequest};
use crate::core::Version;
use crate::sources::source::{Fetched, RepositorySource};

pub use fixtures::*;

/// Set the modification time of a file.
pub fn set_mtime(path: &Path, time: SystemTime) {
    File::options()
        .write(true)
        .open(path)
        .and_then(|f| f.set_modified(time))
        .unwrap_or_else(|e| panic!("failed to set mtime of {}: {}", path.display(), e));
}

/// A repository backed by real files that counts every query.
#[derive(Debug)]
pub struct CountingRepository {
    name: String,
    root: PathBuf,
    listable: bool,
    artifacts: BTreeMap<String, BTreeMap<Version, PathBuf>>,
    get_calls: AtomicUsize,
    version_calls: AtomicUsize,
}

impl CountingRepository {
    pub fn new(name: &str, root: &Path) -> Self {
        CountingRepository {
            name: name.to_string(),
            root: root.to_path_buf(),
            listable: true,
            artifacts: BTreeMap::new(),
            get_calls: AtomicUsize::new(0),
            version_calls: AtomicUsize::new(0),
        }
    }

    /// Add `<root>/<bsn>/<bsn>-<version>.jar` for every version.
    pub fn with(mut self, bsn: &str, versions: &[&str]) -> Self {
        for v in versions {
            self = self.with_file(bsn, v, ".jar", v);
        }
        self
    }

    /// Add one artifact with the given extension and content.
    pub fn with_file(mut self, bsn: &str, version: &str, extension: &str, contents: &str) -> Self {
        let dir = self.root.join(bsn);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(format!("{}-{}{}", bsn, version, extension));
        std::fs::write(&path, contents).unwrap();

        let version = Version::parse(version).unwrap();
        self.artifacts
            .entry(bsn.to_string())
            .or_default()
            .insert(version, path);
        self
    }

    /// Refuse to enumerate versions, like a probe-only source.
    pub fn unlistable(mut self) -> Self {
        self.listable = false;
        self
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn version_calls(&self) -> usize {
        self.version_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.get_calls() + self.version_calls()
    }
}

impl RepositorySource for CountingRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn can_write(&self) -> bool {
        false
    }

    fn versions(&self, bsn: &str) -> Result<Option<BTreeSet<Version>>> {
        self.version_calls.fetch_add(1, Ordering::SeqCst);
        if !self.listable {
            return Ok(None);
        }
        Ok(Some(
            self.artifacts
                .get(bsn)
                .map(|v| v.keys().cloned().collect())
                .unwrap_or_default(),
        ))
    }

    fn get(
        &self,
        bsn: &str,
        version: &Version,
        _attrs: &BTreeMap<String, String>,
    ) -> Result<Option<Fetched>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .artifacts
            .get(bsn)
            .and_then(|v| v.get(version))
            .map(Fetched::local))
    }

    fn location(&self) -> String {
        self.root.display().to_string()
    }
}

/// A producer that writes a small text file per target and remembers
/// every request, in call order.
#[derive(Debug, Default)]
pub struct RecordingProducer {
    requests: Mutex<Vec<ProduceRequest>>,
    fail: Mutex<BTreeSet<String>>,
}

impl RecordingProducer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later build of `project` report failure.
    pub fn fail_on(&self, project: &str) {
        self.fail.lock().insert(project.to_string());
    }

    pub fn requests(&self) -> Vec<ProduceRequest> {
        self.requests.lock().clone()
    }

    /// Names of the built projects in call order.
    pub fn built(&self) -> Vec<String> {
        self.requests.lock().iter().map(|r| r.project.clone()).collect()
    }
}

impl ArtifactProducer for RecordingProducer {
    fn name(&self) -> &str {
        "recording"
    }

    fn produce(&self, request: &ProduceRequest) -> Result<ProduceOutcome> {
        self.requests.lock().push(request.clone());
        if self.fail.lock().contains(&request.project) {
            return Ok(ProduceOutcome::failure("asked to fail"));
        }

        let mut artifacts = Vec::new();
        for target in &request.targets {
            if let Some(parent) = target.file.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&target.file, format!("{} {}", target.bsn, target.version))?;
            artifacts.push(target.file.clone());
        }
        Ok(ProduceOutcome::success(artifacts))
    }
}
