//! Temporary workspace fixtures.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::anyhow;
use tempfile::TempDir;

use crate::builder::producer::ArtifactProducer;
use crate::core::workspace::{Workspace, WorkspaceOptions};
use crate::core::MANIFEST_NAME;
use crate::sources::source::RepositorySource;
use crate::sources::SourceRegistry;
use crate::test_support::CountingRepository;

/// A workspace in a temporary directory.
///
/// The root manifest is `[workspace]` followed by whatever was passed to
/// [`WorkspaceFixture::workspace_toml`]; `open_with_repos` appends one
/// `[[repository]]` of kind `mock` per repository.
pub struct WorkspaceFixture {
    dir: TempDir,
    extra: RefCell<String>,
}

impl WorkspaceFixture {
    pub fn new() -> Self {
        let fx = WorkspaceFixture {
            dir: TempDir::new().unwrap(),
            extra: RefCell::new(String::new()),
        };
        fx.write_root("");
        fx
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Replace the `[workspace]` body.
    pub fn workspace_toml(&self, extra: &str) {
        *self.extra.borrow_mut() = extra.to_string();
        self.write_root("");
    }

    fn write_root(&self, repositories: &str) {
        let content = format!("[workspace]\n{}{}", self.extra.borrow(), repositories);
        std::fs::write(self.root().join(MANIFEST_NAME), content).unwrap();
    }

    /// Create a project directory with `[project]` followed by `body`.
    pub fn project(&self, name: &str, body: &str) -> PathBuf {
        let base = self.root().join(name);
        std::fs::create_dir_all(base.join("src")).unwrap();
        std::fs::write(base.join(MANIFEST_NAME), format!("[project]\n{}", body)).unwrap();
        base
    }

    /// Write a file relative to the root, creating parents.
    pub fn file(&self, rel: &str, contents: &str) -> PathBuf {
        let path = self.root().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, contents).unwrap();
        path
    }

    pub fn open(&self) -> Arc<Workspace> {
        self.write_root("");
        Workspace::open(self.root(), WorkspaceOptions::default()).unwrap()
    }

    pub fn open_with_producer(&self, producer: Arc<dyn ArtifactProducer>) -> Arc<Workspace> {
        self.write_root("");
        let options = WorkspaceOptions {
            producer,
            ..Default::default()
        };
        Workspace::open(self.root(), options).unwrap()
    }

    /// Open with mock repositories, registered in the given order.
    pub fn open_with_repos(&self, repos: &[Arc<CountingRepository>]) -> Arc<Workspace> {
        let mut entries = String::new();
        let mut by_name = HashMap::new();
        for repo in repos {
            entries.push_str(&format!(
                "\n[[repository]]\nname = \"{}\"\nkind = \"mock\"\npath = \"{}\"\n",
                repo.name(),
                repo.name()
            ));
            by_name.insert(repo.name().to_string(), repo.clone());
        }
        self.write_root(&entries);

        let mut sources = SourceRegistry::new();
        sources.register("mock", move |config, _root| {
            by_name
                .get(&config.name)
                .cloned()
                .map(|r| r as Arc<dyn RepositorySource>)
                .ok_or_else(|| anyhow!("no mock repository named `{}`", config.name))
        });

        let options = WorkspaceOptions {
            sources,
            ..Default::default()
        };
        Workspace::open(self.root(), options).unwrap()
    }
}

impl Default for WorkspaceFixture {
    fn default() -> Self {
        Self::new()
    }
}
