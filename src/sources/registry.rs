//! Repository kind registry - maps a `kind` name to a source factory.
//!
//! Construction never touches the filesystem; a factory runs only when a
//! workspace instantiates a configured `[[repository]]`.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Result};

use crate::core::manifest::RepositoryConfig;
use crate::sources::directory::DirectoryRepository;
use crate::sources::flat::FlatRepository;
use crate::sources::source::RepositorySource;

/// Builds a repository source from its configuration.
///
/// The second argument is the workspace root that relative paths are
/// resolved against.
pub type SourceFactory =
    Box<dyn Fn(&RepositoryConfig, &Path) -> Result<Arc<dyn RepositorySource>> + Send + Sync>;

/// Registry of repository kinds.
pub struct SourceRegistry {
    factories: HashMap<String, SourceFactory>,
}

impl SourceRegistry {
    /// Create a registry with the built-in `dir` and `flat` kinds.
    pub fn new() -> Self {
        let mut registry = SourceRegistry {
            factories: HashMap::new(),
        };

        registry.register("dir", |config, root| {
            let repo = DirectoryRepository::new(&config.name, root.join(&config.path));
            let repo = if config.writable.unwrap_or(true) {
                repo
            } else {
                repo.read_only()
            };
            Ok(Arc::new(repo) as Arc<dyn RepositorySource>)
        });

        registry.register("flat", |config, root| {
            if config.writable == Some(true) {
                bail!("repository `{}`: kind `flat` cannot be writable", config.name);
            }
            Ok(Arc::new(FlatRepository::new(&config.name, root.join(&config.path)))
                as Arc<dyn RepositorySource>)
        });

        registry
    }

    /// Register a factory for a repository kind, replacing any previous one.
    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn(&RepositoryConfig, &Path) -> Result<Arc<dyn RepositorySource>>
            + Send
            + Sync
            + 'static,
    {
        self.factories.insert(kind.into(), Box::new(factory));
    }

    /// Instantiate a configured repository.
    pub fn create(&self, config: &RepositoryConfig, root: &Path) -> Result<Arc<dyn RepositorySource>> {
        match self.factories.get(&config.kind) {
            Some(factory) => factory(config, root),
            None => {
                let mut known: Vec<_> = self.kinds().collect();
                known.sort();
                bail!(
                    "repository `{}` has unknown kind `{}` (known kinds: {})",
                    config.name,
                    config.kind,
                    known.join(", ")
                )
            }
        }
    }

    /// Get all registered kind names.
    pub fn kinds(&self) -> impl Iterator<Item = &str> + '_ {
        self.factories.keys().map(String::as_str)
    }

    /// Check if a kind is registered.
    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
