//! Dependency contributors - pluggable sources of `dependson` names.
//!
//! Contributors run at the start of dependency-name resolution and add
//! project names (or name patterns) ahead of the project's own
//! `[paths] dependson` declarations.

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::project::Project;
use crate::core::workspace::Workspace;

/// Adds dependency names to a project being prepared.
pub trait DependencyContributor: Send + Sync {
    /// Registry name used in the workspace `contributors` list.
    fn name(&self) -> &str;

    /// Append names for `project`.
    fn contribute(&self, workspace: &Workspace, project: &Project, names: &mut Vec<String>);
}

/// Adds the workspace-wide `dependson` list to every project.
#[derive(Debug, Default)]
pub struct SharedContributor;

impl DependencyContributor for SharedContributor {
    fn name(&self) -> &str {
        "shared"
    }

    fn contribute(&self, workspace: &Workspace, project: &Project, names: &mut Vec<String>) {
        for name in workspace.shared_dependson() {
            if name != project.name() {
                names.push(name.clone());
            }
        }
    }
}

/// Registry of contributors by name.
#[derive(Clone)]
pub struct ContributorRegistry {
    contributors: HashMap<String, Arc<dyn DependencyContributor>>,
}

impl ContributorRegistry {
    /// Create a registry holding the built-in `shared` contributor.
    pub fn new() -> Self {
        let mut registry = ContributorRegistry {
            contributors: HashMap::new(),
        };
        registry.register(Arc::new(SharedContributor));
        registry
    }

    /// Register a contributor, replacing one with the same name.
    pub fn register(&mut self, contributor: Arc<dyn DependencyContributor>) {
        self.contributors
            .insert(contributor.name().to_string(), contributor);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn DependencyContributor>> {
        self.contributors.get(name).cloned()
    }

    /// Look up the named contributors in order.
    ///
    /// Unknown names are logged and skipped.
    pub fn activate(&self, names: &[String]) -> Vec<Arc<dyn DependencyContributor>> {
        names
            .iter()
            .filter_map(|name| {
                let found = self.get(name);
                if found.is_none() {
                    tracing::warn!("unknown dependency contributor `{}`", name);
                }
                found
            })
            .collect()
    }
}

impl Default for ContributorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
