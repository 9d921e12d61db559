//! Workspace - the project registry and repository list.
//!
//! The workspace owns its projects; each project refers back through a
//! `Weak` handle, so dropping the last `Arc<Workspace>` frees everything.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use parking_lot::RwLock;

use crate::builder::archive::ArchiveProducer;
use crate::builder::producer::ArtifactProducer;
use crate::core::contributor::{ContributorRegistry, DependencyContributor};
use crate::core::locks::LockRegistry;
use crate::core::manifest::{
    ProjectManifest, WorkspaceManifest, WorkspaceSection, MANIFEST_NAME,
};
use crate::core::project::Project;
use crate::core::version::Version;
use crate::sources::registry::SourceRegistry;
use crate::sources::source::RepositorySource;
use crate::util::{Config, GlobalContext};

/// Pluggable pieces a workspace is opened with.
pub struct WorkspaceOptions {
    pub sources: SourceRegistry,
    pub contributors: ContributorRegistry,
    pub producer: Arc<dyn ArtifactProducer>,
    pub config: Config,
}

impl Default for WorkspaceOptions {
    fn default() -> Self {
        WorkspaceOptions {
            sources: SourceRegistry::new(),
            contributors: ContributorRegistry::new(),
            producer: Arc::new(ArchiveProducer::new()),
            config: Config::default(),
        }
    }
}

pub struct Workspace {
    root: PathBuf,
    manifest: WorkspaceManifest,
    config: Config,
    offline: AtomicBool,
    repositories: Vec<Arc<dyn RepositorySource>>,
    contributors: Vec<Arc<dyn DependencyContributor>>,
    producer: Arc<dyn ArtifactProducer>,
    projects: RwLock<BTreeMap<String, Arc<Project>>>,
    locks: LockRegistry,
}

impl Workspace {
    /// Open the workspace enclosing the context's working directory.
    pub fn load(gctx: &GlobalContext) -> Result<Arc<Self>> {
        let root = gctx.find_workspace_root()?;
        let options = WorkspaceOptions {
            config: gctx.load_config(&root),
            ..Default::default()
        };
        let workspace = Self::open(&root, options)?;
        if gctx.is_offline() {
            workspace.set_offline(true);
        }
        Ok(workspace)
    }

    /// Open the workspace rooted at `root`.
    pub fn open(root: &Path, options: WorkspaceOptions) -> Result<Arc<Self>> {
        let root = root.to_path_buf();
        let manifest = WorkspaceManifest::load(&root.join(MANIFEST_NAME))?;

        let mut config = options.config;
        config.apply_manifest(&manifest.workspace);

        let repositories = manifest
            .repositories
            .iter()
            .map(|r| {
                options
                    .sources
                    .create(r, &root)
                    .with_context(|| format!("failed to set up repository `{}`", r.name))
            })
            .collect::<Result<Vec<_>>>()?;

        let active = manifest
            .workspace
            .contributors
            .clone()
            .unwrap_or_else(|| vec!["shared".to_string()]);
        let contributors = options.contributors.activate(&active);

        let members = discover_members(&root, &manifest.workspace)?;
        tracing::debug!(
            "workspace {}: {} projects, {} repositories",
            root.display(),
            members.len(),
            repositories.len()
        );

        let offline = AtomicBool::new(config.offline());
        Ok(Arc::new_cyclic(|weak| {
            let projects = members
                .into_iter()
                .map(|(name, dir)| {
                    let project = Arc::new(Project::new(name.clone(), dir, weak.clone()));
                    (name, project)
                })
                .collect();

            Workspace {
                root,
                manifest,
                config,
                offline,
                repositories,
                contributors,
                producer: options.producer,
                projects: RwLock::new(projects),
                locks: LockRegistry::new(),
            }
        }))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub(crate) fn locks(&self) -> &LockRegistry {
        &self.locks
    }

    pub fn manifest(&self) -> &WorkspaceManifest {
        &self.manifest
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::Relaxed)
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Relaxed);
    }

    pub fn lock_timeout(&self) -> Duration {
        self.config.lock_timeout()
    }

    pub fn fetch_timeout(&self) -> Duration {
        self.config.fetch_timeout()
    }

    /// Repositories in registration order.
    pub fn repositories(&self) -> &[Arc<dyn RepositorySource>] {
        &self.repositories
    }

    pub fn repository(&self, name: &str) -> Option<Arc<dyn RepositorySource>> {
        self.repositories.iter().find(|r| r.name() == name).cloned()
    }

    /// The named repository, or the first writable one.
    pub fn writable_repository(&self, name: Option<&str>) -> Result<Arc<dyn RepositorySource>> {
        match name {
            Some(name) => {
                let Some(repo) = self.repository(name) else {
                    bail!("no repository named `{}`", name);
                };
                if !repo.can_write() {
                    bail!("repository `{}` is read-only", name);
                }
                Ok(repo)
            }
            None => self
                .repositories
                .iter()
                .find(|r| r.can_write())
                .cloned()
                .context("no writable repository is configured"),
        }
    }

    pub fn contributors(&self) -> &[Arc<dyn DependencyContributor>] {
        &self.contributors
    }

    /// Names every project depends on through the `shared` contributor.
    pub fn shared_dependson(&self) -> &[String] {
        &self.manifest.workspace.dependson
    }

    pub fn producer(&self) -> &Arc<dyn ArtifactProducer> {
        &self.producer
    }

    pub fn project(&self, name: &str) -> Option<Arc<Project>> {
        self.projects.read().get(name).cloned()
    }

    /// All projects, sorted by name.
    pub fn projects(&self) -> Vec<Arc<Project>> {
        self.projects.read().values().cloned().collect()
    }

    pub fn project_names(&self) -> Vec<String> {
        self.projects.read().keys().cloned().collect()
    }

    /// The project whose directory contains `path`.
    pub fn project_for_path(&self, path: &Path) -> Option<Arc<Project>> {
        self.projects
            .read()
            .values()
            .filter(|p| path.starts_with(p.base()))
            .max_by_key(|p| p.base().components().count())
            .cloned()
    }

    /// Unregister a project. Every other project is invalidated, since its
    /// paths may refer to the removed one.
    pub fn remove_project(&self, name: &str) -> Option<Arc<Project>> {
        let removed = self.projects.write().remove(name)?;
        for project in self.projects() {
            project.set_changed();
        }
        tracing::debug!("removed project {}", name);
        Some(removed)
    }

    /// Valid workspace projects producing `bsn`, with the version they produce.
    pub fn local_providers(&self, bsn: &str) -> Vec<(Version, Arc<Project>)> {
        self.projects()
            .into_iter()
            .filter(|p| p.is_valid())
            .filter_map(|p| {
                let version = p.versions().get(bsn).cloned()?;
                Some((version, p))
            })
            .collect()
    }

    pub fn local_versions(&self, bsn: &str) -> BTreeSet<Version> {
        self.local_providers(bsn)
            .into_iter()
            .map(|(version, _)| version)
            .collect()
    }
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace")
            .field("root", &self.root)
            .field("projects", &self.project_names())
            .finish()
    }
}

/// Find project directories matched by `members` and not by `exclude`.
///
/// A directory qualifies when its manifest exists and is not a bare
/// workspace manifest. Manifests that fail to parse are still registered
/// so the project reports itself invalid.
fn discover_members(root: &Path, section: &WorkspaceSection) -> Result<Vec<(String, PathBuf)>> {
    let excludes = section
        .exclude
        .iter()
        .map(|p| glob::Pattern::new(p).with_context(|| format!("invalid exclude pattern `{}`", p)))
        .collect::<Result<Vec<_>>>()?;

    let mut found: BTreeMap<String, PathBuf> = BTreeMap::new();
    for pattern in &section.members {
        let full = root.join(pattern);
        let entries = glob::glob(&full.to_string_lossy())
            .with_context(|| format!("invalid member pattern `{}`", pattern))?;

        for entry in entries {
            let dir = match entry {
                Ok(dir) => dir,
                Err(e) => {
                    tracing::warn!("skipping unreadable member: {}", e);
                    continue;
                }
            };
            if !dir.is_dir() || dir == root {
                continue;
            }

            let relative = dir.strip_prefix(root).unwrap_or(&dir);
            if excludes.iter().any(|p| p.matches_path(relative)) {
                continue;
            }

            let manifest = dir.join(MANIFEST_NAME);
            if !manifest.is_file() {
                continue;
            }
            if let Ok(None) = ProjectManifest::load(&manifest) {
                tracing::debug!("{} has no [project] table, skipping", manifest.display());
                continue;
            }

            let Some(name) = dir.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                continue;
            };
            if let Some(existing) = found.get(&name) {
                if existing != &dir {
                    tracing::warn!(
                        "project name `{}` is used by both {} and {}, keeping the first",
                        name,
                        existing.display(),
                        dir.display()
                    );
                }
                continue;
            }
            found.insert(name, dir);
        }
    }

    Ok(found.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::WorkspaceFixture;

    #[test]
    fn test_members_and_excludes() {
        let fx = WorkspaceFixture::new();
        fx.workspace_toml("members = [\"*\", \"nested/*\"]\nexclude = [\"scratch\"]\n");
        fx.project("app", "");
        fx.project("nested/lib", "");
        fx.project("scratch", "");
        fx.file("notes/readme.txt", "not a project");
        fx.file("plain/Quay.toml", "[workspace]\n");
        let ws = fx.open();

        assert_eq!(ws.project_names(), vec!["app", "lib"]);
        assert_eq!(ws.project("lib").unwrap().base(), fx.root().join("nested/lib"));
    }

    #[test]
    fn test_remove_project_invalidates_others() {
        let fx = WorkspaceFixture::new();
        fx.project("a", "");
        fx.project("b", "[paths]\ndependson = \"a\"\n");
        let ws = fx.open();
        let b = ws.project("b").unwrap();
        assert_eq!(b.dependson().unwrap().len(), 1);

        assert!(ws.remove_project("a").is_some());
        assert!(ws.project("a").is_none());
        assert!(!b.is_prepared());
        assert!(b.dependson().unwrap().is_empty());
        assert!(ws.remove_project("a").is_none());
    }

    #[test]
    fn test_local_versions_skip_no_output() {
        let fx = WorkspaceFixture::new();
        fx.project("api", "version = \"2.1\"\n");
        fx.project("docs", "no-output = true\n");
        let ws = fx.open();

        assert_eq!(
            ws.local_versions("api").into_iter().collect::<Vec<_>>(),
            vec![Version::new(2, 1, 0)]
        );
        assert!(ws.local_versions("docs").is_empty());
    }

    #[test]
    fn test_writable_repository_selection() {
        let fx = WorkspaceFixture::new();
        fx.workspace_toml(
            "[[repository]]\nname = \"cache\"\nkind = \"flat\"\npath = \"cache\"\n\n\
             [[repository]]\nname = \"local\"\nkind = \"dir\"\npath = \"local\"\n",
        );
        let ws = fx.open();

        assert_eq!(ws.writable_repository(None).unwrap().name(), "local");
        assert!(ws.writable_repository(Some("cache")).is_err());
        assert!(ws.writable_repository(Some("nope")).is_err());
    }

    #[test]
    fn test_unknown_repository_kind() {
        let fx = WorkspaceFixture::new();
        fx.workspace_toml("[[repository]]\nname = \"x\"\nkind = \"ftp\"\npath = \"x\"\n");
        let err = Workspace::open(fx.root(), WorkspaceOptions::default()).unwrap_err();
        assert!(format!("{:#}", err).contains("repository `x`"));
    }

    #[test]
    fn test_project_for_path() {
        let fx = WorkspaceFixture::new();
        fx.project("app", "");
        let ws = fx.open();
        let found = ws.project_for_path(&fx.root().join("app/src/Main.java"));
        assert_eq!(found.unwrap().name(), "app");
        assert!(ws.project_for_path(fx.root()).is_none());
    }
}
