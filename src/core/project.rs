//! Project - one buildable unit and the paths prepared for it.
//!
//! `prepare()` resolves every declared path into an immutable
//! [`ResolvedPaths`] snapshot. The snapshot is cached until the project is
//! invalidated; readers always see a complete snapshot, old or new.
//!
//! Preparation of one project is exclusive (a per-project re-entrant lock),
//! but different projects prepare concurrently. Cycles are detected through
//! the [`PrepareContext`] trail that is passed down the recursive calls, and
//! across threads by the workspace's lock registry.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs::File;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, OnceLock, Weak};
use std::time::SystemTime;

use anyhow::{anyhow, bail, Context, Result};
use parking_lot::{ReentrantMutex, ReentrantMutexGuard, RwLock};

use crate::builder::buildfiles::BuildFilesRecord;
use crate::builder::producer::{OutputTarget, ProduceRequest};
use crate::builder::staleness;
use crate::builder::BuildOutcome;
use crate::core::container::{Container, ContainerKind};
use crate::core::manifest::{PathKind, ProjectManifest, MANIFEST_NAME};
use crate::core::version::{RangeToken, Version};
use crate::core::workspace::Workspace;
use crate::resolver::declaration;
use crate::resolver::errors::PrepareError;
use crate::resolver::graph;
use crate::resolver::path::{default_strategy, partition, PartitionOptions, PathBuilder};
use crate::sources::source::{split_artifact_name, PutOptions};
use crate::util::diagnostic::{Diagnostic, Reporter};
use crate::util::fs::{mtime, newest_mtime, normalize_path, remove_dir_all_if_exists};

/// The chain of projects currently being prepared.
#[derive(Debug, Default)]
pub struct PrepareContext {
    trail: Vec<String>,
}

impl PrepareContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trail(&self) -> &[String] {
        &self.trail
    }

    pub fn contains(&self, name: &str) -> bool {
        self.trail.iter().any(|n| n == name)
    }

    fn cycle(&self, name: &str) -> PrepareError {
        let mut trail = self.trail.clone();
        trail.push(name.to_string());
        PrepareError::CircularDependency { trail }
    }

    /// Run `f` with `name` pushed on the trail. The entry is popped on
    /// every exit path.
    fn enter<T>(&mut self, name: &str, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.trail.push(name.to_string());
        let result = f(self);
        self.trail.pop();
        result
    }
}

/// A path computed on first access.
#[derive(Debug, Clone, Default)]
pub struct LazyPath {
    pub containers: Vec<Container>,
    pub diagnostics: Vec<Diagnostic>,
}

/// A held project lock, registered with the workspace while alive.
struct ProjectLock<'a> {
    name: &'a str,
    workspace: Arc<Workspace>,
    _guard: ReentrantMutexGuard<'a, ()>,
}

impl Drop for ProjectLock<'_> {
    fn drop(&mut self) {
        self.workspace.locks().released(self.name);
    }
}

/// Everything `prepare()` derives for a project.
#[derive(Debug)]
pub struct ResolvedPaths {
    /// Project revision this snapshot was computed from
    pub revision: u64,
    /// Transitive dependency closure, dependencies first
    pub dependson: Vec<Arc<Project>>,
    pub buildpath: Vec<Container>,
    pub testpath: Vec<Container>,
    pub bootclasspath: Vec<Container>,
    pub sourcepath: Vec<PathBuf>,
    /// Own source path followed by those of every dependency
    pub allsourcepath: Vec<PathBuf>,
    pub output: PathBuf,
    pub target: PathBuf,
    pub run_storage: Option<PathBuf>,
    /// ERROR containers kept off the paths
    pub errors: Vec<Container>,
    pub diagnostics: Vec<Diagnostic>,
    runpath: OnceLock<LazyPath>,
    runbundles: OnceLock<LazyPath>,
    runfw: OnceLock<LazyPath>,
}

impl ResolvedPaths {
    fn slot(&self, kind: PathKind) -> Option<&OnceLock<LazyPath>> {
        match kind {
            PathKind::Runpath => Some(&self.runpath),
            PathKind::Runbundles => Some(&self.runbundles),
            PathKind::Runfw => Some(&self.runfw),
            PathKind::Buildpath | PathKind::Testpath => None,
        }
    }

    /// Whether a run path has been computed for this snapshot.
    pub fn has_computed(&self, kind: PathKind) -> bool {
        self.slot(kind).is_some_and(|s| s.get().is_some())
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }
}

struct ProjectState {
    manifest: Option<ProjectManifest>,
    manifest_error: Option<String>,
    manifest_mtime: Option<SystemTime>,
    revision: u64,
    paths: Option<Arc<ResolvedPaths>>,
    build_files: Option<Vec<PathBuf>>,
    versions: Option<Arc<BTreeMap<String, Version>>>,
}

/// A buildable unit of the workspace.
pub struct Project {
    name: String,
    base: PathBuf,
    workspace: Weak<Workspace>,
    lock: ReentrantMutex<()>,
    state: RwLock<ProjectState>,
}

fn read_manifest(path: &Path) -> (Option<ProjectManifest>, Option<String>) {
    match ProjectManifest::load(path) {
        Ok(Some(m)) => (Some(m), None),
        Ok(None) => (None, Some(format!("{} has no [project] table", path.display()))),
        Err(e) => (None, Some(format!("{:#}", e))),
    }
}

/// Whether `dir` is strictly below `base`, judged lexically.
fn strictly_inside(dir: &Path, base: &Path) -> bool {
    dir != base
        && dir.starts_with(base)
        && !dir.components().any(|c| c == Component::ParentDir)
}

fn create_dir(path: &Path, role: &'static str) -> Result<(), PrepareError> {
    std::fs::create_dir_all(path).map_err(|source| PrepareError::CreateDirectory {
        role,
        path: path.to_path_buf(),
        source,
    })
}

impl Project {
    pub(crate) fn new(name: String, base: PathBuf, workspace: Weak<Workspace>) -> Self {
        let manifest_path = base.join(MANIFEST_NAME);
        let (manifest, manifest_error) = read_manifest(&manifest_path);
        Project {
            name,
            base,
            workspace,
            lock: ReentrantMutex::new(()),
            state: RwLock::new(ProjectState {
                manifest,
                manifest_error,
                manifest_mtime: mtime(&manifest_path),
                revision: 0,
                paths: None,
                build_files: None,
                versions: None,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.base.join(MANIFEST_NAME)
    }

    /// A copy of the current configuration, `None` if it failed to load.
    pub fn manifest(&self) -> Option<ProjectManifest> {
        self.state.read().manifest.clone()
    }

    pub fn workspace(&self) -> Result<Arc<Workspace>> {
        self.workspace
            .upgrade()
            .ok_or_else(|| anyhow!("workspace of project `{}` has been dropped", self.name))
    }

    /// The base directory and a loadable manifest both exist.
    pub fn is_valid(&self) -> bool {
        self.base.is_dir() && self.manifest_path().is_file() && self.state.read().manifest.is_some()
    }

    fn invalid(&self) -> PrepareError {
        let reason = if !self.base.is_dir() {
            format!("base directory {} does not exist", self.base.display())
        } else if !self.manifest_path().is_file() {
            format!("{} is missing", self.manifest_path().display())
        } else {
            self.state
                .read()
                .manifest_error
                .clone()
                .unwrap_or_else(|| "manifest could not be loaded".to_string())
        };
        PrepareError::InvalidProject {
            name: self.name.clone(),
            reason,
        }
    }

    fn section<T>(&self, f: impl FnOnce(&crate::core::manifest::ProjectSection) -> T) -> T {
        let state = self.state.read();
        match &state.manifest {
            Some(m) => f(&m.project),
            None => f(&Default::default()),
        }
    }

    pub fn no_output(&self) -> bool {
        self.section(|s| s.no_output)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.section(|s| self.base.join(&s.bin))
    }

    pub fn target_dir(&self) -> PathBuf {
        self.section(|s| self.base.join(&s.target))
    }

    pub fn test_output_dir(&self) -> PathBuf {
        self.section(|s| self.base.join(&s.test_bin))
    }

    pub fn src_dir(&self) -> PathBuf {
        self.section(|s| self.base.join(&s.src))
    }

    pub fn test_src_dir(&self) -> PathBuf {
        self.section(|s| self.base.join(&s.test_src))
    }

    pub fn revision(&self) -> u64 {
        self.state.read().revision
    }

    pub fn is_prepared(&self) -> bool {
        self.state.read().paths.is_some()
    }

    pub fn is_offline(&self) -> bool {
        self.workspace.upgrade().is_some_and(|w| w.is_offline())
    }

    /// Newest modification time of the manifest and the source tree.
    pub fn last_modified(&self) -> Option<SystemTime> {
        let manifest = mtime(&self.manifest_path());
        let sources = newest_mtime(&self.src_dir());
        manifest.max(sources)
    }

    /// Take this project's lock.
    ///
    /// A wait that would close a cycle through locks held by other threads
    /// fails at once with a circular dependency instead of timing out.
    fn locked(&self) -> Result<ProjectLock<'_>> {
        let workspace = self.workspace()?;
        let guard = match self.lock.try_lock() {
            Some(guard) => guard,
            None => {
                if let Some(trail) = workspace.locks().wait_for(&self.name) {
                    let err = PrepareError::CircularDependency { trail };
                    tracing::warn!("{}", err);
                    return Err(err.into());
                }
                let timeout = workspace.lock_timeout();
                let guard = self.lock.try_lock_for(timeout);
                workspace.locks().stop_waiting();
                guard.ok_or(PrepareError::Locked {
                    name: self.name.clone(),
                    waited: timeout,
                })?
            }
        };
        workspace.locks().acquired(&self.name);
        Ok(ProjectLock {
            name: &self.name,
            workspace,
            _guard: guard,
        })
    }

    // ------------------------------------------------------------------
    // Deliverables
    // ------------------------------------------------------------------

    /// Symbolic names this project produces, with their versions.
    pub fn versions(&self) -> Arc<BTreeMap<String, Version>> {
        if let Some(versions) = self.state.read().versions.clone() {
            return versions;
        }

        let computed = {
            let state = self.state.read();
            let mut map = BTreeMap::new();
            if let Some(m) = &state.manifest {
                if !m.project.no_output {
                    if m.deliverables.is_empty() {
                        map.insert(self.name.clone(), m.project.version.clone());
                    }
                    for d in &m.deliverables {
                        let version = d.version.clone().unwrap_or_else(|| m.project.version.clone());
                        map.insert(d.name.clone(), version);
                    }
                }
            }
            Arc::new(map)
        };

        self.state
            .write()
            .versions
            .get_or_insert(computed)
            .clone()
    }

    /// Packaged file for one deliverable.
    pub fn output_file(&self, bsn: &str, version: &Version) -> PathBuf {
        let (target, mask) = self.section(|s| (self.base.join(&s.target), s.output_mask.clone()));
        target.join(
            mask.replace("{bsn}", bsn)
                .replace("{version}", &version.to_string()),
        )
    }

    /// Every deliverable with the file it is packaged to.
    pub fn deliverables(&self) -> Vec<OutputTarget> {
        self.versions()
            .iter()
            .map(|(bsn, version)| OutputTarget {
                bsn: bsn.clone(),
                version: version.clone(),
                file: self.output_file(bsn, version),
            })
            .collect()
    }

    /// A PROJECT container for the packaged `bsn`, if this project produces it.
    pub fn deliverable(&self, bsn: &str, attrs: &BTreeMap<String, String>) -> Option<Container> {
        let versions = self.versions();
        let version = versions.get(bsn)?;
        Some(Container::new(
            Some(&self.name),
            bsn,
            version.to_string(),
            ContainerKind::Project,
            self.output_file(bsn, version),
            attrs.clone(),
        ))
    }

    // ------------------------------------------------------------------
    // Preparation
    // ------------------------------------------------------------------

    /// Prepare with a fresh cycle-detection context.
    pub fn prepare(&self) -> Result<Arc<ResolvedPaths>> {
        self.prepare_in(&mut PrepareContext::new())
    }

    /// Prepare as part of an enclosing preparation.
    pub fn prepare_in(&self, ctx: &mut PrepareContext) -> Result<Arc<ResolvedPaths>> {
        if let Some(paths) = self.state.read().paths.clone() {
            return Ok(paths);
        }

        if !self.is_valid() {
            return Err(self.invalid().into());
        }

        if ctx.contains(&self.name) {
            let err = ctx.cycle(&self.name);
            tracing::warn!("{}", err);
            return Err(err.into());
        }

        let _guard = self.locked()?;

        if let Some(paths) = self.state.read().paths.clone() {
            return Ok(paths);
        }

        let (revision, manifest) = {
            let state = self.state.read();
            (state.revision, state.manifest.clone())
        };
        let manifest = manifest.ok_or_else(|| self.invalid())?;

        tracing::debug!("preparing {}", self.name);
        let paths = ctx.enter(&self.name, |ctx| self.resolve_paths(ctx, &manifest, revision))?;
        let paths = Arc::new(paths);

        let mut state = self.state.write();
        if state.revision == revision {
            state.paths = Some(paths.clone());
        } else {
            tracing::debug!("{} changed while preparing, not caching", self.name);
        }
        Ok(paths)
    }

    fn resolve_paths(
        &self,
        ctx: &mut PrepareContext,
        manifest: &ProjectManifest,
        revision: u64,
    ) -> Result<ResolvedPaths> {
        let workspace = self.workspace()?;
        let section = &manifest.project;
        let mut reporter = Reporter::new();

        let src = self.base.join(&section.src);
        let sourcepath = if src.is_dir() {
            vec![src]
        } else {
            vec![self.base.clone()]
        };

        let output = self.base.join(&section.bin);
        create_dir(&output, "output")?;
        let target = self.base.join(&section.target);
        create_dir(&target, "target")?;
        let run_storage = section.run_storage.as_ref().map(|p| self.base.join(p));

        let mut dependencies = self.select_dependson(&workspace, manifest, &mut reporter);

        let mut builder = PathBuilder::new(&workspace, self, &mut reporter);
        let build_entries = builder.build(
            &manifest.paths.declaration(PathKind::Buildpath),
            default_strategy(PathKind::Buildpath),
            PathKind::Buildpath.as_str(),
        );
        let test_entries = builder.build(
            &manifest.paths.declaration(PathKind::Testpath),
            default_strategy(PathKind::Testpath),
            PathKind::Testpath.as_str(),
        );
        let eager: Vec<(PathKind, Vec<Container>)> = if section.delay_run_dependencies {
            Vec::new()
        } else {
            [PathKind::Runpath, PathKind::Runbundles, PathKind::Runfw]
                .into_iter()
                .map(|kind| {
                    let entries = builder.build(
                        &manifest.paths.declaration(kind),
                        default_strategy(kind),
                        kind.as_str(),
                    );
                    (kind, entries)
                })
                .collect()
        };

        let boot = PartitionOptions {
            route_boot: true,
            no_project: false,
        };
        let build_parts = partition(build_entries, boot, "buildpath", &mut reporter);
        let test_parts = partition(test_entries, boot, "testpath", &mut reporter);

        let mut buildpath = vec![Container::new(
            Some(&self.name),
            &self.name,
            RangeToken::Project.as_str(),
            ContainerKind::Project,
            output.clone(),
            BTreeMap::new(),
        )];
        buildpath.extend(build_parts.path);
        let mut bootclasspath = build_parts.boot;
        bootclasspath.extend(test_parts.boot);
        let testpath = test_parts.path;
        let mut errors = build_parts.errors;
        errors.extend(test_parts.errors);

        let add_projects = |names: Vec<String>, dependencies: &mut Vec<String>| {
            for name in names {
                if name != self.name && !dependencies.contains(&name) {
                    dependencies.push(name);
                }
            }
        };
        add_projects(build_parts.projects, &mut dependencies);
        add_projects(test_parts.projects, &mut dependencies);

        let (runpath, runbundles, runfw) = (OnceLock::new(), OnceLock::new(), OnceLock::new());
        for (kind, entries) in eager {
            let options = PartitionOptions {
                route_boot: false,
                no_project: kind == PathKind::Runbundles,
            };
            let parts = partition(entries, options, kind.as_str(), &mut reporter);
            add_projects(parts.projects, &mut dependencies);
            errors.extend(parts.errors);
            let slot = match kind {
                PathKind::Runpath => &runpath,
                PathKind::Runbundles => &runbundles,
                _ => &runfw,
            };
            let _ = slot.set(LazyPath {
                containers: parts.path,
                diagnostics: Vec::new(),
            });
        }

        let mut visited = HashSet::from([self.name.clone()]);
        let mut dependson = Vec::new();
        for name in &dependencies {
            match workspace.project(name) {
                Some(project) => graph::traverse(&project, ctx, &mut visited, &mut dependson)?,
                None => reporter.warning(format!(
                    "`{}` depends on `{}`, which is not a workspace project",
                    self.name, name
                )),
            }
        }

        let mut allsourcepath = sourcepath.clone();
        for dependency in &dependson {
            let paths = dependency.prepare_in(ctx)?;
            for dir in &paths.sourcepath {
                if !allsourcepath.contains(dir) {
                    allsourcepath.push(dir.clone());
                }
            }
        }

        if reporter.errors() > 0 || reporter.warnings() > 0 {
            tracing::info!(
                "{}: {} errors, {} warnings while preparing",
                self.name,
                reporter.errors(),
                reporter.warnings()
            );
        }

        Ok(ResolvedPaths {
            revision,
            dependson,
            buildpath,
            testpath,
            bootclasspath,
            sourcepath,
            allsourcepath,
            output,
            target,
            run_storage,
            errors,
            diagnostics: reporter.into_diagnostics(),
            runpath,
            runbundles,
            runfw,
        })
    }

    /// Choose dependency projects from contributor names and `[paths] dependson`.
    ///
    /// Each entry is a glob over project names; a leading `!` excludes.
    /// The first pattern that matches a project decides for it.
    fn select_dependson(
        &self,
        workspace: &Workspace,
        manifest: &ProjectManifest,
        reporter: &mut Reporter,
    ) -> Vec<String> {
        let mut patterns = Vec::new();
        for contributor in workspace.contributors() {
            contributor.contribute(workspace, self, &mut patterns);
        }

        match declaration::parse(&manifest.paths.dependson()) {
            Ok(decls) => patterns.extend(decls.iter().map(|d| d.name().to_string())),
            Err(e) => reporter.error(format!("invalid dependson in `{}`: {}", self.name, e)),
        }

        let names = workspace.project_names();
        let mut decided: HashSet<String> = HashSet::new();
        let mut selected = Vec::new();

        for pattern in &patterns {
            let (negated, glob) = match pattern.strip_prefix('!') {
                Some(rest) => (true, rest),
                None => (false, pattern.as_str()),
            };
            let matcher = match glob::Pattern::new(glob) {
                Ok(m) => m,
                Err(e) => {
                    reporter.warning(format!("invalid dependson pattern `{}`: {}", pattern, e));
                    continue;
                }
            };

            let mut matched = false;
            for name in &names {
                if !matcher.matches(name) {
                    continue;
                }
                matched = true;
                if name == &self.name || !decided.insert(name.clone()) {
                    continue;
                }
                if !negated {
                    selected.push(name.clone());
                }
            }

            if !matched && !negated {
                reporter.report(
                    Diagnostic::warning(format!(
                        "missing dependson `{}` in project `{}`",
                        glob, self.name
                    ))
                    .with_location(self.manifest_path()),
                );
            }
        }

        selected
    }

    // ------------------------------------------------------------------
    // Path accessors
    // ------------------------------------------------------------------

    pub fn dependson(&self) -> Result<Vec<Arc<Project>>> {
        Ok(self.prepare()?.dependson.clone())
    }

    pub fn buildpath(&self) -> Result<Vec<Container>> {
        Ok(self.prepare()?.buildpath.clone())
    }

    pub fn testpath(&self) -> Result<Vec<Container>> {
        Ok(self.prepare()?.testpath.clone())
    }

    pub fn bootclasspath(&self) -> Result<Vec<Container>> {
        Ok(self.prepare()?.bootclasspath.clone())
    }

    pub fn sourcepath(&self) -> Result<Vec<PathBuf>> {
        Ok(self.prepare()?.sourcepath.clone())
    }

    pub fn allsourcepath(&self) -> Result<Vec<PathBuf>> {
        Ok(self.prepare()?.allsourcepath.clone())
    }

    pub fn runpath(&self) -> Result<Vec<Container>> {
        self.run_path(PathKind::Runpath)
    }

    pub fn runbundles(&self) -> Result<Vec<Container>> {
        self.run_path(PathKind::Runbundles)
    }

    pub fn runfw(&self) -> Result<Vec<Container>> {
        self.run_path(PathKind::Runfw)
    }

    /// A run path, computed on first access for the current snapshot.
    fn run_path(&self, kind: PathKind) -> Result<Vec<Container>> {
        let paths = self.prepare()?;
        let Some(slot) = paths.slot(kind) else {
            bail!("{} is not a run path", kind);
        };
        if let Some(lazy) = slot.get() {
            return Ok(lazy.containers.clone());
        }

        let manifest = self.manifest().ok_or_else(|| self.invalid())?;
        let workspace = self.workspace()?;
        let mut reporter = Reporter::new();
        let entries = PathBuilder::new(&workspace, self, &mut reporter).build(
            &manifest.paths.declaration(kind),
            default_strategy(kind),
            kind.as_str(),
        );
        let options = PartitionOptions {
            route_boot: false,
            no_project: kind == PathKind::Runbundles,
        };
        let parts = partition(entries, options, kind.as_str(), &mut reporter);

        let lazy = slot.get_or_init(|| LazyPath {
            containers: parts.path,
            diagnostics: reporter.into_diagnostics(),
        });
        Ok(lazy.containers.clone())
    }

    /// Diagnostics of the current snapshot, including computed run paths.
    pub fn diagnostics(&self) -> Result<Vec<Diagnostic>> {
        let paths = self.prepare()?;
        let mut all = paths.diagnostics.clone();
        for slot in [&paths.runpath, &paths.runbundles, &paths.runfw] {
            if let Some(lazy) = slot.get() {
                all.extend(lazy.diagnostics.iter().cloned());
            }
        }
        Ok(all)
    }

    // ------------------------------------------------------------------
    // Invalidation
    // ------------------------------------------------------------------

    /// Discard everything derived from the configuration.
    pub fn set_changed(&self) {
        let mut state = self.state.write();
        state.paths = None;
        state.build_files = None;
        state.versions = None;
        state.revision += 1;
        tracing::debug!("{} changed (revision {})", self.name, state.revision);
    }

    pub fn properties_changed(&self) {
        self.set_changed();
    }

    /// Change the in-memory configuration and invalidate.
    pub fn update_manifest(&self, f: impl FnOnce(&mut ProjectManifest)) -> Result<()> {
        let updated = match self.state.write().manifest.as_mut() {
            Some(manifest) => {
                f(manifest);
                true
            }
            None => false,
        };
        if !updated {
            return Err(self.invalid().into());
        }
        self.set_changed();
        Ok(())
    }

    /// Reload the manifest if it changed on disk. Returns whether it did.
    pub fn refresh(&self) -> Result<bool> {
        let path = self.manifest_path();
        let current = mtime(&path);
        if current == self.state.read().manifest_mtime {
            return Ok(false);
        }

        let (manifest, error) = read_manifest(&path);
        {
            let mut state = self.state.write();
            state.manifest = manifest;
            state.manifest_error = error.clone();
            state.manifest_mtime = current;
        }
        self.set_changed();

        if let Some(message) = error {
            return Err(PrepareError::Manifest {
                name: self.name.clone(),
                message,
            }
            .into());
        }
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Building
    // ------------------------------------------------------------------

    pub fn build_record(&self) -> BuildFilesRecord {
        BuildFilesRecord::new(&self.target_dir())
    }

    /// Outputs of the last successful build, `None` if unknown or gone.
    pub fn build_files(&self) -> Result<Option<Vec<PathBuf>>> {
        let cached = self.state.read().build_files.clone();
        if let Some(files) = cached {
            if files.iter().all(|f| f.is_file()) {
                return Ok(Some(files));
            }
        }

        let loaded = self.build_record().load()?;
        self.state.write().build_files = loaded.clone();
        Ok(loaded)
    }

    pub fn is_stale(self: &Arc<Self>) -> Result<bool> {
        staleness::is_stale(self, &mut HashSet::new())
    }

    /// Build if stale.
    pub fn build(self: &Arc<Self>) -> Result<BuildOutcome> {
        let _guard = self.locked()?;

        if self.no_output() {
            return Ok(BuildOutcome::NoOutput);
        }

        if !staleness::is_stale(self, &mut HashSet::new())? {
            tracing::info!("{} is up to date", self.name);
            let files = self.build_files()?.unwrap_or_default();
            return Ok(BuildOutcome::Fresh(files));
        }

        Ok(BuildOutcome::Built(self.build_local(false)?))
    }

    /// Produce artifacts without checking staleness.
    pub fn build_local(&self, under_test: bool) -> Result<Vec<PathBuf>> {
        let _guard = self.locked()?;
        let paths = self.prepare()?;

        let record = self.build_record();
        record.clear()?;
        self.state.write().build_files = None;

        if self.no_output() {
            return Ok(Vec::new());
        }

        let workspace = self.workspace()?;
        let timeout = workspace.fetch_timeout();
        let mut failures = Vec::new();
        let mut ready = |containers: &[Container]| -> Vec<PathBuf> {
            containers
                .iter()
                .filter_map(|c| match c.wait_ready(timeout) {
                    Ok(()) => c.file().map(Path::to_path_buf),
                    Err(reason) => {
                        failures.push(format!("{}: {}", c, reason));
                        None
                    }
                })
                .collect()
        };

        let request = ProduceRequest {
            project: self.name.clone(),
            base: self.base.clone(),
            output_dir: paths.output.clone(),
            target_dir: paths.target.clone(),
            targets: self.deliverables(),
            buildpath: ready(&paths.buildpath),
            testpath: ready(&paths.testpath),
            bootclasspath: ready(&paths.bootclasspath),
            sourcepath: paths.sourcepath.clone(),
            under_test,
        };

        if !failures.is_empty() {
            bail!(
                "cannot build `{}`, inputs are not available:\n  {}",
                self.name,
                failures.join("\n  ")
            );
        }

        tracing::info!("building {}", self.name);
        let producer = workspace.producer();
        let outcome = producer
            .produce(&request)
            .with_context(|| format!("producer `{}` failed on `{}`", producer.name(), self.name))?;

        if !outcome.ok {
            bail!(
                "failed to produce artifacts for `{}`: {}",
                self.name,
                outcome.messages.join("; ")
            );
        }

        let files: Vec<PathBuf> = outcome.artifacts.iter().map(|f| normalize_path(f)).collect();
        record.save(&files)?;
        self.state.write().build_files = Some(files.clone());
        Ok(files)
    }

    /// Delete and recreate the target and output directories.
    pub fn clean(&self) -> Result<()> {
        let _guard = self.locked()?;

        let dirs = [
            ("target", self.target_dir()),
            ("output", self.output_dir()),
            ("test output", self.test_output_dir()),
        ];
        for (role, dir) in &dirs {
            if !strictly_inside(dir, &self.base) {
                bail!(
                    "refusing to clean {} directory `{}` of `{}`: it is not inside the project",
                    role,
                    dir.display(),
                    self.name
                );
            }
        }

        for (role, dir) in dirs {
            remove_dir_all_if_exists(&dir)?;
            create_dir(&dir, role)?;
        }

        self.state.write().build_files = None;
        tracing::info!("cleaned {}", self.name);
        Ok(())
    }

    /// Build if needed, then store every build output in a repository.
    ///
    /// The repository is `repo`, else the project's `deploy-repo`, else the
    /// first writable one.
    pub fn release(self: &Arc<Self>, repo: Option<&str>) -> Result<Vec<PathBuf>> {
        let workspace = self.workspace()?;
        let files = self.build()?.into_files();
        if files.is_empty() {
            return Ok(Vec::new());
        }

        let configured = self.section(|s| s.deploy_repo.clone());
        let repository = workspace.writable_repository(repo.or(configured.as_deref()))?;

        let targets = self.deliverables();
        let default_version = self.section(|s| s.version.clone());
        let mut stored = Vec::new();

        for file in files {
            let (bsn, version) = targets
                .iter()
                .find(|t| normalize_path(&t.file) == file)
                .map(|t| (t.bsn.clone(), t.version.clone()))
                .unwrap_or_else(|| (self.name.clone(), default_version.clone()));

            let extension = file
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(split_artifact_name)
                .map(|(_, ext)| ext.to_string())
                .unwrap_or_else(|| ".tar.gz".to_string());

            let mut input =
                File::open(&file).with_context(|| format!("failed to open {}", file.display()))?;
            let options = PutOptions::new(&bsn, version).with_extension(extension);
            let path = repository
                .put(&mut input, &options)
                .with_context(|| format!("failed to release {} to `{}`", bsn, repository.name()))?;
            tracing::info!("released {} to {}", bsn, repository.name());
            stored.push(path);
        }

        Ok(stored)
    }
}

impl fmt::Debug for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Project")
            .field("name", &self.name)
            .field("base", &self.base)
            .finish()
    }
}

impl fmt::Display for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{CountingRepository, WorkspaceFixture};
    use std::time::Duration;

    fn names(projects: &[Arc<Project>]) -> Vec<&str> {
        projects.iter().map(|p| p.name()).collect()
    }

    #[test]
    fn test_cycle_is_detected() {
        let fx = WorkspaceFixture::new();
        fx.project("a", "[paths]\ndependson = \"b\"\n");
        fx.project("b", "[paths]\ndependson = \"a\"\n");
        let ws = fx.open();

        let err = ws.project("a").unwrap().prepare().unwrap_err();
        match err.downcast_ref::<PrepareError>() {
            Some(PrepareError::CircularDependency { trail }) => {
                assert_eq!(trail, &vec!["a".to_string(), "b".to_string(), "a".to_string()]);
            }
            other => panic!("expected a cycle, got {:?}", other),
        }

        // Neither project was left half-prepared or stuck on a trail
        assert!(!ws.project("a").unwrap().is_prepared());
        assert!(!ws.project("b").unwrap().is_prepared());
        assert!(ws.project("b").unwrap().prepare().is_err());
    }

    #[test]
    fn test_cycle_through_project_reference() {
        let fx = WorkspaceFixture::new();
        fx.project("a", "[paths]\nbuildpath = \"b;version=project\"\n");
        fx.project("b", "[paths]\nbuildpath = \"a;version=project\"\n");
        let ws = fx.open();

        let err = ws.project("b").unwrap().prepare().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PrepareError>(),
            Some(PrepareError::CircularDependency { .. })
        ));
    }

    #[test]
    fn test_prepare_is_idempotent() {
        let fx = WorkspaceFixture::new();
        fx.project("app", "[paths]\nbuildpath = \"util;version='[1.0,2.0)'\"\n");
        let repo = Arc::new(CountingRepository::new("R", &fx.root().join("R")).with("util", &["1.2"]));
        let ws = fx.open_with_repos(&[repo.clone()]);
        let app = ws.project("app").unwrap();

        let first = app.prepare().unwrap();
        let calls = repo.total_calls();
        let output_mtime = mtime(&first.output);

        let second = app.prepare().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(repo.total_calls(), calls);
        assert_eq!(mtime(&second.output), output_mtime);
    }

    #[test]
    fn test_set_changed_invalidates() {
        let fx = WorkspaceFixture::new();
        fx.project("app", "");
        let ws = fx.open();
        let app = ws.project("app").unwrap();

        let first = app.prepare().unwrap();
        let revision = app.revision();
        app.set_changed();
        assert!(!app.is_prepared());
        assert_eq!(app.revision(), revision + 1);

        let second = app.prepare().unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.revision, revision + 1);
    }

    #[test]
    fn test_paths_and_closure() {
        let fx = WorkspaceFixture::new();
        fx.project("base", "");
        fx.project("api", "[paths]\nbuildpath = \"base;version=project\"\n");
        fx.project(
            "app",
            "[paths]\nbuildpath = \"api;version=project, ee.j2se;version=1.0, util;version=1.0\"\n\
             testpath = \"junit;version=4\"\n",
        );
        let repo = Arc::new(
            CountingRepository::new("R", &fx.root().join("R"))
                .with("ee.j2se", &["1.0"])
                .with("util", &["1.0"])
                .with("junit", &["4.12"]),
        );
        let ws = fx.open_with_repos(&[repo]);
        let app = ws.project("app").unwrap();
        let paths = app.prepare().unwrap();

        let build: Vec<_> = paths.buildpath.iter().map(|c| c.bsn()).collect();
        assert_eq!(build, vec!["app", "api", "util"]);
        assert_eq!(paths.buildpath[0].file().unwrap(), fx.root().join("app/bin"));
        assert_eq!(paths.bootclasspath.len(), 1);
        assert_eq!(paths.bootclasspath[0].bsn(), "ee.j2se");
        assert_eq!(paths.testpath[0].version(), "4.12.0");

        assert_eq!(names(&paths.dependson), vec!["base", "api"]);
        assert_eq!(paths.sourcepath, vec![fx.root().join("app/src")]);
        assert_eq!(
            paths.allsourcepath,
            vec![
                fx.root().join("app/src"),
                fx.root().join("base/src"),
                fx.root().join("api/src"),
            ]
        );
        assert!(paths.errors.is_empty());
    }

    #[test]
    fn test_sourcepath_falls_back_to_base() {
        let fx = WorkspaceFixture::new();
        let base = fx.project("app", "src = \"source\"\n");
        let ws = fx.open();
        let paths = ws.project("app").unwrap().prepare().unwrap();
        assert_eq!(paths.sourcepath, vec![base]);
    }

    #[test]
    fn test_dependson_globs_and_missing_warning() {
        let fx = WorkspaceFixture::new();
        fx.project("lib.core", "");
        fx.project("lib.extra", "");
        fx.project("lib.internal", "");
        fx.project(
            "app",
            "[paths]\ndependson = \"!lib.internal, lib.*, ghost\"\n",
        );
        let ws = fx.open();
        let app = ws.project("app").unwrap();
        let paths = app.prepare().unwrap();

        assert_eq!(names(&paths.dependson), vec!["lib.core", "lib.extra"]);
        let missing: Vec<_> = paths
            .diagnostics
            .iter()
            .filter(|d| d.message.contains("missing dependson `ghost`"))
            .collect();
        assert_eq!(missing.len(), 1);
    }

    #[test]
    fn test_shared_contributor() {
        let fx = WorkspaceFixture::new();
        fx.workspace_toml("dependson = [\"common\"]\n");
        fx.project("common", "");
        fx.project("app", "");
        let ws = fx.open();

        let app = ws.project("app").unwrap().prepare().unwrap();
        assert_eq!(names(&app.dependson), vec!["common"]);
        let common = ws.project("common").unwrap().prepare().unwrap();
        assert!(common.dependson.is_empty());
    }

    #[test]
    fn test_run_paths_are_lazy() {
        let fx = WorkspaceFixture::new();
        fx.project("app", "[paths]\nrunpath = \"util;version=1.0\"\n");
        let repo = Arc::new(CountingRepository::new("R", &fx.root().join("R")).with("util", &["1.0", "1.1"]));
        let ws = fx.open_with_repos(&[repo.clone()]);
        let app = ws.project("app").unwrap();

        let paths = app.prepare().unwrap();
        assert!(!paths.has_computed(PathKind::Runpath));
        assert_eq!(repo.total_calls(), 0);

        let runpath = app.runpath().unwrap();
        assert_eq!(runpath[0].version(), "1.1.0");
        assert!(paths.has_computed(PathKind::Runpath));

        let calls = repo.total_calls();
        app.runpath().unwrap();
        assert_eq!(repo.total_calls(), calls);
    }

    #[test]
    fn test_run_paths_are_eager_when_not_delayed() {
        let fx = WorkspaceFixture::new();
        fx.project("core", "");
        fx.project(
            "app",
            "delay-run-dependencies = false\n\
             [paths]\nrunbundles = \"core;version=project\"\nrunfw = \"fw;version=1.0\"\n",
        );
        let repo = Arc::new(CountingRepository::new("R", &fx.root().join("R")).with("fw", &["1.0"]));
        let ws = fx.open_with_repos(&[repo]);
        let app = ws.project("app").unwrap();
        let paths = app.prepare().unwrap();

        assert!(paths.has_computed(PathKind::Runbundles));
        assert!(app.runbundles().unwrap().is_empty());
        assert_eq!(app.runfw().unwrap().len(), 1);
        assert_eq!(names(&paths.dependson), vec!["core"]);
        assert_eq!(paths.error_count(), 1);
    }

    #[test]
    fn test_invalid_project() {
        let fx = WorkspaceFixture::new();
        fx.project("broken", "version = [\n");
        let ws = fx.open();
        let broken = ws.project("broken").unwrap();

        assert!(!broken.is_valid());
        let err = broken.prepare().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PrepareError>(),
            Some(PrepareError::InvalidProject { .. })
        ));
    }

    #[test]
    fn test_update_manifest_and_refresh() {
        let fx = WorkspaceFixture::new();
        let base = fx.project("app", "version = \"1.0\"\n");
        let ws = fx.open();
        let app = ws.project("app").unwrap();

        app.prepare().unwrap();
        app.update_manifest(|m| m.project.version = Version::new(2, 0, 0))
            .unwrap();
        assert!(!app.is_prepared());
        assert_eq!(app.versions().get("app"), Some(&Version::new(2, 0, 0)));

        assert!(!app.refresh().unwrap());

        std::fs::write(base.join(MANIFEST_NAME), "[project]\nversion = \"3.0\"\n").unwrap();
        crate::test_support::set_mtime(
            &base.join(MANIFEST_NAME),
            SystemTime::now() + Duration::from_secs(5),
        );
        assert!(app.refresh().unwrap());
        assert_eq!(app.versions().get("app"), Some(&Version::new(3, 0, 0)));
    }

    #[test]
    fn test_deliverables() {
        let fx = WorkspaceFixture::new();
        fx.project(
            "multi",
            "version = \"1.2\"\noutput-mask = \"{bsn}-{version}.tar.gz\"\n\
             [[deliverable]]\nname = \"multi.api\"\n\
             [[deliverable]]\nname = \"multi.impl\"\nversion = \"1.3\"\n",
        );
        let ws = fx.open();
        let multi = ws.project("multi").unwrap();

        let targets = multi.deliverables();
        assert_eq!(targets.len(), 2);
        assert_eq!(
            targets[1].file,
            fx.root().join("multi/generated/multi.impl-1.3.0.tar.gz")
        );
        assert!(multi.deliverable("multi", &BTreeMap::new()).is_none());
        assert_eq!(
            ws.local_versions("multi.impl").into_iter().collect::<Vec<_>>(),
            vec![Version::new(1, 3, 0)]
        );
    }

    #[test]
    fn test_clean_refuses_outside_directories() {
        let fx = WorkspaceFixture::new();
        fx.project("good", "");
        fx.project("bad", "target = \"../elsewhere\"\n");
        fx.project("self", "bin = \".\"\n");
        let ws = fx.open();

        let good = ws.project("good").unwrap();
        good.build_local(false).unwrap();
        good.clean().unwrap();
        assert!(good.target_dir().is_dir());
        assert!(good.build_files().unwrap().is_none());

        assert!(ws.project("bad").unwrap().clean().is_err());
        assert!(ws.project("self").unwrap().clean().is_err());
        assert!(fx.root().join("self").is_dir());
    }

    #[test]
    fn test_release_to_writable_repository() {
        let fx = WorkspaceFixture::new();
        fx.workspace_toml(
            "[[repository]]\nname = \"mirror\"\nkind = \"flat\"\npath = \"mirror\"\n\n\
             [[repository]]\nname = \"release\"\nkind = \"dir\"\npath = \"release\"\n",
        );
        fx.project("app", "version = \"1.4\"\n");
        let ws = fx.open();
        let app = ws.project("app").unwrap();

        let stored = app.release(None).unwrap();
        assert_eq!(stored, vec![fx.root().join("release/app/app-1.4.0.tar.gz")]);
        assert!(stored[0].is_file());

        assert!(app.release(Some("mirror")).is_err());
    }

    #[test]
    fn test_lock_timeout() {
        let fx = WorkspaceFixture::new();
        fx.workspace_toml("lock-timeout-secs = 0\n");
        fx.project("app", "");
        let ws = fx.open();
        let app = ws.project("app").unwrap();

        let (held_tx, held_rx) = std::sync::mpsc::channel();
        let (done_tx, done_rx) = std::sync::mpsc::channel::<()>();
        std::thread::scope(|s| {
            let holder = app.clone();
            s.spawn(move || {
                let _guard = holder.lock.lock();
                held_tx.send(()).unwrap();
                done_rx.recv().unwrap();
            });

            held_rx.recv().unwrap();
            let err = app.prepare().unwrap_err();
            assert!(matches!(
                err.downcast_ref::<PrepareError>(),
                Some(PrepareError::Locked { .. })
            ));
            done_tx.send(()).unwrap();
        });

        assert!(app.prepare().is_ok());
    }

    #[test]
    fn test_cycle_prepared_from_two_threads() {
        let fx = WorkspaceFixture::new();
        fx.workspace_toml("lock-timeout-secs = 30\n");
        fx.project("a", "[paths]\ndependson = \"b\"\n");
        fx.project("b", "[paths]\ndependson = \"a\"\n");
        let ws = fx.open();
        let a = ws.project("a").unwrap();
        let b = ws.project("b").unwrap();

        let start = std::time::Instant::now();
        for _ in 0..20 {
            let barrier = std::sync::Barrier::new(2);
            let (ra, rb) = std::thread::scope(|s| {
                let ta = s.spawn(|| {
                    barrier.wait();
                    a.prepare()
                });
                let tb = s.spawn(|| {
                    barrier.wait();
                    b.prepare()
                });
                (ta.join().unwrap(), tb.join().unwrap())
            });

            for result in [ra, rb] {
                let err = result.unwrap_err();
                assert!(
                    matches!(
                        err.downcast_ref::<PrepareError>(),
                        Some(PrepareError::CircularDependency { .. })
                    ),
                    "expected a cycle, got {:#}",
                    err
                );
            }
        }
        assert!(start.elapsed() < std::time::Duration::from_secs(10));
    }
}
