//! Quay.toml manifest parsing and schema.
//!
//! One file name serves two roles. At the workspace root it carries a
//! `[workspace]` table and `[[repository]]` entries; inside a project
//! directory it carries a `[project]` table, optional `[[deliverable]]`
//! entries and the `[paths]` declarations.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::Version;

/// Canonical manifest file name.
pub const MANIFEST_NAME: &str = "Quay.toml";

/// Errors locating a manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("could not find `{MANIFEST_NAME}` in `{}` or any parent directory", dir.display())]
    NotFound { dir: PathBuf },

    #[error("`{}` has no [workspace] table", path.display())]
    NotAWorkspace { path: PathBuf },
}

/// A declaration list written as one string or as several strings.
///
/// Several strings are joined with commas in order, which lets long paths
/// be split across lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSpec {
    One(String),
    Many(Vec<String>),
}

impl PathSpec {
    /// The combined declaration string.
    pub fn joined(&self) -> String {
        match self {
            PathSpec::One(s) => s.clone(),
            PathSpec::Many(parts) => parts
                .iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}

/// The `[paths]` table of a project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub buildpath: Option<PathSpec>,
    pub testpath: Option<PathSpec>,
    pub runpath: Option<PathSpec>,
    pub runbundles: Option<PathSpec>,
    pub runfw: Option<PathSpec>,
    pub dependson: Option<PathSpec>,
}

/// Names a path declaration for diagnostics and strategy defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PathKind {
    Buildpath,
    Testpath,
    Runpath,
    Runbundles,
    Runfw,
}

impl PathKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PathKind::Buildpath => "buildpath",
            PathKind::Testpath => "testpath",
            PathKind::Runpath => "runpath",
            PathKind::Runbundles => "runbundles",
            PathKind::Runfw => "runfw",
        }
    }
}

impl std::fmt::Display for PathKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PathsConfig {
    /// The declaration string for a path, empty when unset.
    pub fn declaration(&self, kind: PathKind) -> String {
        let spec = match kind {
            PathKind::Buildpath => &self.buildpath,
            PathKind::Testpath => &self.testpath,
            PathKind::Runpath => &self.runpath,
            PathKind::Runbundles => &self.runbundles,
            PathKind::Runfw => &self.runfw,
        };
        spec.as_ref().map(PathSpec::joined).unwrap_or_default()
    }

    pub fn dependson(&self) -> String {
        self.dependson
            .as_ref()
            .map(PathSpec::joined)
            .unwrap_or_default()
    }
}

/// One symbolic name a project produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliverableSpec {
    pub name: String,

    #[serde(default)]
    pub version: Option<Version>,
}

/// The `[project]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ProjectSection {
    /// Version of deliverables that do not name their own
    pub version: Version,

    /// The project produces nothing
    pub no_output: bool,

    pub src: PathBuf,
    pub bin: PathBuf,
    pub test_src: PathBuf,
    pub test_bin: PathBuf,
    pub target: PathBuf,

    /// File name template with `{bsn}` and `{version}` placeholders
    pub output_mask: String,

    pub run_storage: Option<PathBuf>,

    /// Compute run paths on first access instead of during prepare
    pub delay_run_dependencies: bool,

    /// Default repository for `release`
    pub deploy_repo: Option<String>,
}

impl Default for ProjectSection {
    fn default() -> Self {
        ProjectSection {
            version: Version::lowest(),
            no_output: false,
            src: PathBuf::from("src"),
            bin: PathBuf::from("bin"),
            test_src: PathBuf::from("test"),
            test_bin: PathBuf::from("bin_test"),
            target: PathBuf::from("generated"),
            output_mask: "{bsn}.tar.gz".to_string(),
            run_storage: None,
            delay_run_dependencies: true,
            deploy_repo: None,
        }
    }
}

/// A parsed project manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectManifest {
    pub project: ProjectSection,
    pub deliverables: Vec<DeliverableSpec>,
    pub paths: PathsConfig,
}

/// A configured repository source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    pub name: String,

    pub kind: String,

    /// Location, relative to the workspace root
    pub path: PathBuf,

    #[serde(default)]
    pub writable: Option<bool>,

    /// Extra keys for kinds registered by embedding applications
    #[serde(flatten)]
    pub options: BTreeMap<String, toml::Value>,
}

/// The `[workspace]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct WorkspaceSection {
    /// Glob patterns for project directories
    pub members: Vec<String>,

    /// Glob patterns removed from `members`
    pub exclude: Vec<String>,

    pub offline: Option<bool>,

    /// Projects every other project depends on
    pub dependson: Vec<String>,

    /// Dependency contributors to activate
    pub contributors: Option<Vec<String>>,

    pub lock_timeout_secs: Option<u64>,

    pub fetch_timeout_secs: Option<u64>,
}

impl Default for WorkspaceSection {
    fn default() -> Self {
        WorkspaceSection {
            members: vec!["*".to_string()],
            exclude: Vec::new(),
            offline: None,
            dependson: Vec::new(),
            contributors: None,
            lock_timeout_secs: None,
            fetch_timeout_secs: None,
        }
    }
}

/// A parsed workspace manifest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkspaceManifest {
    pub workspace: WorkspaceSection,
    pub repositories: Vec<RepositoryConfig>,
}

/// Raw manifest as deserialized from TOML.
#[derive(Debug, Deserialize)]
struct RawManifest {
    #[serde(default)]
    project: Option<ProjectSection>,

    #[serde(default)]
    workspace: Option<WorkspaceSection>,

    #[serde(default)]
    deliverable: Vec<DeliverableSpec>,

    #[serde(default)]
    paths: PathsConfig,

    #[serde(default)]
    repository: Vec<RepositoryConfig>,
}

fn read_raw(path: &Path) -> Result<RawManifest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read manifest: {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
}

impl ProjectManifest {
    /// Load a project manifest.
    ///
    /// Returns `Ok(None)` when the file parses but has no `[project]` table.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let raw = read_raw(path)?;
        Ok(raw.project.map(|project| ProjectManifest {
            project,
            deliverables: raw.deliverable,
            paths: raw.paths,
        }))
    }

    /// Parse manifest content directly.
    pub fn parse(content: &str) -> Result<Self> {
        let raw: RawManifest = toml::from_str(content).context("failed to parse project manifest")?;
        Ok(ProjectManifest {
            project: raw.project.unwrap_or_default(),
            deliverables: raw.deliverable,
            paths: raw.paths,
        })
    }
}

impl WorkspaceManifest {
    /// Load a workspace manifest, failing if it has no `[workspace]` table.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = read_raw(path)?;
        let workspace = raw.workspace.ok_or_else(|| ManifestError::NotAWorkspace {
            path: path.to_path_buf(),
        })?;
        Ok(WorkspaceManifest {
            workspace,
            repositories: raw.repository,
        })
    }
}

/// Check whether `dir` holds a workspace manifest.
pub fn is_workspace_root(dir: &Path) -> bool {
    let path = dir.join(MANIFEST_NAME);
    path.is_file() && matches!(read_raw(&path), Ok(raw) if raw.workspace.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_defaults() {
        let manifest = ProjectManifest::parse("[project]\n").unwrap();
        assert_eq!(manifest.project.bin, PathBuf::from("bin"));
        assert_eq!(manifest.project.target, PathBuf::from("generated"));
        assert!(manifest.project.delay_run_dependencies);
        assert!(!manifest.project.no_output);
        assert!(manifest.deliverables.is_empty());
    }

    #[test]
    fn test_paths_as_string_or_list() {
        let manifest = ProjectManifest::parse(
            r#"
[project]
version = "1.2.0"

[paths]
buildpath = "api;version=latest, util;version='[1.0,2.0)'"
testpath = ["junit;version=4", "mock;version=1.0"]
"#,
        )
        .unwrap();

        assert_eq!(manifest.project.version, Version::new(1, 2, 0));
        assert_eq!(
            manifest.paths.declaration(PathKind::Buildpath),
            "api;version=latest, util;version='[1.0,2.0)'"
        );
        assert_eq!(
            manifest.paths.declaration(PathKind::Testpath),
            "junit;version=4,mock;version=1.0"
        );
        assert_eq!(manifest.paths.declaration(PathKind::Runfw), "");
    }

    #[test]
    fn test_deliverables() {
        let manifest = ProjectManifest::parse(
            r#"
[project]
version = "2.0"
output-mask = "{bsn}-{version}.jar"

[[deliverable]]
name = "com.example.api"

[[deliverable]]
name = "com.example.impl"
version = "2.1"
"#,
        )
        .unwrap();

        assert_eq!(manifest.deliverables.len(), 2);
        assert_eq!(manifest.deliverables[1].version, Some(Version::new(2, 1, 0)));
        assert_eq!(manifest.project.output_mask, "{bsn}-{version}.jar");
    }

    #[test]
    fn test_workspace_manifest() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join(MANIFEST_NAME);
        std::fs::write(
            &path,
            r#"
[workspace]
members = ["projects/*"]
offline = true
dependson = ["common"]

[[repository]]
name = "local"
kind = "dir"
path = "repo"

[[repository]]
name = "mirror"
kind = "flat"
path = "mirror"
url = "https://mirror.example.com"
"#,
        )
        .unwrap();

        let manifest = WorkspaceManifest::load(&path).unwrap();
        assert_eq!(manifest.workspace.members, vec!["projects/*"]);
        assert_eq!(manifest.workspace.offline, Some(true));
        assert_eq!(manifest.repositories.len(), 2);
        assert_eq!(manifest.repositories[1].kind, "flat");
        assert!(manifest.repositories[1].options.contains_key("url"));
        assert!(is_workspace_root(tmp.path()));
    }

    #[test]
    fn test_project_manifest_is_not_workspace() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join(MANIFEST_NAME);
        std::fs::write(&path, "[project]\n").unwrap();

        assert!(WorkspaceManifest::load(&path).is_err());
        assert!(!is_workspace_root(tmp.path()));
        assert!(ProjectManifest::load(&path).unwrap().is_some());
    }
}
