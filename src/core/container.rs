//! Container - one resolved (or failed) entry on a path.
//!
//! Containers are created fresh by every resolution and never mutated
//! afterwards. Identity for de-duplication is the triple
//! (symbolic name, resolved version, backing file).

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;

use crate::sources::blocker::{BlockerState, DownloadBlocker};

/// What a container resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerKind {
    /// Output of a workspace project (directory or packaged deliverable)
    Project,
    /// Artifact materialized by a repository source
    Repo,
    /// A `.lib` file that expands into other containers
    Library,
    /// A plain file referenced by path
    External,
    /// Resolution failed; see `error()`
    Error,
}

/// A resolved path entry.
#[derive(Clone)]
pub struct Container {
    project: Option<String>,
    bsn: String,
    version: String,
    kind: ContainerKind,
    file: Option<PathBuf>,
    error: Option<String>,
    hint: Option<&'static str>,
    attributes: BTreeMap<String, String>,
    blocker: Option<DownloadBlocker>,
    members: Vec<Container>,
}

impl Container {
    /// Create a successfully resolved container.
    ///
    /// `project` names the owning workspace project, if any.
    pub fn new(
        project: Option<&str>,
        bsn: impl Into<String>,
        version: impl Into<String>,
        kind: ContainerKind,
        file: impl Into<PathBuf>,
        attributes: BTreeMap<String, String>,
    ) -> Self {
        debug_assert!(kind != ContainerKind::Error, "use Container::failed");
        Container {
            project: project.map(str::to_string),
            bsn: bsn.into(),
            version: version.into(),
            kind,
            file: Some(file.into()),
            error: None,
            hint: None,
            attributes,
            blocker: None,
            members: Vec::new(),
        }
    }

    /// Create an ERROR container carrying a human-readable message.
    pub fn failed(
        project: Option<&str>,
        bsn: impl Into<String>,
        version: impl Into<String>,
        message: impl Into<String>,
        attributes: BTreeMap<String, String>,
    ) -> Self {
        Container {
            project: project.map(str::to_string),
            bsn: bsn.into(),
            version: version.into(),
            kind: ContainerKind::Error,
            file: None,
            error: Some(message.into()),
            hint: None,
            attributes,
            blocker: None,
            members: Vec::new(),
        }
    }

    /// Attach a suggestion shown with the error of a failed container.
    pub fn with_hint(mut self, hint: &'static str) -> Self {
        self.hint = Some(hint);
        self
    }

    /// Attach the completion handle of a background fetch.
    pub fn with_blocker(mut self, blocker: DownloadBlocker) -> Self {
        self.blocker = Some(blocker);
        self
    }

    /// Set the expanded members of a LIBRARY container.
    pub fn with_members(mut self, members: Vec<Container>) -> Self {
        debug_assert!(self.kind == ContainerKind::Library);
        self.members = members;
        self
    }

    /// Name of the owning workspace project, if any.
    pub fn project(&self) -> Option<&str> {
        self.project.as_deref()
    }

    /// Symbolic name.
    pub fn bsn(&self) -> &str {
        &self.bsn
    }

    /// Version (or range/token) as requested or resolved.
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn kind(&self) -> ContainerKind {
        self.kind
    }

    /// Backing file; `None` only for ERROR containers.
    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    /// Error message; `Some` iff the kind is ERROR.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn hint(&self) -> Option<&'static str> {
        self.hint
    }

    pub fn is_error(&self) -> bool {
        self.kind == ContainerKind::Error
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn blocker(&self) -> Option<&DownloadBlocker> {
        self.blocker.as_ref()
    }

    /// Flatten to concrete path entries.
    ///
    /// Non-library containers are their own single member.
    pub fn members(&self) -> &[Container] {
        if self.kind == ContainerKind::Library {
            &self.members
        } else {
            std::slice::from_ref(self)
        }
    }

    /// Wait for a background fetch to settle.
    ///
    /// Containers without a blocker are ready immediately. A fetch that has
    /// not completed by `timeout` is reported as a failure.
    pub fn wait_ready(&self, timeout: Duration) -> Result<(), String> {
        match &self.blocker {
            None => Ok(()),
            Some(blocker) => match blocker.wait_timeout(timeout) {
                BlockerState::Ready => Ok(()),
                BlockerState::Failed(reason) => Err(reason),
                BlockerState::Pending => Err(format!(
                    "timed out after {}s waiting for {} to download",
                    timeout.as_secs(),
                    self
                )),
            },
        }
    }
}

impl PartialEq for Container {
    fn eq(&self, other: &Self) -> bool {
        self.bsn == other.bsn && self.version == other.version && self.file == other.file
    }
}

impl Eq for Container {}

impl Hash for Container {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bsn.hash(state);
        self.version.hash(state);
        self.file.hash(state);
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("bsn", &self.bsn)
            .field("version", &self.version)
            .field("kind", &self.kind)
            .field("file", &self.file)
            .field("error", &self.error)
            .finish()
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{};version={}", self.bsn, self.version)
    }
}
