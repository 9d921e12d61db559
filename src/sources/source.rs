//! Repository source trait - common interface for artifact repositories.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::path::PathBuf;

use anyhow::{bail, Result};

use crate::core::Version;
use crate::sources::blocker::DownloadBlocker;

/// File name suffixes recognized when parsing artifact file names.
///
/// Longer suffixes come first so `.tar.gz` wins over `.gz`.
pub const ARTIFACT_EXTENSIONS: &[&str] = &[".tar.gz", ".tgz", ".jar", ".zip", ".lib"];

/// An artifact handed back by `get`.
#[derive(Debug, Clone)]
pub struct Fetched {
    /// Where the artifact lives (or will live once the blocker completes)
    pub path: PathBuf,

    /// Completion handle for background transfers
    pub blocker: Option<DownloadBlocker>,
}

impl Fetched {
    /// An artifact that is already on disk.
    pub fn local(path: impl Into<PathBuf>) -> Self {
        Fetched {
            path: path.into(),
            blocker: None,
        }
    }
}

/// Metadata for writing an artifact into a repository.
#[derive(Debug, Clone)]
pub struct PutOptions {
    /// Symbolic name of the artifact
    pub bsn: String,

    /// Version to publish under
    pub version: Version,

    /// File suffix to store with, e.g. `.tar.gz`
    pub extension: String,
}

impl PutOptions {
    pub fn new(bsn: impl Into<String>, version: Version) -> Self {
        PutOptions {
            bsn: bsn.into(),
            version,
            extension: ".tar.gz".to_string(),
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }
}

/// A source of versioned artifacts.
///
/// Implementations must be shareable across the worker threads of a
/// workspace build.
pub trait RepositorySource: Send + Sync {
    /// Repository name for display and `release --repo`.
    fn name(&self) -> &str;

    /// Whether `put` is supported.
    fn can_write(&self) -> bool;

    /// List the available versions of `bsn`.
    ///
    /// Returns `Ok(None)` when this source cannot enumerate versions at all,
    /// which is different from knowing of none (`Ok(Some(empty))`).
    fn versions(&self, bsn: &str) -> Result<Option<BTreeSet<Version>>>;

    /// Materialize one version of `bsn`, or `Ok(None)` if absent.
    fn get(
        &self,
        bsn: &str,
        version: &Version,
        attrs: &BTreeMap<String, String>,
    ) -> Result<Option<Fetched>>;

    /// Store an artifact, returning where it was written.
    fn put(&self, stream: &mut dyn Read, options: &PutOptions) -> Result<PathBuf> {
        let _ = (stream, options);
        bail!("repository `{}` is read-only", self.name())
    }

    /// Human-readable location, e.g. a directory path.
    fn location(&self) -> String;
}

/// Split an artifact file name into (stem, extension) using the known suffixes.
pub fn split_artifact_name(file_name: &str) -> Option<(&str, &str)> {
    ARTIFACT_EXTENSIONS.iter().find_map(|ext| {
        file_name
            .strip_suffix(ext)
            .map(|stem| (stem, &file_name[stem.len()..]))
    })
}

/// Version spellings tried when probing for a file by name.
///
/// `1.5.0` is also looked up as `1.5`, and `2.0.0` as `2.0` and `2`.
pub fn version_spellings(version: &Version) -> Vec<String> {
    let mut spellings = vec![version.to_string()];
    if version.qualifier.is_empty() && version.micro == 0 {
        spellings.push(format!("{}.{}", version.major, version.minor));
        if version.minor == 0 {
            spellings.push(version.major.to_string());
        }
    }
    spellings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_artifact_name() {
        assert_eq!(
            split_artifact_name("api-1.2.0.tar.gz"),
            Some(("api-1.2.0", ".tar.gz"))
        );
        assert_eq!(split_artifact_name("core.lib"), Some(("core", ".lib")));
        assert_eq!(split_artifact_name("README"), None);
    }

    #[test]
    fn test_version_spellings() {
        assert_eq!(
            version_spellings(&Version::new(2, 0, 0)),
            vec!["2.0.0", "2.0", "2"]
        );
        assert_eq!(version_spellings(&Version::new(1, 5, 1)), vec!["1.5.1"]);
    }
}
