//! Directory repository - versioned artifacts in a local folder tree.
//!
//! Layout: `<root>/<bsn>/<bsn>-<version><ext>`. Versions are discovered by
//! listing the `<bsn>` folder, so this source supports enumeration.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

use crate::core::Version;
use crate::sources::source::{split_artifact_name, Fetched, PutOptions, RepositorySource};
use crate::util::fs::ensure_dir;

/// A repository backed by a directory tree.
#[derive(Debug)]
pub struct DirectoryRepository {
    name: String,
    root: PathBuf,
    writable: bool,
}

impl DirectoryRepository {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        DirectoryRepository {
            name: name.into(),
            root: root.into(),
            writable: true,
        }
    }

    /// Mark the repository as read-only.
    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All artifacts of `bsn` with their parsed versions.
    fn artifacts(&self, bsn: &str) -> Result<Vec<(Version, PathBuf)>> {
        let dir = self.root.join(bsn);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let prefix = format!("{}-", bsn);
        let mut found = Vec::new();

        for entry in fs::read_dir(&dir)
            .with_context(|| format!("failed to read repository directory: {}", dir.display()))?
        {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            let Some((stem, _)) = split_artifact_name(file_name) else {
                continue;
            };
            let Some(version) = stem.strip_prefix(&prefix) else {
                continue;
            };
            match Version::parse(version) {
                Ok(v) => found.push((v, entry.path())),
                Err(_) => tracing::debug!(
                    "ignoring {} in repository {}: unparseable version",
                    file_name,
                    self.name
                ),
            }
        }

        Ok(found)
    }
}

impl RepositorySource for DirectoryRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn can_write(&self) -> bool {
        self.writable
    }

    fn versions(&self, bsn: &str) -> Result<Option<BTreeSet<Version>>> {
        Ok(Some(
            self.artifacts(bsn)?.into_iter().map(|(v, _)| v).collect(),
        ))
    }

    fn get(
        &self,
        bsn: &str,
        version: &Version,
        _attrs: &BTreeMap<String, String>,
    ) -> Result<Option<Fetched>> {
        let mut matches: Vec<PathBuf> = self
            .artifacts(bsn)?
            .into_iter()
            .filter(|(v, _)| v == version)
            .map(|(_, path)| path)
            .collect();

        // Several spellings of one version: pick deterministically
        matches.sort();
        Ok(matches.into_iter().next().map(Fetched::local))
    }

    fn put(&self, stream: &mut dyn Read, options: &PutOptions) -> Result<PathBuf> {
        if !self.writable {
            anyhow::bail!("repository `{}` is read-only", self.name);
        }

        let dir = self.root.join(&options.bsn);
        ensure_dir(&dir)?;

        let dest = dir.join(format!(
            "{}-{}{}",
            options.bsn, options.version, options.extension
        ));

        let mut tmp = NamedTempFile::new_in(&dir)
            .with_context(|| format!("failed to create temporary file in {}", dir.display()))?;
        io::copy(stream, &mut tmp)
            .with_context(|| format!("failed to write artifact {}", dest.display()))?;
        tmp.persist(&dest)
            .with_context(|| format!("failed to store artifact {}", dest.display()))?;

        tracing::info!("stored {} {} in {}", options.bsn, options.version, self.name);
        Ok(dest)
    }

    fn location(&self) -> String {
        self.root.display().to_string()
    }
}
