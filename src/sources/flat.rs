//! Flat repository - a probe-only artifact store.
//!
//! Layout: `<root>/<bsn>-<version><ext>`. Like a remote mirror without an
//! index, it cannot enumerate versions; it can only answer whether one
//! specific version exists.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use anyhow::Result;

use crate::core::Version;
use crate::sources::source::{
    version_spellings, Fetched, RepositorySource, ARTIFACT_EXTENSIONS,
};

#[derive(Debug)]
pub struct FlatRepository {
    name: String,
    root: PathBuf,
}

impl FlatRepository {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        FlatRepository {
            name: name.into(),
            root: root.into(),
        }
    }
}

impl RepositorySource for FlatRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn can_write(&self) -> bool {
        false
    }

    fn versions(&self, _bsn: &str) -> Result<Option<BTreeSet<Version>>> {
        Ok(None)
    }

    fn get(
        &self,
        bsn: &str,
        version: &Version,
        _attrs: &BTreeMap<String, String>,
    ) -> Result<Option<Fetched>> {
        for spelling in version_spellings(version) {
            for ext in ARTIFACT_EXTENSIONS {
                let candidate = self.root.join(format!("{}-{}{}", bsn, spelling, ext));
                if candidate.is_file() {
                    tracing::debug!("{}: probe hit {}", self.name, candidate.display());
                    return Ok(Some(Fetched::local(candidate)));
                }
            }
        }
        Ok(None)
    }

    fn location(&self) -> String {
        self.root.display().to_string()
    }
}
