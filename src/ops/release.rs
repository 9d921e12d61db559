//! Implementation of `quay release` and `quay repos`.

use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::core::{Version, Workspace};
use crate::ops::build::select_projects;

/// Release the named projects, or all of them.
///
/// Returns each project with the files stored for it.
pub fn release(
    ws: &Workspace,
    names: &[String],
    repo: Option<&str>,
) -> Result<Vec<(String, Vec<PathBuf>)>> {
    let mut released = Vec::new();
    for project in select_projects(ws, names)? {
        let stored = project
            .release(repo)
            .with_context(|| format!("failed to release `{}`", project.name()))?;
        released.push((project.name().to_string(), stored));
    }
    Ok(released)
}

/// One repository as listed by `quay repos`.
#[derive(Debug, Clone)]
pub struct RepositoryListing {
    pub name: String,
    pub location: String,
    pub writable: bool,
    /// Versions of the queried name; `None` when the repository cannot list
    pub versions: Option<BTreeSet<Version>>,
}

/// Describe every repository, with the versions of `bsn` when given.
pub fn list_repositories(ws: &Workspace, bsn: Option<&str>) -> Result<Vec<RepositoryListing>> {
    ws.repositories()
        .iter()
        .map(|repo| {
            let versions = match bsn {
                Some(bsn) => repo
                    .versions(bsn)
                    .with_context(|| format!("repository `{}` failed to list {}", repo.name(), bsn))?,
                None => None,
            };
            Ok(RepositoryListing {
                name: repo.name().to_string(),
                location: repo.location(),
                writable: repo.can_write(),
                versions,
            })
        })
        .collect()
}
