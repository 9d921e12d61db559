//! Command implementations

pub mod build;
pub mod clean;
pub mod paths;
pub mod release;
pub mod repos;
pub mod stale;
pub mod tree;

use std::sync::Arc;

use anyhow::{anyhow, bail, Result};

use quay::core::manifest::ManifestError;
use quay::core::{Project, Workspace};
use quay::util::diagnostic::suggestions;
use quay::util::GlobalContext;

/// The workspace enclosing the current directory.
pub fn workspace(gctx: &GlobalContext) -> Result<Arc<Workspace>> {
    Workspace::load(gctx).map_err(|e| match e.downcast_ref::<ManifestError>() {
        Some(ManifestError::NotFound { .. }) => {
            anyhow!("{}\nhelp: {}", e, suggestions::NO_MANIFEST)
        }
        _ => e,
    })
}

/// The named project, or the one containing the current directory.
pub fn current_project(
    ws: &Workspace,
    gctx: &GlobalContext,
    name: Option<&str>,
) -> Result<Arc<Project>> {
    if let Some(name) = name {
        return Ok(quay::ops::select_projects(ws, &[name.to_string()])?.remove(0));
    }
    match ws.project_for_path(gctx.cwd()) {
        Some(project) => Ok(project),
        None => bail!(
            "not inside a project; name one of: {}",
            ws.project_names().join(", ")
        ),
    }
}
