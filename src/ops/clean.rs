//! Implementation of `quay clean` and `quay stale`.

use anyhow::{Context, Result};

use crate::core::Workspace;
use crate::ops::build::select_projects;

/// Clean the named projects, or all of them. Returns the cleaned names.
pub fn clean(ws: &Workspace, names: &[String]) -> Result<Vec<String>> {
    let mut cleaned = Vec::new();
    for project in select_projects(ws, names)? {
        project
            .clean()
            .with_context(|| format!("failed to clean `{}`", project.name()))?;
        cleaned.push(project.name().to_string());
    }
    Ok(cleaned)
}

/// Staleness of the named projects, or all of them, in name order.
pub fn stale(ws: &Workspace, names: &[String]) -> Result<Vec<(String, bool)>> {
    select_projects(ws, names)?
        .iter()
        .map(|project| Ok((project.name().to_string(), project.is_stale()?)))
        .collect()
}
