//! Staleness checker.
//!
//! A project is stale when its recorded outputs are missing, older than
//! its own manifest and sources, or older than anything a dependency
//! produced since.
//!
//! A dependency already seen in the current check is reported fresh.
//! That is only sound when every project is also checked on its own, as
//! the workspace build sweep does; a single isolated check can under-report
//! staleness in diamond-shaped graphs.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::SystemTime;

use anyhow::Result;

use crate::core::project::Project;
use crate::util::fs::mtime;

/// Decide whether `project` must be rebuilt.
pub fn is_stale(project: &Arc<Project>, visited: &mut HashSet<String>) -> Result<bool> {
    if project.is_offline() {
        return Ok(true);
    }

    if project.no_output() {
        return Ok(false);
    }

    if !visited.insert(project.name().to_string()) {
        tracing::debug!("{}: already checked in this pass", project.name());
        return Ok(false);
    }

    let Some(files) = project.build_files()? else {
        tracing::debug!("{}: no build record", project.name());
        return Ok(true);
    };

    let last_modified = project.last_modified();
    let mut build_time = SystemTime::UNIX_EPOCH;

    for file in &files {
        let modified = mtime(file).unwrap_or(SystemTime::UNIX_EPOCH);
        if last_modified.is_some_and(|lm| modified < lm) {
            tracing::debug!(
                "{}: {} is older than the project sources",
                project.name(),
                file.display()
            );
            return Ok(true);
        }
        build_time = build_time.max(modified);
    }

    let paths = project.prepare()?;
    for dependency in &paths.dependson {
        if Arc::ptr_eq(dependency, project) {
            continue;
        }

        if is_stale(dependency, visited)? {
            tracing::debug!("{}: dependency `{}` is stale", project.name(), dependency.name());
            return Ok(true);
        }

        if let Some(dep_files) = dependency.build_files()? {
            for file in &dep_files {
                if mtime(file).is_some_and(|m| m >= build_time) {
                    tracing::debug!(
                        "{}: {} is newer than the last build",
                        project.name(),
                        file.display()
                    );
                    return Ok(true);
                }
            }
        }
    }

    Ok(false)
}
