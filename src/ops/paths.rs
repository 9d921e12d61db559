//! Implementation of `quay paths` and `quay tree`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;

use crate::core::{Container, ContainerKind, Project};
use crate::util::diagnostic::Diagnostic;

/// One path entry, as reported.
#[derive(Debug, Clone, Serialize)]
pub struct EntryReport {
    pub bsn: String,
    pub version: String,
    pub kind: ContainerKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&Container> for EntryReport {
    fn from(c: &Container) -> Self {
        EntryReport {
            bsn: c.bsn().to_string(),
            version: c.version().to_string(),
            kind: c.kind(),
            file: c.file().map(PathBuf::from),
            error: c.error().map(str::to_string),
        }
    }
}

/// Every resolved path of one project.
#[derive(Debug, Clone, Serialize)]
pub struct PathReport {
    pub project: String,
    pub buildpath: Vec<EntryReport>,
    pub testpath: Vec<EntryReport>,
    pub bootclasspath: Vec<EntryReport>,
    pub runpath: Vec<EntryReport>,
    pub runbundles: Vec<EntryReport>,
    pub runfw: Vec<EntryReport>,
    pub sourcepath: Vec<PathBuf>,
    pub dependson: Vec<String>,
    /// Entries that failed to resolve
    pub errors: Vec<EntryReport>,
    pub diagnostics: Vec<Diagnostic>,
}

impl PathReport {
    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }
}

fn entries(containers: &[Container]) -> Vec<EntryReport> {
    containers.iter().map(EntryReport::from).collect()
}

/// Prepare `project` and collect all of its paths, run paths included.
pub fn path_report(project: &Arc<Project>) -> Result<PathReport> {
    let paths = project.prepare()?;
    let runpath = project.runpath()?;
    let runbundles = project.runbundles()?;
    let runfw = project.runfw()?;

    Ok(PathReport {
        project: project.name().to_string(),
        buildpath: entries(&paths.buildpath),
        testpath: entries(&paths.testpath),
        bootclasspath: entries(&paths.bootclasspath),
        runpath: entries(&runpath),
        runbundles: entries(&runbundles),
        runfw: entries(&runfw),
        sourcepath: paths.sourcepath.clone(),
        dependson: paths.dependson.iter().map(|p| p.name().to_string()).collect(),
        errors: entries(&paths.errors),
        diagnostics: project.diagnostics()?,
    })
}

/// Plain-text rendering, one section per path.
pub fn format_report(report: &PathReport) -> String {
    let mut out = format!("{}\n", report.project);

    let sections: [(&str, &[EntryReport]); 6] = [
        ("buildpath", &report.buildpath),
        ("testpath", &report.testpath),
        ("bootclasspath", &report.bootclasspath),
        ("runpath", &report.runpath),
        ("runbundles", &report.runbundles),
        ("runfw", &report.runfw),
    ];
    for (name, list) in sections {
        if list.is_empty() {
            continue;
        }
        out.push_str(&format!("  {}:\n", name));
        for entry in list {
            let location = entry
                .file
                .as_ref()
                .map(|f| f.display().to_string())
                .unwrap_or_default();
            out.push_str(&format!("    {};version={}  {}\n", entry.bsn, entry.version, location));
        }
    }

    if !report.sourcepath.is_empty() {
        out.push_str("  sourcepath:\n");
        for dir in &report.sourcepath {
            out.push_str(&format!("    {}\n", dir.display()));
        }
    }

    if !report.dependson.is_empty() {
        out.push_str(&format!("  dependson: {}\n", report.dependson.join(", ")));
    }
    out
}

/// Lines of the dependency tree of `project`, one per project.
///
/// Direct dependencies are those the project's closure does not already
/// reach through another dependency.
pub fn tree(project: &Arc<Project>) -> Result<Vec<String>> {
    let mut lines = Vec::new();
    let mut seen = Vec::new();
    tree_lines(project, 0, &mut seen, &mut lines)?;
    Ok(lines)
}

fn tree_lines(
    project: &Arc<Project>,
    depth: usize,
    seen: &mut Vec<String>,
    lines: &mut Vec<String>,
) -> Result<()> {
    let prefix = if depth == 0 {
        String::new()
    } else {
        format!("{}├── ", "│   ".repeat(depth - 1))
    };

    let duplicate = seen.iter().any(|n| n == project.name());
    lines.push(format!(
        "{}{}{}",
        prefix,
        project.name(),
        if duplicate { " (*)" } else { "" }
    ));
    if duplicate {
        return Ok(());
    }
    seen.push(project.name().to_string());

    let closure = project.dependson()?;
    let mut indirect = std::collections::HashSet::new();
    for dependency in &closure {
        for nested in dependency.dependson()? {
            indirect.insert(nested.name().to_string());
        }
    }

    for dependency in closure.iter().filter(|d| !indirect.contains(d.name())) {
        tree_lines(dependency, depth + 1, seen, lines)?;
    }
    Ok(())
}
