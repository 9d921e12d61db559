//! Implementation of `quay build`.
//!
//! The sweep orders projects into dependency layers and builds each
//! layer in parallel. A layer starts only when the previous one is done,
//! and a project whose dependency failed is skipped. Projects that cannot
//! be prepared are reported as failed without stopping the others.

use std::collections::HashSet;
use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Result};
use indicatif::{ProgressBar, ProgressStyle};
use parking_lot::Mutex;
use rayon::prelude::*;

use crate::builder::BuildOutcome;
use crate::core::{Project, Workspace};
use crate::resolver::graph::build_layers;

/// Options for the build command.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Projects to build with their dependencies (empty = whole workspace)
    pub projects: Vec<String>,

    /// Produce test builds, bypassing staleness
    pub under_test: bool,

    /// Number of parallel jobs
    pub jobs: Option<usize>,

    /// Draw a progress bar on stderr when it is a terminal
    pub progress: bool,
}

/// What happened to one project during the sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectStatus {
    Built(BuildOutcome),
    Failed(String),
    /// Not attempted because the named dependency failed
    Skipped(String),
}

#[derive(Debug, Clone)]
pub struct ProjectReport {
    pub name: String,
    pub status: ProjectStatus,
}

/// Per-project results in build order.
#[derive(Debug, Clone, Default)]
pub struct BuildSummary {
    pub reports: Vec<ProjectReport>,
}

impl BuildSummary {
    pub fn failed(&self) -> impl Iterator<Item = &ProjectReport> {
        self.reports
            .iter()
            .filter(|r| !matches!(r.status, ProjectStatus::Built(_)))
    }

    pub fn is_ok(&self) -> bool {
        self.failed().next().is_none()
    }

    pub fn built_count(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| matches!(&r.status, ProjectStatus::Built(o) if o.was_built()))
            .count()
    }
}

/// Look up named projects, or take all of them when `names` is empty.
pub fn select_projects(ws: &Workspace, names: &[String]) -> Result<Vec<Arc<Project>>> {
    if names.is_empty() {
        return Ok(ws.projects());
    }

    let mut selected = Vec::new();
    for name in names {
        match ws.project(name) {
            Some(project) => selected.push(project),
            None => {
                let available = ws.project_names();
                bail!(
                    "project `{}` not found in workspace\n\
                     available projects: {}",
                    name,
                    if available.is_empty() {
                        "(none)".to_string()
                    } else {
                        available.join(", ")
                    }
                );
            }
        }
    }
    Ok(selected)
}

/// The selected projects together with their dependency closures.
///
/// Projects that cannot be prepared, a cycle for example, are left out and
/// reported as failed. Everything that depends on them fails to prepare too.
fn with_closure(selected: Vec<Arc<Project>>) -> (Vec<Arc<Project>>, Vec<ProjectReport>) {
    let mut seen = HashSet::new();
    let mut all = Vec::new();
    let mut unprepared = Vec::new();
    for project in selected {
        let closure = match project.dependson() {
            Ok(closure) => closure,
            Err(e) => {
                if seen.insert(project.name().to_string()) {
                    unprepared.push(ProjectReport {
                        name: project.name().to_string(),
                        status: ProjectStatus::Failed(format!("{:#}", e)),
                    });
                }
                continue;
            }
        };
        for dependency in closure {
            if seen.insert(dependency.name().to_string()) {
                all.push(dependency);
            }
        }
        if seen.insert(project.name().to_string()) {
            all.push(project);
        }
    }
    (all, unprepared)
}

fn build_one(project: &Arc<Project>, under_test: bool, failed: &Mutex<HashSet<String>>) -> ProjectStatus {
    let blocked = project.dependson().map(|deps| {
        let failed = failed.lock();
        deps.iter()
            .find(|d| failed.contains(d.name()))
            .map(|d| d.name().to_string())
    });

    let status = match blocked {
        Err(e) => ProjectStatus::Failed(format!("{:#}", e)),
        Ok(Some(dependency)) => ProjectStatus::Skipped(dependency),
        Ok(None) => {
            let result = if under_test {
                project.build_local(true).map(BuildOutcome::Built)
            } else {
                project.build()
            };
            match result {
                Ok(outcome) => ProjectStatus::Built(outcome),
                Err(e) => ProjectStatus::Failed(format!("{:#}", e)),
            }
        }
    };

    if !matches!(status, ProjectStatus::Built(_)) {
        failed.lock().insert(project.name().to_string());
    }
    status
}

/// Build the workspace, or the named projects and what they depend on.
pub fn build_workspace(ws: &Workspace, opts: &BuildOptions) -> Result<BuildSummary> {
    let start = Instant::now();
    let (projects, unprepared) = with_closure(select_projects(ws, &opts.projects)?);
    let layers = build_layers(&projects)?;
    let total = projects.len() + unprepared.len();

    tracing::debug!("building {} projects in {} layers", total, layers.len());

    let mut pool = rayon::ThreadPoolBuilder::new();
    if let Some(jobs) = opts.jobs {
        pool = pool.num_threads(jobs);
    }
    let pool = pool.build()?;

    let pb = if opts.progress && total > 1 && std::io::stderr().is_terminal() {
        let pb = ProgressBar::new(total as u64);
        if let Ok(style) =
            ProgressStyle::default_bar().template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        Some(pb)
    } else {
        None
    };

    let mut summary = BuildSummary::default();
    for report in unprepared {
        if let ProjectStatus::Failed(e) = &report.status {
            tracing::warn!("{} failed: {}", report.name, e);
        }
        summary.reports.push(report);
    }
    let failed = Mutex::new(
        summary
            .reports
            .iter()
            .map(|r| r.name.clone())
            .collect::<HashSet<_>>(),
    );
    if let Some(pb) = &pb {
        pb.inc(summary.reports.len() as u64);
    }

    for layer in &layers {
        let statuses: Vec<ProjectStatus> = pool.install(|| {
            layer
                .par_iter()
                .map(|project| {
                    let status = build_one(project, opts.under_test, &failed);
                    if let Some(pb) = &pb {
                        pb.set_message(project.name().to_string());
                        pb.inc(1);
                    }
                    status
                })
                .collect()
        });

        for (project, status) in layer.iter().zip(statuses) {
            match &status {
                ProjectStatus::Failed(e) => tracing::warn!("{} failed: {}", project.name(), e),
                ProjectStatus::Skipped(d) => {
                    tracing::warn!("{} skipped, dependency `{}` failed", project.name(), d)
                }
                ProjectStatus::Built(_) => {}
            }
            summary.reports.push(ProjectReport {
                name: project.name().to_string(),
                status,
            });
        }
    }

    if let Some(pb) = pb {
        pb.finish_with_message("done");
    }

    tracing::info!(
        "built {} of {} projects in {:.2}s",
        summary.built_count(),
        total,
        start.elapsed().as_secs_f64()
    );
    Ok(summary)
}
