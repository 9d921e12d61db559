//! `quay build` command

use anyhow::Result;

use crate::cli::BuildArgs;
use quay::ops::{build_workspace, BuildOptions, ProjectStatus};
use quay::util::GlobalContext;

pub fn execute(gctx: &GlobalContext, args: BuildArgs) -> Result<i32> {
    let ws = super::workspace(gctx)?;

    let opts = BuildOptions {
        projects: args.projects,
        under_test: args.test,
        jobs: args.jobs,
        progress: !gctx.is_verbose(),
    };

    let summary = build_workspace(&ws, &opts)?;

    for report in &summary.reports {
        match &report.status {
            ProjectStatus::Built(outcome) if outcome.was_built() => {
                eprintln!("       Built {}", report.name)
            }
            ProjectStatus::Built(_) => eprintln!("       Fresh {}", report.name),
            ProjectStatus::Failed(e) => eprintln!("      Failed {}: {}", report.name, e),
            ProjectStatus::Skipped(dep) => {
                eprintln!("     Skipped {} (dependency `{}` failed)", report.name, dep)
            }
        }
    }

    Ok(if summary.is_ok() { 0 } else { 1 })
}
