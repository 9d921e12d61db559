//! `quay paths` command

use anyhow::Result;

use crate::cli::PathsArgs;
use quay::ops::{format_report, path_report};
use quay::util::diagnostic::emit;
use quay::util::GlobalContext;

pub fn execute(gctx: &GlobalContext, args: PathsArgs) -> Result<i32> {
    let ws = super::workspace(gctx)?;
    let project = super::current_project(&ws, gctx, args.project.as_deref())?;
    let report = path_report(&project)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", format_report(&report));
        for diagnostic in &report.diagnostics {
            emit(diagnostic, gctx.color());
        }
    }

    Ok(if report.error_count() > 0 { 1 } else { 0 })
}
