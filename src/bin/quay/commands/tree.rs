//! `quay tree` command

use anyhow::Result;

use crate::cli::TreeArgs;
use quay::ops::tree;
use quay::util::GlobalContext;

pub fn execute(gctx: &GlobalContext, args: TreeArgs) -> Result<i32> {
    let ws = super::workspace(gctx)?;

    let roots = match (&args.project, ws.project_for_path(gctx.cwd())) {
        (Some(name), _) => vec![super::current_project(&ws, gctx, Some(name))?],
        (None, Some(project)) => vec![project],
        (None, None) => ws.projects(),
    };

    for project in roots {
        for line in tree(&project)? {
            println!("{}", line);
        }
    }
    Ok(0)
}
