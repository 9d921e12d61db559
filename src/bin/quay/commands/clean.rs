//! `quay clean` command

use anyhow::Result;

use crate::cli::ProjectsArgs;
use quay::ops::clean;
use quay::util::GlobalContext;

pub fn execute(gctx: &GlobalContext, args: ProjectsArgs) -> Result<i32> {
    let ws = super::workspace(gctx)?;
    for name in clean(&ws, &args.projects)? {
        eprintln!("     Cleaned {}", name);
    }
    Ok(0)
}
