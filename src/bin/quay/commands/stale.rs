//! `quay stale` command

use anyhow::Result;

use crate::cli::ProjectsArgs;
use quay::ops::stale;
use quay::util::GlobalContext;

pub fn execute(gctx: &GlobalContext, args: ProjectsArgs) -> Result<i32> {
    let ws = super::workspace(gctx)?;
    for (name, is_stale) in stale(&ws, &args.projects)? {
        println!("{} {}", if is_stale { "stale" } else { "fresh" }, name);
    }
    Ok(0)
}
