//! `quay release` command

use anyhow::Result;

use crate::cli::ReleaseArgs;
use quay::ops::release;
use quay::util::GlobalContext;

pub fn execute(gctx: &GlobalContext, args: ReleaseArgs) -> Result<i32> {
    let ws = super::workspace(gctx)?;
    for (name, files) in release(&ws, &args.projects, args.repo.as_deref())? {
        if files.is_empty() {
            eprintln!("     Skipped {} (no output)", name);
        }
        for file in files {
            eprintln!("    Released {} -> {}", name, file.display());
        }
    }
    Ok(0)
}
