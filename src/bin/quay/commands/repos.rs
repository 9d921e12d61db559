//! `quay repos` command

use anyhow::Result;

use crate::cli::ReposArgs;
use quay::ops::list_repositories;
use quay::util::GlobalContext;

pub fn execute(gctx: &GlobalContext, args: ReposArgs) -> Result<i32> {
    let ws = super::workspace(gctx)?;
    let listing = list_repositories(&ws, args.name.as_deref())?;

    if listing.is_empty() {
        eprintln!("no repositories configured");
        return Ok(0);
    }

    for repo in listing {
        let access = if repo.writable { "rw" } else { "ro" };
        match (&args.name, repo.versions) {
            (None, _) => println!("{} ({}) {}", repo.name, access, repo.location),
            (Some(_), None) => println!("{}: cannot list versions", repo.name),
            (Some(_), Some(versions)) => {
                let versions: Vec<String> = versions.iter().map(|v| v.to_string()).collect();
                println!("{}: {}", repo.name, versions.join(", "));
            }
        }
    }
    Ok(0)
}
