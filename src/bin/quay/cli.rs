//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// quay - resolve and incrementally build a workspace of projects
#[derive(Parser)]
#[command(name = "quay")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Treat every project as stale and skip nothing
    #[arg(long, global = true, env = "QUAY_OFFLINE")]
    pub offline: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Run as if started in this directory
    #[arg(short = 'C', global = true, value_name = "DIR")]
    pub directory: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the resolved paths of a project
    Paths(PathsArgs),

    /// Build projects that are stale
    Build(BuildArgs),

    /// Report whether projects need a rebuild
    Stale(ProjectsArgs),

    /// Display the project dependency tree
    Tree(TreeArgs),

    /// Remove build outputs
    Clean(ProjectsArgs),

    /// Build and store deliverables in a repository
    Release(ReleaseArgs),

    /// List repositories, or the versions of a name in each
    Repos(ReposArgs),
}

#[derive(Args)]
pub struct PathsArgs {
    /// Project to show (defaults to the one containing the current directory)
    pub project: Option<String>,

    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct BuildArgs {
    /// Projects to build (defaults to the whole workspace)
    pub projects: Vec<String>,

    /// Build for testing, ignoring staleness
    #[arg(long)]
    pub test: bool,

    /// Number of parallel jobs
    #[arg(short, long)]
    pub jobs: Option<usize>,
}

#[derive(Args)]
pub struct ProjectsArgs {
    /// Projects to act on (defaults to all)
    pub projects: Vec<String>,
}

#[derive(Args)]
pub struct TreeArgs {
    /// Project to show the tree for (defaults to the current one, or all)
    pub project: Option<String>,
}

#[derive(Args)]
pub struct ReleaseArgs {
    /// Projects to release (defaults to all)
    pub projects: Vec<String>,

    /// Repository to release to
    #[arg(long)]
    pub repo: Option<String>,
}

#[derive(Args)]
pub struct ReposArgs {
    /// Symbolic name to list versions of
    pub name: Option<String>,
}
