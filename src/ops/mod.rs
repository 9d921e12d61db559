//! High-level operations.
//!
//! This module contains the implementation of quay commands.

pub mod build;
pub mod clean;
pub mod paths;
pub mod release;

pub use build::{build_workspace, select_projects, BuildOptions, BuildSummary, ProjectStatus};
pub use clean::{clean, stale};
pub use paths::{format_report, path_report, tree, PathReport};
pub use release::{list_repositories, release, RepositoryListing};
