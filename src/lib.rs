//! quay - a workspace build orchestrator
//!
//! This crate resolves the build, test and run paths of interdependent
//! projects against a set of versioned repositories, orders the projects
//! by their dependencies, and rebuilds only the ones that are stale.

pub mod builder;
pub mod core;
pub mod ops;
pub mod resolver;
pub mod sources;
pub mod util;

/// Test utilities for quay unit tests.
///
/// Only compiled for tests. Provides temporary workspaces, a repository
/// that counts its queries, and a producer that records its requests.
#[cfg(test)]
pub mod test_support;

pub use core::{Container, Project, Version, Workspace};
pub use resolver::PrepareError;
pub use util::context::GlobalContext;
