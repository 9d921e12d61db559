//! Core data structures for quay.
//!
//! This module contains the foundational types used throughout quay:
//! - Versions, ranges and selection strategies
//! - Containers (resolved path entries)
//! - Project and workspace manifests
//! - Projects, their prepared paths, and the workspace registry

pub mod container;
pub mod contributor;
pub(crate) mod locks;
pub mod manifest;
pub mod project;
pub mod version;
pub mod workspace;

pub use container::{Container, ContainerKind};
pub use contributor::{ContributorRegistry, DependencyContributor, SharedContributor};
pub use manifest::{PathKind, ProjectManifest, WorkspaceManifest, MANIFEST_NAME};
pub use project::{PrepareContext, Project, ResolvedPaths};
pub use version::{RangeToken, Strategy, Version, VersionRange};
pub use workspace::{Workspace, WorkspaceOptions};
