//! Path resolution.
//!
//! Declarations are parsed, each entry is resolved to a container by the
//! bundle resolver, and the path builder assembles and partitions the
//! results. Project closures and workspace build order live in `graph`.

pub mod bundle;
pub mod declaration;
pub mod errors;
pub mod graph;
pub mod path;

pub use bundle::BundleResolver;
pub use declaration::{Declaration, DUPLICATE_MARKER};
pub use errors::PrepareError;
pub use path::{partition, Partition, PartitionOptions, PathBuilder};
