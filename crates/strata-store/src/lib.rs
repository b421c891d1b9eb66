//! Hierarchical versioned node store for the Strata repository.
//!
//! This crate is the storage capability the repository layer is built on: a
//! tree of named nodes with typed properties, optional mixins, and per-node
//! version histories driven by a checkout/checkin cycle. It knows nothing of
//! directories, elements, locks, or tombstones; those are policies layered on
//! top in `strata-repo`.
//!
//! # Capabilities
//!
//! All engines implement the [`TreeStore`] trait, which hands out
//! [`TreeSession`]s. A session is one unit of work: changes stay private
//! until [`TreeSession::save`] and are dropped by [`TreeSession::refresh`].
//!
//! - [`InMemoryTreeStore`] -- shared in-memory tree, optionally mirrored to a
//!   JSON snapshot file
//!
//! # Design Rules
//!
//! 1. Sibling names are unique.
//! 2. A checked-in versionable node is read-only.
//! 3. Reference properties only target referenceable nodes.
//! 4. Node ids and version labels are never reused.
//! 5. A save either applies every pending change or none of them.

pub mod error;
pub mod memory;
pub mod node;
mod snapshot;
mod state;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use error::{StoreError, StoreResult};
pub use memory::{InMemorySession, InMemoryTreeStore};
pub use node::{
    validate_node_name, FrozenNode, Mixin, NodeInfo, NodeType, VersionRef, ROOT_VERSION_LABEL,
};
pub use traits::{TreeSession, TreeStore};
