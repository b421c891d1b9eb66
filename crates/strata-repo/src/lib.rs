//! Versioned element repository for Strata.
//!
//! `strata-repo` layers repository policy over a [`strata_store::TreeStore`]:
//! elements of a closed set of kinds live in a folder hierarchy, every save
//! creates a version, deletion is a tombstone, and edits are gated by
//! advisory locks kept in a registry folder.
//!
//! # Components
//!
//! - [`path`] -- canonical node paths of directories and elements
//! - [`DirectoryTree`] -- logical directories mapped onto folder nodes
//! - [`AttributeStore`] -- typed scalar and indexed attributes on nodes
//! - [`VersionManager`] -- checkout/checkin cycle and linear histories
//! - [`LockManager`] -- advisory locks in the registry folder
//! - [`TombstoneManager`] -- soft deletion through a versioned flag
//! - [`Repository`] -- the facade composing all of the above
//!
//! # Design Rules
//!
//! 1. Every repository operation is one unit of work: it flushes once on
//!    success and discards its changes on failure. Directory creation is the
//!    exception and flushes per folder.
//! 2. Element identity is directory, name, and kind; the kind's extension is
//!    part of the node name.
//! 3. Version histories are linear. A branch is reported as an integrity
//!    violation, never silently followed.
//! 4. Reserved properties contain `:`, which attribute codes may not.
//! 5. A lock held by another user blocks save, delete, and undelete; the
//!    holder's own lock is released by the edit.

pub mod attributes;
pub mod codec;
pub mod config;
pub mod directory;
pub mod element;
pub mod error;
pub mod lock;
pub mod path;
mod props;
pub mod repository;
pub mod tombstone;
pub mod version;

// Re-export primary types at crate root for ergonomic imports.
pub use attributes::{AttributeKey, AttributeMap, AttributeStore, INDEX_SEPARATOR};
pub use codec::{JsonCodec, PayloadCodec};
pub use config::{RepositoryConfig, DEFAULT_LOCK_REGISTRY};
pub use directory::{DirectoryTree, RepositoryDirectory};
pub use element::{ElementPayload, ElementRelation, RepositoryElement, RepositoryObject, SubObject};
pub use error::{RepoResult, RepositoryError};
pub use lock::LockManager;
pub use repository::Repository;
pub use tombstone::TombstoneManager;
pub use version::{CommitInfo, VersionManager, VersionState};

pub use strata_store::{InMemoryTreeStore, TreeSession, TreeStore};
pub use strata_types::{Actor, ElementKind, LockRecord, ObjectId, ObjectVersion, PropertyValue};
