//! Foundation types for the Strata repository.
//!
//! This crate provides the identity, classification, and metadata types used
//! throughout Strata. Every other Strata crate depends on `strata-types`.
//!
//! # Key Types
//!
//! - [`ObjectId`] -- UUID handle of a node in the backing tree store
//! - [`ElementKind`] -- Closed set of repository element kinds and their extensions
//! - [`PropertyValue`] -- Typed value stored in a node property
//! - [`ObjectVersion`] -- Immutable snapshot metadata of one version
//! - [`LockRecord`] -- Advisory lock held on a repository element
//! - [`Actor`] -- The user performing repository operations

pub mod actor;
pub mod error;
pub mod kind;
pub mod lock;
pub mod object;
pub mod value;
pub mod version;

pub use actor::Actor;
pub use error::TypeError;
pub use kind::ElementKind;
pub use lock::LockRecord;
pub use object::ObjectId;
pub use value::PropertyValue;
pub use version::ObjectVersion;
