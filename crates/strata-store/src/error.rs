use strata_types::ObjectId;

/// Errors from tree store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested node was not found.
    #[error("node not found: {0}")]
    NotFound(ObjectId),

    /// A sibling with the same name already exists.
    #[error("item already exists: {path}")]
    ItemExists { path: String },

    /// The node does not carry the versionable mixin.
    #[error("node is not versionable: {path}")]
    NotVersionable { path: String },

    /// The node is checked in and therefore read-only.
    #[error("node is checked in: {path}")]
    CheckedIn { path: String },

    /// A reference property pointed at a node without the referenceable mixin.
    #[error("node cannot be referenced: {0}")]
    NotReferenceable(ObjectId),

    /// The version label does not exist in the node's history.
    #[error("version {label} not found for node {node}")]
    VersionNotFound { node: ObjectId, label: String },

    /// The version cannot be removed (root or current base version).
    #[error("version {label} of node {node} is in use")]
    VersionInUse { node: ObjectId, label: String },

    /// The node was modified by another session since it was read.
    #[error("concurrent modification of node {0}")]
    Conflict(ObjectId),

    /// Node names must be non-empty and free of path syntax.
    #[error("invalid node name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    /// The operation is not supported on this node.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the snapshot file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The shared state lock was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    Poisoned,
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
