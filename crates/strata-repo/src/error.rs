use chrono::{DateTime, Utc};
use strata_store::{StoreError, StoreResult};
use strata_types::LockRecord;
use thiserror::Error;

/// Errors from repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// A directory, element, or node is absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// The element is locked by another user.
    #[error("locked by {display_name} ({login}) since {locked_at}: {message}")]
    AlreadyLocked {
        login: String,
        display_name: String,
        message: String,
        locked_at: DateTime<Utc>,
    },

    /// Repository state is inconsistent, or an operation would make it so.
    #[error("integrity violation: {0}")]
    IntegrityViolation(String),

    /// Serialized content could not be read back.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// The backing store failed.
    #[error("{context}: {source}")]
    Transport {
        context: String,
        #[source]
        source: StoreError,
    },

    #[error("version {label} not found for {object}")]
    VersionNotFound { object: String, label: String },

    /// The node was expected to carry a version history.
    #[error("not versionable: {path}")]
    NotVersionable { path: String },

    #[error("invalid attribute code {code:?}: {reason}")]
    InvalidAttributeCode { code: String, reason: String },

    #[error("invalid name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl RepositoryError {
    /// The error reported when `lock` blocks an edit.
    pub fn locked_by(lock: &LockRecord) -> Self {
        Self::AlreadyLocked {
            login: lock.login.clone(),
            display_name: lock.display_name.clone(),
            message: lock.message.clone(),
            locked_at: lock.locked_at,
        }
    }

    /// Translate a store failure, keeping `context` for the caller.
    pub(crate) fn from_store(context: String, err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::NotFound(format!("{context}: node {id}")),
            StoreError::NotVersionable { path } => Self::NotVersionable { path },
            StoreError::InvalidName { name, reason } => Self::InvalidName { name, reason },
            StoreError::VersionNotFound { node, label } => Self::VersionNotFound {
                object: node.to_string(),
                label,
            },
            StoreError::VersionInUse { label, .. } => {
                Self::Unsupported(format!("{context}: version {label} is in use"))
            }
            StoreError::NotReferenceable(id) => {
                Self::IntegrityViolation(format!("{context}: node {id} cannot be referenced"))
            }
            source => Self::Transport { context, source },
        }
    }
}

/// Attach operation context to store results.
pub(crate) trait StoreContext<T> {
    fn with_context<F: FnOnce() -> String>(self, context: F) -> RepoResult<T>;
}

impl<T> StoreContext<T> for StoreResult<T> {
    fn with_context<F: FnOnce() -> String>(self, context: F) -> RepoResult<T> {
        self.map_err(|e| RepositoryError::from_store(context(), e))
    }
}

/// Result alias for repository operations.
pub type RepoResult<T> = Result<T, RepositoryError>;
