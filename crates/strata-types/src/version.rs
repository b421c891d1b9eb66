use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata of one version in an element's version chain.
///
/// Versions are immutable once created. The label is assigned by the store
/// on check-in and is unique within one chain; comment and author are
/// stamped by the repository right before check-in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectVersion {
    /// Store-assigned version label (e.g. `"1.3"`).
    pub label: String,
    /// Version comment supplied by the saving user.
    pub comment: String,
    /// Login of the user who created the version.
    pub author: String,
    /// Creation time of the version.
    pub created: DateTime<Utc>,
}

impl ObjectVersion {
    pub fn new(
        label: impl Into<String>,
        comment: impl Into<String>,
        author: impl Into<String>,
        created: DateTime<Utc>,
    ) -> Self {
        Self {
            label: label.into(),
            comment: comment.into(),
            author: author.into(),
            created,
        }
    }
}

impl fmt::Display for ObjectVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{} by {}", self.label, self.author)?;
        if !self.comment.is_empty() {
            write!(f, ": {}", self.comment)?;
        }
        Ok(())
    }
}
