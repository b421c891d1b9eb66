use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::object::ObjectId;

/// An advisory edit lock held on a repository element.
///
/// Lock records live as ordinary nodes in a dedicated registry folder rather
/// than as store-native locks. `path` is the locked element's node path at
/// the time the lock was taken; readers compare it with the live path to
/// detect a registry that drifted away from the object graph.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    /// The locked element.
    pub object_id: ObjectId,
    /// Login of the lock holder.
    pub login: String,
    /// Display name of the lock holder.
    pub display_name: String,
    /// Why the lock was taken.
    pub message: String,
    /// When the lock was taken.
    pub locked_at: DateTime<Utc>,
    /// Node path of the locked element when the lock was taken.
    pub path: String,
}

impl LockRecord {
    /// Returns `true` if the lock is held by the given login.
    pub fn is_held_by(&self, login: &str) -> bool {
        self.login == login
    }
}
