use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TypeError;

/// Stable identifier of a node in the backing tree store.
///
/// An `ObjectId` is a UUID assigned by the store when a node is created. It
/// survives renames, moves, and new versions, which makes it the only safe
/// way to hold on to a node across operations. The repository never keeps
/// live node handles; it keeps `ObjectId`s and re-resolves them.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(Uuid);

impl ObjectId {
    /// Generate a new time-ordered identifier (UUID v7).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Wrap an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// The nil identifier (all zeros). Never assigned to a node.
    pub const fn nil() -> Self {
        Self(Uuid::nil())
    }

    /// Returns `true` if this is the nil identifier.
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    /// Short representation (first 8 characters of the UUID).
    pub fn short_id(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }

    /// Parse from the hyphenated UUID string form.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| TypeError::InvalidObjectId(format!("{s}: {e}")))
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for ObjectId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.short_id())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl From<Uuid> for ObjectId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}
