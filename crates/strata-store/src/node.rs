use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strata_types::{ObjectId, PropertyValue};

use crate::error::{StoreError, StoreResult};

/// Label of the placeholder version every history starts with.
pub const ROOT_VERSION_LABEL: &str = "root";

/// Primary type of a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    /// The single root of the tree.
    Root,
    /// Free-form node holding any properties and children.
    Unstructured,
    /// A repository folder.
    Folder,
    /// An advisory lock record.
    Lock,
    /// A usage relation between two elements.
    Relation,
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => write!(f, "root"),
            Self::Unstructured => write!(f, "unstructured"),
            Self::Folder => write!(f, "folder"),
            Self::Lock => write!(f, "lock"),
            Self::Relation => write!(f, "relation"),
        }
    }
}

/// Optional capabilities attached to a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Mixin {
    /// The node may be the target of reference properties.
    Referenceable,
    /// The node may be locked. Recorded only; native locks are not offered.
    Lockable,
    /// The node carries a version history and the checkout/checkin cycle.
    Versionable,
}

/// Read-only view of a node's identity and state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeInfo {
    pub id: ObjectId,
    pub name: String,
    pub node_type: NodeType,
    pub parent: Option<ObjectId>,
    pub mixins: BTreeSet<Mixin>,
    /// Always `true` for non-versionable nodes.
    pub checked_out: bool,
}

impl NodeInfo {
    pub fn has_mixin(&self, mixin: Mixin) -> bool {
        self.mixins.contains(&mixin)
    }

    pub fn is_versionable(&self) -> bool {
        self.has_mixin(Mixin::Versionable)
    }
}

/// Handle to one version in a node's history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRef {
    pub node: ObjectId,
    pub label: String,
    pub created: DateTime<Utc>,
}

impl VersionRef {
    pub fn is_root(&self) -> bool {
        self.label == ROOT_VERSION_LABEL
    }
}

/// State of a node subtree captured by a version.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FrozenNode {
    pub name: String,
    pub properties: BTreeMap<String, PropertyValue>,
    pub children: Vec<FrozenNode>,
}

impl FrozenNode {
    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    pub fn child(&self, name: &str) -> Option<&FrozenNode> {
        self.children.iter().find(|c| c.name == name)
    }
}

/// Characters never allowed in a node name.
const FORBIDDEN_NAME_CHARS: &[char] = &['/', '[', ']', '*', '|', '\n', '\r', '\t'];

/// Validate a node name.
///
/// Names are single path segments: non-empty, not `.` or `..`, and free of
/// path and pattern syntax.
pub fn validate_node_name(name: &str) -> StoreResult<()> {
    let invalid = |reason: &str| StoreError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };
    if name.is_empty() {
        return Err(invalid("name must not be empty"));
    }
    if name == "." || name == ".." {
        return Err(invalid("name must not be a relative path segment"));
    }
    if let Some(ch) = name.chars().find(|c| FORBIDDEN_NAME_CHARS.contains(c)) {
        return Err(invalid(&format!("contains forbidden character: {ch:?}")));
    }
    Ok(())
}
