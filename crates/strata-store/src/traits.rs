use std::sync::Arc;

use strata_types::{ObjectId, PropertyValue};

use crate::error::{StoreError, StoreResult};
use crate::node::{FrozenNode, Mixin, NodeInfo, NodeType, VersionRef};

/// A hierarchical, versioned node store.
///
/// The store itself only hands out sessions. All reads and writes go through
/// a [`TreeSession`], which is the unit of work: mutations stay private to
/// the session until [`TreeSession::save`] flushes them, and
/// [`TreeSession::refresh`] discards them.
pub trait TreeStore: Send + Sync {
    type Session: TreeSession;

    /// Open a new session with no pending changes.
    fn open_session(&self) -> StoreResult<Self::Session>;
}

impl<T: TreeStore + ?Sized> TreeStore for Arc<T> {
    type Session = T::Session;

    fn open_session(&self) -> StoreResult<Self::Session> {
        (**self).open_session()
    }
}

/// One unit of work against a [`TreeStore`].
///
/// Implementations must satisfy these invariants:
/// - Sibling names are unique; adding a duplicate fails with `ItemExists`,
///   both inside the session and when flushing against concurrent changes.
/// - A versionable node that is checked in is read-only, and so is the set
///   of its children.
/// - Version histories only grow through `checkin`; `remove_version` is the
///   single administrative exception.
/// - Node ids are never reused.
/// - All failures are reported, never silently ignored.
pub trait TreeSession {
    /// The root node of the tree.
    fn root(&self) -> StoreResult<ObjectId>;

    /// Identity and state of a node. Fails with `NotFound` if absent.
    fn node(&self, id: ObjectId) -> StoreResult<NodeInfo>;

    /// Resolve a node by id. Returns `Ok(None)` if it does not exist.
    fn resolve(&self, id: ObjectId) -> StoreResult<Option<NodeInfo>> {
        match self.node(id) {
            Ok(info) => Ok(Some(info)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Child of `parent` with the given name, if any.
    fn child(&self, parent: ObjectId, name: &str) -> StoreResult<Option<ObjectId>>;

    /// Children of a node in insertion order.
    fn children(&self, parent: ObjectId) -> StoreResult<Vec<ObjectId>>;

    /// Create a named child node.
    fn add_child(&mut self, parent: ObjectId, name: &str, node_type: NodeType)
        -> StoreResult<ObjectId>;

    /// Attach a mixin. Adding `Versionable` starts a history and leaves the
    /// node checked out.
    fn add_mixin(&mut self, id: ObjectId, mixin: Mixin) -> StoreResult<()>;

    /// Physically remove a node and its whole subtree.
    fn remove(&mut self, id: ObjectId) -> StoreResult<()>;

    /// Read a property. Returns `Ok(None)` if unset.
    fn property(&self, id: ObjectId, key: &str) -> StoreResult<Option<PropertyValue>>;

    /// All properties of a node, ordered by key.
    fn properties(&self, id: ObjectId) -> StoreResult<Vec<(String, PropertyValue)>>;

    /// Write a property. References must target a referenceable node.
    fn set_property(&mut self, id: ObjectId, key: &str, value: PropertyValue) -> StoreResult<()>;

    /// Remove a property. Returns `true` if it was set.
    fn remove_property(&mut self, id: ObjectId, key: &str) -> StoreResult<bool>;

    /// Absolute path of a node (`/` for the root).
    fn path(&self, id: ObjectId) -> StoreResult<String>;

    /// Resolve an absolute or root-relative path. Returns `Ok(None)` if any
    /// segment is missing.
    fn node_at_path(&self, path: &str) -> StoreResult<Option<ObjectId>> {
        let mut current = self.root()?;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            match self.child(current, segment)? {
                Some(next) => current = next,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    /// Make a checked-in versionable node writable.
    fn checkout(&mut self, id: ObjectId) -> StoreResult<()>;

    /// Snapshot a checked-out node into a new version and make it read-only.
    fn checkin(&mut self, id: ObjectId) -> StoreResult<VersionRef>;

    /// The placeholder version at the start of a node's history.
    fn root_version(&self, id: ObjectId) -> StoreResult<VersionRef>;

    /// Direct successors of a version.
    fn successors(&self, version: &VersionRef) -> StoreResult<Vec<VersionRef>>;

    /// Look up a version by label. Returns `Ok(None)` if absent.
    fn version_by_label(&self, id: ObjectId, label: &str) -> StoreResult<Option<VersionRef>>;

    /// The node state captured by a version.
    fn frozen(&self, version: &VersionRef) -> StoreResult<FrozenNode>;

    /// Remove one version from a history, relinking its neighbours.
    fn remove_version(&mut self, id: ObjectId, label: &str) -> StoreResult<()>;

    /// Flush all pending changes.
    fn save(&mut self) -> StoreResult<()>;

    /// Discard all pending changes.
    fn refresh(&mut self);

    /// Returns `true` if the session holds unsaved changes.
    fn has_pending_changes(&self) -> bool;
}
