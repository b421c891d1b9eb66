use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard};

use chrono::Utc;
use strata_types::{ObjectId, PropertyValue};
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::node::{FrozenNode, Mixin, NodeInfo, NodeType, VersionRef, ROOT_VERSION_LABEL};
use crate::snapshot::{read_snapshot, write_snapshot};
use crate::state::{NodeRecord, TreeState, VersionHistory, VersionRecord};
use crate::traits::{TreeSession, TreeStore};

/// In-memory tree store.
///
/// The tree lives behind a shared `RwLock`; sessions stage their changes
/// privately and merge them on save. When opened with a snapshot path, every
/// successful save also rewrites the snapshot file before the new state
/// becomes visible.
pub struct InMemoryTreeStore {
    state: Arc<RwLock<TreeState>>,
    snapshot: Option<PathBuf>,
}

impl InMemoryTreeStore {
    /// Create a new store holding only a root node.
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(TreeState::new())),
            snapshot: None,
        }
    }

    /// Open a store persisted at `path`, loading the snapshot if it exists.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let state = match read_snapshot(&path)? {
            Some(state) => state,
            None => {
                let state = TreeState::new();
                write_snapshot(&path, &state)?;
                state
            }
        };
        info!(path = %path.display(), nodes = state.nodes.len(), "opened tree store");
        Ok(Self {
            state: Arc::new(RwLock::new(state)),
            snapshot: Some(path),
        })
    }

    /// Snapshot file backing this store, if any.
    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot.as_deref()
    }

    /// Number of nodes currently stored, including the root.
    pub fn node_count(&self) -> StoreResult<usize> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state.nodes.len())
    }
}

impl Default for InMemoryTreeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InMemoryTreeStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryTreeStore")
            .field("nodes", &self.node_count().unwrap_or(0))
            .field("snapshot", &self.snapshot)
            .finish()
    }
}

impl TreeStore for InMemoryTreeStore {
    type Session = InMemorySession;

    fn open_session(&self) -> StoreResult<InMemorySession> {
        Ok(InMemorySession {
            shared: Arc::clone(&self.state),
            snapshot: self.snapshot.clone(),
            staged: HashMap::new(),
            removed: HashSet::new(),
            added: Vec::new(),
        })
    }
}

/// A node copied into a session for modification.
struct Staged {
    record: NodeRecord,
    /// Revision the copy was taken at; `None` for nodes created in-session.
    base_revision: Option<u64>,
    /// Properties, mixins or version state changed.
    dirty: bool,
}

/// Session over an [`InMemoryTreeStore`].
///
/// Reads see the session's own pending changes layered over the shared tree.
/// `save` fails with `Conflict` if another session flushed a content change
/// to a node this session also changed.
pub struct InMemorySession {
    shared: Arc<RwLock<TreeState>>,
    snapshot: Option<PathBuf>,
    staged: HashMap<ObjectId, Staged>,
    removed: HashSet<ObjectId>,
    added: Vec<(ObjectId, ObjectId)>,
}

impl fmt::Debug for InMemorySession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemorySession")
            .field("staged", &self.staged.len())
            .field("removed", &self.removed.len())
            .field("added", &self.added.len())
            .finish()
    }
}

impl InMemorySession {
    fn read_shared(&self) -> StoreResult<RwLockReadGuard<'_, TreeState>> {
        self.shared.read().map_err(|_| StoreError::Poisoned)
    }

    fn with_node<R>(&self, id: ObjectId, f: impl FnOnce(&NodeRecord) -> R) -> StoreResult<R> {
        if self.removed.contains(&id) {
            return Err(StoreError::NotFound(id));
        }
        if let Some(staged) = self.staged.get(&id) {
            return Ok(f(&staged.record));
        }
        let state = self.read_shared()?;
        state.nodes.get(&id).map(f).ok_or(StoreError::NotFound(id))
    }

    /// Copy a node into the session, if not already there.
    fn stage(&mut self, id: ObjectId) -> StoreResult<&mut Staged> {
        if self.removed.contains(&id) {
            return Err(StoreError::NotFound(id));
        }
        if !self.staged.contains_key(&id) {
            let record = {
                let state = self.read_shared()?;
                state.nodes.get(&id).cloned().ok_or(StoreError::NotFound(id))?
            };
            let base_revision = Some(record.revision);
            self.staged.insert(
                id,
                Staged {
                    record,
                    base_revision,
                    dirty: false,
                },
            );
        }
        self.staged.get_mut(&id).ok_or(StoreError::NotFound(id))
    }

    fn ensure_writable(&self, id: ObjectId) -> StoreResult<()> {
        if self.with_node(id, NodeRecord::is_read_only)? {
            return Err(StoreError::CheckedIn {
                path: self.path(id)?,
            });
        }
        Ok(())
    }

    fn not_versionable(&self, id: ObjectId) -> StoreError {
        match self.path(id) {
            Ok(path) => StoreError::NotVersionable { path },
            Err(e) => e,
        }
    }

    /// Run `f` against a node's version history.
    fn with_history<R>(
        &self,
        id: ObjectId,
        f: impl FnOnce(&VersionHistory) -> R,
    ) -> StoreResult<R> {
        match self.with_node(id, |r| r.history.as_ref().map(f))? {
            Some(result) => Ok(result),
            None => Err(self.not_versionable(id)),
        }
    }

    fn live_children(&self, id: ObjectId) -> StoreResult<Vec<ObjectId>> {
        let children = self.with_node(id, |r| r.children.clone())?;
        Ok(children
            .into_iter()
            .filter(|c| !self.removed.contains(c))
            .collect())
    }

    fn subtree(&self, id: ObjectId) -> StoreResult<Vec<ObjectId>> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            stack.extend(self.live_children(next)?);
            out.push(next);
        }
        Ok(out)
    }

    fn freeze(&self, id: ObjectId) -> StoreResult<FrozenNode> {
        let (name, properties) = self.with_node(id, |r| (r.name.clone(), r.properties.clone()))?;
        let children = self
            .live_children(id)?
            .into_iter()
            .map(|c| self.freeze(c))
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(FrozenNode {
            name,
            properties,
            children,
        })
    }

    fn validate_flush(&self, state: &TreeState) -> StoreResult<()> {
        for (id, staged) in &self.staged {
            if let (Some(base), true) = (staged.base_revision, staged.dirty) {
                match state.nodes.get(id) {
                    Some(current) if current.revision == base => {}
                    _ => return Err(StoreError::Conflict(*id)),
                }
            }
        }
        for (parent, child) in &self.added {
            let Some(new_node) = self.staged.get(child) else {
                continue;
            };
            let name = &new_node.record.name;
            match state.nodes.get(parent) {
                Some(parent_rec) => {
                    let clash = parent_rec
                        .children
                        .iter()
                        .filter(|c| *c != child && !self.removed.contains(c))
                        .filter_map(|c| state.nodes.get(c))
                        .any(|c| c.name == *name);
                    if clash {
                        let parent_path = state.path_of(*parent);
                        return Err(StoreError::ItemExists {
                            path: join_path(&parent_path, name),
                        });
                    }
                }
                None => {
                    let created_here = self
                        .staged
                        .get(parent)
                        .is_some_and(|p| p.base_revision.is_none());
                    if !created_here {
                        return Err(StoreError::NotFound(*parent));
                    }
                }
            }
        }
        Ok(())
    }

    fn apply(&self, state: &mut TreeState) {
        for id in &self.removed {
            state.remove_subtree(*id);
        }
        for (id, staged) in &self.staged {
            match staged.base_revision {
                None => {
                    state.nodes.insert(*id, staged.record.clone());
                }
                Some(_) if staged.dirty => {
                    if let Some(current) = state.nodes.get_mut(id) {
                        current.properties = staged.record.properties.clone();
                        current.mixins = staged.record.mixins.clone();
                        current.history = staged.record.history.clone();
                        current.checked_out = staged.record.checked_out;
                        current.revision += 1;
                    }
                }
                Some(_) => {}
            }
        }
        for (parent, child) in &self.added {
            if !state.nodes.contains_key(child) {
                continue;
            }
            if let Some(parent) = state.nodes.get_mut(parent) {
                if !parent.children.contains(child) {
                    parent.children.push(*child);
                }
            }
        }
    }

    fn clear(&mut self) {
        self.staged.clear();
        self.removed.clear();
        self.added.clear();
    }
}

fn join_path(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// Replace `old` in a link list with `with`, keeping order and skipping
/// entries already present.
fn relink(links: &mut Vec<String>, old: &str, with: &[String]) {
    if let Some(pos) = links.iter().position(|l| l == old) {
        let replacement: Vec<String> = with
            .iter()
            .filter(|w| !links.contains(w))
            .cloned()
            .collect();
        links.splice(pos..=pos, replacement);
    }
}

impl TreeSession for InMemorySession {
    fn root(&self) -> StoreResult<ObjectId> {
        Ok(self.read_shared()?.root)
    }

    fn node(&self, id: ObjectId) -> StoreResult<NodeInfo> {
        self.with_node(id, NodeRecord::info)
    }

    fn child(&self, parent: ObjectId, name: &str) -> StoreResult<Option<ObjectId>> {
        for child in self.live_children(parent)? {
            match self.with_node(child, |r| r.name == name) {
                Ok(true) => return Ok(Some(child)),
                Ok(false) | Err(StoreError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    fn children(&self, parent: ObjectId) -> StoreResult<Vec<ObjectId>> {
        self.live_children(parent)
    }

    fn add_child(
        &mut self,
        parent: ObjectId,
        name: &str,
        node_type: NodeType,
    ) -> StoreResult<ObjectId> {
        crate::node::validate_node_name(name)?;
        if node_type == NodeType::Root {
            return Err(StoreError::Unsupported("a tree has a single root".into()));
        }
        self.ensure_writable(parent)?;
        if self.child(parent, name)?.is_some() {
            return Err(StoreError::ItemExists {
                path: join_path(&self.path(parent)?, name),
            });
        }

        let id = ObjectId::new();
        self.stage(parent)?.record.children.push(id);
        self.staged.insert(
            id,
            Staged {
                record: NodeRecord::new(id, name, node_type, Some(parent)),
                base_revision: None,
                dirty: true,
            },
        );
        self.added.push((parent, id));
        debug!(%parent, child = %id, name, %node_type, "staged new node");
        Ok(id)
    }

    fn add_mixin(&mut self, id: ObjectId, mixin: Mixin) -> StoreResult<()> {
        let staged = self.stage(id)?;
        if staged.record.mixins.insert(mixin) {
            staged.dirty = true;
            if mixin == Mixin::Versionable && staged.record.history.is_none() {
                staged.record.history = Some(VersionHistory::new(Utc::now()));
                staged.record.checked_out = true;
            }
        }
        Ok(())
    }

    fn remove(&mut self, id: ObjectId) -> StoreResult<()> {
        let Some(parent) = self.node(id)?.parent else {
            return Err(StoreError::Unsupported("cannot remove the root node".into()));
        };
        self.ensure_writable(parent)?;

        let subtree: HashSet<ObjectId> = self.subtree(id)?.into_iter().collect();
        self.stage(parent)?.record.children.retain(|c| *c != id);
        for node in &subtree {
            self.staged.remove(node);
            self.removed.insert(*node);
        }
        self.added.retain(|(_, child)| !subtree.contains(child));
        debug!(node = %id, count = subtree.len(), "staged removal");
        Ok(())
    }

    fn property(&self, id: ObjectId, key: &str) -> StoreResult<Option<PropertyValue>> {
        self.with_node(id, |r| r.properties.get(key).cloned())
    }

    fn properties(&self, id: ObjectId) -> StoreResult<Vec<(String, PropertyValue)>> {
        self.with_node(id, |r| {
            r.properties
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        })
    }

    fn set_property(&mut self, id: ObjectId, key: &str, value: PropertyValue) -> StoreResult<()> {
        if key.is_empty() {
            return Err(StoreError::InvalidName {
                name: key.to_string(),
                reason: "property key must not be empty".into(),
            });
        }
        self.ensure_writable(id)?;
        if let PropertyValue::Reference(target) = &value {
            if !self.node(*target)?.has_mixin(Mixin::Referenceable) {
                return Err(StoreError::NotReferenceable(*target));
            }
        }
        let staged = self.stage(id)?;
        staged.record.properties.insert(key.to_string(), value);
        staged.dirty = true;
        Ok(())
    }

    fn remove_property(&mut self, id: ObjectId, key: &str) -> StoreResult<bool> {
        self.ensure_writable(id)?;
        if !self.with_node(id, |r| r.properties.contains_key(key))? {
            return Ok(false);
        }
        let staged = self.stage(id)?;
        staged.record.properties.remove(key);
        staged.dirty = true;
        Ok(true)
    }

    fn path(&self, id: ObjectId) -> StoreResult<String> {
        let mut segments = Vec::new();
        let mut current = id;
        loop {
            let (name, parent) = self.with_node(current, |r| (r.name.clone(), r.parent))?;
            match parent {
                Some(parent) => {
                    segments.push(name);
                    current = parent;
                }
                None => break,
            }
        }
        segments.reverse();
        Ok(format!("/{}", segments.join("/")))
    }

    fn checkout(&mut self, id: ObjectId) -> StoreResult<()> {
        let info = self.node(id)?;
        if !info.is_versionable() {
            return Err(self.not_versionable(id));
        }
        if info.checked_out {
            return Ok(());
        }
        let staged = self.stage(id)?;
        staged.record.checked_out = true;
        staged.dirty = true;
        debug!(node = %id, "checked out");
        Ok(())
    }

    fn checkin(&mut self, id: ObjectId) -> StoreResult<VersionRef> {
        let info = self.node(id)?;
        if !info.is_versionable() {
            return Err(self.not_versionable(id));
        }
        if !info.checked_out {
            return self
                .with_history(id, |h| h.get(&h.base).map(|v| v.to_ref(id)))?
                .ok_or_else(|| self.not_versionable(id));
        }

        let frozen = self.freeze(id)?;
        let not_versionable = self.not_versionable(id);
        let created = Utc::now();
        let staged = self.stage(id)?;
        let history = staged.record.history.as_mut().ok_or(not_versionable)?;

        let label = history.next_label();
        let base = history.base.clone();
        history.versions.push(VersionRecord {
            label: label.clone(),
            created,
            predecessors: vec![base.clone()],
            successors: Vec::new(),
            frozen,
        });
        if let Some(previous) = history.get_mut(&base) {
            previous.successors.push(label.clone());
        }
        history.base = label.clone();
        staged.record.checked_out = false;
        staged.dirty = true;

        debug!(node = %id, %label, "checked in");
        Ok(VersionRef {
            node: id,
            label,
            created,
        })
    }

    fn root_version(&self, id: ObjectId) -> StoreResult<VersionRef> {
        self.with_history(id, |h| h.get(ROOT_VERSION_LABEL).map(|v| v.to_ref(id)))?
            .ok_or_else(|| self.not_versionable(id))
    }

    fn successors(&self, version: &VersionRef) -> StoreResult<Vec<VersionRef>> {
        let node = version.node;
        self.with_history(node, |h| {
            h.get(&version.label).map(|v| {
                v.successors
                    .iter()
                    .filter_map(|label| h.get(label))
                    .map(|s| s.to_ref(node))
                    .collect()
            })
        })?
        .ok_or_else(|| StoreError::VersionNotFound {
            node,
            label: version.label.clone(),
        })
    }

    fn version_by_label(&self, id: ObjectId, label: &str) -> StoreResult<Option<VersionRef>> {
        self.with_history(id, |h| h.get(label).map(|v| v.to_ref(id)))
    }

    fn frozen(&self, version: &VersionRef) -> StoreResult<FrozenNode> {
        self.with_history(version.node, |h| {
            h.get(&version.label).map(|v| v.frozen.clone())
        })?
        .ok_or_else(|| StoreError::VersionNotFound {
            node: version.node,
            label: version.label.clone(),
        })
    }

    fn remove_version(&mut self, id: ObjectId, label: &str) -> StoreResult<()> {
        let in_use = || StoreError::VersionInUse {
            node: id,
            label: label.to_string(),
        };
        if label == ROOT_VERSION_LABEL {
            return Err(in_use());
        }
        let not_versionable = self.not_versionable(id);
        let staged = self.stage(id)?;
        let history = staged.record.history.as_mut().ok_or(not_versionable)?;
        if history.base == label {
            return Err(in_use());
        }
        let index = history
            .versions
            .iter()
            .position(|v| v.label == label)
            .ok_or_else(|| StoreError::VersionNotFound {
                node: id,
                label: label.to_string(),
            })?;

        let removed = history.versions.remove(index);
        for version in history.versions.iter_mut() {
            if removed.predecessors.contains(&version.label) {
                relink(&mut version.successors, label, &removed.successors);
            }
            if removed.successors.contains(&version.label) {
                relink(&mut version.predecessors, label, &removed.predecessors);
            }
        }
        staged.dirty = true;
        debug!(node = %id, label, "removed version");
        Ok(())
    }

    fn save(&mut self) -> StoreResult<()> {
        if !self.has_pending_changes() {
            return Ok(());
        }
        let shared = Arc::clone(&self.shared);
        let mut state = shared.write().map_err(|_| StoreError::Poisoned)?;
        self.validate_flush(&state)?;

        match &self.snapshot {
            Some(path) => {
                let mut next = state.clone();
                self.apply(&mut next);
                write_snapshot(path, &next)?;
                *state = next;
            }
            None => self.apply(&mut state),
        }
        drop(state);

        debug!(
            staged = self.staged.len(),
            removed = self.removed.len(),
            "flushed session"
        );
        self.clear();
        Ok(())
    }

    fn refresh(&mut self) {
        if self.has_pending_changes() {
            debug!(staged = self.staged.len(), "discarding pending changes");
        }
        self.clear();
    }

    fn has_pending_changes(&self) -> bool {
        !self.staged.is_empty() || !self.removed.is_empty()
    }
}
