//! Persistent state of the in-memory engine.
//!
//! These records are the engine's private representation. They are what the
//! snapshot file contains, and what sessions copy-on-write into their
//! staging area.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strata_types::{ObjectId, PropertyValue};

use crate::node::{FrozenNode, Mixin, NodeInfo, NodeType, VersionRef, ROOT_VERSION_LABEL};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct NodeRecord {
    pub id: ObjectId,
    pub name: String,
    pub node_type: NodeType,
    pub parent: Option<ObjectId>,
    pub mixins: BTreeSet<Mixin>,
    pub properties: BTreeMap<String, PropertyValue>,
    pub children: Vec<ObjectId>,
    pub history: Option<VersionHistory>,
    pub checked_out: bool,
    /// Bumped on every flushed content change; used to detect conflicts.
    pub revision: u64,
}

impl NodeRecord {
    pub fn new(id: ObjectId, name: &str, node_type: NodeType, parent: Option<ObjectId>) -> Self {
        Self {
            id,
            name: name.to_string(),
            node_type,
            parent,
            mixins: BTreeSet::new(),
            properties: BTreeMap::new(),
            children: Vec::new(),
            history: None,
            checked_out: true,
            revision: 0,
        }
    }

    pub fn info(&self) -> NodeInfo {
        NodeInfo {
            id: self.id,
            name: self.name.clone(),
            node_type: self.node_type,
            parent: self.parent,
            mixins: self.mixins.clone(),
            checked_out: self.checked_out,
        }
    }

    /// A checked-in versionable node accepts no mutations.
    pub fn is_read_only(&self) -> bool {
        self.mixins.contains(&Mixin::Versionable) && !self.checked_out
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct VersionHistory {
    pub versions: Vec<VersionRecord>,
    /// Label of the version the node was last checked in as.
    pub base: String,
    next_minor: u64,
}

impl VersionHistory {
    pub fn new(created: DateTime<Utc>) -> Self {
        Self {
            versions: vec![VersionRecord {
                label: ROOT_VERSION_LABEL.to_string(),
                created,
                predecessors: Vec::new(),
                successors: Vec::new(),
                frozen: FrozenNode::default(),
            }],
            base: ROOT_VERSION_LABEL.to_string(),
            next_minor: 0,
        }
    }

    /// Labels are never reused, even after a version is removed.
    pub fn next_label(&mut self) -> String {
        let label = format!("1.{}", self.next_minor);
        self.next_minor += 1;
        label
    }

    pub fn get(&self, label: &str) -> Option<&VersionRecord> {
        self.versions.iter().find(|v| v.label == label)
    }

    pub fn get_mut(&mut self, label: &str) -> Option<&mut VersionRecord> {
        self.versions.iter_mut().find(|v| v.label == label)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct VersionRecord {
    pub label: String,
    pub created: DateTime<Utc>,
    pub predecessors: Vec<String>,
    pub successors: Vec<String>,
    pub frozen: FrozenNode,
}

impl VersionRecord {
    pub fn to_ref(&self, node: ObjectId) -> VersionRef {
        VersionRef {
            node,
            label: self.label.clone(),
            created: self.created,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct TreeState {
    pub root: ObjectId,
    pub nodes: HashMap<ObjectId, NodeRecord>,
}

impl TreeState {
    pub fn new() -> Self {
        let root = ObjectId::new();
        let mut record = NodeRecord::new(root, "", NodeType::Root, None);
        record.mixins.insert(Mixin::Referenceable);
        let mut nodes = HashMap::new();
        nodes.insert(root, record);
        Self { root, nodes }
    }

    pub fn path_of(&self, id: ObjectId) -> String {
        let mut segments = Vec::new();
        let mut current = self.nodes.get(&id);
        while let Some(record) = current {
            match record.parent {
                Some(parent) => {
                    segments.push(record.name.as_str());
                    current = self.nodes.get(&parent);
                }
                None => break,
            }
        }
        segments.reverse();
        format!("/{}", segments.join("/"))
    }

    /// Remove a node, its descendants, and its entry in the parent.
    pub fn remove_subtree(&mut self, id: ObjectId) {
        let Some(record) = self.nodes.get(&id) else {
            return;
        };
        if let Some(parent) = record.parent {
            if let Some(parent) = self.nodes.get_mut(&parent) {
                parent.children.retain(|c| *c != id);
            }
        }
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(removed) = self.nodes.remove(&next) {
                stack.extend(removed.children);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add(state: &mut TreeState, parent: ObjectId, name: &str) -> ObjectId {
        let id = ObjectId::new();
        state
            .nodes
            .insert(id, NodeRecord::new(id, name, NodeType::Folder, Some(parent)));
        state.nodes.get_mut(&parent).unwrap().children.push(id);
        id
    }

    #[test]
    fn new_state_has_root_only() {
        let state = TreeState::new();
        assert_eq!(state.nodes.len(), 1);
        assert_eq!(state.path_of(state.root), "/");
    }

    #[test]
    fn path_of_nested_node() {
        let mut state = TreeState::new();
        let root = state.root;
        let a = add(&mut state, root, "a");
        let b = add(&mut state, a, "b");
        assert_eq!(state.path_of(b), "/a/b");
    }

    #[test]
    fn remove_subtree_drops_descendants() {
        let mut state = TreeState::new();
        let root = state.root;
        let a = add(&mut state, root, "a");
        let b = add(&mut state, a, "b");
        add(&mut state, b, "c");
        state.remove_subtree(a);
        assert_eq!(state.nodes.len(), 1);
        assert!(state.nodes[&root].children.is_empty());
    }

    #[test]
    fn labels_are_never_reused() {
        let mut history = VersionHistory::new(Utc::now());
        assert_eq!(history.next_label(), "1.0");
        assert_eq!(history.next_label(), "1.1");
        history.versions.truncate(1);
        assert_eq!(history.next_label(), "1.2");
    }
}
