//! Save/checkout/checkin protocol over the store's version chains.

use std::fmt;

use strata_store::{FrozenNode, Mixin, NodeType, TreeSession, VersionRef};
use strata_types::{ElementKind, ObjectId, ObjectVersion, PropertyValue};
use tracing::{debug, warn};

use crate::error::{RepoResult, RepositoryError, StoreContext};
use crate::props;

/// Edit state of a repository element.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VersionState {
    /// Created but never checked in.
    Unversioned,
    /// Has at least one version and is read-only.
    CheckedIn,
    /// Being edited.
    CheckedOut,
}

impl fmt::Display for VersionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unversioned => write!(f, "unversioned"),
            Self::CheckedIn => write!(f, "checked-in"),
            Self::CheckedOut => write!(f, "checked-out"),
        }
    }
}

/// Metadata stamped onto an element right before check-in.
#[derive(Clone, Debug, PartialEq)]
pub struct CommitInfo {
    pub name: String,
    pub description: String,
    pub kind: ElementKind,
    pub comment: String,
    pub author: String,
    pub deleted: bool,
}

/// Version chain handling for element nodes.
///
/// Chains are linear: every version has at most one successor. A chain with
/// more than one successor anywhere is reported as an integrity violation
/// rather than resolved by picking a branch.
#[derive(Clone, Copy, Debug, Default)]
pub struct VersionManager;

impl VersionManager {
    /// Current edit state of `node`.
    pub fn state<T: TreeSession>(&self, session: &T, node: ObjectId) -> RepoResult<VersionState> {
        let info = session
            .node(node)
            .with_context(|| format!("read state of {node}"))?;
        if !info.is_versionable() {
            return Err(RepositoryError::NotVersionable {
                path: session.path(node).with_context(|| format!("path of {node}"))?,
            });
        }
        if self.chain(session, node)?.is_empty() {
            return Ok(VersionState::Unversioned);
        }
        Ok(if info.checked_out {
            VersionState::CheckedOut
        } else {
            VersionState::CheckedIn
        })
    }

    /// Open `node_name` under `folder` for editing, creating it if absent.
    pub fn find_or_create<T: TreeSession>(
        &self,
        session: &mut T,
        folder: ObjectId,
        node_name: &str,
    ) -> RepoResult<ObjectId> {
        let existing = session
            .child(folder, node_name)
            .with_context(|| format!("look up {node_name}"))?;
        if let Some(id) = existing {
            session
                .checkout(id)
                .with_context(|| format!("check out {node_name}"))?;
            debug!(%id, node_name, "checked out existing element");
            return Ok(id);
        }

        let id = session
            .add_child(folder, node_name, NodeType::Unstructured)
            .with_context(|| format!("create {node_name}"))?;
        for mixin in [Mixin::Referenceable, Mixin::Versionable] {
            session
                .add_mixin(id, mixin)
                .with_context(|| format!("make {node_name} {mixin:?}"))?;
        }
        debug!(%id, node_name, "created element node");
        Ok(id)
    }

    /// Stamp `info` onto `node` and check it in.
    pub fn commit<T: TreeSession>(
        &self,
        session: &mut T,
        node: ObjectId,
        info: &CommitInfo,
    ) -> RepoResult<ObjectVersion> {
        let stamp = [
            (props::NAME, PropertyValue::from(info.name.as_str())),
            (props::DESCRIPTION, PropertyValue::from(info.description.as_str())),
            (props::KIND, PropertyValue::from(info.kind.tag())),
            (props::COMMENT, PropertyValue::from(info.comment.as_str())),
            (props::AUTHOR, PropertyValue::from(info.author.as_str())),
            (props::DELETED, PropertyValue::Boolean(info.deleted)),
        ];
        for (key, value) in stamp {
            session
                .set_property(node, key, value)
                .with_context(|| format!("stamp {key} on {node}"))?;
        }
        let version = session
            .checkin(node)
            .with_context(|| format!("check in {}", info.name))?;
        debug!(%node, label = %version.label, author = %info.author, "committed version");
        Ok(ObjectVersion::new(
            version.label,
            info.comment.clone(),
            info.author.clone(),
            version.created,
        ))
    }

    /// Re-open a checked-in node, change its tombstone flag, and check it in.
    pub(crate) fn recommit<T: TreeSession>(
        &self,
        session: &mut T,
        node: ObjectId,
        deleted: bool,
        comment: &str,
        author: &str,
    ) -> RepoResult<ObjectVersion> {
        session
            .checkout(node)
            .with_context(|| format!("check out {node}"))?;
        let updates = [
            (props::DELETED, PropertyValue::Boolean(deleted)),
            (props::COMMENT, PropertyValue::from(comment)),
            (props::AUTHOR, PropertyValue::from(author)),
        ];
        for (key, value) in updates {
            session
                .set_property(node, key, value)
                .with_context(|| format!("stamp {key} on {node}"))?;
        }
        let version = session
            .checkin(node)
            .with_context(|| format!("check in {node}"))?;
        Ok(ObjectVersion::new(version.label, comment, author, version.created))
    }

    /// The chain tip, or `None` if the node was never checked in.
    pub fn latest<T: TreeSession>(
        &self,
        session: &T,
        node: ObjectId,
    ) -> RepoResult<Option<ObjectVersion>> {
        match self.chain(session, node)?.last() {
            Some(tip) => self.describe(session, tip).map(Some),
            None => Ok(None),
        }
    }

    /// The version with the given label.
    pub fn by_label<T: TreeSession>(
        &self,
        session: &T,
        node: ObjectId,
        label: &str,
    ) -> RepoResult<ObjectVersion> {
        let version = self.version_ref(session, node, label)?;
        self.describe(session, &version)
    }

    /// All versions, oldest first, without the root placeholder.
    pub fn history<T: TreeSession>(
        &self,
        session: &T,
        node: ObjectId,
    ) -> RepoResult<Vec<ObjectVersion>> {
        self.chain(session, node)?
            .iter()
            .map(|v| self.describe(session, v))
            .collect()
    }

    /// Node state captured by a version.
    pub fn frozen_state<T: TreeSession>(
        &self,
        session: &T,
        node: ObjectId,
        label: &str,
    ) -> RepoResult<FrozenNode> {
        let version = self.version_ref(session, node, label)?;
        session
            .frozen(&version)
            .with_context(|| format!("read version {label} of {node}"))
    }

    /// Remove one version from the chain. The root placeholder and the
    /// current base version cannot be pruned.
    pub fn prune<T: TreeSession>(
        &self,
        session: &mut T,
        node: ObjectId,
        label: &str,
    ) -> RepoResult<()> {
        self.version_ref(session, node, label)?;
        session
            .remove_version(node, label)
            .with_context(|| format!("prune version {label} of {node}"))?;
        debug!(%node, label, "pruned version");
        Ok(())
    }

    fn version_ref<T: TreeSession>(
        &self,
        session: &T,
        node: ObjectId,
        label: &str,
    ) -> RepoResult<VersionRef> {
        session
            .version_by_label(node, label)
            .with_context(|| format!("look up version {label} of {node}"))?
            .filter(|v| !v.is_root())
            .ok_or_else(|| RepositoryError::VersionNotFound {
                object: node.to_string(),
                label: label.to_string(),
            })
    }

    /// Walk the chain from its root, excluding the root itself.
    fn chain<T: TreeSession>(&self, session: &T, node: ObjectId) -> RepoResult<Vec<VersionRef>> {
        let mut current = session
            .root_version(node)
            .with_context(|| format!("read history of {node}"))?;
        let mut chain = Vec::new();
        loop {
            let mut successors = session
                .successors(&current)
                .with_context(|| format!("walk history of {node}"))?;
            if successors.len() > 1 {
                warn!(%node, label = %current.label, branches = successors.len(), "branched version chain");
                return Err(RepositoryError::IntegrityViolation(format!(
                    "version {} of {node} has {} successors",
                    current.label,
                    successors.len()
                )));
            }
            match successors.pop() {
                Some(next) => {
                    chain.push(next.clone());
                    current = next;
                }
                None => return Ok(chain),
            }
        }
    }

    fn describe<T: TreeSession>(&self, session: &T, version: &VersionRef) -> RepoResult<ObjectVersion> {
        let frozen = session
            .frozen(version)
            .with_context(|| format!("read version {} of {}", version.label, version.node))?;
        let text = |key: &str| {
            frozen
                .property(key)
                .and_then(|v| v.as_string().ok())
                .unwrap_or_default()
        };
        Ok(ObjectVersion::new(
            version.label.clone(),
            text(props::COMMENT),
            text(props::AUTHOR),
            version.created,
        ))
    }
}
