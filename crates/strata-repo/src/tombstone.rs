//! Logical delete and undelete.
//!
//! Deleting an element never removes its node. It flips the tombstone flag
//! and records the change as a new version, so the element's history stays
//! intact and undelete is just another version.

use strata_store::TreeSession;
use strata_types::{Actor, ObjectId, ObjectVersion, PropertyValue};
use tracing::{debug, info};

use crate::error::{RepoResult, RepositoryError, StoreContext};
use crate::props;
use crate::version::VersionManager;

#[derive(Clone, Debug)]
pub struct TombstoneManager {
    delete_comment: String,
    undelete_comment: String,
    versions: VersionManager,
}

impl TombstoneManager {
    pub fn new(delete_comment: impl Into<String>, undelete_comment: impl Into<String>) -> Self {
        Self {
            delete_comment: delete_comment.into(),
            undelete_comment: undelete_comment.into(),
            versions: VersionManager,
        }
    }

    /// Mark `node` deleted in a new version.
    pub fn mark_deleted<T: TreeSession>(
        &self,
        session: &mut T,
        node: ObjectId,
        actor: &Actor,
    ) -> RepoResult<ObjectVersion> {
        let version =
            self.versions
                .recommit(session, node, true, &self.delete_comment, &actor.login)?;
        info!(id = %node, label = %version.label, login = %actor.login, "deleted element");
        Ok(version)
    }

    /// Clear the tombstone of `node` in a new version.
    ///
    /// Returns `Ok(None)` without touching the node if it is not deleted.
    pub fn undelete<T: TreeSession>(
        &self,
        session: &mut T,
        node: ObjectId,
        actor: &Actor,
    ) -> RepoResult<Option<ObjectVersion>> {
        if !self.is_deleted(session, node)? {
            debug!(id = %node, "undelete of visible element ignored");
            return Ok(None);
        }
        let version =
            self.versions
                .recommit(session, node, false, &self.undelete_comment, &actor.login)?;
        info!(id = %node, label = %version.label, login = %actor.login, "restored element");
        Ok(Some(version))
    }

    /// Whether `node` carries a tombstone. Unset means visible.
    pub fn is_deleted<T: TreeSession>(&self, session: &T, node: ObjectId) -> RepoResult<bool> {
        match session
            .property(node, props::DELETED)
            .with_context(|| format!("read tombstone of {node}"))?
        {
            Some(PropertyValue::Boolean(deleted)) => Ok(deleted),
            Some(other) => Err(RepositoryError::IntegrityViolation(format!(
                "tombstone of {node} is a {}",
                other.type_name()
            ))),
            None => Ok(false),
        }
    }

    /// `true` iff a node resolves at `path` and is not deleted.
    pub fn exists_visible<T: TreeSession>(&self, session: &T, path: &str) -> RepoResult<bool> {
        let node = session
            .node_at_path(path)
            .with_context(|| format!("resolve {path}"))?;
        match node {
            Some(id) => Ok(!self.is_deleted(session, id)?),
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::CommitInfo;
    use strata_store::{InMemorySession, InMemoryTreeStore, TreeStore};
    use strata_types::ElementKind;

    fn committed() -> (InMemorySession, ObjectId) {
        let store = InMemoryTreeStore::new();
        let mut s = store.open_session().unwrap();
        let root = s.root().unwrap();
        let vm = VersionManager;
        let id = vm.find_or_create(&mut s, root, "load.ktr").unwrap();
        let info = CommitInfo {
            name: "load".into(),
            description: String::new(),
            kind: ElementKind::Transformation,
            comment: "c1".into(),
            author: "alice".into(),
            deleted: false,
        };
        vm.commit(&mut s, id, &info).unwrap();
        (s, id)
    }

    fn tombstones() -> TombstoneManager {
        TombstoneManager::new("deleted", "undeleted")
    }

    #[test]
    fn delete_then_undelete_restores_visibility() {
        let (mut s, id) = committed();
        let t = tombstones();
        let bob = Actor::with_login("bob");
        assert!(t.exists_visible(&s, "/load.ktr").unwrap());

        let deleted = t.mark_deleted(&mut s, id, &bob).unwrap();
        assert_eq!(deleted.comment, "deleted");
        assert!(t.is_deleted(&s, id).unwrap());
        assert!(!t.exists_visible(&s, "/load.ktr").unwrap());

        let restored = t.undelete(&mut s, id, &bob).unwrap().expect("should restore");
        assert_eq!(restored.comment, "undeleted");
        assert!(t.exists_visible(&s, "/load.ktr").unwrap());
        assert_eq!(VersionManager.history(&s, id).unwrap().len(), 3);
    }

    #[test]
    fn undelete_of_visible_element_is_noop() {
        let (mut s, id) = committed();
        let t = tombstones();
        assert!(t.undelete(&mut s, id, &Actor::with_login("bob")).unwrap().is_none());
        assert_eq!(VersionManager.history(&s, id).unwrap().len(), 1);
    }

    #[test]
    fn missing_path_is_not_visible() {
        let (s, _) = committed();
        assert!(!tombstones().exists_visible(&s, "/nope.ktr").unwrap());
    }

    #[test]
    fn unset_flag_means_visible() {
        let store = InMemoryTreeStore::new();
        let mut s = store.open_session().unwrap();
        let root = s.root().unwrap();
        let id = s
            .add_child(root, "raw", strata_store::NodeType::Unstructured)
            .unwrap();
        assert!(!tombstones().is_deleted(&s, id).unwrap());
    }
}
