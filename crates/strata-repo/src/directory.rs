//! Folder hierarchy of the repository.

use strata_store::{Mixin, NodeType, TreeSession};
use strata_types::ObjectId;
use tracing::{debug, info};

use crate::error::{RepoResult, RepositoryError, StoreContext};
use crate::path::{self, ROOT_PATH};

/// One folder of the repository, with its sub-folders.
///
/// This is a read-side snapshot. Changes made to it locally are not
/// persisted; use the repository's directory operations and reload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepositoryDirectory {
    pub name: String,
    /// Backing folder node. `None` for the root directory.
    pub id: Option<ObjectId>,
    /// Logical path, `/` for the root.
    pub path: String,
    pub children: Vec<RepositoryDirectory>,
}

impl RepositoryDirectory {
    /// An empty root directory.
    pub fn root() -> Self {
        Self {
            name: String::new(),
            id: None,
            path: ROOT_PATH.to_string(),
            children: Vec::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.path == ROOT_PATH
    }

    /// Logical path of the parent, or `None` for the root.
    pub fn parent_path(&self) -> Option<String> {
        path::parent_path(&self.path)
    }

    pub fn child(&self, name: &str) -> Option<&RepositoryDirectory> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Find a directory by path, relative to this one or absolute.
    pub fn find(&self, path: &str) -> Option<&RepositoryDirectory> {
        let relative = if path.starts_with('/') {
            let own = path::relative_path(&self.path);
            let target = path::relative_path(path).trim_end_matches('/');
            if own.is_empty() {
                target
            } else if target == own {
                ""
            } else {
                target.strip_prefix(own)?.strip_prefix('/')?
            }
        } else {
            path
        };
        path::segments(relative).try_fold(self, |dir, segment| dir.child(segment))
    }

    pub fn find_by_id(&self, id: ObjectId) -> Option<&RepositoryDirectory> {
        if self.id == Some(id) {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find_by_id(id))
    }

    pub fn subdirectory_names(&self) -> Vec<&str> {
        self.children.iter().map(|c| c.name.as_str()).collect()
    }

    /// Number of directories in this subtree, itself included.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(RepositoryDirectory::count).sum::<usize>()
    }
}

/// Maps logical directories onto folder nodes.
///
/// The lock registry folder sits below the root like any other folder; it is
/// hidden from the directory tree and may not be used as a directory name.
#[derive(Clone, Debug)]
pub struct DirectoryTree {
    hidden: String,
}

impl DirectoryTree {
    pub fn new(lock_registry: impl Into<String>) -> Self {
        Self {
            hidden: lock_registry.into(),
        }
    }

    /// Load the full folder hierarchy.
    pub fn load_tree<T: TreeSession>(&self, session: &T) -> RepoResult<RepositoryDirectory> {
        let root = session.root().with_context(|| "open root".into())?;
        let mut tree = RepositoryDirectory::root();
        tree.children = self.load_children(session, root, ROOT_PATH)?;
        debug!(directories = tree.count(), "loaded directory tree");
        Ok(tree)
    }

    fn load_children<T: TreeSession>(
        &self,
        session: &T,
        node: ObjectId,
        node_path: &str,
    ) -> RepoResult<Vec<RepositoryDirectory>> {
        let mut out = Vec::new();
        for child in self.folder_children(session, node, node_path)? {
            let (id, name) = child;
            let child_path = path::join(node_path, &name);
            let children = self.load_children(session, id, &child_path)?;
            out.push(RepositoryDirectory {
                name,
                id: Some(id),
                path: child_path,
                children,
            });
        }
        Ok(out)
    }

    /// Folder children of `node` as `(id, name)`, hiding the lock registry.
    fn folder_children<T: TreeSession>(
        &self,
        session: &T,
        node: ObjectId,
        node_path: &str,
    ) -> RepoResult<Vec<(ObjectId, String)>> {
        let children = session
            .children(node)
            .with_context(|| format!("list {node_path}"))?;
        let mut out = Vec::new();
        for child in children {
            let info = session
                .node(child)
                .with_context(|| format!("read child of {node_path}"))?;
            if info.node_type != NodeType::Folder {
                continue;
            }
            if node_path == ROOT_PATH && info.name == self.hidden {
                continue;
            }
            out.push((child, info.name));
        }
        Ok(out)
    }

    /// Folder node at a logical path. The root path resolves to the root node.
    pub fn folder_at<T: TreeSession>(&self, session: &T, dir: &str) -> RepoResult<Option<ObjectId>> {
        let mut current = session.root().with_context(|| "open root".into())?;
        let mut walked = String::from(ROOT_PATH);
        for segment in path::segments(dir) {
            if walked == ROOT_PATH && segment == self.hidden {
                return Ok(None);
            }
            let next = session
                .child(current, segment)
                .with_context(|| format!("look up {segment} in {walked}"))?;
            let Some(next) = next else {
                return Ok(None);
            };
            let info = session
                .node(next)
                .with_context(|| format!("read {segment} in {walked}"))?;
            if info.node_type != NodeType::Folder {
                return Ok(None);
            }
            walked = path::join(&walked, segment);
            current = next;
        }
        Ok(Some(current))
    }

    /// Create every missing folder along `dir` and return the leaf.
    ///
    /// Each created folder is flushed on its own. A failure part-way leaves
    /// the already created prefix in place; calling again resumes from it,
    /// and calling with an existing path returns the existing directory.
    pub fn create_path<T: TreeSession>(
        &self,
        session: &mut T,
        dir: &str,
    ) -> RepoResult<RepositoryDirectory> {
        let segments: Vec<&str> = path::segments(dir).collect();
        for segment in &segments {
            self.validate_segment(segment)?;
        }

        let mut current = session.root().with_context(|| "open root".into())?;
        let mut walked = String::from(ROOT_PATH);
        for segment in segments {
            let target = path::join(&walked, segment);
            let existing = session
                .child(current, segment)
                .with_context(|| format!("look up {target}"))?;
            current = match existing {
                Some(id) => {
                    let info = session
                        .node(id)
                        .with_context(|| format!("read {target}"))?;
                    if info.node_type != NodeType::Folder {
                        return Err(RepositoryError::IntegrityViolation(format!(
                            "{target} exists and is not a folder"
                        )));
                    }
                    id
                }
                None => self.create_folder(session, current, segment, &target)?,
            };
            walked = target;
        }
        self.directory_at(session, current, &walked)
    }

    /// Create one folder below `parent`.
    pub fn save_directory<T: TreeSession>(
        &self,
        session: &mut T,
        parent: &str,
        name: &str,
    ) -> RepoResult<RepositoryDirectory> {
        self.validate_segment(name)?;
        let parent_path = path::normalize_directory(parent);
        let parent_id = self
            .folder_at(session, &parent_path)?
            .ok_or_else(|| RepositoryError::NotFound(format!("directory {parent_path}")))?;
        let target = path::join(&parent_path, name);
        let existing = session
            .child(parent_id, name)
            .with_context(|| format!("look up {target}"))?;
        if existing.is_some() {
            return Err(RepositoryError::InvalidName {
                name: name.to_string(),
                reason: format!("{target} already exists"),
            });
        }
        let id = self.create_folder(session, parent_id, name, &target)?;
        self.directory_at(session, id, &target)
    }

    /// Physically remove a folder and everything below it.
    pub fn delete_directory<T: TreeSession>(
        &self,
        session: &mut T,
        dir: &RepositoryDirectory,
    ) -> RepoResult<()> {
        let id = self.resolve_directory(session, dir)?;
        session
            .remove(id)
            .with_context(|| format!("delete directory {}", dir.path))?;
        info!(path = %dir.path, %id, "deleted directory");
        Ok(())
    }

    /// Folder node of a non-root directory, preferring its cached id.
    ///
    /// The lock registry is never a directory, even when `dir` carries its id.
    pub(crate) fn resolve_directory<T: TreeSession>(
        &self,
        session: &T,
        dir: &RepositoryDirectory,
    ) -> RepoResult<ObjectId> {
        if dir.is_root() {
            return Err(RepositoryError::Unsupported(
                "the root directory cannot be deleted".into(),
            ));
        }
        let cached = match dir.id {
            Some(id) => session
                .resolve(id)
                .with_context(|| format!("resolve {}", dir.path))?
                .filter(|info| info.node_type == NodeType::Folder)
                .map(|info| (id, info)),
            None => None,
        };
        match cached {
            Some((id, info)) => {
                let root = session.root().with_context(|| "open root".into())?;
                if info.parent == Some(root) && info.name == self.hidden {
                    return Err(RepositoryError::Unsupported(format!(
                        "{} is the lock registry, not a directory",
                        dir.path
                    )));
                }
                Ok(id)
            }
            None => self
                .folder_at(session, &dir.path)?
                .ok_or_else(|| RepositoryError::NotFound(format!("directory {}", dir.path))),
        }
    }

    /// Names of the direct sub-folders of `dir`, read from the store.
    pub fn directory_names<T: TreeSession>(&self, session: &T, dir: &str) -> RepoResult<Vec<String>> {
        let dir = path::normalize_directory(dir);
        let id = self
            .folder_at(session, &dir)?
            .ok_or_else(|| RepositoryError::NotFound(format!("directory {dir}")))?;
        Ok(self
            .folder_children(session, id, &dir)?
            .into_iter()
            .map(|(_, name)| name)
            .collect())
    }

    fn validate_segment(&self, segment: &str) -> RepoResult<()> {
        path::validate_name(segment)?;
        if segment == self.hidden {
            return Err(RepositoryError::InvalidName {
                name: segment.to_string(),
                reason: "reserved for the lock registry".into(),
            });
        }
        Ok(())
    }

    fn create_folder<T: TreeSession>(
        &self,
        session: &mut T,
        parent: ObjectId,
        name: &str,
        target: &str,
    ) -> RepoResult<ObjectId> {
        let id = session
            .add_child(parent, name, NodeType::Folder)
            .with_context(|| format!("create {target}"))?;
        for mixin in [Mixin::Referenceable, Mixin::Lockable] {
            session
                .add_mixin(id, mixin)
                .with_context(|| format!("create {target}"))?;
        }
        session.save().with_context(|| format!("create {target}"))?;
        info!(path = %target, %id, "created directory");
        Ok(id)
    }

    fn directory_at<T: TreeSession>(
        &self,
        session: &T,
        id: ObjectId,
        dir: &str,
    ) -> RepoResult<RepositoryDirectory> {
        let root = session.root().with_context(|| "open root".into())?;
        let name = path::segments(dir).last().unwrap_or_default().to_string();
        Ok(RepositoryDirectory {
            name,
            id: (id != root).then_some(id),
            path: dir.to_string(),
            children: self.load_children(session, id, dir)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_store::{InMemoryTreeStore, TreeStore};

    fn tree() -> DirectoryTree {
        DirectoryTree::new("__LOCKS__")
    }

    #[test]
    fn create_path_creates_missing_segments() {
        let store = InMemoryTreeStore::new();
        let mut s = store.open_session().unwrap();
        let leaf = tree().create_path(&mut s, "/a/b/c").unwrap();
        assert_eq!(leaf.path, "/a/b/c");
        assert_eq!(leaf.name, "c");
        assert!(leaf.id.is_some());
        assert!(!s.has_pending_changes());
        assert_eq!(store.node_count().unwrap(), 4);
    }

    #[test]
    fn create_path_resumes_from_existing_prefix() {
        let store = InMemoryTreeStore::new();
        let mut s = store.open_session().unwrap();
        let dirs = tree();
        let a = dirs.create_path(&mut s, "/a").unwrap();

        let leaf = dirs.create_path(&mut s, "/a/b/c").unwrap();
        assert_eq!(store.node_count().unwrap(), 4);
        let loaded = dirs.load_tree(&s).unwrap();
        assert_eq!(loaded.find("/a").unwrap().id, a.id);

        let again = dirs.create_path(&mut s, "a/b/c/").unwrap();
        assert_eq!(again, leaf);
        assert_eq!(store.node_count().unwrap(), 4);
    }

    #[test]
    fn create_path_detects_existing_folders_in_store() {
        let store = InMemoryTreeStore::new();
        let dirs = tree();
        let mut first = store.open_session().unwrap();
        let mut second = store.open_session().unwrap();
        let a = dirs.create_path(&mut first, "/a").unwrap();
        let again = dirs.create_path(&mut second, "/a").unwrap();
        assert_eq!(a.id, again.id);
    }

    #[test]
    fn create_path_rejects_bad_segments() {
        let store = InMemoryTreeStore::new();
        let mut s = store.open_session().unwrap();
        assert!(matches!(
            tree().create_path(&mut s, "/a/../b"),
            Err(RepositoryError::InvalidName { .. })
        ));
        assert!(matches!(
            tree().create_path(&mut s, "/__LOCKS__"),
            Err(RepositoryError::InvalidName { .. })
        ));
        assert_eq!(store.node_count().unwrap(), 1);
    }

    #[test]
    fn create_path_refuses_non_folder_segment() {
        let store = InMemoryTreeStore::new();
        let mut s = store.open_session().unwrap();
        let root = s.root().unwrap();
        s.add_child(root, "data", NodeType::Unstructured).unwrap();
        s.save().unwrap();
        assert!(matches!(
            tree().create_path(&mut s, "/data/x"),
            Err(RepositoryError::IntegrityViolation(_))
        ));
    }

    #[test]
    fn load_tree_skips_data_nodes_and_registry() {
        let store = InMemoryTreeStore::new();
        let mut s = store.open_session().unwrap();
        let dirs = tree();
        dirs.create_path(&mut s, "/etl/daily").unwrap();
        let root = s.root().unwrap();
        s.add_child(root, "__LOCKS__", NodeType::Folder).unwrap();
        let etl = dirs.folder_at(&s, "/etl").unwrap().unwrap();
        s.add_child(etl, "load.ktr", NodeType::Unstructured).unwrap();
        s.save().unwrap();

        let loaded = dirs.load_tree(&s).unwrap();
        assert!(loaded.is_root());
        assert_eq!(loaded.id, None);
        assert_eq!(loaded.subdirectory_names(), vec!["etl"]);
        let etl_dir = loaded.find("/etl").unwrap();
        assert_eq!(etl_dir.subdirectory_names(), vec!["daily"]);
        assert_eq!(loaded.count(), 3);
        assert_eq!(dirs.folder_at(&s, "/__LOCKS__").unwrap(), None);
    }

    #[test]
    fn find_relative_and_absolute() {
        let store = InMemoryTreeStore::new();
        let mut s = store.open_session().unwrap();
        let dirs = tree();
        dirs.create_path(&mut s, "/a/b/c").unwrap();
        let loaded = dirs.load_tree(&s).unwrap();

        let a = loaded.find("a").unwrap();
        assert_eq!(a.find("b/c").unwrap().path, "/a/b/c");
        assert_eq!(a.find("/a/b").unwrap().path, "/a/b");
        assert_eq!(a.find("/a").unwrap().path, "/a");
        assert!(a.find("/x/b").is_none());
        let c_id = loaded.find("/a/b/c").unwrap().id.unwrap();
        assert_eq!(loaded.find_by_id(c_id).unwrap().name, "c");
        assert_eq!(loaded.find("/a/b/c").unwrap().parent_path().as_deref(), Some("/a/b"));
    }

    #[test]
    fn save_and_delete_directory() {
        let store = InMemoryTreeStore::new();
        let mut s = store.open_session().unwrap();
        let dirs = tree();
        let etl = dirs.save_directory(&mut s, "/", "etl").unwrap();
        dirs.save_directory(&mut s, "/etl", "daily").unwrap();
        assert!(matches!(
            dirs.save_directory(&mut s, "/", "etl"),
            Err(RepositoryError::InvalidName { .. })
        ));
        assert_eq!(dirs.directory_names(&s, "/etl").unwrap(), vec!["daily"]);

        dirs.delete_directory(&mut s, &etl).unwrap();
        s.save().unwrap();
        assert_eq!(dirs.folder_at(&s, "/etl").unwrap(), None);
        assert_eq!(store.node_count().unwrap(), 1);
    }

    #[test]
    fn root_cannot_be_deleted() {
        let store = InMemoryTreeStore::new();
        let mut s = store.open_session().unwrap();
        assert!(matches!(
            tree().delete_directory(&mut s, &RepositoryDirectory::root()),
            Err(RepositoryError::Unsupported(_))
        ));
    }

    #[test]
    fn registry_id_is_not_a_directory() {
        let store = InMemoryTreeStore::new();
        let mut s = store.open_session().unwrap();
        let root = s.root().unwrap();
        let registry = s.add_child(root, "__LOCKS__", NodeType::Folder).unwrap();
        s.save().unwrap();

        let disguised = RepositoryDirectory {
            name: "etl".into(),
            id: Some(registry),
            path: "/etl".into(),
            children: vec![],
        };
        assert!(matches!(
            tree().delete_directory(&mut s, &disguised),
            Err(RepositoryError::Unsupported(_))
        ));
        assert!(s.resolve(registry).unwrap().is_some());
    }

    #[test]
    fn missing_parent_is_not_found() {
        let store = InMemoryTreeStore::new();
        let mut s = store.open_session().unwrap();
        assert!(matches!(
            tree().save_directory(&mut s, "/nope", "x"),
            Err(RepositoryError::NotFound(_))
        ));
        assert!(matches!(
            tree().directory_names(&s, "/nope"),
            Err(RepositoryError::NotFound(_))
        ));
    }
}
