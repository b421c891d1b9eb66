use std::collections::HashSet;
use std::fmt;

use strata_store::{InMemoryTreeStore, NodeInfo, NodeType, StoreError, TreeSession, TreeStore};
use strata_types::{Actor, ElementKind, LockRecord, ObjectId, ObjectVersion, PropertyValue};
use tracing::{debug, info, warn};

use crate::attributes::{AttributeMap, AttributeStore};
use crate::codec::PayloadCodec;
use crate::config::RepositoryConfig;
use crate::directory::{DirectoryTree, RepositoryDirectory};
use crate::element::{
    frozen_text, read_payload, ElementPayload, ElementRelation, RepositoryElement,
    RepositoryObject,
};
use crate::error::{RepoResult, RepositoryError, StoreContext};
use crate::lock::LockManager;
use crate::path;
use crate::props;
use crate::tombstone::TombstoneManager;
use crate::version::{CommitInfo, VersionManager};

/// Suffix of the node holding the usage relations of an element.
const USAGE_SUFFIX: &str = ".usage";

/// A typed, versioned element repository over a [`TreeStore`].
///
/// Every operation runs in its own store session: it performs its changes,
/// flushes once, and discards everything on failure. Directory creation is
/// the exception and flushes once per created folder.
pub struct Repository<S: TreeStore> {
    store: S,
    config: RepositoryConfig,
    actor: Actor,
    directories: DirectoryTree,
    attributes: AttributeStore,
    versions: VersionManager,
    locks: LockManager,
    tombstones: TombstoneManager,
}

impl<S: TreeStore> fmt::Debug for Repository<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("actor", &self.actor.login)
            .field("lock_registry", &self.config.lock_registry)
            .finish_non_exhaustive()
    }
}

impl Repository<InMemoryTreeStore> {
    /// Open the in-memory store described by `config` as its configured actor.
    pub fn open(config: RepositoryConfig) -> RepoResult<Self> {
        let store = config.open_store()?;
        let actor = config.actor.clone();
        Self::connect(store, config, actor)
    }
}

impl<S: TreeStore> Repository<S> {
    /// Connect to `store` on behalf of `actor`, creating the lock registry
    /// if it does not exist yet.
    pub fn connect(store: S, config: RepositoryConfig, actor: Actor) -> RepoResult<Self> {
        config.validate()?;
        let repo = Self {
            directories: DirectoryTree::new(config.lock_registry.clone()),
            attributes: AttributeStore,
            versions: VersionManager,
            locks: LockManager::new(config.lock_registry.clone()),
            tombstones: TombstoneManager::new(
                config.delete_comment.clone(),
                config.undelete_comment.clone(),
            ),
            store,
            config,
            actor,
        };
        repo.unit_of_work("connect", |session| {
            repo.locks.verify_registry(session)?;
            repo.locks.ensure_registry(session).map(|_| ())
        })?;
        info!(login = %repo.actor.login, registry = %repo.config.lock_registry, "connected repository");
        Ok(repo)
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// The attribute accessor used for element and sub-object nodes.
    pub fn attributes(&self) -> &AttributeStore {
        &self.attributes
    }

    // ---- Elements ----

    /// Save `element` under `comment`, creating a new version.
    ///
    /// On success the element's `id` and `version` are filled in.
    pub fn save(&self, element: &mut RepositoryElement, comment: &str) -> RepoResult<ObjectVersion> {
        self.check_saveable(element)?;
        let node_name = element.node_name();
        let target = element.path();

        let (id, version) = self.unit_of_work(&format!("save {target}"), |session| {
            let folder = self
                .directories
                .folder_at(session, &element.directory)?
                .ok_or_else(|| {
                    RepositoryError::NotFound(format!("directory {}", element.directory))
                })?;
            let existing = session
                .child(folder, &node_name)
                .with_context(|| format!("look up {target}"))?;
            if let Some(id) = existing {
                self.locks.check_for_edit(session, id, &self.actor)?;
            }

            let id = self.versions.find_or_create(session, folder, &node_name)?;
            self.write_payload(session, id, &element.payload)?;
            let info = CommitInfo {
                name: element.name.clone(),
                description: element.description.clone(),
                kind: element.kind.clone(),
                comment: comment.to_string(),
                author: self.actor.login.clone(),
                deleted: false,
            };
            let version = self.versions.commit(session, id, &info)?;
            Ok((id, version))
        })?;

        info!(path = %target, %id, label = %version.label, login = %self.actor.login, "saved element");
        element.id = Some(id);
        element.version = Some(version.clone());
        element.deleted = false;
        Ok(version)
    }

    /// Load an element at its latest version, or at `label`.
    pub fn load(
        &self,
        name: &str,
        directory: &str,
        kind: &ElementKind,
        label: Option<&str>,
    ) -> RepoResult<RepositoryElement> {
        let directory = path::normalize_directory(directory);
        let target = path::resolve_path(&directory, name, kind);
        self.read(|session| {
            let id = self
                .element_at(session, &directory, name, kind)?
                .ok_or_else(|| RepositoryError::NotFound(target.clone()))?;
            let version = match label {
                Some(label) => self.versions.by_label(session, id, label)?,
                None => self
                    .versions
                    .latest(session, id)?
                    .ok_or_else(|| RepositoryError::NotFound(format!("{target} has no versions")))?,
            };
            let frozen = self.versions.frozen_state(session, id, &version.label)?;
            debug!(path = %target, label = %version.label, "loaded element");
            Ok(RepositoryElement {
                name: name.to_string(),
                directory: directory.clone(),
                kind: kind.clone(),
                description: frozen_text(&frozen, props::DESCRIPTION),
                id: Some(id),
                deleted: matches!(
                    frozen.property(props::DELETED),
                    Some(PropertyValue::Boolean(true))
                ),
                payload: read_payload(&frozen)?,
                version: Some(version),
            })
        })
    }

    /// `true` if the element exists and is not deleted.
    pub fn exists(&self, name: &str, directory: &str, kind: &ElementKind) -> RepoResult<bool> {
        self.read(|session| match self.element_at(session, directory, name, kind)? {
            Some(id) => Ok(!self.tombstones.is_deleted(session, id)?),
            None => Ok(false),
        })
    }

    /// Id of an element, deleted or not.
    pub fn object_id(
        &self,
        name: &str,
        directory: &str,
        kind: &ElementKind,
    ) -> RepoResult<Option<ObjectId>> {
        self.read(|session| self.element_at(session, directory, name, kind))
    }

    /// Names of the elements of `kind` in `directory`.
    pub fn list(
        &self,
        directory: &str,
        kind: &ElementKind,
        include_deleted: bool,
    ) -> RepoResult<Vec<String>> {
        self.read(|session| {
            Ok(self
                .listing(session, directory, kind, include_deleted)?
                .into_iter()
                .map(|(_, name)| name)
                .collect())
        })
    }

    /// Ids of the elements of `kind` in `directory`.
    pub fn list_ids(
        &self,
        directory: &str,
        kind: &ElementKind,
        include_deleted: bool,
    ) -> RepoResult<Vec<ObjectId>> {
        self.read(|session| {
            Ok(self
                .listing(session, directory, kind, include_deleted)?
                .into_iter()
                .map(|(id, _)| id)
                .collect())
        })
    }

    /// Listing rows for the elements of `kind` in `directory`.
    pub fn list_objects(
        &self,
        directory: &str,
        kind: &ElementKind,
        include_deleted: bool,
    ) -> RepoResult<Vec<RepositoryObject>> {
        self.read(|session| {
            let mut out = Vec::new();
            for (id, name) in self.listing(session, directory, kind, include_deleted)? {
                let Some(latest) = self.versions.latest(session, id)? else {
                    continue;
                };
                let description = session
                    .property(id, props::DESCRIPTION)
                    .with_context(|| format!("read description of {name}"))?
                    .and_then(|v| v.as_string().ok())
                    .unwrap_or_default();
                out.push(RepositoryObject {
                    id,
                    name,
                    kind: kind.clone(),
                    author: latest.author.clone(),
                    created: latest.created,
                    description: annotate(&description, &latest.label),
                    comment: latest.comment,
                    deleted: self.tombstones.is_deleted(session, id)?,
                });
            }
            Ok(out)
        })
    }

    /// Every version of an element, oldest first.
    pub fn versions(&self, id: ObjectId) -> RepoResult<Vec<ObjectVersion>> {
        self.read(|session| {
            self.require_element(session, id)?;
            self.versions.history(session, id)
        })
    }

    /// Remove one version from an element's history.
    pub fn prune_version(&self, id: ObjectId, label: &str) -> RepoResult<()> {
        self.unit_of_work(&format!("prune {id}@{label}"), |session| {
            self.require_element(session, id)?;
            self.versions.prune(session, id, label)
        })?;
        info!(%id, label, login = %self.actor.login, "pruned version");
        Ok(())
    }

    // ---- Deletion ----

    /// Tombstone an element in a new version.
    ///
    /// Returns `Ok(None)` if no node has this id.
    pub fn delete(&self, id: ObjectId) -> RepoResult<Option<ObjectVersion>> {
        self.unit_of_work(&format!("delete {id}"), |session| {
            let info = session
                .resolve(id)
                .with_context(|| format!("resolve {id}"))?;
            let Some(info) = info else {
                debug!(%id, "delete of unknown element ignored");
                return Ok(None);
            };
            self.check_element(session, &info)?;
            let kind = self.element_kind(session, id)?;
            if matches!(
                kind,
                ElementKind::ClusterSchema | ElementKind::SlaveServer | ElementKind::PartitionSchema
            ) {
                return Err(RepositoryError::Unsupported(format!(
                    "deleting {kind} elements"
                )));
            }
            self.locks.check_for_edit(session, id, &self.actor)?;
            self.tombstones.mark_deleted(session, id, &self.actor).map(Some)
        })
    }

    /// Clear an element's tombstone in a new version.
    ///
    /// Returns `Ok(None)` if the element is not deleted.
    pub fn undelete(&self, id: ObjectId) -> RepoResult<Option<ObjectVersion>> {
        self.unit_of_work(&format!("undelete {id}"), |session| {
            self.require_element(session, id)?;
            self.locks.check_for_edit(session, id, &self.actor)?;
            self.tombstones.undelete(session, id, &self.actor)
        })
    }

    // ---- Locking ----

    /// Lock an element for the current actor.
    pub fn lock(&self, id: ObjectId, message: &str) -> RepoResult<LockRecord> {
        let result = self.unit_of_work(&format!("lock {id}"), |session| {
            self.require_element(session, id)?;
            self.locks.acquire(session, id, &self.actor, message)
        });
        match result {
            Err(
                err @ RepositoryError::Transport {
                    source: StoreError::ItemExists { .. },
                    ..
                },
            ) => match self.lock_status(id)? {
                Some(lock) => Err(RepositoryError::locked_by(&lock)),
                None => Err(err),
            },
            other => other,
        }
    }

    /// Remove the lock on an element. Returns `false` if there was none.
    pub fn unlock(&self, id: ObjectId) -> RepoResult<bool> {
        self.unit_of_work(&format!("unlock {id}"), |session| {
            self.locks.release(session, id)
        })
    }

    pub fn lock_status(&self, id: ObjectId) -> RepoResult<Option<LockRecord>> {
        self.read(|session| self.locks.status(session, id))
    }

    // ---- Relations ----

    /// Record that `parent` uses `child`.
    ///
    /// Relations are stored next to the parent, in a node named after it
    /// with a `.usage` suffix. Relating the same pair again updates the
    /// description.
    pub fn relate(&self, parent: ObjectId, child: ObjectId, description: &str) -> RepoResult<ObjectId> {
        if parent == child {
            return Err(RepositoryError::IntegrityViolation(format!(
                "element {parent} cannot use itself"
            )));
        }
        let relation = self.unit_of_work(&format!("relate {parent} to {child}"), |session| {
            let parent_info = self.require_element(session, parent)?;
            self.require_element(session, child)?;
            let folder = parent_info.parent.ok_or_else(|| {
                RepositoryError::IntegrityViolation(format!("element {parent} has no folder"))
            })?;

            let usage_name = format!("{}{USAGE_SUFFIX}", parent_info.name);
            let usage = match session
                .child(folder, &usage_name)
                .with_context(|| format!("look up {usage_name}"))?
            {
                Some(id) => id,
                None => session
                    .add_child(folder, &usage_name, NodeType::Unstructured)
                    .with_context(|| format!("create {usage_name}"))?,
            };

            let relation_name = child.to_string();
            let relation = match session
                .child(usage, &relation_name)
                .with_context(|| format!("look up relation {relation_name}"))?
            {
                Some(id) => id,
                None => session
                    .add_child(usage, &relation_name, NodeType::Relation)
                    .with_context(|| format!("create relation {relation_name}"))?,
            };
            let fields = [
                (props::RELATION_PARENT, PropertyValue::Reference(parent)),
                (props::RELATION_CHILD, PropertyValue::Reference(child)),
                (props::DESCRIPTION, PropertyValue::from(description)),
            ];
            for (key, value) in fields {
                session
                    .set_property(relation, key, value)
                    .with_context(|| format!("write relation {relation_name}"))?;
            }
            Ok(relation)
        })?;
        info!(%parent, %child, "recorded relation");
        Ok(relation)
    }

    /// Relations recorded for `parent`.
    pub fn relations(&self, parent: ObjectId) -> RepoResult<Vec<ElementRelation>> {
        self.read(|session| {
            let info = self.require_element(session, parent)?;
            let Some(folder) = info.parent else {
                return Ok(Vec::new());
            };
            let usage_name = format!("{}{USAGE_SUFFIX}", info.name);
            let Some(usage) = session
                .child(folder, &usage_name)
                .with_context(|| format!("look up {usage_name}"))?
            else {
                return Ok(Vec::new());
            };

            let mut out = Vec::new();
            for relation in session
                .children(usage)
                .with_context(|| format!("list {usage_name}"))?
            {
                let child = self
                    .attributes_reference(session, relation, props::RELATION_CHILD)?
                    .ok_or_else(|| {
                        RepositoryError::IntegrityViolation(format!(
                            "relation {relation} has no child"
                        ))
                    })?;
                let description = session
                    .property(relation, props::DESCRIPTION)
                    .with_context(|| format!("read relation {relation}"))?
                    .and_then(|v| v.as_string().ok())
                    .unwrap_or_default();
                out.push(ElementRelation {
                    id: relation,
                    parent,
                    child,
                    description,
                });
            }
            Ok(out)
        })
    }

    // ---- Payload codecs ----

    /// Serialize `object` with `codec` and save it as a document element.
    pub fn save_object<C: PayloadCodec>(
        &self,
        codec: &C,
        object: &C::Object,
        mut element: RepositoryElement,
        comment: &str,
    ) -> RepoResult<RepositoryElement> {
        element.payload = ElementPayload::Xml(codec.serialize(object)?);
        self.save(&mut element, comment)?;
        Ok(element)
    }

    /// Load a document element and parse it with `codec`.
    pub fn load_object<C: PayloadCodec>(
        &self,
        codec: &C,
        name: &str,
        directory: &str,
        kind: &ElementKind,
        label: Option<&str>,
    ) -> RepoResult<(C::Object, RepositoryElement)> {
        let element = self.load(name, directory, kind, label)?;
        let ElementPayload::Xml(document) = &element.payload else {
            return Err(RepositoryError::MalformedPayload(format!(
                "{} is not stored as a document",
                element.path()
            )));
        };
        let object = codec.parse(document)?;
        Ok((object, element))
    }

    // ---- Directories ----

    pub fn load_directory_tree(&self) -> RepoResult<RepositoryDirectory> {
        self.read(|session| self.directories.load_tree(session))
    }

    /// Create `dir_path` below `parent`, or absolutely if it starts with `/`.
    ///
    /// Folders are flushed one at a time; on failure the created prefix
    /// stays, and repeating the call resumes from it.
    pub fn create_directory(
        &self,
        parent: &RepositoryDirectory,
        dir_path: &str,
    ) -> RepoResult<RepositoryDirectory> {
        let full = if dir_path.starts_with('/') {
            path::normalize_directory(dir_path)
        } else {
            path::normalize_directory(&path::join(&parent.path, dir_path))
        };
        self.unit_of_work(&format!("create directory {full}"), |session| {
            self.directories.create_path(session, &full)
        })
    }

    /// Create a single folder named `name` below `parent`.
    pub fn save_directory(
        &self,
        parent: &RepositoryDirectory,
        name: &str,
    ) -> RepoResult<RepositoryDirectory> {
        self.unit_of_work(&format!("create directory {name} in {}", parent.path), |session| {
            self.directories.save_directory(session, &parent.path, name)
        })
    }

    /// Physically remove a folder and everything in it.
    ///
    /// Locks on the removed elements are released, and relations elsewhere
    /// that use them are dropped.
    pub fn delete_directory(&self, dir: &RepositoryDirectory) -> RepoResult<()> {
        self.unit_of_work(&format!("delete directory {}", dir.path), |session| {
            let folder = self.directories.resolve_directory(session, dir)?;
            let removed = self.elements_below(session, folder)?;
            for id in &removed {
                self.locks.release(session, *id)?;
            }
            self.drop_relations_to(session, folder, &removed)?;
            self.directories.delete_directory(session, dir)?;
            debug!(path = %dir.path, elements = removed.len(), "removed directory contents");
            Ok(())
        })
    }

    pub fn directory_names(&self, dir: &RepositoryDirectory) -> RepoResult<Vec<String>> {
        self.read(|session| self.directories.directory_names(session, &dir.path))
    }

    // ---- Internals ----

    fn unit_of_work<R>(
        &self,
        operation: &str,
        f: impl FnOnce(&mut S::Session) -> RepoResult<R>,
    ) -> RepoResult<R> {
        let mut session = self
            .store
            .open_session()
            .with_context(|| format!("{operation}: open session"))?;
        match f(&mut session) {
            Ok(value) => {
                if let Err(e) = session.save() {
                    session.refresh();
                    warn!(operation, error = %e, "flush failed");
                    return Err(RepositoryError::from_store(format!("{operation}: flush"), e));
                }
                Ok(value)
            }
            Err(e) => {
                session.refresh();
                debug!(operation, error = %e, "discarded pending changes");
                Err(e)
            }
        }
    }

    fn read<R>(&self, f: impl FnOnce(&S::Session) -> RepoResult<R>) -> RepoResult<R> {
        let session = self
            .store
            .open_session()
            .with_context(|| "open session".into())?;
        f(&session)
    }

    fn check_saveable(&self, element: &RepositoryElement) -> RepoResult<()> {
        let kind = &element.kind;
        if kind.is_other() {
            return Err(RepositoryError::Unsupported(format!(
                "saving elements of unknown kind {kind}"
            )));
        }
        if kind.is_sub_object() {
            return Err(RepositoryError::Unsupported(format!(
                "saving {kind} elements outside their owner"
            )));
        }
        if *kind == ElementKind::Database && element.payload.is_xml() {
            return Err(RepositoryError::Unsupported(
                "saving database connections as documents".into(),
            ));
        }
        path::validate_name(&element.name)?;
        path::validate_name(&element.node_name())?;

        if let ElementPayload::Structured { parts, .. } = &element.payload {
            let mut seen = HashSet::new();
            for part in parts {
                if !part.kind.is_sub_object() {
                    return Err(RepositoryError::Unsupported(format!(
                        "{} elements as sub-objects",
                        part.kind
                    )));
                }
                path::validate_name(&part.name)?;
                let node_name = part.node_name();
                if !seen.insert(node_name.clone()) {
                    return Err(RepositoryError::InvalidName {
                        name: node_name,
                        reason: format!("duplicate sub-object in {}", element.path()),
                    });
                }
            }
        }
        Ok(())
    }

    fn write_payload(
        &self,
        session: &mut S::Session,
        id: ObjectId,
        payload: &ElementPayload,
    ) -> RepoResult<()> {
        for part in session
            .children(id)
            .with_context(|| format!("list parts of {id}"))?
        {
            session
                .remove(part)
                .with_context(|| format!("clear parts of {id}"))?;
        }

        match payload {
            ElementPayload::Xml(document) => {
                AttributeMap::new().write_to(session, id)?;
                session
                    .set_property(id, props::PAYLOAD, PropertyValue::from(document.as_str()))
                    .with_context(|| format!("write payload of {id}"))?;
            }
            ElementPayload::Structured { attributes, parts } => {
                session
                    .remove_property(id, props::PAYLOAD)
                    .with_context(|| format!("clear payload of {id}"))?;
                attributes.write_to(session, id)?;
                for part in parts {
                    let node_name = part.node_name();
                    let part_id = session
                        .add_child(id, &node_name, NodeType::Unstructured)
                        .with_context(|| format!("create part {node_name}"))?;
                    let fields = [
                        (props::NAME, PropertyValue::from(part.name.as_str())),
                        (props::KIND, PropertyValue::from(part.kind.tag())),
                    ];
                    for (key, value) in fields {
                        session
                            .set_property(part_id, key, value)
                            .with_context(|| format!("write part {node_name}"))?;
                    }
                    part.attributes.write_to(session, part_id)?;
                }
            }
        }
        Ok(())
    }

    /// The element node for a name, directory, and kind, if present.
    fn element_at(
        &self,
        session: &S::Session,
        directory: &str,
        name: &str,
        kind: &ElementKind,
    ) -> RepoResult<Option<ObjectId>> {
        let Some(folder) = self.directories.folder_at(session, directory)? else {
            return Ok(None);
        };
        let node_name = path::node_name(name, kind);
        let Some(id) = session
            .child(folder, &node_name)
            .with_context(|| format!("look up {node_name}"))?
        else {
            return Ok(None);
        };
        let info = session.node(id).with_context(|| format!("read {node_name}"))?;
        Ok(is_element(&info).then_some(id))
    }

    fn listing(
        &self,
        session: &S::Session,
        directory: &str,
        kind: &ElementKind,
        include_deleted: bool,
    ) -> RepoResult<Vec<(ObjectId, String)>> {
        let folder = self
            .directories
            .folder_at(session, directory)?
            .ok_or_else(|| RepositoryError::NotFound(format!("directory {directory}")))?;
        let mut out = Vec::new();
        for child in session
            .children(folder)
            .with_context(|| format!("list {directory}"))?
        {
            let info = session
                .node(child)
                .with_context(|| format!("read child of {directory}"))?;
            if !is_element(&info) {
                continue;
            }
            let Some(name) = path::split_object_name(&info.name, kind) else {
                continue;
            };
            if !include_deleted && self.tombstones.is_deleted(session, child)? {
                continue;
            }
            out.push((child, name.to_string()));
        }
        Ok(out)
    }

    fn require_element(&self, session: &S::Session, id: ObjectId) -> RepoResult<NodeInfo> {
        let info = session
            .resolve(id)
            .with_context(|| format!("resolve {id}"))?
            .ok_or_else(|| RepositoryError::NotFound(format!("element {id}")))?;
        self.check_element(session, &info)?;
        Ok(info)
    }

    fn check_element(&self, session: &S::Session, info: &NodeInfo) -> RepoResult<()> {
        if is_element(info) {
            return Ok(());
        }
        let path = session
            .path(info.id)
            .with_context(|| format!("path of {}", info.id))?;
        Err(RepositoryError::Unsupported(format!(
            "{path} is not a repository element"
        )))
    }

    fn element_kind(&self, session: &S::Session, id: ObjectId) -> RepoResult<ElementKind> {
        let tag = session
            .property(id, props::KIND)
            .with_context(|| format!("read kind of {id}"))?
            .and_then(|v| v.as_string().ok())
            .unwrap_or_default();
        ElementKind::from_tag(&tag).map_err(|e| {
            RepositoryError::IntegrityViolation(format!("element {id} has no kind: {e}"))
        })
    }

    /// Ids of all element nodes below `top`.
    fn elements_below(&self, session: &S::Session, top: ObjectId) -> RepoResult<HashSet<ObjectId>> {
        let mut out = HashSet::new();
        let mut pending = vec![top];
        while let Some(node) = pending.pop() {
            for child in session
                .children(node)
                .with_context(|| format!("list {node}"))?
            {
                let info = session
                    .node(child)
                    .with_context(|| format!("read child of {node}"))?;
                if is_element(&info) {
                    out.insert(child);
                }
                pending.push(child);
            }
        }
        Ok(out)
    }

    /// Remove relations outside `skip` whose child is in `removed`.
    fn drop_relations_to(
        &self,
        session: &mut S::Session,
        skip: ObjectId,
        removed: &HashSet<ObjectId>,
    ) -> RepoResult<()> {
        if removed.is_empty() {
            return Ok(());
        }
        let root = session.root().with_context(|| "open root".into())?;
        let registry = self.locks.registry(session)?;
        let mut stale = Vec::new();
        let mut pending = vec![root];
        while let Some(node) = pending.pop() {
            for child in session
                .children(node)
                .with_context(|| format!("list {node}"))?
            {
                if child == skip || Some(child) == registry {
                    continue;
                }
                let info = session
                    .node(child)
                    .with_context(|| format!("read child of {node}"))?;
                if info.node_type != NodeType::Relation {
                    pending.push(child);
                    continue;
                }
                let target = session
                    .property(child, props::RELATION_CHILD)
                    .with_context(|| format!("read relation {child}"))?
                    .and_then(|v| v.as_reference().ok());
                if target.is_some_and(|t| removed.contains(&t)) {
                    stale.push(child);
                }
            }
        }
        for relation in stale {
            session
                .remove(relation)
                .with_context(|| format!("drop relation {relation}"))?;
            debug!(%relation, "dropped relation to removed element");
        }
        Ok(())
    }

    fn attributes_reference(
        &self,
        session: &S::Session,
        node: ObjectId,
        key: &str,
    ) -> RepoResult<Option<ObjectId>> {
        let Some(value) = session
            .property(node, key)
            .with_context(|| format!("read {key} of {node}"))?
        else {
            return Ok(None);
        };
        let target = value.as_reference().map_err(|e| {
            RepositoryError::IntegrityViolation(format!("{key} of {node}: {e}"))
        })?;
        if session
            .resolve(target)
            .with_context(|| format!("resolve {target}"))?
            .is_none()
        {
            warn!(%node, key, %target, "dangling relation");
            return Err(RepositoryError::IntegrityViolation(format!(
                "{key} of {node} references missing node {target}"
            )));
        }
        Ok(Some(target))
    }
}

/// Element nodes are versionable unstructured nodes.
fn is_element(info: &NodeInfo) -> bool {
    info.node_type == NodeType::Unstructured && info.is_versionable()
}

fn annotate(description: &str, label: &str) -> String {
    if description.is_empty() {
        format!("v{label}")
    } else {
        format!("{description} - v{label}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde::{Deserialize, Serialize};

    use crate::codec::JsonCodec;
    use crate::element::SubObject;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    }

    fn repo() -> Repository<InMemoryTreeStore> {
        init_tracing();
        Repository::open(RepositoryConfig::default()).unwrap()
    }

    fn shared(store: &Arc<InMemoryTreeStore>, login: &str) -> Repository<Arc<InMemoryTreeStore>> {
        init_tracing();
        Repository::connect(
            Arc::clone(store),
            RepositoryConfig::default(),
            Actor::new(login, login.to_uppercase()),
        )
        .unwrap()
    }

    fn etl<S: TreeStore>(repo: &Repository<S>) -> RepositoryDirectory {
        repo.create_directory(&RepositoryDirectory::root(), "etl")
            .unwrap()
    }

    fn transformation(name: &str) -> RepositoryElement {
        RepositoryElement::xml(
            name,
            "/etl",
            ElementKind::Transformation,
            format!("<transformation name=\"{name}\"/>"),
        )
    }

    fn saved(repo: &Repository<InMemoryTreeStore>, name: &str) -> ObjectId {
        let mut element = transformation(name);
        repo.save(&mut element, "first").unwrap();
        element.id.unwrap()
    }

    // ---- Save and load ----

    #[test]
    fn document_round_trip() {
        let repo = repo();
        etl(&repo);
        let mut element = transformation("load").with_description("loads facts");
        let version = repo.save(&mut element, "first").unwrap();
        assert_eq!(version.label, "1.0");
        assert_eq!(version.author, "anonymous");
        assert_eq!(version.comment, "first");
        assert_eq!(element.version.as_ref(), Some(&version));

        let loaded = repo
            .load("load", "/etl", &ElementKind::Transformation, None)
            .unwrap();
        assert_eq!(loaded.id, element.id);
        assert_eq!(loaded.payload, element.payload);
        assert_eq!(loaded.description, "loads facts");
        assert_eq!(loaded.version.unwrap().label, "1.0");
        assert!(!loaded.deleted);

        assert!(repo.exists("load", "/etl", &ElementKind::Transformation).unwrap());
        assert!(!repo.exists("load", "/etl", &ElementKind::Job).unwrap());
        assert!(!repo.exists("load", "/nowhere", &ElementKind::Transformation).unwrap());
    }

    #[test]
    fn structured_round_trip_with_reference() {
        let repo = repo();
        etl(&repo);
        let mut db_attrs = AttributeMap::new();
        db_attrs.insert("host", "db.local").unwrap();
        db_attrs.insert("port", 5432i64).unwrap();
        let mut db = RepositoryElement::structured(
            "warehouse",
            "/etl",
            ElementKind::Database,
            db_attrs,
            vec![],
        );
        repo.save(&mut db, "connection").unwrap();
        let db_id = db.id.unwrap();

        let mut attrs = AttributeMap::new();
        attrs.insert("connection", db_id).unwrap();
        attrs.insert_indexed("field", 0, "id").unwrap();
        attrs.insert_indexed("field", 1, "amount").unwrap();
        let mut step_attrs = AttributeMap::new();
        step_attrs.insert("type", "TableInput").unwrap();
        let step = SubObject::new("read", ElementKind::Step, step_attrs);
        let mut element = RepositoryElement::structured(
            "load",
            "/etl",
            ElementKind::Transformation,
            attrs,
            vec![step],
        );
        repo.save(&mut element, "first").unwrap();

        let loaded = repo
            .load("load", "/etl", &ElementKind::Transformation, None)
            .unwrap();
        assert_eq!(loaded.payload, element.payload);
        let ElementPayload::Structured { attributes, parts } = &loaded.payload else {
            panic!("expected a structured payload");
        };
        assert_eq!(attributes.count("field"), 2);
        assert_eq!(attributes.get("connection"), Some(&PropertyValue::Reference(db_id)));
        assert_eq!(parts[0].name, "read");
    }

    #[test]
    fn resave_replaces_parts_and_payload_style() {
        let repo = repo();
        etl(&repo);
        let mut attrs = AttributeMap::new();
        attrs.insert("size", 1i64).unwrap();
        let parts = vec![
            SubObject::new("a", ElementKind::Step, AttributeMap::new()),
            SubObject::new("b", ElementKind::Step, AttributeMap::new()),
        ];
        let mut element =
            RepositoryElement::structured("load", "/etl", ElementKind::Transformation, attrs, parts);
        repo.save(&mut element, "first").unwrap();

        element.payload = ElementPayload::Xml("<t/>".into());
        repo.save(&mut element, "second").unwrap();
        let loaded = repo
            .load("load", "/etl", &ElementKind::Transformation, None)
            .unwrap();
        assert_eq!(loaded.payload, ElementPayload::Xml("<t/>".into()));

        let first = repo
            .load("load", "/etl", &ElementKind::Transformation, Some("1.0"))
            .unwrap();
        let ElementPayload::Structured { parts, .. } = first.payload else {
            panic!("expected a structured payload");
        };
        assert_eq!(parts.len(), 2);
    }

    #[test]
    fn save_into_missing_directory_fails() {
        let repo = repo();
        let mut element = transformation("load");
        assert!(matches!(
            repo.save(&mut element, "first"),
            Err(RepositoryError::NotFound(_))
        ));
        assert!(element.id.is_none());
    }

    #[test]
    fn unsupported_elements_are_refused() {
        let repo = repo();
        etl(&repo);
        let refused = [
            RepositoryElement::xml("x", "/etl", ElementKind::Other("report".into()), "<r/>"),
            RepositoryElement::xml("x", "/etl", ElementKind::Step, "<s/>"),
            RepositoryElement::xml("x", "/etl", ElementKind::Database, "<d/>"),
            RepositoryElement::structured(
                "x",
                "/etl",
                ElementKind::Transformation,
                AttributeMap::new(),
                vec![SubObject::new("j", ElementKind::Job, AttributeMap::new())],
            ),
        ];
        for mut element in refused {
            assert!(
                matches!(repo.save(&mut element, "c"), Err(RepositoryError::Unsupported(_))),
                "{:?} should be refused",
                element.kind
            );
        }

        let mut duplicate = RepositoryElement::structured(
            "x",
            "/etl",
            ElementKind::Transformation,
            AttributeMap::new(),
            vec![
                SubObject::new("s", ElementKind::Step, AttributeMap::new()),
                SubObject::new("s", ElementKind::Step, AttributeMap::new()),
            ],
        );
        assert!(matches!(
            repo.save(&mut duplicate, "c"),
            Err(RepositoryError::InvalidName { .. })
        ));
        let mut bad_name = transformation("a/b");
        assert!(matches!(
            repo.save(&mut bad_name, "c"),
            Err(RepositoryError::InvalidName { .. })
        ));
    }

    #[test]
    fn failed_save_leaves_nothing_behind() {
        let repo = repo();
        etl(&repo);
        let before = repo.store().node_count().unwrap();
        let mut attrs = AttributeMap::new();
        attrs.insert("connection", ObjectId::new()).unwrap();
        let mut element =
            RepositoryElement::structured("load", "/etl", ElementKind::Transformation, attrs, vec![]);
        assert!(repo.save(&mut element, "first").is_err());
        assert_eq!(repo.store().node_count().unwrap(), before);
        assert_eq!(
            repo.object_id("load", "/etl", &ElementKind::Transformation)
                .unwrap(),
            None
        );
    }

    // ---- Versions ----

    #[test]
    fn load_by_label_and_history() {
        let repo = repo();
        etl(&repo);
        let mut element = transformation("load");
        repo.save(&mut element, "first").unwrap();
        element.payload = ElementPayload::Xml("<v2/>".into());
        repo.save(&mut element, "second").unwrap();
        let id = element.id.unwrap();

        let first = repo
            .load("load", "/etl", &ElementKind::Transformation, Some("1.0"))
            .unwrap();
        assert_eq!(
            first.payload,
            ElementPayload::Xml("<transformation name=\"load\"/>".into())
        );
        let latest = repo
            .load("load", "/etl", &ElementKind::Transformation, None)
            .unwrap();
        assert_eq!(latest.payload, ElementPayload::Xml("<v2/>".into()));

        for label in ["9.9", "root"] {
            assert!(matches!(
                repo.load("load", "/etl", &ElementKind::Transformation, Some(label)),
                Err(RepositoryError::VersionNotFound { .. })
            ));
        }

        let history = repo.versions(id).unwrap();
        let labels: Vec<&str> = history.iter().map(|v| v.label.as_str()).collect();
        assert_eq!(labels, ["1.0", "1.1"]);
        let comments: Vec<&str> = history.iter().map(|v| v.comment.as_str()).collect();
        assert_eq!(comments, ["first", "second"]);
    }

    #[test]
    fn prune_removes_one_version() {
        let repo = repo();
        etl(&repo);
        let mut element = transformation("load");
        for comment in ["a", "b", "c"] {
            repo.save(&mut element, comment).unwrap();
        }
        let id = element.id.unwrap();

        repo.prune_version(id, "1.1").unwrap();
        let labels: Vec<String> = repo
            .versions(id)
            .unwrap()
            .into_iter()
            .map(|v| v.label)
            .collect();
        assert_eq!(labels, ["1.0", "1.2"]);

        assert!(matches!(
            repo.prune_version(id, "1.2"),
            Err(RepositoryError::Unsupported(_))
        ));
        assert!(matches!(
            repo.prune_version(id, "7.7"),
            Err(RepositoryError::VersionNotFound { .. })
        ));
    }

    // ---- Listing ----

    #[test]
    fn listing_filters_by_kind() {
        let repo = repo();
        etl(&repo);
        let t = saved(&repo, "load");
        let mut job = RepositoryElement::xml("load", "/etl", ElementKind::Job, "<job/>");
        repo.save(&mut job, "first").unwrap();

        assert_eq!(
            repo.list("/etl", &ElementKind::Transformation, false).unwrap(),
            ["load"]
        );
        assert_eq!(repo.list("/etl", &ElementKind::Job, false).unwrap(), ["load"]);
        assert_eq!(
            repo.list_ids("/etl", &ElementKind::Transformation, false)
                .unwrap(),
            [t]
        );
        assert!(repo
            .list("/etl", &ElementKind::Database, false)
            .unwrap()
            .is_empty());
        assert!(matches!(
            repo.list("/missing", &ElementKind::Job, false),
            Err(RepositoryError::NotFound(_))
        ));
    }

    #[test]
    fn list_objects_annotates_latest_version() {
        let repo = repo();
        etl(&repo);
        let mut described = transformation("load").with_description("loads facts");
        repo.save(&mut described, "first").unwrap();
        repo.save(&mut described, "second").unwrap();
        saved(&repo, "plain");

        let rows = repo
            .list_objects("/etl", &ElementKind::Transformation, false)
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "load");
        assert_eq!(rows[0].description, "loads facts - v1.1");
        assert_eq!(rows[0].comment, "second");
        assert_eq!(rows[0].author, "anonymous");
        assert_eq!(rows[1].description, "v1.0");
        assert!(!rows[1].deleted);
    }

    // ---- Deletion ----

    #[test]
    fn delete_and_undelete() {
        let repo = repo();
        etl(&repo);
        let load = saved(&repo, "load");
        saved(&repo, "extract");

        let version = repo.delete(load).unwrap().unwrap();
        assert_eq!(version.comment, "deleted");
        assert_eq!(
            repo.list("/etl", &ElementKind::Transformation, false).unwrap(),
            ["extract"]
        );
        assert_eq!(
            repo.list("/etl", &ElementKind::Transformation, true).unwrap(),
            ["load", "extract"]
        );
        assert!(!repo.exists("load", "/etl", &ElementKind::Transformation).unwrap());
        assert_eq!(
            repo.object_id("load", "/etl", &ElementKind::Transformation)
                .unwrap(),
            Some(load)
        );
        assert!(repo
            .load("load", "/etl", &ElementKind::Transformation, None)
            .unwrap()
            .deleted);

        let restored = repo.undelete(load).unwrap().unwrap();
        assert_eq!(restored.comment, "undeleted");
        assert_eq!(repo.undelete(load).unwrap(), None);
        assert_eq!(
            repo.list("/etl", &ElementKind::Transformation, false)
                .unwrap()
                .len(),
            2
        );
        assert_eq!(repo.versions(load).unwrap().len(), 3);
    }

    #[test]
    fn saving_a_deleted_element_restores_it() {
        let repo = repo();
        etl(&repo);
        let mut element = transformation("load");
        repo.save(&mut element, "first").unwrap();
        repo.delete(element.id.unwrap()).unwrap();
        repo.save(&mut element, "again").unwrap();
        assert!(repo.exists("load", "/etl", &ElementKind::Transformation).unwrap());
    }

    #[test]
    fn delete_edge_cases() {
        let repo = repo();
        let dir = etl(&repo);
        assert_eq!(repo.delete(ObjectId::new()).unwrap(), None);
        assert!(matches!(
            repo.undelete(ObjectId::new()),
            Err(RepositoryError::NotFound(_))
        ));
        assert!(matches!(
            repo.delete(dir.id.unwrap()),
            Err(RepositoryError::Unsupported(_))
        ));

        let mut cluster = RepositoryElement::xml("c1", "/etl", ElementKind::ClusterSchema, "<c/>");
        repo.save(&mut cluster, "first").unwrap();
        assert!(matches!(
            repo.delete(cluster.id.unwrap()),
            Err(RepositoryError::Unsupported(_))
        ));
    }

    // ---- Locking ----

    #[test]
    fn lock_blocks_other_users() {
        let store = Arc::new(InMemoryTreeStore::new());
        let alice = shared(&store, "alice");
        let bob = shared(&store, "bob");
        etl(&alice);
        let mut element = transformation("load");
        alice.save(&mut element, "first").unwrap();
        let id = element.id.unwrap();

        let lock = alice.lock(id, "editing").unwrap();
        assert_eq!(lock.login, "alice");
        assert_eq!(lock.display_name, "ALICE");
        assert_eq!(lock.path, "/etl/load.ktr");
        assert_eq!(bob.lock_status(id).unwrap(), Some(lock));

        let mut theirs = element.clone();
        match bob.save(&mut theirs, "mine") {
            Err(RepositoryError::AlreadyLocked { login, message, .. }) => {
                assert_eq!(login, "alice");
                assert_eq!(message, "editing");
            }
            other => panic!("expected AlreadyLocked, got {other:?}"),
        }
        assert!(matches!(bob.delete(id), Err(RepositoryError::AlreadyLocked { .. })));
        assert!(matches!(bob.lock(id, "x"), Err(RepositoryError::AlreadyLocked { .. })));
        assert_eq!(bob.versions(id).unwrap().len(), 1);

        alice.save(&mut element, "second").unwrap();
        assert_eq!(alice.lock_status(id).unwrap(), None);
        bob.save(&mut theirs, "mine").unwrap();
        assert_eq!(bob.versions(id).unwrap().len(), 3);
    }

    #[test]
    fn lock_and_unlock() {
        let repo = repo();
        etl(&repo);
        let id = saved(&repo, "load");
        repo.lock(id, "mine").unwrap();
        assert!(matches!(
            repo.lock(id, "again"),
            Err(RepositoryError::AlreadyLocked { .. })
        ));
        assert!(repo.unlock(id).unwrap());
        assert!(!repo.unlock(id).unwrap());
        assert!(matches!(
            repo.lock(ObjectId::new(), "ghost"),
            Err(RepositoryError::NotFound(_))
        ));
    }

    // ---- Relations ----

    #[test]
    fn relations_are_recorded_beside_parent() {
        let repo = repo();
        etl(&repo);
        let mut db = RepositoryElement::structured(
            "warehouse",
            "/etl",
            ElementKind::Database,
            AttributeMap::new(),
            vec![],
        );
        repo.save(&mut db, "first").unwrap();
        let db = db.id.unwrap();
        let load = saved(&repo, "load");

        let relation = repo.relate(load, db, "reads from").unwrap();
        let again = repo.relate(load, db, "writes to").unwrap();
        assert_eq!(relation, again);
        assert_eq!(
            repo.relations(load).unwrap(),
            [ElementRelation {
                id: relation,
                parent: load,
                child: db,
                description: "writes to".into(),
            }]
        );
        assert!(repo.relations(db).unwrap().is_empty());
        assert!(matches!(
            repo.relate(load, load, "self"),
            Err(RepositoryError::IntegrityViolation(_))
        ));

        assert_eq!(
            repo.list("/etl", &ElementKind::Transformation, true).unwrap(),
            ["load"]
        );
        let tree = repo.load_directory_tree().unwrap();
        assert!(tree.find("/etl").unwrap().children.is_empty());
    }

    // ---- Payload codecs ----

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Pipeline {
        name: String,
        steps: Vec<String>,
    }

    #[test]
    fn codec_round_trip() {
        let repo = repo();
        etl(&repo);
        let codec = JsonCodec::<Pipeline>::new();
        let pipeline = Pipeline {
            name: "load".into(),
            steps: vec!["read".into(), "write".into()],
        };
        let element = repo
            .save_object(&codec, &pipeline, transformation("load"), "first")
            .unwrap();
        assert_eq!(element.version.as_ref().unwrap().label, "1.0");

        let (back, loaded) = repo
            .load_object(&codec, "load", "/etl", &ElementKind::Transformation, None)
            .unwrap();
        assert_eq!(back, pipeline);
        assert_eq!(loaded.id, element.id);

        let mut structured = RepositoryElement::structured(
            "attrs",
            "/etl",
            ElementKind::Transformation,
            AttributeMap::new(),
            vec![],
        );
        repo.save(&mut structured, "first").unwrap();
        assert!(matches!(
            repo.load_object(&codec, "attrs", "/etl", &ElementKind::Transformation, None),
            Err(RepositoryError::MalformedPayload(_))
        ));
    }

    // ---- Directories ----

    #[test]
    fn directory_operations() {
        let repo = repo();
        let root = RepositoryDirectory::root();
        let b = repo.create_directory(&root, "a/b").unwrap();
        assert_eq!(b.path, "/a/b");
        let c = repo.create_directory(&b, "c").unwrap();
        assert_eq!(c.path, "/a/b/c");
        let again = repo.create_directory(&root, "/a/b/c").unwrap();
        assert_eq!(again.id, c.id);

        let tree = repo.load_directory_tree().unwrap();
        assert_eq!(tree.count(), 4);
        assert!(tree.child("__LOCKS__").is_none());
        assert!(tree.find("/a/b/c").is_some());

        repo.save_directory(&b, "d").unwrap();
        assert!(matches!(
            repo.save_directory(&b, "d"),
            Err(RepositoryError::InvalidName { .. })
        ));
        assert_eq!(repo.directory_names(&b).unwrap(), ["c", "d"]);

        repo.delete_directory(&b).unwrap();
        let tree = repo.load_directory_tree().unwrap();
        assert!(tree.find("/a/b").is_none());
        assert!(tree.find("/a").is_some());
        assert!(matches!(
            repo.delete_directory(&root),
            Err(RepositoryError::Unsupported(_))
        ));
    }

    #[test]
    fn deleting_a_directory_cleans_locks_and_relations() {
        let repo = repo();
        let conns = repo
            .create_directory(&RepositoryDirectory::root(), "conns")
            .unwrap();
        etl(&repo);
        let mut db = RepositoryElement::structured(
            "warehouse",
            "/conns",
            ElementKind::Database,
            AttributeMap::new(),
            vec![],
        );
        repo.save(&mut db, "first").unwrap();
        let db = db.id.unwrap();
        let load = saved(&repo, "load");
        let extract = saved(&repo, "extract");
        repo.relate(load, db, "reads from").unwrap();
        repo.relate(load, extract, "runs after").unwrap();
        repo.lock(db, "editing").unwrap();
        repo.lock(extract, "kept").unwrap();

        repo.delete_directory(&conns).unwrap();
        assert_eq!(repo.lock_status(db).unwrap(), None);
        assert!(repo.lock_status(extract).unwrap().is_some());
        let relations = repo.relations(load).unwrap();
        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].child, extract);
    }

    #[test]
    fn exists_ignores_folders_with_element_names() {
        let repo = repo();
        let root = RepositoryDirectory::root();
        repo.create_directory(&root, "load.ktr").unwrap();
        assert!(!repo.exists("load", "/", &ElementKind::Transformation).unwrap());
        assert!(repo
            .list("/", &ElementKind::Transformation, true)
            .unwrap()
            .is_empty());
        assert!(matches!(
            repo.load("load", "/", &ElementKind::Transformation, None),
            Err(RepositoryError::NotFound(_))
        ));
    }

    #[test]
    fn lock_registry_is_not_a_directory() {
        let repo = repo();
        let root = RepositoryDirectory::root();
        assert!(matches!(
            repo.create_directory(&root, "__LOCKS__"),
            Err(RepositoryError::InvalidName { .. })
        ));
        let mut element = transformation("load");
        element.directory = "/__LOCKS__".into();
        assert!(matches!(
            repo.save(&mut element, "first"),
            Err(RepositoryError::NotFound(_))
        ));
    }

    // ---- Setup ----

    #[test]
    fn snapshot_survives_reopen() {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        let config = RepositoryConfig {
            snapshot_path: Some(dir.path().join("tree.json")),
            ..RepositoryConfig::default()
        };
        let id = {
            let repo = Repository::open(config.clone()).unwrap();
            etl(&repo);
            let id = saved(&repo, "load");
            repo.lock(id, "overnight").unwrap();
            id
        };

        let repo = Repository::open(config).unwrap();
        let loaded = repo
            .load("load", "/etl", &ElementKind::Transformation, None)
            .unwrap();
        assert_eq!(loaded.id, Some(id));
        let lock = repo.lock_status(id).unwrap().unwrap();
        assert_eq!(lock.message, "overnight");
    }

    #[test]
    fn registry_may_not_take_over_a_folder() {
        let store = Arc::new(InMemoryTreeStore::new());
        let alice = shared(&store, "alice");
        alice
            .create_directory(&RepositoryDirectory::root(), "shared/daily")
            .unwrap();
        let config = RepositoryConfig {
            lock_registry: "shared".into(),
            ..RepositoryConfig::default()
        };
        assert!(matches!(
            Repository::connect(Arc::clone(&store), config, Actor::with_login("bob")),
            Err(RepositoryError::Config(_))
        ));
        let tree = alice.load_directory_tree().unwrap();
        assert!(tree.find("/shared/daily").is_some());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = RepositoryConfig {
            lock_registry: "a/b".into(),
            ..RepositoryConfig::default()
        };
        assert!(matches!(
            Repository::connect(InMemoryTreeStore::new(), config, Actor::with_login("x")),
            Err(RepositoryError::Config(_))
        ));
    }

    #[test]
    fn repository_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Repository<InMemoryTreeStore>>();
        assert_send_sync::<Repository<Arc<InMemoryTreeStore>>>();
    }
}
