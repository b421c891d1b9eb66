//! Advisory lock registry.
//!
//! Locks are ordinary nodes in one registry folder below the root, named by
//! the locked element's id. The store's refusal to create duplicate sibling
//! names is what makes a second `acquire` fail. Each record keeps the path
//! the element had when it was locked; reading a record whose path no
//! longer matches the element is an integrity violation.

use chrono::Utc;
use strata_store::{Mixin, NodeType, TreeSession};
use strata_types::{Actor, LockRecord, ObjectId, PropertyValue};
use tracing::{debug, info, warn};

use crate::error::{RepoResult, RepositoryError, StoreContext};
use crate::props;

#[derive(Clone, Debug)]
pub struct LockManager {
    registry: String,
}

impl LockManager {
    pub fn new(registry: impl Into<String>) -> Self {
        Self {
            registry: registry.into(),
        }
    }

    /// Name of the registry folder below the root.
    pub fn registry_name(&self) -> &str {
        &self.registry
    }

    /// The registry folder, if it exists.
    pub fn registry<T: TreeSession>(&self, session: &T) -> RepoResult<Option<ObjectId>> {
        let root = session.root().with_context(|| "open root".into())?;
        session
            .child(root, &self.registry)
            .with_context(|| format!("look up lock registry {}", self.registry))
    }

    /// Get or create the registry folder.
    pub fn ensure_registry<T: TreeSession>(&self, session: &mut T) -> RepoResult<ObjectId> {
        if let Some(id) = self.registry(session)? {
            return Ok(id);
        }
        let root = session.root().with_context(|| "open root".into())?;
        let id = session
            .add_child(root, &self.registry, NodeType::Folder)
            .with_context(|| format!("create lock registry {}", self.registry))?;
        session
            .add_mixin(id, Mixin::Referenceable)
            .with_context(|| format!("create lock registry {}", self.registry))?;
        info!(registry = %self.registry, "created lock registry");
        Ok(id)
    }

    /// Check that an existing registry holds nothing but lock records.
    ///
    /// A registry name that collides with a user folder would otherwise hide
    /// that folder from the directory tree.
    pub fn verify_registry<T: TreeSession>(&self, session: &T) -> RepoResult<()> {
        let Some(id) = self.registry(session)? else {
            return Ok(());
        };
        let foreign = |what: String| {
            RepositoryError::Config(format!(
                "lock_registry {:?} names an existing {what}",
                self.registry
            ))
        };
        let info = session
            .node(id)
            .with_context(|| format!("read lock registry {}", self.registry))?;
        if info.node_type != NodeType::Folder {
            return Err(foreign(format!("{} node", info.node_type)));
        }
        for child in session
            .children(id)
            .with_context(|| format!("list lock registry {}", self.registry))?
        {
            let child = session
                .node(child)
                .with_context(|| format!("read lock registry {}", self.registry))?;
            if child.node_type != NodeType::Lock {
                warn!(registry = %self.registry, child = %child.name, "registry holds foreign node");
                return Err(foreign(format!("folder holding {}", child.name)));
            }
        }
        Ok(())
    }

    /// Lock `object` on behalf of `holder`.
    pub fn acquire<T: TreeSession>(
        &self,
        session: &mut T,
        object: ObjectId,
        holder: &Actor,
        message: &str,
    ) -> RepoResult<LockRecord> {
        let path = session
            .path(object)
            .with_context(|| format!("resolve {object} for locking"))?;
        if let Some(existing) = self.status(session, object)? {
            return Err(RepositoryError::locked_by(&existing));
        }

        let registry = self.ensure_registry(session)?;
        let record = LockRecord {
            object_id: object,
            login: holder.login.clone(),
            display_name: holder.display_name.clone(),
            message: message.to_string(),
            locked_at: Utc::now(),
            path,
        };
        let lock = session
            .add_child(registry, &object.to_string(), NodeType::Lock)
            .with_context(|| format!("lock {}", record.path))?;
        let fields = [
            (props::LOCK_OBJECT, PropertyValue::Reference(object)),
            (props::LOCK_LOGIN, PropertyValue::from(record.login.as_str())),
            (
                props::LOCK_DISPLAY_NAME,
                PropertyValue::from(record.display_name.as_str()),
            ),
            (props::LOCK_MESSAGE, PropertyValue::from(record.message.as_str())),
            (props::LOCK_DATE, PropertyValue::Date(record.locked_at)),
            (props::LOCK_PATH, PropertyValue::from(record.path.as_str())),
        ];
        for (key, value) in fields {
            session
                .set_property(lock, key, value)
                .with_context(|| format!("write lock record for {}", record.path))?;
        }
        info!(id = %object, path = %record.path, login = %record.login, "acquired lock");
        Ok(record)
    }

    /// Remove the lock on `object`. Returns `false` if there was none.
    pub fn release<T: TreeSession>(&self, session: &mut T, object: ObjectId) -> RepoResult<bool> {
        let Some(lock) = self.record_node(session, object)? else {
            return Ok(false);
        };
        session
            .remove(lock)
            .with_context(|| format!("release lock on {object}"))?;
        info!(id = %object, "released lock");
        Ok(true)
    }

    /// Current lock on `object`, verified against the object's live path.
    pub fn status<T: TreeSession>(
        &self,
        session: &T,
        object: ObjectId,
    ) -> RepoResult<Option<LockRecord>> {
        let Some(lock) = self.record_node(session, object)? else {
            return Ok(None);
        };
        let record = read_record(session, lock, object)?;

        let live = session
            .resolve(object)
            .with_context(|| format!("resolve locked object {object}"))?;
        if live.is_none() {
            warn!(id = %object, path = %record.path, "lock on missing object");
            return Err(RepositoryError::IntegrityViolation(format!(
                "lock {} refers to missing object {object}",
                record.path
            )));
        }
        let live_path = session
            .path(object)
            .with_context(|| format!("resolve locked object {object}"))?;
        if live_path != record.path {
            warn!(id = %object, locked = %record.path, live = %live_path, "lock path mismatch");
            return Err(RepositoryError::IntegrityViolation(format!(
                "lock on {object} was taken at {} but the object is at {live_path}",
                record.path
            )));
        }
        Ok(Some(record))
    }

    /// Gate an edit of `object` by `actor`.
    ///
    /// A lock held by someone else blocks the edit; the actor's own lock is
    /// released.
    pub fn check_for_edit<T: TreeSession>(
        &self,
        session: &mut T,
        object: ObjectId,
        actor: &Actor,
    ) -> RepoResult<()> {
        match self.status(session, object)? {
            Some(lock) if !lock.is_held_by(&actor.login) => {
                debug!(id = %object, holder = %lock.login, login = %actor.login, "edit blocked by lock");
                Err(RepositoryError::locked_by(&lock))
            }
            Some(_) => {
                self.release(session, object)?;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn record_node<T: TreeSession>(
        &self,
        session: &T,
        object: ObjectId,
    ) -> RepoResult<Option<ObjectId>> {
        let Some(registry) = self.registry(session)? else {
            return Ok(None);
        };
        session
            .child(registry, &object.to_string())
            .with_context(|| format!("look up lock on {object}"))
    }
}

fn read_record<T: TreeSession>(
    session: &T,
    lock: ObjectId,
    object: ObjectId,
) -> RepoResult<LockRecord> {
    let field = |key: &str| -> RepoResult<PropertyValue> {
        session
            .property(lock, key)
            .with_context(|| format!("read lock on {object}"))?
            .ok_or_else(|| {
                RepositoryError::IntegrityViolation(format!("lock on {object} has no {key}"))
            })
    };
    let malformed =
        |e: strata_types::TypeError| RepositoryError::IntegrityViolation(format!("lock on {object}: {e}"));

    let locked = field(props::LOCK_OBJECT)?.as_reference().map_err(malformed)?;
    if locked != object {
        return Err(RepositoryError::IntegrityViolation(format!(
            "lock named {object} refers to {locked}"
        )));
    }
    Ok(LockRecord {
        object_id: locked,
        login: field(props::LOCK_LOGIN)?.as_string().map_err(malformed)?,
        display_name: field(props::LOCK_DISPLAY_NAME)?
            .as_string()
            .map_err(malformed)?,
        message: field(props::LOCK_MESSAGE)?.as_string().map_err(malformed)?,
        locked_at: field(props::LOCK_DATE)?.as_date().map_err(malformed)?,
        path: field(props::LOCK_PATH)?.as_string().map_err(malformed)?,
    })
}
