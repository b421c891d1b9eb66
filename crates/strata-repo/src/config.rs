use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strata_store::InMemoryTreeStore;
use strata_types::Actor;

use crate::error::{RepoResult, RepositoryError, StoreContext};
use crate::path::validate_name;

/// Default name of the lock registry folder.
pub const DEFAULT_LOCK_REGISTRY: &str = "__LOCKS__";

/// Repository settings.
///
/// Every field has a default, so a TOML file only needs the keys it changes:
///
/// ```toml
/// lock_registry = "__LOCKS__"
/// snapshot_path = "/var/lib/strata/tree.json"
/// delete_comment = "deleted"
/// undelete_comment = "undeleted"
///
/// [actor]
/// login = "etl"
/// display_name = "ETL service"
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    pub lock_registry: String,
    /// JSON file backing the in-memory store; unset keeps it memory-only.
    pub snapshot_path: Option<PathBuf>,
    pub actor: Actor,
    pub delete_comment: String,
    pub undelete_comment: String,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            lock_registry: DEFAULT_LOCK_REGISTRY.to_string(),
            snapshot_path: None,
            actor: Actor::with_login("anonymous"),
            delete_comment: "deleted".to_string(),
            undelete_comment: "undeleted".to_string(),
        }
    }
}

impl RepositoryConfig {
    pub fn from_toml_str(text: &str) -> RepoResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| RepositoryError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> RepoResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| RepositoryError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> RepoResult<()> {
        validate_name(&self.lock_registry)
            .map_err(|e| RepositoryError::Config(format!("lock_registry: {e}")))?;
        if self.actor.login.is_empty() {
            return Err(RepositoryError::Config("actor.login must not be empty".into()));
        }
        Ok(())
    }

    /// Open the in-memory store these settings describe.
    pub fn open_store(&self) -> RepoResult<InMemoryTreeStore> {
        match &self.snapshot_path {
            Some(path) => InMemoryTreeStore::open(path)
                .with_context(|| format!("open snapshot {}", path.display())),
            None => Ok(InMemoryTreeStore::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = RepositoryConfig::default();
        assert_eq!(c.lock_registry, "__LOCKS__");
        assert!(c.snapshot_path.is_none());
        assert_eq!(c.actor.login, "anonymous");
        assert_eq!(c.delete_comment, "deleted");
        assert_eq!(c.undelete_comment, "undeleted");
        assert!(c.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c = RepositoryConfig::from_toml_str(
            r#"
            lock_registry = "LOCKS"

            [actor]
            login = "etl"
            display_name = "ETL service"
            "#,
        )
        .unwrap();
        assert_eq!(c.lock_registry, "LOCKS");
        assert_eq!(c.actor, Actor::new("etl", "ETL service"));
        assert_eq!(c.delete_comment, "deleted");
    }

    #[test]
    fn invalid_registry_rejected() {
        let err = RepositoryConfig::from_toml_str(r#"lock_registry = "a/b""#).unwrap_err();
        assert!(matches!(err, RepositoryError::Config(_)));
    }

    #[test]
    fn unparsable_toml_rejected() {
        let err = RepositoryConfig::from_toml_str("lock_registry = ").unwrap_err();
        assert!(matches!(err, RepositoryError::Config(_)));
    }

    #[test]
    fn load_from_file_and_open_store() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = dir.path().join("tree.json");
        let file = dir.path().join("strata.toml");
        fs::write(
            &file,
            format!("snapshot_path = {:?}\n", snapshot.display().to_string()),
        )
        .unwrap();

        let c = RepositoryConfig::load(&file).unwrap();
        assert_eq!(c.snapshot_path.as_deref(), Some(snapshot.as_path()));
        let store = c.open_store().unwrap();
        assert_eq!(store.snapshot_path(), Some(snapshot.as_path()));
        assert!(snapshot.exists());
    }

    #[test]
    fn missing_file_is_config_error() {
        assert!(matches!(
            RepositoryConfig::load("/definitely/not/here.toml"),
            Err(RepositoryError::Config(_))
        ));
    }
}
