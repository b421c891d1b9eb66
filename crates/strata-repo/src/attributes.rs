//! Typed attributes on repository nodes.
//!
//! Attributes are plain node properties keyed by a caller-chosen code.
//! Repeated attributes append an index to the code behind the separator
//! `_#_`, so `field_#_0`, `field_#_1`, ... form one indexed attribute. The
//! repository's own bookkeeping lives under names containing `:`, which codes
//! may therefore not use.

use std::collections::BTreeMap;
use std::fmt;

use strata_store::TreeSession;
use strata_types::{ObjectId, PropertyValue, TypeError};
use tracing::warn;

use crate::error::{RepoResult, RepositoryError, StoreContext};
use crate::props;

/// Separator between an attribute code and its index.
pub const INDEX_SEPARATOR: &str = "_#_";

/// Check that `code` can be used as an attribute code.
pub fn validate_code(code: &str) -> RepoResult<()> {
    let invalid = |reason: &str| RepositoryError::InvalidAttributeCode {
        code: code.to_string(),
        reason: reason.to_string(),
    };
    if code.is_empty() {
        return Err(invalid("code must not be empty"));
    }
    if code.contains(INDEX_SEPARATOR) {
        return Err(invalid("code must not contain the index separator"));
    }
    if props::is_reserved(code) {
        return Err(invalid("':' is reserved for repository properties"));
    }
    Ok(())
}

/// Property name of one entry of an indexed attribute.
pub fn indexed_key(code: &str, index: usize) -> String {
    format!("{code}{INDEX_SEPARATOR}{index}")
}

/// Address of one attribute: a code, plus an index for repeated attributes.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttributeKey {
    pub code: String,
    pub index: Option<usize>,
}

impl AttributeKey {
    pub fn scalar(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            index: None,
        }
    }

    pub fn indexed(code: impl Into<String>, index: usize) -> Self {
        Self {
            code: code.into(),
            index: Some(index),
        }
    }

    /// The node property this key is stored under.
    pub fn property_name(&self) -> String {
        match self.index {
            Some(index) => indexed_key(&self.code, index),
            None => self.code.clone(),
        }
    }

    /// Parse a property name back into a key.
    ///
    /// Returns `Ok(None)` for reserved repository properties.
    pub fn parse(property: &str) -> RepoResult<Option<Self>> {
        if props::is_reserved(property) {
            return Ok(None);
        }
        match property.split_once(INDEX_SEPARATOR) {
            None => Ok(Some(Self::scalar(property))),
            Some((code, index)) => {
                let index = index.parse().map_err(|_| {
                    RepositoryError::MalformedPayload(format!(
                        "attribute {property:?} has a non-numeric index"
                    ))
                })?;
                Ok(Some(Self::indexed(code, index)))
            }
        }
    }
}

impl fmt::Display for AttributeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(index) => write!(f, "{}[{index}]", self.code),
            None => write!(f, "{}", self.code),
        }
    }
}

/// A typed attribute bag, read from and written to a single node.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AttributeMap {
    entries: BTreeMap<AttributeKey, PropertyValue>,
}

impl AttributeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a scalar attribute.
    pub fn insert(&mut self, code: &str, value: impl Into<PropertyValue>) -> RepoResult<()> {
        validate_code(code)?;
        self.entries.insert(AttributeKey::scalar(code), value.into());
        Ok(())
    }

    /// Set one entry of an indexed attribute.
    pub fn insert_indexed(
        &mut self,
        code: &str,
        index: usize,
        value: impl Into<PropertyValue>,
    ) -> RepoResult<()> {
        validate_code(code)?;
        self.entries
            .insert(AttributeKey::indexed(code, index), value.into());
        Ok(())
    }

    pub fn get(&self, code: &str) -> Option<&PropertyValue> {
        self.entries.get(&AttributeKey::scalar(code))
    }

    pub fn get_indexed(&self, code: &str, index: usize) -> Option<&PropertyValue> {
        self.entries.get(&AttributeKey::indexed(code, index))
    }

    /// Number of entries (scalar or indexed) sharing `code`.
    pub fn count(&self, code: &str) -> usize {
        self.entries.keys().filter(|k| k.code == code).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AttributeKey, &PropertyValue)> {
        self.entries.iter()
    }

    /// Build a map from raw node properties, skipping reserved ones.
    pub fn from_properties<'a>(
        properties: impl IntoIterator<Item = (&'a String, &'a PropertyValue)>,
    ) -> RepoResult<Self> {
        let mut entries = BTreeMap::new();
        for (name, value) in properties {
            if let Some(key) = AttributeKey::parse(name)? {
                entries.insert(key, value.clone());
            }
        }
        Ok(Self { entries })
    }

    /// Replace all attributes of `node` with this map.
    pub fn write_to<T: TreeSession>(&self, session: &mut T, node: ObjectId) -> RepoResult<()> {
        let existing = session
            .properties(node)
            .with_context(|| format!("read attributes of {node}"))?;
        for (name, _) in existing {
            if props::is_reserved(&name) {
                continue;
            }
            session
                .remove_property(node, &name)
                .with_context(|| format!("clear attribute {name} of {node}"))?;
        }
        for (key, value) in &self.entries {
            let name = key.property_name();
            session
                .set_property(node, &name, value.clone())
                .with_context(|| format!("write attribute {name} of {node}"))?;
        }
        Ok(())
    }

    /// Read all attributes of `node`.
    pub fn read_from<T: TreeSession>(session: &T, node: ObjectId) -> RepoResult<Self> {
        let properties = session
            .properties(node)
            .with_context(|| format!("read attributes of {node}"))?;
        Self::from_properties(properties.iter().map(|(k, v)| (k, v)))
    }
}

/// Per-node typed key/value access.
///
/// All getters treat an unset attribute as absent rather than as an error.
#[derive(Clone, Copy, Debug, Default)]
pub struct AttributeStore;

impl AttributeStore {
    /// Set a scalar attribute.
    pub fn set<T: TreeSession>(
        &self,
        session: &mut T,
        node: ObjectId,
        code: &str,
        value: impl Into<PropertyValue>,
    ) -> RepoResult<()> {
        validate_code(code)?;
        session
            .set_property(node, code, value.into())
            .with_context(|| format!("set attribute {code} on {node}"))
    }

    /// Set one entry of an indexed attribute.
    pub fn set_indexed<T: TreeSession>(
        &self,
        session: &mut T,
        node: ObjectId,
        code: &str,
        index: usize,
        value: impl Into<PropertyValue>,
    ) -> RepoResult<()> {
        validate_code(code)?;
        let key = indexed_key(code, index);
        session
            .set_property(node, &key, value.into())
            .with_context(|| format!("set attribute {key} on {node}"))
    }

    /// Raw value of a scalar attribute.
    pub fn get<T: TreeSession>(
        &self,
        session: &T,
        node: ObjectId,
        code: &str,
    ) -> RepoResult<Option<PropertyValue>> {
        validate_code(code)?;
        session
            .property(node, code)
            .with_context(|| format!("get attribute {code} on {node}"))
    }

    /// Raw value of one entry of an indexed attribute.
    pub fn get_indexed<T: TreeSession>(
        &self,
        session: &T,
        node: ObjectId,
        code: &str,
        index: usize,
    ) -> RepoResult<Option<PropertyValue>> {
        validate_code(code)?;
        let key = indexed_key(code, index);
        session
            .property(node, &key)
            .with_context(|| format!("get attribute {key} on {node}"))
    }

    pub fn get_bool_or<T: TreeSession>(
        &self,
        session: &T,
        node: ObjectId,
        code: &str,
        default: bool,
    ) -> RepoResult<bool> {
        self.typed(session, node, code, default, PropertyValue::as_bool)
    }

    pub fn get_integer_or<T: TreeSession>(
        &self,
        session: &T,
        node: ObjectId,
        code: &str,
        default: i64,
    ) -> RepoResult<i64> {
        self.typed(session, node, code, default, PropertyValue::as_integer)
    }

    pub fn get_number_or<T: TreeSession>(
        &self,
        session: &T,
        node: ObjectId,
        code: &str,
        default: f64,
    ) -> RepoResult<f64> {
        self.typed(session, node, code, default, PropertyValue::as_number)
    }

    pub fn get_string<T: TreeSession>(
        &self,
        session: &T,
        node: ObjectId,
        code: &str,
    ) -> RepoResult<Option<String>> {
        match self.get(session, node, code)? {
            Some(value) => value
                .as_string()
                .map(Some)
                .map_err(|e| mismatch(node, code, e)),
            None => Ok(None),
        }
    }

    /// Store a live reference from `node` to `target`.
    pub fn set_reference<T: TreeSession>(
        &self,
        session: &mut T,
        node: ObjectId,
        code: &str,
        target: ObjectId,
    ) -> RepoResult<()> {
        self.set(session, node, code, PropertyValue::Reference(target))
    }

    /// Follow a reference attribute to its live target.
    ///
    /// A reference whose target no longer exists is an integrity violation.
    pub fn get_reference<T: TreeSession>(
        &self,
        session: &T,
        node: ObjectId,
        code: &str,
    ) -> RepoResult<Option<ObjectId>> {
        let Some(value) = self.get(session, node, code)? else {
            return Ok(None);
        };
        let target = value.as_reference().map_err(|e| mismatch(node, code, e))?;
        let live = session
            .resolve(target)
            .with_context(|| format!("resolve reference {code} on {node}"))?;
        if live.is_none() {
            warn!(%node, code, %target, "dangling reference");
            return Err(RepositoryError::IntegrityViolation(format!(
                "attribute {code} on {node} references missing node {target}"
            )));
        }
        Ok(Some(target))
    }

    /// Number of properties stored under `code`, scalar or indexed.
    pub fn count<T: TreeSession>(&self, session: &T, node: ObjectId, code: &str) -> RepoResult<usize> {
        validate_code(code)?;
        let prefix = format!("{code}{INDEX_SEPARATOR}");
        let properties = session
            .properties(node)
            .with_context(|| format!("count attribute {code} on {node}"))?;
        Ok(properties
            .iter()
            .filter(|(name, _)| name == code || name.starts_with(&prefix))
            .count())
    }

    /// Remove a scalar attribute. Returns `true` if it was set.
    pub fn remove<T: TreeSession>(
        &self,
        session: &mut T,
        node: ObjectId,
        code: &str,
    ) -> RepoResult<bool> {
        validate_code(code)?;
        session
            .remove_property(node, code)
            .with_context(|| format!("remove attribute {code} on {node}"))
    }

    fn typed<T: TreeSession, V>(
        &self,
        session: &T,
        node: ObjectId,
        code: &str,
        default: V,
        convert: fn(&PropertyValue) -> Result<V, TypeError>,
    ) -> RepoResult<V> {
        match self.get(session, node, code)? {
            Some(value) => convert(&value).map_err(|e| mismatch(node, code, e)),
            None => Ok(default),
        }
    }
}

fn mismatch(node: ObjectId, code: &str, err: TypeError) -> RepositoryError {
    RepositoryError::MalformedPayload(format!("attribute {code} on {node}: {err}"))
}
