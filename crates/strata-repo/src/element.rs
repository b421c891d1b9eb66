use chrono::{DateTime, Utc};
use strata_store::FrozenNode;
use strata_types::{ElementKind, ObjectId, ObjectVersion, PropertyValue};

use crate::attributes::AttributeMap;
use crate::error::{RepoResult, RepositoryError};
use crate::path;
use crate::props;

/// Persisted content of an element.
#[derive(Clone, Debug, PartialEq)]
pub enum ElementPayload {
    /// The whole element serialized into one opaque document.
    Xml(String),
    /// Attributes on the element node plus one child node per sub-object.
    Structured {
        attributes: AttributeMap,
        parts: Vec<SubObject>,
    },
}

impl ElementPayload {
    /// A structured payload without sub-objects.
    pub fn attributes(attributes: AttributeMap) -> Self {
        Self::Structured {
            attributes,
            parts: Vec::new(),
        }
    }

    pub fn is_xml(&self) -> bool {
        matches!(self, Self::Xml(_))
    }
}

/// A step or job entry stored below its owning element.
#[derive(Clone, Debug, PartialEq)]
pub struct SubObject {
    pub name: String,
    pub kind: ElementKind,
    pub attributes: AttributeMap,
}

impl SubObject {
    pub fn new(name: impl Into<String>, kind: ElementKind, attributes: AttributeMap) -> Self {
        Self {
            name: name.into(),
            kind,
            attributes,
        }
    }

    pub fn node_name(&self) -> String {
        path::node_name(&self.name, &self.kind)
    }
}

/// A versioned artifact: pipeline, job, connection, or schema.
///
/// Identity is the directory, name, and kind. `id` and `version` are filled
/// in by the repository on save and load.
#[derive(Clone, Debug, PartialEq)]
pub struct RepositoryElement {
    pub name: String,
    pub directory: String,
    pub kind: ElementKind,
    pub description: String,
    pub id: Option<ObjectId>,
    pub version: Option<ObjectVersion>,
    pub deleted: bool,
    pub payload: ElementPayload,
}

impl RepositoryElement {
    pub fn new(
        name: impl Into<String>,
        directory: impl Into<String>,
        kind: ElementKind,
        payload: ElementPayload,
    ) -> Self {
        Self {
            name: name.into(),
            directory: path::normalize_directory(&directory.into()),
            kind,
            description: String::new(),
            id: None,
            version: None,
            deleted: false,
            payload,
        }
    }

    pub fn xml(
        name: impl Into<String>,
        directory: impl Into<String>,
        kind: ElementKind,
        document: impl Into<String>,
    ) -> Self {
        Self::new(name, directory, kind, ElementPayload::Xml(document.into()))
    }

    pub fn structured(
        name: impl Into<String>,
        directory: impl Into<String>,
        kind: ElementKind,
        attributes: AttributeMap,
        parts: Vec<SubObject>,
    ) -> Self {
        Self::new(
            name,
            directory,
            kind,
            ElementPayload::Structured { attributes, parts },
        )
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn node_name(&self) -> String {
        path::node_name(&self.name, &self.kind)
    }

    /// Canonical node path of this element.
    pub fn path(&self) -> String {
        path::resolve_path(&self.directory, &self.name, &self.kind)
    }
}

/// One row of an element listing.
#[derive(Clone, Debug, PartialEq)]
pub struct RepositoryObject {
    pub id: ObjectId,
    pub name: String,
    pub kind: ElementKind,
    /// Author of the latest version.
    pub author: String,
    /// Creation time of the latest version.
    pub created: DateTime<Utc>,
    /// Element description annotated with the latest version label.
    pub description: String,
    /// Comment of the latest version.
    pub comment: String,
    pub deleted: bool,
}

/// A recorded "uses" link from one element to another.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElementRelation {
    pub id: ObjectId,
    pub parent: ObjectId,
    pub child: ObjectId,
    pub description: String,
}

/// Text of a reserved property, empty if unset.
pub(crate) fn frozen_text(frozen: &FrozenNode, key: &str) -> String {
    frozen
        .property(key)
        .and_then(|v| v.as_string().ok())
        .unwrap_or_default()
}

/// Rebuild a payload from a frozen element node.
pub(crate) fn read_payload(frozen: &FrozenNode) -> RepoResult<ElementPayload> {
    if let Some(value) = frozen.property(props::PAYLOAD) {
        let PropertyValue::String(document) = value else {
            return Err(RepositoryError::MalformedPayload(format!(
                "{}: payload is a {}",
                frozen.name,
                value.type_name()
            )));
        };
        return Ok(ElementPayload::Xml(document.clone()));
    }

    let attributes = AttributeMap::from_properties(&frozen.properties)?;
    let parts = frozen
        .children
        .iter()
        .map(read_part)
        .collect::<RepoResult<Vec<_>>>()?;
    Ok(ElementPayload::Structured { attributes, parts })
}

fn read_part(frozen: &FrozenNode) -> RepoResult<SubObject> {
    let tag = frozen_text(frozen, props::KIND);
    let kind = ElementKind::from_tag(&tag).map_err(|e| {
        RepositoryError::MalformedPayload(format!("sub-object {}: {e}", frozen.name))
    })?;
    let name = match frozen_text(frozen, props::NAME) {
        name if !name.is_empty() => name,
        _ => path::split_object_name(&frozen.name, &kind)
            .unwrap_or(&frozen.name)
            .to_string(),
    };
    Ok(SubObject {
        name,
        kind,
        attributes: AttributeMap::from_properties(&frozen.properties)?,
    })
}
