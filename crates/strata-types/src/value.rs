use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::object::ObjectId;

/// A typed value held by a node property.
///
/// `Reference` is a live link to another node: it stores the target's
/// [`ObjectId`] and is dereferenced against the store on every read, so it
/// always names the current node rather than a copy of its data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    Boolean(bool),
    Integer(i64),
    Number(f64),
    String(String),
    Date(DateTime<Utc>),
    Reference(ObjectId),
}

impl PropertyValue {
    /// Name of the value's type, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Boolean(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Date(_) => "date",
            Self::Reference(_) => "reference",
        }
    }

    pub fn as_bool(&self) -> Result<bool, TypeError> {
        match self {
            Self::Boolean(b) => Ok(*b),
            other => Err(other.mismatch("boolean")),
        }
    }

    /// Integer view. A number converts only if it is integral and in range.
    pub fn as_integer(&self) -> Result<i64, TypeError> {
        // 2^63; `i64::MAX as f64` rounds up to it.
        const LIMIT: f64 = 9_223_372_036_854_775_808.0;
        match self {
            Self::Integer(i) => Ok(*i),
            Self::Number(n) if n.fract() == 0.0 && *n >= -LIMIT && *n < LIMIT => Ok(*n as i64),
            other => Err(other.mismatch("integer")),
        }
    }

    /// Floating point view. Integers are widened.
    pub fn as_number(&self) -> Result<f64, TypeError> {
        match self {
            Self::Number(n) => Ok(*n),
            Self::Integer(i) => Ok(*i as f64),
            other => Err(other.mismatch("number")),
        }
    }

    /// String view. Every value except a reference has a textual form.
    pub fn as_string(&self) -> Result<String, TypeError> {
        match self {
            Self::String(s) => Ok(s.clone()),
            Self::Boolean(b) => Ok(b.to_string()),
            Self::Integer(i) => Ok(i.to_string()),
            Self::Number(n) => Ok(n.to_string()),
            Self::Date(d) => Ok(d.to_rfc3339()),
            other => Err(other.mismatch("string")),
        }
    }

    pub fn as_date(&self) -> Result<DateTime<Utc>, TypeError> {
        match self {
            Self::Date(d) => Ok(*d),
            other => Err(other.mismatch("date")),
        }
    }

    pub fn as_reference(&self) -> Result<ObjectId, TypeError> {
        match self {
            Self::Reference(id) => Ok(*id),
            other => Err(other.mismatch("reference")),
        }
    }

    fn mismatch(&self, expected: &'static str) -> TypeError {
        TypeError::TypeMismatch {
            expected,
            found: self.type_name(),
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reference(id) => write!(f, "ref:{id}"),
            Self::String(s) => write!(f, "{s:?}"),
            other => match other.as_string() {
                Ok(s) => write!(f, "{s}"),
                Err(_) => write!(f, "<{}>", other.type_name()),
            },
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<DateTime<Utc>> for PropertyValue {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Date(v)
    }
}

impl From<ObjectId> for PropertyValue {
    fn from(v: ObjectId) -> Self {
        Self::Reference(v)
    }
}
