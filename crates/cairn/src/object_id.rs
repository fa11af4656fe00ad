use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use serde_json::Value;
use tracing::trace;

use crate::{CairnError, Result};

/// Opaque, string-backed identity of a document.
///
/// Two identities are equal iff their string values are equal. An `ObjectId`
/// never holds an empty or blank string. On disk it is written as a bare JSON
/// string; the structured `{ "value": "..." }` form is accepted when reading.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(String);

impl ObjectId {
    /// Builds an identity from a raw string.
    ///
    /// # Errors
    ///
    /// Returns `CairnError::Validation` if `value` is empty or blank after trimming.
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(CairnError::validation("object id value is empty or blank"));
        }
        Ok(Self(value))
    }

    /// Builds an identity from a JSON value: either a string or an object
    /// carrying a string `value` field.
    ///
    /// # Errors
    ///
    /// Returns `CairnError::Validation` when the payload is neither form, when
    /// the structured `value` is not a string, or when the string is blank.
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::String(s) => Self::new(s.as_str()),
            Value::Object(map) => {
                match map.get("value") {
                    Some(Value::String(s)) => Self::new(s.as_str()),
                    Some(other) => Err(CairnError::validation(format!("{} is not a string", other))),
                    None => Err(CairnError::validation("object id payload has no 'value' field")),
                }
            },
            other => Err(CairnError::validation(format!("{} is not a plain object", other))),
        }
    }

    /// Generates a fresh collision-resistant identity.
    pub fn generate() -> Self {
        let id = cuid2::create_id();
        trace!("Generated object id {}", id);
        Self(id)
    }

    /// Returns the underlying string.
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl std::str::FromStr for ObjectId {
    type Err = CairnError;

    fn from_str(s: &str) -> Result<Self> { Self::new(s) }
}

impl TryFrom<&str> for ObjectId {
    type Error = CairnError;

    fn try_from(value: &str) -> Result<Self> { Self::new(value) }
}

impl TryFrom<String> for ObjectId {
    type Error = CairnError;

    fn try_from(value: String) -> Result<Self> { Self::new(value) }
}

impl PartialEq<str> for ObjectId {
    fn eq(&self, other: &str) -> bool { self.0 == other }
}

impl PartialEq<&str> for ObjectId {
    fn eq(&self, other: &&str) -> bool { self.0 == *other }
}

impl Serialize for ObjectId {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value).map_err(de::Error::custom)
    }
}
