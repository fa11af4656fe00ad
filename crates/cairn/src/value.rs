//! Runtime values held by documents.
//!
//! JSON only knows strings, numbers, booleans, arrays and objects. Documents
//! additionally carry typed values (dates and object identities) that are
//! rehydrated from their serialized string form whenever a schema declares
//! them. `FieldValue` is that richer representation.

use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer, ser::SerializeMap as _, ser::SerializeSeq as _};
use serde_json::{Number, Value};

use crate::ObjectId;

/// The field map of a document or of an embedded object, in insertion order.
pub type Fields = IndexMap<String, FieldValue>;

/// A single value stored in a document field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Explicit JSON `null`; treated as an absent value by schema checks
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    /// A timestamp, serialized as RFC 3339
    Date(DateTime<Utc>),
    /// A document identity, serialized as its string value
    ObjectId(ObjectId),
    Array(Vec<FieldValue>),
    /// A nested object, including documents embedded by `populate`
    Embedded(Fields),
}

impl FieldValue {
    /// Converts a JSON value without any schema knowledge.
    ///
    /// Strings stay strings; typed coercion happens later against the schema.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n),
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::Array(items.into_iter().map(Self::from_json).collect()),
            Value::Object(map) => {
                Self::Embedded(
                    map.into_iter()
                        .map(|(k, v)| (k, Self::from_json(v)))
                        .collect(),
                )
            },
        }
    }

    /// Renders the value in its serialized JSON shape.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Number(n) => Value::Number(n.clone()),
            Self::String(s) => Value::String(s.clone()),
            Self::Date(d) => Value::String(format_date(d)),
            Self::ObjectId(id) => Value::String(id.to_string()),
            Self::Array(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Embedded(fields) => {
                Value::Object(
                    fields
                        .iter()
                        .map(|(k, v)| (k.clone(), v.to_json()))
                        .collect(),
                )
            },
        }
    }

    /// Short name of the runtime type, used in schema violation messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Date(_) => "date",
            Self::ObjectId(_) => "objectid",
            Self::Array(_) => "array",
            Self::Embedded(_) => "embedded",
        }
    }

    pub fn is_null(&self) -> bool { matches!(self, Self::Null) }

    /// Equality as used by filters.
    ///
    /// Numbers compare by value, so `1` equals `1.0`; arrays and embedded
    /// objects compare element by element with the same rule.
    pub fn value_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => numbers_eq(a, b),
            (Self::Array(a), Self::Array(b)) => a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.value_eq(y)),
            (Self::Embedded(a), Self::Embedded(b)) => {
                a.len() == b.len() &&
                    a.iter()
                        .all(|(key, x)| b.get(key).is_some_and(|y| x.value_eq(y)))
            },
            _ => self == other,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<&DateTime<Utc>> {
        match self {
            Self::Date(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_object_id(&self) -> Option<&ObjectId> {
        match self {
            Self::ObjectId(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_embedded(&self) -> Option<&Fields> {
        match self {
            Self::Embedded(fields) => Some(fields),
            _ => None,
        }
    }
}

fn numbers_eq(a: &Number, b: &Number) -> bool {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x == y;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Formats a date the way it is written to collection files.
pub(crate) fn format_date(date: &DateTime<Utc>) -> String { date.to_rfc3339_opts(SecondsFormat::AutoSi, true) }

/// Parses a date from its serialized RFC 3339 form.
pub(crate) fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

impl Serialize for FieldValue {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Number(n) => n.serialize(serializer),
            Self::String(s) => serializer.serialize_str(s),
            Self::Date(d) => serializer.serialize_str(&format_date(d)),
            Self::ObjectId(id) => id.serialize(serializer),
            Self::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            },
            Self::Embedded(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (key, value) in fields {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            },
        }
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(Self::from_json)
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self { Self::from_json(value) }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self { Self::String(value.to_owned()) }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self { Self::String(value) }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self { Self::Bool(value) }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self { Self::Number(Number::from(value)) }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self { Self::Number(Number::from(value)) }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self { Self::Number(Number::from(value)) }
}

impl From<f64> for FieldValue {
    /// Non-finite floats have no JSON representation and become `Null`.
    fn from(value: f64) -> Self { Number::from_f64(value).map_or(Self::Null, Self::Number) }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self { Self::Date(value) }
}

impl From<ObjectId> for FieldValue {
    fn from(value: ObjectId) -> Self { Self::ObjectId(value) }
}

impl From<&ObjectId> for FieldValue {
    fn from(value: &ObjectId) -> Self { Self::ObjectId(value.clone()) }
}

impl From<Fields> for FieldValue {
    fn from(value: Fields) -> Self { Self::Embedded(value) }
}

impl From<Vec<FieldValue>> for FieldValue {
    fn from(value: Vec<FieldValue>) -> Self { Self::Array(value) }
}

impl<T> From<Option<T>> for FieldValue
where
    T: Into<FieldValue>,
{
    fn from(value: Option<T>) -> Self { value.map_or(Self::Null, Into::into) }
}
