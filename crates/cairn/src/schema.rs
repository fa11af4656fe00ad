//! Declarative schemas describing the fields of a model.
//!
//! A [`Schema`] is an ordered set of [`FieldRule`]s. Schemas do no work when
//! they are built; rules are enforced lazily, each time a document is
//! constructed or a field is assigned through an [`Instance`](crate::Instance).

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{trace, warn};

use crate::{
    error::ViolationKind,
    value::{parse_date, Fields},
    CairnError,
    FieldValue,
    ObjectId,
    Result,
};

/// Closed set of type tags a field can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    /// RFC 3339 timestamp, rehydrated into a `DateTime<Utc>`
    Date,
    /// Identity of a document, usually paired with `ref`
    #[serde(alias = "object_id", alias = "ObjectId")]
    ObjectId,
    /// Nested JSON object
    Embedded,
}

impl FieldType {
    /// Returns `true` for the types JSON can carry natively.
    ///
    /// Non-primitive fields are reconstructed from their serialized form when a
    /// collection is loaded from disk.
    pub fn is_primitive(self) -> bool { matches!(self, Self::String | Self::Number | Self::Boolean) }

    /// Checks `value` against this tag, converting serialized forms of typed
    /// values (date strings, identity strings) into their typed variant.
    ///
    /// `Null` passes through untouched; callers decide whether absence is allowed.
    /// On mismatch the runtime type name of the rejected value is returned.
    pub(crate) fn coerce(self, value: FieldValue) -> std::result::Result<FieldValue, &'static str> {
        let found = value.type_name();
        match (self, value) {
            (_, FieldValue::Null) => Ok(FieldValue::Null),
            (Self::String, v @ FieldValue::String(_)) |
            (Self::Number, v @ FieldValue::Number(_)) |
            (Self::Boolean, v @ FieldValue::Bool(_)) |
            (Self::Date, v @ FieldValue::Date(_)) |
            (Self::ObjectId, v @ FieldValue::ObjectId(_)) |
            (Self::Embedded, v @ FieldValue::Embedded(_)) => Ok(v),
            (Self::Date, FieldValue::String(raw)) => parse_date(&raw).map(FieldValue::Date).ok_or(found),
            (Self::ObjectId, FieldValue::String(raw)) => {
                ObjectId::new(raw)
                    .map(FieldValue::ObjectId)
                    .map_err(|_| found)
            },
            (Self::ObjectId, FieldValue::Embedded(map)) => {
                // structured `{ "value": "..." }` form only
                match (map.len(), map.get("value")) {
                    (1, Some(FieldValue::String(raw))) => {
                        ObjectId::new(raw.as_str())
                            .map(FieldValue::ObjectId)
                            .map_err(|_| found)
                    },
                    _ => Err(found),
                }
            },
            _ => Err(found),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::ObjectId => "objectid",
            Self::Embedded => "embedded",
        };
        f.write_str(name)
    }
}

/// Rule for a single schema field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRule {
    /// Declared type tag
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Whether the field must hold a value once defaults are applied
    #[serde(default)]
    pub required:   bool,
    /// Value used when the field is absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default:    Option<FieldValue>,
    /// Name of the collection an identity field points into
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference:  Option<String>,
}

impl FieldRule {
    /// Creates an optional field of the given type with no default.
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            required: false,
            default: None,
            reference: None,
        }
    }

    pub fn string() -> Self { Self::new(FieldType::String) }

    pub fn number() -> Self { Self::new(FieldType::Number) }

    pub fn boolean() -> Self { Self::new(FieldType::Boolean) }

    pub fn date() -> Self { Self::new(FieldType::Date) }

    pub fn embedded() -> Self { Self::new(FieldType::Embedded) }

    /// An identity field referencing documents of the `target` collection.
    pub fn reference(target: impl Into<String>) -> Self {
        Self {
            reference: Some(target.into()),
            ..Self::new(FieldType::ObjectId)
        }
    }

    /// Marks the field as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets the value applied when the field is absent.
    pub fn default_value(mut self, value: impl Into<FieldValue>) -> Self {
        self.default = Some(value.into());
        self
    }
}

/// Ordered mapping of field names to rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    fields: Vec<(String, FieldRule)>,
}

impl Schema {
    /// Creates an empty schema. Add fields with [`Schema::field`].
    pub fn new() -> Self { Self::default() }

    /// Builds a schema from `(name, rule)` pairs, keeping their order.
    pub fn from_rules<I, K>(rules: I) -> Self
    where
        I: IntoIterator<Item = (K, FieldRule)>,
        K: Into<String>,
    {
        rules
            .into_iter()
            .fold(Self::new(), |schema, (name, rule)| schema.field(name, rule))
    }

    /// Parses a schema from a JSON object of rules, e.g.
    /// `{"username": {"type": "string", "required": true}}`.
    pub fn from_json(definition: &Value) -> Result<Self> {
        let map = definition.as_object().ok_or_else(|| {
            warn!("Schema definition is not a JSON object");
            CairnError::validation(format!("schema definition {} is not an object", definition))
        })?;
        let mut schema = Self::new();
        for (name, rule) in map {
            let rule: FieldRule = serde_json::from_value(rule.clone())?;
            schema = schema.field(name.as_str(), rule);
        }
        trace!("Parsed schema with {} fields", schema.len());
        Ok(schema)
    }

    /// Adds a field, replacing an existing rule of the same name in place.
    pub fn field(mut self, name: impl Into<String>, rule: FieldRule) -> Self {
        let name = name.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = rule,
            None => self.fields.push((name, rule)),
        }
        self
    }

    pub fn rule(&self, name: &str) -> Option<&FieldRule> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, rule)| rule)
    }

    /// Iterates over the declared fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldRule)> {
        self.fields.iter().map(|(n, rule)| (n.as_str(), rule))
    }

    pub fn len(&self) -> usize { self.fields.len() }

    pub fn is_empty(&self) -> bool { self.fields.is_empty() }

    /// Applies defaults, then enforces the required and type rules.
    ///
    /// Declared fields are coerced in place, so a date string becomes a
    /// `FieldValue::Date` and an identity string a `FieldValue::ObjectId`.
    pub(crate) fn prepare(&self, model: &str, fields: &mut Fields) -> Result<()> {
        for (name, rule) in &self.fields {
            let absent = fields.get(name).is_none_or(FieldValue::is_null);
            if absent && let Some(default) = &rule.default {
                trace!("Applying default for {}.{}", model, name);
                fields.insert(name.clone(), default.clone());
            }

            match fields.get_mut(name) {
                Some(slot) if !slot.is_null() => {
                    let typed = rule.field_type.coerce(slot.clone()).map_err(|found| {
                        violation(
                            model,
                            name,
                            ViolationKind::TypeMismatch {
                                expected: rule.field_type,
                                found,
                            },
                        )
                    })?;
                    *slot = typed;
                },
                _ => {
                    if rule.required {
                        return Err(violation(model, name, ViolationKind::Missing));
                    }
                },
            }
        }
        Ok(())
    }

    /// Checks a single assignment against the schema.
    pub(crate) fn check_assignment(&self, model: &str, name: &str, value: FieldValue) -> Result<FieldValue> {
        let rule = self
            .rule(name)
            .ok_or_else(|| violation(model, name, ViolationKind::Undeclared))?;
        if value.is_null() {
            if rule.required {
                return Err(violation(model, name, ViolationKind::Missing));
            }
            return Ok(value);
        }
        rule.field_type.coerce(value).map_err(|found| {
            violation(
                model,
                name,
                ViolationKind::TypeMismatch {
                    expected: rule.field_type,
                    found,
                },
            )
        })
    }

    /// Best-effort reconstruction of typed fields read back from disk.
    ///
    /// Values that no longer fit their declared type are kept as loaded.
    pub(crate) fn rehydrate(&self, model: &str, fields: &mut Fields) {
        for (name, rule) in &self.fields {
            if rule.field_type.is_primitive() {
                continue;
            }
            let Some(slot) = fields.get_mut(name)
            else {
                continue;
            };
            match rule.field_type.coerce(slot.clone()) {
                Ok(typed) => *slot = typed,
                Err(found) => {
                    warn!(
                        "Stored value of {}.{} is a {}, expected {}; keeping it as loaded",
                        model, name, found, rule.field_type
                    );
                },
            }
        }
    }
}

fn violation(model: &str, field: &str, kind: ViolationKind) -> CairnError {
    CairnError::SchemaViolation {
        model: model.to_owned(),
        field: field.to_owned(),
        kind,
    }
}
