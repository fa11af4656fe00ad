use serde_json::Value;
use tracing::trace;

use crate::{constants::ID_FIELD, CairnError, FieldValue, ObjectId, RawDocument, Result, Schema};

/// An exact-match filter over the documents of one collection.
///
/// A document matches when every condition holds. The identity condition
/// compares the string form of `_id`; field conditions compare by value, with
/// numbers equal when they denote the same quantity (`1` matches `1.0`). A
/// document that lacks a filtered field never matches. The empty filter
/// matches every document.
///
/// # Examples
///
/// ```rust
/// use cairn::Filter;
/// use serde_json::json;
///
/// let by_name = Filter::new().equals("username", "ana").equals("active", true);
/// assert_eq!(by_name.len(), 2);
///
/// let from_json = Filter::from_json(&json!({"_id": "abc", "username": "ana"})).unwrap();
/// assert_eq!(from_json.identity(), Some("abc"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    id:         Option<String>,
    conditions: Vec<(String, FieldValue)>,
}

impl Filter {
    pub fn new() -> Self { Self::default() }

    /// Restricts the filter to the document whose `_id` has this string form.
    pub fn with_id(mut self, id: impl ToString) -> Self {
        self.id = Some(id.to_string());
        self
    }

    /// Adds an equality condition. A later condition on the same field replaces
    /// the earlier one.
    pub fn equals(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        let field = field.into();
        if field == ID_FIELD {
            let value = value.into();
            self.id = Some(match value {
                FieldValue::String(raw) => raw,
                FieldValue::ObjectId(id) => id.as_str().to_owned(),
                other => other.to_json().to_string(),
            });
            return self;
        }
        let value = value.into();
        match self.conditions.iter_mut().find(|(name, _)| *name == field) {
            Some(slot) => slot.1 = value,
            None => self.conditions.push((field, value)),
        }
        self
    }

    /// Builds a filter from a JSON object of `field: value` pairs.
    ///
    /// # Errors
    ///
    /// Returns `CairnError::Validation` if `filter` is not an object.
    pub fn from_json(filter: &Value) -> Result<Self> {
        let Some(map) = filter.as_object()
        else {
            return Err(CairnError::validation(format!(
                "filter must be an object, got {}",
                filter
            )));
        };

        let mut result = Self::new();
        for (field, value) in map {
            if field == ID_FIELD {
                let id = match value {
                    Value::String(raw) => raw.clone(),
                    other => {
                        ObjectId::from_value(other)
                            .map(|id| id.as_str().to_owned())
                            .unwrap_or_else(|_| other.to_string())
                    },
                };
                result.id = Some(id);
            }
            else {
                result = result.equals(field.as_str(), FieldValue::from_json(value.clone()));
            }
        }
        Ok(result)
    }

    /// The identity condition, if any.
    pub fn identity(&self) -> Option<&str> { self.id.as_deref() }

    /// Number of conditions, the identity included.
    pub fn len(&self) -> usize { self.conditions.len() + usize::from(self.id.is_some()) }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Converts conditions on declared fields into the declared type, so a
    /// date or identity given as a string compares against the typed value.
    /// Values that do not convert are kept and simply never match.
    pub(crate) fn resolve(&self, schema: &Schema) -> Self {
        let conditions = self
            .conditions
            .iter()
            .map(|(field, value)| {
                let resolved = schema
                    .rule(field)
                    .and_then(|rule| rule.field_type.coerce(value.clone()).ok())
                    .unwrap_or_else(|| value.clone());
                (field.clone(), resolved)
            })
            .collect();
        trace!("Filter resolved against schema: {:?}", conditions);
        Self {
            id: self.id.clone(),
            conditions,
        }
    }

    /// Whether `document` satisfies every condition.
    pub(crate) fn matches(&self, document: &RawDocument) -> bool {
        if let Some(id) = &self.id &&
            document.id.as_str() != id
        {
            return false;
        }
        self.conditions
            .iter()
            .all(|(field, expected)| document.get(field).is_some_and(|actual| actual.value_eq(expected)))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{FieldRule, Fields};

    fn document(id: &str, fields: Value) -> RawDocument {
        let Value::Object(map) = fields
        else {
            panic!("fields must be an object");
        };
        let fields: Fields = map
            .into_iter()
            .map(|(k, v)| (k, FieldValue::from_json(v)))
            .collect();
        RawDocument::new(ObjectId::new(id).unwrap(), fields)
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter = Filter::new();
        assert!(filter.is_empty());
        assert!(filter.matches(&document("a", json!({}))));
        assert!(filter.matches(&document("b", json!({"x": 1}))));
    }

    #[test]
    fn test_identity_condition_compares_string_forms() {
        let filter = Filter::new().with_id("a");
        assert!(filter.matches(&document("a", json!({}))));
        assert!(!filter.matches(&document("b", json!({}))));

        let by_object_id = Filter::new().equals("_id", ObjectId::new("b").unwrap());
        assert_eq!(by_object_id.identity(), Some("b"));
        assert!(by_object_id.matches(&document("b", json!({}))));
    }

    #[test]
    fn test_missing_field_never_matches() {
        let filter = Filter::new().equals("username", "ana");
        assert!(!filter.matches(&document("a", json!({}))));
        assert!(!filter.matches(&document("a", json!({"username": null}))));
        assert!(filter.matches(&document("a", json!({"username": "ana"}))));
    }

    #[test]
    fn test_later_condition_replaces_earlier() {
        let filter = Filter::new().equals("n", 1).equals("n", 2);
        assert_eq!(filter.len(), 1);
        assert!(filter.matches(&document("a", json!({"n": 2}))));
        assert!(!filter.matches(&document("a", json!({"n": 1}))));
    }

    #[test]
    fn test_numbers_match_across_integer_and_float_forms() {
        let stored_float = document("a", json!({"score": 1.0}));
        assert!(Filter::new().equals("score", 1).matches(&stored_float));
        assert!(Filter::new().equals("score", 1.0).matches(&stored_float));
        assert!(!Filter::new().equals("score", 2).matches(&stored_float));

        let stored_int = document("b", json!({"status": 0, "tags": [1, 2]}));
        assert!(Filter::new().equals("status", 0.0).matches(&stored_int));
        assert!(Filter::from_json(&json!({"tags": [1.0, 2.0]}))
            .unwrap()
            .matches(&stored_int));
        assert!(!Filter::new().equals("status", 0.5).matches(&stored_int));
    }

    #[test]
    fn test_from_json() {
        let filter = Filter::from_json(&json!({"_id": {"value": "x1"}, "active": true})).unwrap();
        assert_eq!(filter.identity(), Some("x1"));
        assert_eq!(filter.len(), 2);
        assert!(filter.matches(&document("x1", json!({"active": true}))));
        assert!(!filter.matches(&document("x1", json!({"active": false}))));

        let numeric_id = Filter::from_json(&json!({"_id": 7})).unwrap();
        assert_eq!(numeric_id.identity(), Some("7"));

        let err = Filter::from_json(&json!([1, 2])).unwrap_err();
        assert!(matches!(err, CairnError::Validation { .. }));
    }

    #[test]
    fn test_resolve_coerces_declared_fields() {
        let schema = Schema::new()
            .field("user", FieldRule::reference("User"))
            .field("at", FieldRule::date());
        let filter = Filter::new()
            .equals("user", "u1")
            .equals("at", "2024-01-01T00:00:00+00:00")
            .resolve(&schema);

        let mut fields = Fields::new();
        fields.insert("user".into(), FieldValue::ObjectId(ObjectId::new("u1").unwrap()));
        fields.insert(
            "at".into(),
            FieldValue::from(crate::value::parse_date("2024-01-01T00:00:00Z").unwrap()),
        );
        assert!(filter.matches(&RawDocument::new(ObjectId::new("p1").unwrap(), fields)));
    }
}
