use serde::{ser::SerializeMap as _, Serialize, Serializer};
use serde_json::Value;

use crate::{
    constants::ID_FIELD,
    value::Fields,
    CairnError,
    FieldValue,
    ObjectId,
    Result,
    Schema,
};

/// Storage-level representation of a document: an identity plus its fields.
///
/// This is what a collection holds in memory and what is written, one object
/// per document, into the collection file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    /// The identity of the document.
    pub(crate) id:     ObjectId,
    /// Every other field, keyed by name.
    pub(crate) fields: Fields,
}

impl RawDocument {
    pub fn new(id: ObjectId, fields: Fields) -> Self {
        Self {
            id,
            fields,
        }
    }

    pub fn id(&self) -> &ObjectId { &self.id }

    pub fn fields(&self) -> &Fields { &self.fields }

    pub fn get(&self, field: &str) -> Option<&FieldValue> { self.fields.get(field) }

    /// Splits a JSON object into its identity and remaining fields.
    ///
    /// The identity is `None` when the object carries no `_id` key.
    pub(crate) fn split_json(value: Value) -> Result<(Option<ObjectId>, Fields)> {
        let map = match value {
            Value::Object(map) => map,
            other => {
                return Err(CairnError::validation(format!(
                    "document {} is not a JSON object",
                    other
                )));
            },
        };
        let mut id = None;
        let mut fields = Fields::new();
        for (key, value) in map {
            if key == ID_FIELD {
                if !value.is_null() {
                    id = Some(ObjectId::from_value(&value)?);
                }
            }
            else {
                fields.insert(key, FieldValue::from_json(value));
            }
        }
        Ok((id, fields))
    }

    /// Rebuilds a document read back from a collection file, restoring the
    /// identity and every typed field the schema declares.
    pub(crate) fn from_stored(value: Value, model: &str, schema: &Schema) -> Result<Self> {
        let (id, mut fields) = Self::split_json(value)?;
        let id = id.ok_or_else(|| {
            CairnError::StoreCorruption {
                reason: format!("a stored '{}' document has no '{}' field", model, ID_FIELD),
            }
        })?;
        schema.rehydrate(model, &mut fields);
        Ok(Self::new(id, fields))
    }

    /// Copy of the document as a plain object, identity included, as embedded
    /// by `populate`.
    pub fn to_embedded(&self) -> Fields {
        let mut embedded = Fields::with_capacity(self.fields.len().saturating_add(1));
        embedded.insert(ID_FIELD.to_owned(), FieldValue::ObjectId(self.id.clone()));
        embedded.extend(self.fields.iter().map(|(key, value)| (key.clone(), value.clone())));
        embedded
    }

    /// Renders the document in its serialized JSON shape.
    pub fn to_json(&self) -> Value {
        let mut map = serde_json::Map::with_capacity(self.fields.len().saturating_add(1));
        map.insert(ID_FIELD.to_owned(), Value::String(self.id.to_string()));
        for (key, value) in &self.fields {
            map.insert(key.clone(), value.to_json());
        }
        Value::Object(map)
    }
}

impl Serialize for RawDocument {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.fields.len().saturating_add(1)))?;
        map.serialize_entry(ID_FIELD, &self.id)?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}
