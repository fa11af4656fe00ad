use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, trace};

use crate::{
    constants::ID_FIELD,
    store::persistence::write_collection,
    CairnError,
    FieldType,
    FieldValue,
    Fields,
    Model,
    ObjectId,
    RawDocument,
    Result,
};

/// A live document of a [`Model`].
///
/// An instance owns its own copy of the document; changes are only visible
/// to other readers after [`Instance::save`].
#[derive(Debug, Clone)]
pub struct Instance {
    model:     Model,
    document:  RawDocument,
    persisted: bool,
}

impl Instance {
    pub(crate) fn new(model: Model, document: RawDocument, persisted: bool) -> Self {
        Self {
            model,
            document,
            persisted,
        }
    }

    /// String form of the identity.
    pub fn id(&self) -> String { self.document.id.as_str().to_owned() }

    pub fn object_id(&self) -> &ObjectId { &self.document.id }

    /// Replaces the identity of an instance that was never saved.
    ///
    /// # Errors
    ///
    /// Returns `CairnError::Validation` once the instance has been saved or
    /// was loaded from the store.
    pub fn set_id(&mut self, id: ObjectId) -> Result<()> {
        if self.persisted {
            return Err(CairnError::validation(format!(
                "identity of saved {} document {} cannot change",
                self.model.name, self.document.id
            )));
        }
        self.document.id = id;
        Ok(())
    }

    pub fn model(&self) -> &Model { &self.model }

    pub fn document(&self) -> &RawDocument { &self.document }

    /// Whether this instance has been written to, or read from, the store.
    pub fn is_persisted(&self) -> bool { self.persisted }

    pub fn get(&self, field: &str) -> Option<&FieldValue> { self.document.get(field) }

    pub fn get_str(&self, field: &str) -> Option<&str> { self.get(field).and_then(FieldValue::as_str) }

    pub fn get_f64(&self, field: &str) -> Option<f64> { self.get(field).and_then(FieldValue::as_f64) }

    pub fn get_i64(&self, field: &str) -> Option<i64> { self.get(field).and_then(FieldValue::as_i64) }

    pub fn get_bool(&self, field: &str) -> Option<bool> { self.get(field).and_then(FieldValue::as_bool) }

    pub fn get_date(&self, field: &str) -> Option<&DateTime<Utc>> { self.get(field).and_then(FieldValue::as_date) }

    /// The identity stored in a reference field. A populated reference yields
    /// the identity of the embedded document.
    pub fn get_object_id(&self, field: &str) -> Option<&ObjectId> {
        match self.get(field)? {
            FieldValue::ObjectId(id) => Some(id),
            FieldValue::Embedded(embedded) => embedded.get(ID_FIELD).and_then(FieldValue::as_object_id),
            _ => None,
        }
    }

    pub fn get_embedded(&self, field: &str) -> Option<&Fields> { self.get(field).and_then(FieldValue::as_embedded) }

    /// Assigns a declared field, checking it against the schema.
    ///
    /// # Errors
    ///
    /// Returns `CairnError::SchemaViolation` if the field is not declared, is
    /// required and `value` is null, or `value` has the wrong type.
    pub fn set(&mut self, field: &str, value: impl Into<FieldValue>) -> Result<&mut Self> {
        if field == ID_FIELD {
            return Err(CairnError::validation(
                "use set_id to change the identity of a document",
            ));
        }
        let value = self
            .model
            .schema
            .check_assignment(&self.model.name, field, value.into())?;
        trace!("Set {}.{} on {}", self.model.name, field, self.document.id);
        self.document.fields.insert(field.to_owned(), value);
        Ok(self)
    }

    /// The document as a JSON object, `_id` first.
    pub fn to_json(&self) -> Value { self.document.to_json() }

    /// Deserializes the document into a caller-defined type.
    pub fn deserialize<T>(&self) -> Result<T>
    where
        T: DeserializeOwned,
    {
        Ok(serde_json::from_value(self.to_json())?)
    }

    /// Writes this instance into its collection, inserting or replacing by `_id`.
    ///
    /// The whole collection file is rewritten from a copy of the cached rows
    /// with this document upserted; the cache is only updated once that write
    /// succeeded. Populated references are stored as the referenced identity.
    ///
    /// # Errors
    ///
    /// - `CairnError::NotConnected` if the store is not bound to a root
    /// - `CairnError::Io` if the root cannot be created or the file cannot be written
    /// - `CairnError::StoreCorruption` if a pending collection fails to load in strict mode
    pub async fn save(&mut self) -> Result<&mut Self> {
        let name = self.model.name.clone();
        let row = self.storable();
        trace!("Saving document {} into {}", row.id, name);

        let store = self.model.store.clone();
        let mut state = store.lock().await;
        let root = store.ready(&mut state).await?;

        let mut rows = state.rows(&name).cloned().unwrap_or_default();
        match rows.iter().position(|existing| existing.id == row.id) {
            Some(index) => rows[index] = row,
            None => rows.push(row),
        }

        write_collection(&store.inner, &root, &name, &rows).await?;
        let count = rows.len();
        state.collections.insert(name.to_string(), Some(rows));
        drop(state);

        self.persisted = true;
        debug!(
            "Document {} saved into {} ({} documents)",
            self.document.id, name, count
        );
        Ok(self)
    }

    /// The row written to disk: populated references collapse back to their identity.
    fn storable(&self) -> RawDocument {
        let mut row = self.document.clone();
        for (field, rule) in self.model.schema.fields() {
            if rule.field_type != FieldType::ObjectId || rule.reference.is_none() {
                continue;
            }
            let collapsed = match row.fields.get(field) {
                Some(FieldValue::Embedded(embedded)) => embedded.get(ID_FIELD).and_then(FieldValue::as_object_id).cloned(),
                _ => None,
            };
            if let Some(id) = collapsed {
                row.fields.insert(field.to_owned(), FieldValue::ObjectId(id));
            }
        }
        row
    }

    pub(crate) fn fields_mut(&mut self) -> &mut Fields { &mut self.document.fields }
}
