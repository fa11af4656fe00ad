use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, trace};

use crate::{Instance, ObjectId, RawDocument, Result, Schema, Store};

/// A document type bound to a collection name and a schema.
///
/// Models are returned by [`Store::model`] and are cheap to clone. They build
/// new [`Instance`]s and look up existing ones in the cached collection.
///
/// # Example
///
/// ```rust
/// use cairn::{FieldRule, Schema, Store};
/// use serde_json::json;
///
/// # async fn example() -> cairn::Result<()> {
/// let temp_dir = tempfile::tempdir().unwrap();
/// let store = Store::new();
/// let users = store
///     .model(
///         "User",
///         Schema::new()
///             .field("username", FieldRule::string().required())
///             .field("role", FieldRule::string().default_value("member")),
///     )
///     .await?;
/// store.connect(temp_dir.path()).await?;
///
/// let ana = users.create(json!({"username": "ana"})).await?;
/// assert_eq!(ana.get_str("role"), Some("member"));
///
/// let found = users.find_by_id(&ana.id()).await?.unwrap();
/// assert_eq!(found.get_str("username"), Some("ana"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
#[allow(clippy::field_scoped_visibility_modifiers, reason = "fields need to be pub(crate) for internal access")]
pub struct Model {
    /// Collection name, also the stem of the collection file.
    pub(crate) name:   Arc<str>,
    /// Schema every instance is checked against.
    pub(crate) schema: Arc<Schema>,
    /// Store holding the collection.
    pub(crate) store:  Store,
}

impl Model {
    pub(crate) fn new(name: &str, schema: Arc<Schema>, store: Store) -> Self {
        Self {
            name: Arc::from(name),
            schema,
            store,
        }
    }

    /// Returns the collection name of the model.
    pub fn name(&self) -> &str { &self.name }

    pub fn schema(&self) -> &Schema { &self.schema }

    pub fn store(&self) -> &Store { &self.store }

    /// Builds a validated, unsaved instance from a JSON object.
    ///
    /// Defaults are applied to absent fields, then required and type rules
    /// are enforced. Declared date and identity fields may be given in their
    /// serialized string form. When `_id` is absent a fresh identity is
    /// generated.
    ///
    /// # Errors
    ///
    /// - `CairnError::Validation` if `fields` is not an object or `_id` is malformed
    /// - `CairnError::SchemaViolation` if a required field is missing or a value has the wrong type
    pub fn new_instance(&self, fields: Value) -> Result<Instance> {
        trace!("Constructing {} instance", self.name);
        let (id, mut fields) = RawDocument::split_json(fields)?;
        self.schema.prepare(&self.name, &mut fields)?;
        let id = id.unwrap_or_else(ObjectId::generate);
        debug!("Constructed {} instance {}", self.name, id);
        Ok(Instance::new(
            self.clone(),
            RawDocument::new(id, fields),
            false,
        ))
    }

    /// Builds an unsaved instance from any serializable value.
    pub fn new_instance_from<T>(&self, value: &T) -> Result<Instance>
    where
        T: Serialize,
    {
        self.new_instance(serde_json::to_value(value)?)
    }

    /// Constructs an instance and saves it immediately.
    pub async fn create(&self, fields: Value) -> Result<Instance> {
        let mut instance = self.new_instance(fields)?;
        instance.save().await?;
        Ok(instance)
    }

    /// Constructs an instance from a serializable value and saves it immediately.
    pub async fn create_from<T>(&self, value: &T) -> Result<Instance>
    where
        T: Serialize,
    {
        let mut instance = self.new_instance_from(value)?;
        instance.save().await?;
        Ok(instance)
    }

    /// Rewraps a cached row into a fresh instance, running it through the
    /// schema again so defaults added since the row was written apply.
    pub(crate) fn materialize(&self, row: RawDocument) -> Result<Instance> {
        let RawDocument {
            id,
            mut fields,
        } = row;
        self.schema.prepare(&self.name, &mut fields)?;
        Ok(Instance::new(
            self.clone(),
            RawDocument::new(id, fields),
            true,
        ))
    }
}
