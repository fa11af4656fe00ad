use tracing::{debug, trace};

use crate::{FieldValue, Instance, ObjectId, RawDocument, Result};

impl Instance {
    /// Replaces a reference field with a copy of the document it points to.
    ///
    /// Nothing happens when the field declares no `ref`, holds no identity, or
    /// the referenced document does not exist. The embedded copy includes the
    /// `_id` of the target. Only this instance changes; saving it afterwards
    /// stores the plain identity again.
    ///
    /// # Errors
    ///
    /// Only a strict-mode load failure of a pending collection is returned.
    pub async fn populate(&mut self, field: &str) -> Result<&mut Self> {
        trace!("Populating {}.{}", self.model().name(), field);
        let Some(target) = self
            .model()
            .schema()
            .rule(field)
            .and_then(|rule| rule.reference.clone())
        else {
            debug!("{}.{} declares no reference", self.model().name(), field);
            return Ok(self);
        };

        let reference = match self.get(field) {
            Some(FieldValue::ObjectId(id)) => Some(id.clone()),
            Some(FieldValue::String(raw)) => ObjectId::new(raw.as_str()).ok(),
            _ => None,
        };
        let Some(reference) = reference
        else {
            debug!("{}.{} holds no identity to populate", self.model().name(), field);
            return Ok(self);
        };

        let store = self.model().store().clone();
        let embedded = {
            let mut state = store.lock().await;
            store.load_if_connected(&mut state).await?;
            state
                .rows(&target)
                .and_then(|rows| rows.iter().find(|row| row.id == reference))
                .map(RawDocument::to_embedded)
        };

        match embedded {
            Some(embedded) => {
                self.fields_mut()
                    .insert(field.to_owned(), FieldValue::Embedded(embedded));
                debug!("Populated {} with {} document {}", field, target, reference);
            },
            None => debug!("No {} document {} to populate {} with", target, reference, field),
        }
        Ok(self)
    }
}
