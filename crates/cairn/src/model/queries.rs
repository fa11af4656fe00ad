use tracing::{debug, trace};

use crate::{Filter, Instance, Model, RawDocument, Result};

impl Model {
    /// Looks a document up by the string form of its `_id`.
    ///
    /// Returns `Ok(None)` when nothing matches, including when the collection
    /// is empty or was never loaded.
    ///
    /// # Errors
    ///
    /// - `CairnError::SchemaViolation` if the stored document no longer fits the schema
    /// - `CairnError::StoreCorruption` if a pending collection fails to load in strict mode
    pub async fn find_by_id(&self, id: &str) -> Result<Option<Instance>> {
        trace!("Finding {} document by id {}", self.name, id);
        let row = self
            .with_rows(|rows| rows.iter().find(|row| row.id.as_str() == id).cloned())
            .await?
            .flatten();
        match row {
            Some(row) => {
                debug!("Found {} document {}", self.name, id);
                Ok(Some(self.materialize(row)?))
            },
            None => {
                debug!("No {} document {}", self.name, id);
                Ok(None)
            },
        }
    }

    /// Returns every document matching `filter`, in stored order.
    ///
    /// # Errors
    ///
    /// Same as [`Model::find_by_id`].
    pub async fn find(&self, filter: Filter) -> Result<Vec<Instance>> {
        trace!("Finding {} documents matching {:?}", self.name, filter);
        let filter = filter.resolve(&self.schema);
        let rows = self
            .with_rows(|rows| {
                rows.iter()
                    .filter(|row| filter.matches(row))
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .await?
            .unwrap_or_default();
        debug!("{} {} documents matched", rows.len(), self.name);
        rows.into_iter().map(|row| self.materialize(row)).collect()
    }

    /// Returns every document of the collection.
    pub async fn find_all(&self) -> Result<Vec<Instance>> { self.find(Filter::new()).await }

    /// Number of documents currently in the collection.
    pub async fn count(&self) -> Result<usize> {
        Ok(self
            .with_rows(|rows| rows.len())
            .await?
            .unwrap_or_default())
    }

    /// Runs `read` over the cached rows, loading them first when a root is
    /// bound. `None` means the collection is not loaded.
    async fn with_rows<T, F>(&self, read: F) -> Result<Option<T>>
    where
        F: FnOnce(&[RawDocument]) -> T,
    {
        let mut state = self.store.lock().await;
        self.store.load_if_connected(&mut state).await?;
        Ok(state.rows(&self.name).map(|rows| read(rows)))
    }
}
