use std::path::{Path, PathBuf};

use tracing::{debug, error, trace};

use crate::Result;
use super::stor::Store;

/// A store bound to a storage root, as returned by [`Store::connect`].
#[derive(Debug, Clone)]
pub struct Connection {
    store: Store,
    root:  PathBuf,
}

impl Connection {
    pub(crate) fn new(store: Store, root: PathBuf) -> Self {
        Self {
            store,
            root,
        }
    }

    /// The storage root this connection was opened on.
    pub fn root(&self) -> &Path { &self.root }

    pub fn store(&self) -> &Store { &self.store }

    /// Deletes the storage root and everything in it.
    ///
    /// When the store is still bound to this root, every collection is reset
    /// to the not-loaded sentinel, so the next read sees empty collections and
    /// the next save recreates the root. A root that is already gone counts
    /// as dropped.
    ///
    /// # Errors
    ///
    /// Any removal failure other than "not found" is returned and leaves the
    /// cache untouched.
    pub async fn drop_database(&self) -> Result<()> {
        trace!("Dropping database at {:?}", self.root);
        let mut state = self.store.lock().await;
        match self.store.inner.fs.remove_dir_all(&self.root).await {
            Ok(()) => debug!("Storage root {:?} removed", self.root),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Storage root {:?} already absent", self.root);
            },
            Err(e) => {
                error!("Failed to remove storage root {:?}: {}", self.root, e);
                return Err(e.into());
            },
        }

        if state.root.as_deref() == Some(self.root.as_path()) {
            state.reset_collections();
            debug!("Collections reset after drop of {:?}", self.root);
        }
        Ok(())
    }
}
