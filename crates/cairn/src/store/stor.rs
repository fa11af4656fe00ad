use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, error, trace};

use crate::{
    fs::{FileSystem, TokioFileSystem},
    CairnError,
    Model,
    RawDocument,
    Result,
    Schema,
    StoreConfig,
};
use super::{connection::Connection, persistence::load_pending, validation::validate_collection_name};

/// The registry and cache behind every model of an application.
///
/// `Store` owns the schema registry (`name → Schema`), the collection cache
/// (`name → documents`, or "not loaded yet") and the currently bound storage
/// root. It is a cheap handle: clones share the same state, and every
/// [`Model`], [`Connection`] and [`Instance`](crate::Instance) keeps one.
///
/// # Examples
///
/// ```no_run
/// use cairn::{FieldRule, Schema, Store};
/// use serde_json::json;
///
/// # async fn example() -> cairn::Result<()> {
/// let store = Store::new();
/// let users = store
///     .model("User", Schema::new().field("username", FieldRule::string().required()))
///     .await?;
///
/// store.connect("/var/lib/my-app/db").await?;
///
/// let ana = users.create(json!({"username": "ana"})).await?;
/// let found = users.find_by_id(&ana.id()).await?;
/// assert!(found.is_some());
/// # Ok(())
/// # }
/// ```
///
/// # Thread Safety
///
/// All mutable state sits behind a single async mutex that is held for the
/// whole of every load, save, drop, find and populate, so those operations
/// are serialized even on a multi-threaded runtime.
#[derive(Debug, Clone)]
pub struct Store {
    pub(crate) inner: Arc<StoreInner>,
}

#[allow(clippy::field_scoped_visibility_modifiers, reason = "fields need to be pub(crate) for internal access")]
#[derive(Debug)]
pub(crate) struct StoreInner {
    /// Store configuration.
    pub(crate) config: StoreConfig,
    /// File system the collections are persisted on.
    pub(crate) fs:     Arc<dyn FileSystem>,
    /// Registry, cache and bound root.
    pub(crate) state:  Mutex<StoreState>,
}

/// Mutable state of a store. Only reachable through the store mutex.
#[derive(Debug, Default)]
pub(crate) struct StoreState {
    /// Storage root of the current connection, if any.
    pub(crate) root:        Option<PathBuf>,
    /// Registered schemas by collection name.
    pub(crate) schemas:     HashMap<String, Arc<Schema>>,
    /// Cached collections; `None` means "not loaded from disk yet".
    pub(crate) collections: HashMap<String, Option<Vec<RawDocument>>>,
}

impl StoreState {
    /// Puts every collection back to the not-loaded sentinel.
    pub(crate) fn reset_collections(&mut self) {
        for slot in self.collections.values_mut() {
            *slot = None;
        }
    }

    /// Rows of a loaded collection; `None` when unknown or not loaded.
    pub(crate) fn rows(&self, name: &str) -> Option<&Vec<RawDocument>> { self.collections.get(name).and_then(Option::as_ref) }
}

impl Default for Store {
    fn default() -> Self { Self::new() }
}

impl Store {
    /// Creates an empty, unconnected store with the default configuration.
    pub fn new() -> Self { Self::with_file_system(StoreConfig::default(), Arc::new(TokioFileSystem)) }

    /// Creates an empty, unconnected store with a custom configuration.
    pub fn with_config(config: StoreConfig) -> Self { Self::with_file_system(config, Arc::new(TokioFileSystem)) }

    /// Creates an empty, unconnected store persisting through `fs`.
    pub fn with_file_system(config: StoreConfig, fs: Arc<dyn FileSystem>) -> Self {
        trace!("Creating new Store with config: {:?}", config);
        Self {
            inner: Arc::new(StoreInner {
                config,
                fs,
                state: Mutex::new(StoreState::default()),
            }),
        }
    }

    pub fn config(&self) -> &StoreConfig { &self.inner.config }

    /// Registers a collection and returns the model bound to it.
    ///
    /// The collection starts at the not-loaded sentinel; its file is read on
    /// the next [`Store::connect`] or on the first save. Registering a name
    /// again replaces the previous schema without any migration check and
    /// drops whatever was cached for it.
    ///
    /// # Errors
    ///
    /// - `CairnError::Validation` if `name` is empty or blank
    /// - `CairnError::InvalidCollectionName` if `name` is not a safe file name
    pub async fn model(&self, name: &str, schema: Schema) -> Result<Model> {
        trace!("Registering model: {}", name);
        validate_collection_name(name)?;
        let schema = Arc::new(schema);
        let mut state = self.lock().await;
        if state
            .schemas
            .insert(name.to_owned(), Arc::clone(&schema))
            .is_some()
        {
            debug!("Model {} re-registered, previous schema replaced", name);
        }
        state.collections.insert(name.to_owned(), None);
        debug!(
            "Model {} registered with {} fields",
            name,
            schema.len()
        );
        Ok(Model::new(name, schema, self.clone()))
    }

    /// Binds the store to `root` and loads every registered collection that is
    /// not loaded yet.
    ///
    /// The directory is created, parents included, if it does not exist.
    /// Connecting again to the same root is idempotent; connecting to a
    /// different root resets every collection so the new root is read.
    pub async fn connect<P>(&self, root: P) -> Result<Connection>
    where
        P: AsRef<Path>,
    {
        let root = root.as_ref().to_path_buf();
        trace!("Connecting store to {:?}", root);
        let mut state = self.lock().await;
        if state.root.as_deref() != Some(root.as_path()) {
            if let Some(previous) = &state.root {
                debug!("Rebinding store from {:?} to {:?}", previous, root);
            }
            state.reset_collections();
            state.root = Some(root.clone());
        }

        self.inner.fs.create_dir_all(&root).await.map_err(|e| {
            error!("Failed to create storage root {:?}: {}", root, e);
            e
        })?;
        debug!("Storage root created or already exists: {:?}", root);

        load_pending(&self.inner, &mut state, &root).await?;
        trace!("Store connected to {:?}", root);
        Ok(Connection::new(self.clone(), root))
    }

    /// Unbinds the storage root and forgets every cached collection.
    ///
    /// Saves fail with `CairnError::NotConnected` until the next connect.
    pub async fn disconnect(&self) {
        let mut state = self.lock().await;
        if let Some(root) = state.root.take() {
            debug!("Store disconnected from {:?}", root);
        }
        state.reset_collections();
    }

    /// The storage root the store is currently bound to.
    pub async fn root(&self) -> Option<PathBuf> { self.lock().await.root.clone() }

    /// Whether the store is bound to a storage root.
    pub async fn is_connected(&self) -> bool { self.lock().await.root.is_some() }

    /// Names of all registered collections, sorted.
    pub async fn collection_names(&self) -> Vec<String> {
        let state = self.lock().await;
        let mut names: Vec<_> = state.schemas.keys().cloned().collect();
        names.sort();
        names
    }

    pub(crate) async fn lock(&self) -> MutexGuard<'_, StoreState> { self.inner.state.lock().await }

    /// Makes the store ready for a write: the root exists and every pending
    /// collection is loaded. Returns the bound root.
    pub(crate) async fn ready(&self, state: &mut StoreState) -> Result<PathBuf> {
        let root = state.root.clone().ok_or_else(|| {
            error!("Store used before connect");
            CairnError::NotConnected
        })?;
        self.inner.fs.create_dir_all(&root).await.map_err(|e| {
            error!("Failed to create storage root {:?}: {}", root, e);
            e
        })?;
        load_pending(&self.inner, state, &root).await?;
        Ok(root)
    }

    /// Loads pending collections when a root is bound; a no-op otherwise.
    pub(crate) async fn load_if_connected(&self, state: &mut StoreState) -> Result<()> {
        if let Some(root) = state.root.clone() {
            load_pending(&self.inner, state, &root).await?;
        }
        Ok(())
    }
}
