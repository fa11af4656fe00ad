use std::path::Path;

use serde::Serialize as _;
use serde_json::{ser::PrettyFormatter, Value};
use tracing::{debug, error, trace, warn};

use crate::{config::LoadFailureMode, CairnError, RawDocument, Result, Schema};
use super::stor::{StoreInner, StoreState};

/// Loads every registered collection still at the not-loaded sentinel.
///
/// Each collection is read at most once; afterwards it stays cached until a
/// drop, disconnect or rebind resets it.
pub(crate) async fn load_pending(inner: &StoreInner, state: &mut StoreState, root: &Path) -> Result<()> {
    let pending: Vec<String> = state
        .collections
        .iter()
        .filter(|(_, slot)| slot.is_none())
        .map(|(name, _)| name.clone())
        .collect();
    if pending.is_empty() {
        return Ok(());
    }
    trace!("Loading {} pending collections from {:?}", pending.len(), root);

    for name in pending {
        let schema = state.schemas.get(&name).cloned().unwrap_or_default();
        let rows = load_collection(inner, root, &name, &schema).await?;
        debug!("Collection {} loaded with {} documents", name, rows.len());
        state.collections.insert(name, Some(rows));
    }
    Ok(())
}

/// Reads one collection file. A missing or unreadable file is an empty
/// collection; a row that cannot be restored is dropped from the load in
/// `Warn` mode and fails it in `Strict` mode.
async fn load_collection(inner: &StoreInner, root: &Path, name: &str, schema: &Schema) -> Result<Vec<RawDocument>> {
    let path = inner.config.collection_file(root, name);
    let content = match inner.fs.read_to_string(&path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No file for collection {} at {:?}", name, path);
            return Ok(Vec::new());
        },
        Err(e) => {
            warn!(
                "Collection file {:?} is unreadable, treating {} as empty: {}",
                path, name, e
            );
            return Ok(Vec::new());
        },
    };

    let mode = inner.config.load_failure_mode;
    let rows: Vec<Value> = match serde_json::from_str(&content) {
        Ok(rows) => rows,
        Err(e) => {
            corrupt(
                mode,
                &path,
                name,
                &format!("not a valid document array: {}", e),
            )?;
            return Ok(Vec::new());
        },
    };

    let mut documents = Vec::with_capacity(rows.len());
    for (index, row) in rows.into_iter().enumerate() {
        match RawDocument::from_stored(row, name, schema) {
            Ok(document) => documents.push(document),
            Err(e) => corrupt(mode, &path, name, &format!("row {} cannot be restored: {}", index, e))?,
        }
    }
    Ok(documents)
}

/// Reports damage in a collection file. `Warn` logs and lets the load go on
/// without the damaged part, `Strict` fails it.
fn corrupt(mode: LoadFailureMode, path: &Path, name: &str, reason: &str) -> Result<()> {
    match mode {
        LoadFailureMode::Warn => {
            warn!("Collection file {:?} of {}: {}", path, name, reason);
            Ok(())
        },
        LoadFailureMode::Strict => {
            error!("Collection file {:?} is corrupt: {}", path, reason);
            Err(CairnError::StoreCorruption {
                reason: format!("collection file {} is corrupt: {}", path.display(), reason),
            })
        },
    }
}

/// Serializes a whole collection the way it is stored on disk.
pub(crate) fn serialize_collection(inner: &StoreInner, rows: &[RawDocument]) -> Result<Vec<u8>> {
    let indent = inner.config.indent_bytes();
    let mut buffer = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, PrettyFormatter::with_indent(&indent));
    rows.serialize(&mut serializer)?;
    Ok(buffer)
}

/// Overwrites the file of collection `name` with `rows`.
pub(crate) async fn write_collection(inner: &StoreInner, root: &Path, name: &str, rows: &[RawDocument]) -> Result<()> {
    let path = inner.config.collection_file(root, name);
    let json = serialize_collection(inner, rows).map_err(|e| {
        error!("Failed to serialize collection {}: {}", name, e);
        e
    })?;
    inner.fs.write(&path, &json).await.map_err(|e| {
        error!(
            "Failed to write collection {} to file {:?}: {}",
            name, path, e
        );
        e
    })?;
    debug!(
        "Collection {} written with {} documents",
        name,
        rows.len()
    );
    Ok(())
}
