//! Store configuration structures and loading modes.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    constants::{DEFAULT_FILE_EXTENSION, DEFAULT_INDENT},
    CairnError,
    Result,
};

/// How a collection file that exists but cannot be parsed is handled on load.
///
/// - `Warn`: the problem is logged; an unparseable file loads as empty and a
///   row that cannot be restored is left out
/// - `Strict`: the load fails with `CairnError::StoreCorruption`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LoadFailureMode {
    /// Corrupt files are logged and treated as empty collections
    #[default]
    Warn,
    /// Corrupt files abort the load
    Strict,
}

/// Configuration for a [`Store`](crate::Store).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Number of spaces used to pretty-print collection files
    pub indent:            usize,
    /// Extension of collection files, without the leading dot
    pub file_extension:    String,
    /// Behaviour when a collection file is present but unreadable as documents
    pub load_failure_mode: LoadFailureMode,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            indent:            DEFAULT_INDENT,
            file_extension:    DEFAULT_FILE_EXTENSION.to_owned(),
            load_failure_mode: LoadFailureMode::Warn,
        }
    }
}

impl StoreConfig {
    /// Parses a configuration document. Missing keys take their default.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }

    pub fn with_file_extension(mut self, extension: impl Into<String>) -> Self {
        self.file_extension = extension.into();
        self
    }

    pub fn with_load_failure_mode(mut self, mode: LoadFailureMode) -> Self {
        self.load_failure_mode = mode;
        self
    }

    /// Checks that the file extension can be appended to a collection name.
    pub fn validate(&self) -> Result<()> {
        let extension = self.file_extension.trim_start_matches('.');
        if extension.trim().is_empty() || extension.contains(['/', '\\']) {
            warn!("Rejecting file extension {:?}", self.file_extension);
            return Err(CairnError::validation(format!(
                "'{}' is not a usable file extension",
                self.file_extension
            )));
        }
        Ok(())
    }

    /// Path of the file backing collection `name` under `root`.
    pub(crate) fn collection_file(&self, root: &Path, name: &str) -> PathBuf {
        root.join(format!(
            "{}.{}",
            name,
            self.file_extension.trim_start_matches('.')
        ))
    }

    pub(crate) fn indent_bytes(&self) -> Vec<u8> { vec![b' '; self.indent] }
}
