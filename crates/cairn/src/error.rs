use thiserror::Error;

use crate::schema::FieldType;

/// Cairn-wide error type for the embedded document store.
///
/// Every fallible operation in the crate returns this type. Construction-time
/// problems (`Validation`, `SchemaViolation`) are raised synchronously before a
/// document ever reaches the store, while `Io` and `Json` surface failures of
/// the persistence layer during `save` and `drop_database`.
#[derive(Error, Debug)]
pub enum CairnError {
    /// I/O operations on the storage root failed
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization failed
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    /// A constructor argument was rejected (blank string, malformed identity payload, ...)
    #[error("Validation error: {message}")]
    Validation {
        message: String,
    },

    /// A document does not satisfy the schema of its model
    #[error("Schema violation on '{model}.{field}': {kind}")]
    SchemaViolation {
        model: String,
        field: String,
        kind:  ViolationKind,
    },

    /// Domain-level content was rejected by the boundary validation helpers
    #[error("Content error: {message}")]
    Content {
        message: String,
    },

    /// Reserved for calling applications; the engine reports absence with `None`
    #[error("Document '{id}' not found in collection '{collection}'")]
    NotFound {
        id:         String,
        collection: String,
    },

    /// Reserved for calling applications
    #[error("Conflict: {message}")]
    Conflict {
        message: String,
    },

    /// Reserved for calling applications
    #[error("Invalid credentials: {message}")]
    Credentials {
        message: String,
    },

    /// Collection name is not usable as a file name
    #[error("Invalid collection name: {name}")]
    InvalidCollectionName {
        name: String,
    },

    /// An operation needed a storage root but the store was never connected
    #[error("Store is not connected to a storage root")]
    NotConnected,

    /// A collection file exists but does not hold a valid document array
    #[error("Store corruption detected: {reason}")]
    StoreCorruption {
        reason: String,
    },
}

/// The specific way a document broke its schema.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ViolationKind {
    /// A required field has no value after defaults were applied
    #[error("required but not present")]
    Missing,
    /// The value does not match the declared type tag
    #[error("expected {expected}, got {found}")]
    TypeMismatch {
        expected: FieldType,
        found:    &'static str,
    },
    /// The field is not declared in the schema
    #[error("field is not declared in the schema")]
    Undeclared,
}

impl CairnError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub(crate) fn content(message: impl Into<String>) -> Self {
        Self::Content {
            message: message.into(),
        }
    }

    /// Returns `true` for errors raised by schema enforcement.
    pub fn is_schema_violation(&self) -> bool { matches!(self, Self::SchemaViolation { .. }) }
}

/// Result type alias for Cairn operations.
pub type Result<T> = std::result::Result<T, CairnError>;
