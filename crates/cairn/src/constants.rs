//! Constants for special field names, file names and formatting defaults.

/// Name of the identity field every document carries.
pub const ID_FIELD: &str = "_id";

/// Default file extension for collection files.
pub const DEFAULT_FILE_EXTENSION: &str = "json";

/// Default number of spaces used to indent collection files.
pub const DEFAULT_INDENT: usize = 4;
