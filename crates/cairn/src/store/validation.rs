use tracing::{trace, warn};

use crate::{CairnError, Result};

/// Device names Windows refuses as file stems, whatever the extension.
const RESERVED_STEMS: [&str; 4] = ["CON", "PRN", "AUX", "NUL"];

/// Device families followed by a single digit (`COM1` .. `COM9`, `LPT1` .. `LPT9`).
const RESERVED_NUMBERED: [&str; 2] = ["COM", "LPT"];

fn is_device_name(name: &str) -> bool {
    let stem = name
        .split_once('.')
        .map_or(name, |(stem, _)| stem)
        .to_ascii_uppercase();
    if RESERVED_STEMS.contains(&stem.as_str()) {
        return true;
    }
    RESERVED_NUMBERED.iter().any(|family| {
        stem.strip_prefix(family)
            .is_some_and(|suffix| matches!(suffix.as_bytes(), [b'1' ..= b'9']))
    })
}

fn is_file_name_char(ch: char) -> bool { ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.') }

/// Checks that a model name can be used as the stem of its collection file.
///
/// A blank name is a `CairnError::Validation`. Names that start or end with a
/// dot, contain anything but ASCII letters, digits, `_`, `-` and `.`, or name
/// a Windows device are `CairnError::InvalidCollectionName`.
pub fn validate_collection_name(name: &str) -> Result<()> {
    trace!("Validating collection name: {}", name);
    if name.trim().is_empty() {
        warn!("Collection name is empty or blank");
        return Err(CairnError::validation("name is empty or blank"));
    }

    let reason = if name.starts_with('.') || name.ends_with('.') {
        Some("leading or trailing dot")
    }
    else if !name.chars().all(is_file_name_char) {
        Some("characters outside [A-Za-z0-9_.-]")
    }
    else if is_device_name(name) {
        Some("reserved device name")
    }
    else {
        None
    };

    if let Some(reason) = reason {
        warn!("Collection name {:?} rejected: {}", name, reason);
        return Err(CairnError::InvalidCollectionName {
            name: name.to_owned(),
        });
    }
    Ok(())
}
