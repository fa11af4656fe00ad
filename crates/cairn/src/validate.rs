//! Checks for caller input arriving at an application boundary.
//!
//! These helpers sit in front of the store: they reject blank strings,
//! malformed e-mail addresses and values outside an allowed set with
//! `CairnError::Content`, and untyped JSON of the wrong shape with
//! `CairnError::Validation`.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::{CairnError, Result};

const EMAIL_REGEX: &str = r#"^(([^<>()\[\]\\.,;:\s@"]+(\.[^<>()\[\]\\.,;:\s@"]+)*)|(".+"))@((\[[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\])|(([a-zA-Z\-0-9]+\.)+[a-zA-Z]{2,}))$"#;

static EMAIL_PATTERN: OnceLock<Regex> = OnceLock::new();

fn email_pattern() -> Result<&'static Regex> {
    if let Some(pattern) = EMAIL_PATTERN.get() {
        return Ok(pattern);
    }
    let pattern = Regex::new(EMAIL_REGEX).map_err(|e| CairnError::validation(format!("invalid e-mail pattern: {}", e)))?;
    Ok(EMAIL_PATTERN.get_or_init(|| pattern))
}

/// Fails when `target` is empty or only whitespace.
///
/// # Examples
///
/// ```rust
/// use cairn::validate;
///
/// assert!(validate::string_not_blank("username", "ana").is_ok());
/// assert!(validate::string_not_blank("username", "  ").is_err());
/// ```
pub fn string_not_blank(name: &str, target: &str) -> Result<()> {
    if target.trim().is_empty() {
        return Err(CairnError::content(format!("{} is empty or blank", name)));
    }
    Ok(())
}

/// Fails when `target`, lowercased, is not an e-mail address.
pub fn email(target: &str) -> Result<()> {
    if !email_pattern()?.is_match(&target.to_lowercase()) {
        return Err(CairnError::content(format!("{} is not an e-mail", target)));
    }
    Ok(())
}

/// Fails when `target` is not one of `allowed`.
pub fn one_of<T>(name: &str, target: &T, allowed: &[T]) -> Result<()>
where
    T: PartialEq + std::fmt::Debug,
{
    if !allowed.contains(target) {
        return Err(CairnError::content(format!(
            "{:?} does not match any of the valid {} values: {:?}",
            target, name, allowed
        )));
    }
    Ok(())
}

/// Fails when `target` is not of the JSON type `expected`.
///
/// `expected` is one of `null`, `boolean`, `number`, `string`, `array` or
/// `object`.
pub fn json_type(expected: &str, target: &Value) -> Result<()> {
    let found = match target {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    };
    if found != expected {
        return Err(CairnError::validation(format!(
            "{} is not a {}",
            target, expected
        )));
    }
    Ok(())
}
