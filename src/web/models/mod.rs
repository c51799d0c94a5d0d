//! Request payloads, response bodies and the validation that turns one into
//! the inputs of the `db::services` layer.
//!
//! Request fields are read as raw JSON values so that a missing field, an
//! explicit `null` and a value of the wrong type all become field-level
//! messages instead of one deserialization failure for the whole body.

pub mod recipe_models;
pub mod user_models;

pub use recipe_models::*;
pub use user_models::*;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::web::error::FieldErrors;

pub const MAX_CHAR_FIELD_LEN: usize = 255;

pub(crate) const REQUIRED: &str = "This field is required.";
pub(crate) const BLANK: &str = "This field may not be blank.";
pub(crate) const NULL: &str = "This field may not be null.";
pub(crate) const NOT_A_STRING: &str = "Not a valid string.";

/// Deserializes a body field so that a present `null` stays distinguishable
/// from a missing key: missing is `None` (via `#[serde(default)]`), `null`
/// is `Some(Value::Null)`.
pub(crate) fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Name of a JSON value's type, as used in "expected ... but got" messages.
pub(crate) fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

/// Reads a present char field. Numbers are accepted as their text; `null`
/// and other types are recorded against `field`.
pub(crate) fn string_value(errors: &mut FieldErrors, field: &str, value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Null => {
            errors.add(field, NULL);
            None
        }
        _ => {
            errors.add(field, NOT_A_STRING);
            None
        }
    }
}

pub(crate) fn too_long(max: usize) -> String {
    format!("Ensure this field has no more than {max} characters.")
}

/// Validates a char field: trims it, rejects blank values unless `allow_blank`,
/// and enforces `max_len` (counted in characters).
pub(crate) fn clean_text(
    errors: &mut FieldErrors,
    field: &str,
    value: String,
    max_len: Option<usize>,
    allow_blank: bool,
) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() && !allow_blank {
        errors.add(field, BLANK);
        return None;
    }
    if let Some(max) = max_len {
        if trimmed.chars().count() > max {
            errors.add(field, too_long(max));
            return None;
        }
    }
    Some(trimmed.to_string())
}

/// Like [`clean_text`] on a body field, but records "required" when the value
/// is absent and `partial` is false.
pub(crate) fn required_text(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<Value>,
    max_len: Option<usize>,
    partial: bool,
) -> Option<String> {
    match value {
        Some(v) => {
            let text = string_value(errors, field, v)?;
            clean_text(errors, field, text, max_len, false)
        }
        None => {
            if !partial {
                errors.add(field, REQUIRED);
            }
            None
        }
    }
}

/// A char field that may be blank and may be left out.
pub(crate) fn optional_text(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<Value>,
    max_len: Option<usize>,
) -> Option<String> {
    let text = string_value(errors, field, value?)?;
    clean_text(errors, field, text, max_len, true)
}
