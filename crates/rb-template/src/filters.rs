//! Filters registered on the Jinja engine

use minijinja::value::Kwargs;
use minijinja::{Error, ErrorKind, Value};

/// Convert value to JSON string
pub fn to_json(value: Value, kwargs: Kwargs) -> Result<String, Error> {
    let pretty: bool = kwargs.get::<Option<bool>>("pretty")?.unwrap_or(false);

    let json_value = value_to_json(&value)?;

    if pretty {
        serde_json::to_string_pretty(&json_value)
    } else {
        serde_json::to_string(&json_value)
    }
    .map_err(|e| Error::new(ErrorKind::InvalidOperation, format!("JSON error: {}", e)))
}

/// Parse JSON string to value
pub fn from_json(value: &str) -> Result<Value, Error> {
    let json: serde_json::Value = serde_json::from_str(value)
        .map_err(|e| Error::new(ErrorKind::InvalidOperation, format!("invalid JSON: {}", e)))?;

    Ok(Value::from_serialize(&json))
}

/// Coerce to a boolean with the same rules as automation options
pub fn truthy(value: Value) -> bool {
    value_to_json(&value)
        .map(|json| rb_core::is_truthy(&json))
        .unwrap_or(false)
}

/// Convert a template value into JSON
pub(crate) fn value_to_json(value: &Value) -> Result<serde_json::Value, Error> {
    if value.is_undefined() || value.is_none() {
        return Ok(serde_json::Value::Null);
    }
    serde_json::to_value(value)
        .map_err(|e| Error::new(ErrorKind::InvalidOperation, format!("JSON error: {}", e)))
}
