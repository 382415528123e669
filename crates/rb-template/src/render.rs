//! Recursive rendering of JSON values

use serde_json::Value;

use crate::engine::{is_template, ExpressionEngine};
use crate::error::TemplateResult;

/// Render every template string inside `value`
///
/// Objects and arrays are walked recursively; strings without template
/// syntax and non-string scalars are returned unchanged.
pub fn render_value(
    engine: &dyn ExpressionEngine,
    value: &Value,
    variables: &Value,
) -> TemplateResult<Value> {
    match value {
        Value::String(s) if is_template(s) => engine.process(s, variables),
        Value::Object(obj) => {
            let mut new_obj = serde_json::Map::new();
            for (k, v) in obj {
                new_obj.insert(k.clone(), render_value(engine, v, variables)?);
            }
            Ok(Value::Object(new_obj))
        }
        Value::Array(arr) => {
            let new_arr: Result<Vec<_>, _> = arr
                .iter()
                .map(|v| render_value(engine, v, variables))
                .collect();
            Ok(Value::Array(new_arr?))
        }
        _ => Ok(value.clone()),
    }
}

/// Check whether any string inside `value` contains template syntax
pub fn contains_template(value: &Value) -> bool {
    match value {
        Value::String(s) => is_template(s),
        Value::Object(obj) => obj.values().any(contains_template),
        Value::Array(arr) => arr.iter().any(contains_template),
        _ => false,
    }
}
