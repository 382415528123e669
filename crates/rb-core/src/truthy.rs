//! Boolean coercion of option and template values

use serde_json::Value;

/// Coerce a JSON value to a boolean
///
/// Truthy values are `true`, the strings `"true"` and `"yes"` (case
/// insensitive, surrounding whitespace ignored) and non-zero numbers.
/// Everything else, including `null`, arrays and objects, is falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => is_truthy_str(s),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        _ => false,
    }
}

/// Coerce a string to a boolean, see [`is_truthy`]
pub fn is_truthy_str(value: &str) -> bool {
    let trimmed = value.trim().to_lowercase();
    matches!(trimmed.as_str(), "true" | "yes")
}

/// Coerce an optional value, missing values are falsy
pub fn is_truthy_opt(value: Option<&Value>) -> bool {
    value.map(is_truthy).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_is_truthy() {
        assert!(is_truthy(&json!(true)));
        assert!(is_truthy(&json!("true")));
        assert!(is_truthy(&json!("True")));
        assert!(is_truthy(&json!("YES")));
        assert!(is_truthy(&json!(" yes ")));
        assert!(is_truthy(&json!(1)));
        assert!(is_truthy(&json!(-3)));
        assert!(is_truthy(&json!(0.5)));

        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!("false")));
        assert!(!is_truthy(&json!("on")));
        assert!(!is_truthy(&json!("hello")));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!(0.0)));
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!([1])));
        assert!(!is_truthy(&json!({"a": 1})));
    }

    #[test]
    fn test_is_truthy_opt() {
        assert!(!is_truthy_opt(None));
        assert!(is_truthy_opt(Some(&json!("yes"))));
    }
}
