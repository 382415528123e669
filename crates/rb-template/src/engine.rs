//! Expression engines
//!
//! An [`ExpressionEngine`] turns a template string and a set of variables
//! into a JSON value. The default engine is [`JinjaEngine`], built on
//! minijinja.

use minijinja::{Environment, UndefinedBehavior};
use serde_json::Value;
use tracing::trace;

use crate::error::TemplateResult;
use crate::filters;

/// Name of the built-in Jinja engine
pub const JINJA_ENGINE: &str = "jinja";

/// Capability to evaluate a template against variables
pub trait ExpressionEngine: Send + Sync {
    /// Name the engine is registered under
    fn name(&self) -> &str;

    /// Evaluate `template` with `variables` and return the produced value
    fn process(&self, template: &str, variables: &Value) -> TemplateResult<Value>;
}

/// Check if a string contains template syntax
pub fn is_template(template: &str) -> bool {
    template.contains("{{") || template.contains("{%") || template.contains("{#")
}

/// Return the inner expression when the whole template is a single `{{ }}`
fn single_expression(template: &str) -> Option<&str> {
    let inner = template
        .trim()
        .strip_prefix("{{")?
        .strip_suffix("}}")?;

    if inner.contains("{{") || inner.contains("}}") || inner.contains("{%") {
        return None;
    }
    Some(inner.trim())
}

/// Jinja2-compatible engine
///
/// A template consisting of exactly one `{{ expression }}` evaluates to the
/// expression's native value (numbers stay numbers, lists stay lists).
/// Anything else is rendered to a string, which is then parsed as JSON when
/// possible and kept as a string otherwise.
pub struct JinjaEngine {
    env: Environment<'static>,
}

impl JinjaEngine {
    /// Create an engine where undefined variables render as empty
    pub fn new() -> Self {
        Self::with_undefined(UndefinedBehavior::Lenient)
    }

    /// Create an engine where undefined variables are errors
    pub fn strict() -> Self {
        Self::with_undefined(UndefinedBehavior::Strict)
    }

    fn with_undefined(behavior: UndefinedBehavior) -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(behavior);

        // JSON
        env.add_filter("to_json", filters::to_json);
        env.add_filter("from_json", filters::from_json);

        // Type conversion
        env.add_filter("truthy", filters::truthy);

        Self { env }
    }

    /// Render a template with context variables
    pub fn render_with_context(
        &self,
        template: &str,
        context: impl serde::Serialize,
    ) -> TemplateResult<String> {
        Ok(self.env.render_str(template, context)?)
    }

    /// Evaluate an expression with context variables
    pub fn evaluate_with_context(
        &self,
        expression: &str,
        context: impl serde::Serialize,
    ) -> TemplateResult<Value> {
        let expr = self.env.compile_expression(expression)?;
        let result = expr.eval(context)?;
        Ok(filters::value_to_json(&result)?)
    }
}

impl Default for JinjaEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpressionEngine for JinjaEngine {
    fn name(&self) -> &str {
        JINJA_ENGINE
    }

    fn process(&self, template: &str, variables: &Value) -> TemplateResult<Value> {
        trace!(template, "Processing template");

        if let Some(expression) = single_expression(template) {
            return self.evaluate_with_context(expression, variables);
        }

        let rendered = self.render_with_context(template, variables)?;

        // Try to parse as JSON, otherwise keep as string
        Ok(serde_json::from_str(&rendered).unwrap_or(Value::String(rendered)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TemplateError;
    use serde_json::json;

    #[test]
    fn test_is_template() {
        assert!(is_template("{{ x }}"));
        assert!(is_template("{% if x %}y{% endif %}"));
        assert!(!is_template("plain text"));
    }

    #[test]
    fn test_single_expression() {
        assert_eq!(single_expression("{{ a.b }}"), Some("a.b"));
        assert_eq!(single_expression("  {{x}} "), Some("x"));
        assert_eq!(single_expression("{{ a }} and {{ b }}"), None);
        assert_eq!(single_expression("hello {{ a }}"), None);
    }

    #[test]
    fn test_native_value_from_single_expression() {
        let engine = JinjaEngine::new();
        let vars = json!({"count": 3, "items": [1, 2]});

        assert_eq!(engine.process("{{ count + 1 }}", &vars).unwrap(), json!(4));
        assert_eq!(engine.process("{{ items }}", &vars).unwrap(), json!([1, 2]));
    }

    #[test]
    fn test_mixed_template_renders_string() {
        let engine = JinjaEngine::new();
        let vars = json!({"name": "bob"});

        assert_eq!(
            engine.process("hello {{ name }}", &vars).unwrap(),
            json!("hello bob")
        );
    }

    #[test]
    fn test_rendered_json_is_parsed() {
        let engine = JinjaEngine::new();
        let vars = json!({"n": 5});

        assert_eq!(
            engine.process("{% if n > 1 %}true{% else %}false{% endif %}", &vars).unwrap(),
            json!(true)
        );
    }

    #[test]
    fn test_filters() {
        let engine = JinjaEngine::new();
        let vars = json!({"flag": "yes", "obj": {"a": 1}});

        assert_eq!(engine.process("{{ flag | truthy }}", &vars).unwrap(), json!(true));
        assert_eq!(
            engine.process("{{ obj | to_json }}", &vars).unwrap(),
            json!(r#"{"a":1}"#)
        );
    }

    #[test]
    fn test_strict_undefined() {
        let lenient = JinjaEngine::new();
        assert_eq!(lenient.process("x{{ missing }}", &json!({})).unwrap(), json!("x"));

        let strict = JinjaEngine::strict();
        let err = strict.process("x{{ missing }}", &json!({})).unwrap_err();
        assert!(matches!(err, TemplateError::Undefined { .. }));
    }

    #[test]
    fn test_syntax_error() {
        let engine = JinjaEngine::new();
        let err = engine.process("{% if %}", &json!({})).unwrap_err();
        assert!(matches!(err, TemplateError::Syntax { .. }));
    }
}
