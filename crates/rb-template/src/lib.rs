//! Expression and template evaluation for rulebook
//!
//! Blocks receive their parameters as JSON. Before a block runs, the
//! templating interceptor renders every `{{ }}` expression inside those
//! parameters against the current context metadata using an
//! [`ExpressionEngine`] picked from a [`TemplateRegistry`].
//!
//! # Engines
//!
//! - [`JinjaEngine`] - minijinja based, registered as `jinja` and used by default
//! - any type implementing [`ExpressionEngine`] can be registered by name
//!
//! # Filters
//!
//! - `| to_json` / `| from_json` - JSON serialization
//! - `| truthy` - boolean coercion used for automation options
//!
//! # Example
//!
//! ```ignore
//! use rb_template::{render_value, TemplateRegistry};
//!
//! let registry = TemplateRegistry::new();
//! let engine = registry.engine_for(None)?;
//! let params = render_value(engine.as_ref(), &params, &ctx.to_template_vars())?;
//! ```

mod engine;
mod error;
mod filters;
mod registry;
mod render;

pub use engine::{is_template, ExpressionEngine, JinjaEngine, JINJA_ENGINE};
pub use error::{TemplateError, TemplateResult};
pub use registry::TemplateRegistry;
pub use render::{contains_template, render_value};
