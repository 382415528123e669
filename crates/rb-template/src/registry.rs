//! Named expression engines

use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::engine::{ExpressionEngine, JinjaEngine, JINJA_ENGINE};
use crate::error::{TemplateError, TemplateResult};

/// Registry of expression engines addressed by name
///
/// A fresh registry contains the Jinja engine, which is also the default.
#[derive(Clone)]
pub struct TemplateRegistry {
    engines: HashMap<String, Arc<dyn ExpressionEngine>>,
    default_engine: String,
}

impl TemplateRegistry {
    /// Create a registry with the Jinja engine as default
    pub fn new() -> Self {
        let mut engines: HashMap<String, Arc<dyn ExpressionEngine>> = HashMap::new();
        engines.insert(JINJA_ENGINE.to_string(), Arc::new(JinjaEngine::new()));

        Self {
            engines,
            default_engine: JINJA_ENGINE.to_string(),
        }
    }

    /// Register an engine under its own name, replacing any previous one
    pub fn register(&mut self, engine: Arc<dyn ExpressionEngine>) {
        debug!(engine = engine.name(), "Registering template engine");
        self.engines.insert(engine.name().to_string(), engine);
    }

    /// Select the engine used when none is requested
    pub fn set_default(&mut self, name: &str) -> TemplateResult<()> {
        if !self.engines.contains_key(name) {
            return Err(TemplateError::UnknownEngine {
                name: name.to_string(),
            });
        }
        self.default_engine = name.to_string();
        Ok(())
    }

    /// Name of the default engine
    pub fn default_name(&self) -> &str {
        &self.default_engine
    }

    /// Look up an engine by name
    pub fn get(&self, name: &str) -> TemplateResult<Arc<dyn ExpressionEngine>> {
        self.engines
            .get(name)
            .cloned()
            .ok_or_else(|| TemplateError::UnknownEngine {
                name: name.to_string(),
            })
    }

    /// Engine for an optional name, falling back to the default
    pub fn engine_for(&self, name: Option<&str>) -> TemplateResult<Arc<dyn ExpressionEngine>> {
        self.get(name.unwrap_or(&self.default_engine))
    }

    /// Names of all registered engines, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.engines.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TemplateRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateRegistry")
            .field("engines", &self.names())
            .field("default_engine", &self.default_engine)
            .finish()
    }
}
