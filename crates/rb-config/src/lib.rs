//! Configuration for the rulebook dispatch engine
//!
//! The engine reads a single [`EngineConfig`] document. Every field has a
//! default, so an empty file is a valid configuration.
//!
//! ```yaml
//! template:
//!   default_engine: jinja
//! dispatch:
//!   failure_policy: isolate   # or propagate
//! resume:
//!   timeout_policy: resume    # or abort
//! fan_out:
//!   max_concurrency: 8
//! tracing:
//!   trace_capacity: 64
//! ```
//!
//! The loader understands two custom tags:
//!
//! - `!include path` - Include another YAML file, relative to the including file
//! - `!env_var VAR` - Environment variable substitution
//!
//! # Example
//!
//! ```ignore
//! use rb_config::EngineConfig;
//!
//! let config = EngineConfig::load("/etc/rulebook/engine.yaml")?;
//! ```

mod engine_config;
mod error;
mod loader;

pub use engine_config::{
    DispatchConfig, EngineConfig, FailurePolicy, FanOutConfig, ResumeConfig, TemplateConfig,
    TimeoutPolicy, TracingConfig,
};
pub use error::{ConfigError, ConfigResult};
pub use loader::{load_yaml, load_yaml_string, YamlLoader};

// Re-export serde_yaml::Value for convenience
pub use serde_yaml::Value;
