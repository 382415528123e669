//! Dispatch engine configuration
//!
//! Parses the engine YAML document. Every section is optional.

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::path::Path;
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::loader::{load_yaml, load_yaml_string};

/// What `publish` does when one automation fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Log the fault, record it in the automation's outcome and continue
    #[default]
    Isolate,
    /// Return the first fault to the caller
    Propagate,
}

/// What happens to a paused run whose timeout elapsed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutPolicy {
    /// Continue the remaining actions with a timed-out marker
    #[default]
    Resume,
    /// Drop the remaining actions
    Abort,
}

/// Template engine selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateConfig {
    /// Engine used when an automation does not choose one
    #[serde(default = "default_engine")]
    pub default_engine: String,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            default_engine: default_engine(),
        }
    }
}

/// Event dispatch behaviour
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

/// Paused run behaviour
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeConfig {
    #[serde(default)]
    pub timeout_policy: TimeoutPolicy,
}

/// Concurrent child execution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanOutConfig {
    /// Maximum branches running at once, unbounded when absent
    #[serde(default)]
    pub max_concurrency: Option<usize>,
}

/// Execution trace retention
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TracingConfig {
    /// Number of finished traces kept by the engine
    #[serde(default = "default_stored_traces")]
    pub stored_traces: usize,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            stored_traces: default_stored_traces(),
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub template: TemplateConfig,

    #[serde(default)]
    pub dispatch: DispatchConfig,

    #[serde(default)]
    pub resume: ResumeConfig,

    #[serde(default)]
    pub fan_out: FanOutConfig,

    #[serde(default)]
    pub tracing: TracingConfig,
}

fn default_engine() -> String {
    "jinja".to_string()
}

fn default_stored_traces() -> usize {
    5
}

impl EngineConfig {
    /// Parse from an already loaded YAML value
    ///
    /// A null document yields the defaults.
    pub fn from_yaml(yaml: &Value) -> ConfigResult<Self> {
        let config: EngineConfig = match yaml {
            Value::Null => EngineConfig::default(),
            Value::Mapping(_) => {
                serde_yaml::from_value(yaml.clone()).map_err(|e| ConfigError::InvalidValue {
                    key: "engine".to_string(),
                    reason: e.to_string(),
                })?
            }
            _ => {
                return Err(ConfigError::InvalidValue {
                    key: "root".to_string(),
                    reason: "configuration must be a mapping".to_string(),
                })
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Parse from YAML text, resolving includes against the working directory
    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        let value = load_yaml_string(".", content, "engine.yaml")?;
        Self::from_yaml(&value)
    }

    /// Load from a YAML file
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Loading engine configuration");

        let base_dir = path.parent().unwrap_or(Path::new("."));
        let file = path.file_name().map(Path::new).unwrap_or(path);
        let value = load_yaml(base_dir, file)?;
        Self::from_yaml(&value)
    }

    /// Check values serde cannot express
    pub fn validate(&self) -> ConfigResult<()> {
        if self.template.default_engine.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "template.default_engine".to_string(),
                reason: "engine name must not be empty".to_string(),
            });
        }

        if self.fan_out.max_concurrency == Some(0) {
            return Err(ConfigError::InvalidValue {
                key: "fan_out.max_concurrency".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(())
    }
}
