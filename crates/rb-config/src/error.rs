//! Configuration errors

use std::path::PathBuf;
use thiserror::Error;

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Why an engine configuration or definition file could not be loaded
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed YAML in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `!include` target does not exist
    #[error("included file not found: {path}")]
    IncludeNotFound { path: PathBuf },

    /// A file includes itself, directly or through other files
    #[error("circular include of {path}")]
    CircularInclude { path: PathBuf },

    #[error("environment variable '{var}' not set")]
    EnvVarNotFound { var: String },

    #[error("unsupported YAML tag {tag}")]
    UnsupportedTag { tag: String },

    /// Tag argument has the wrong shape, e.g. a mapping after `!include`
    #[error("{tag} expects {expected}")]
    TagArgument { tag: &'static str, expected: &'static str },

    /// A setting is out of range or has the wrong type
    #[error("invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },
}
