//! YAML loading with `!include` and `!env_var` tags
//!
//! Engine configuration can be split across files:
//!
//! - `!include path` - Include another YAML file
//! - `!env_var VAR` - Environment variable substitution

use crate::error::{ConfigError, ConfigResult};
use serde_yaml::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// YAML loader resolving custom tags relative to a base directory
pub struct YamlLoader {
    /// Base directory for resolving relative paths
    base_dir: PathBuf,
    /// Track included files to detect circular includes
    include_stack: HashSet<PathBuf>,
}

impl YamlLoader {
    /// Create a new YAML loader for the given base directory
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            include_stack: HashSet::new(),
        }
    }

    /// Load and process a YAML file
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> ConfigResult<Value> {
        let path = self.resolve_path(path.as_ref());
        debug!(path = %path.display(), "Loading YAML file");

        if self.include_stack.contains(&path) {
            return Err(ConfigError::CircularInclude { path });
        }

        let content = fs::read_to_string(&path).map_err(|e| ConfigError::Io {
            path: path.clone(),
            source: e,
        })?;

        self.include_stack.insert(path.clone());
        let result = self.load_string(&content, &path);
        self.include_stack.remove(&path);

        result
    }

    /// Load and process YAML from a string
    pub fn load_string(&mut self, content: &str, source_path: &Path) -> ConfigResult<Value> {
        let value: Value = serde_yaml::from_str(content).map_err(|e| ConfigError::Yaml {
            path: source_path.to_path_buf(),
            source: e,
        })?;

        self.process_value(value, source_path)
    }

    fn process_value(&mut self, value: Value, source_path: &Path) -> ConfigResult<Value> {
        match value {
            Value::Tagged(tagged) => self.process_tagged(*tagged, source_path),
            Value::Mapping(map) => {
                let mut result = serde_yaml::Mapping::new();
                for (k, v) in map {
                    let processed = self.process_value(v, source_path)?;
                    result.insert(k, processed);
                }
                Ok(Value::Mapping(result))
            }
            Value::Sequence(seq) => {
                let result: ConfigResult<Vec<Value>> = seq
                    .into_iter()
                    .map(|v| self.process_value(v, source_path))
                    .collect();
                Ok(Value::Sequence(result?))
            }
            _ => Ok(value),
        }
    }

    fn process_tagged(
        &mut self,
        tagged: serde_yaml::value::TaggedValue,
        source_path: &Path,
    ) -> ConfigResult<Value> {
        let tag = tagged.tag.to_string();
        trace!(tag = %tag, "Processing tag");

        match tag.as_str() {
            "!include" => self.process_include(&tagged.value, source_path),
            "!env_var" => process_env_var(&tagged.value),
            _ => Err(ConfigError::UnsupportedTag { tag }),
        }
    }

    fn process_include(&mut self, value: &Value, source_path: &Path) -> ConfigResult<Value> {
        let Value::String(relative) = value else {
            return Err(ConfigError::TagArgument {
                tag: "!include",
                expected: "a file path",
            });
        };

        // Relative to the including file
        let base = source_path.parent().unwrap_or(&self.base_dir);
        let path = if Path::new(relative).is_absolute() {
            PathBuf::from(relative)
        } else {
            base.join(relative)
        };

        if !path.is_file() {
            return Err(ConfigError::IncludeNotFound { path });
        }

        debug!(path = %path.display(), "Including file");
        self.load_file(path)
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Get the base directory
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

fn process_env_var(value: &Value) -> ConfigResult<Value> {
    let Value::String(var) = value else {
        return Err(ConfigError::TagArgument {
            tag: "!env_var",
            expected: "a variable name",
        });
    };

    let env_value =
        std::env::var(var).map_err(|_| ConfigError::EnvVarNotFound { var: var.clone() })?;

    debug!(var = %var, "Substituted env var");
    Ok(Value::String(env_value))
}

/// Load a YAML file with tag processing
pub fn load_yaml(base_dir: impl Into<PathBuf>, file: impl AsRef<Path>) -> ConfigResult<Value> {
    YamlLoader::new(base_dir).load_file(file)
}

/// Load a YAML string with tag processing
pub fn load_yaml_string(
    base_dir: impl Into<PathBuf>,
    content: &str,
    source_name: &str,
) -> ConfigResult<Value> {
    let base_dir = base_dir.into();
    let source = base_dir.join(source_name);
    YamlLoader::new(base_dir).load_string(content, &source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &Path, name: &str, content: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let mut file = fs::File::create(path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    fn key(name: &str) -> Value {
        Value::String(name.to_string())
    }

    #[test]
    fn test_load_simple_yaml() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "engine.yaml", "dispatch:\n  failure_policy: isolate\n");

        let value = load_yaml(dir.path(), "engine.yaml").unwrap();
        assert!(value.is_mapping());
    }

    #[test]
    fn test_include_relative_to_including_file() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "parts/dispatch.yaml", "failure_policy: propagate\n");
        write_file(dir.path(), "parts/main.yaml", "dispatch: !include dispatch.yaml\n");

        let value = load_yaml(dir.path(), "parts/main.yaml").unwrap();
        let dispatch = value.as_mapping().unwrap().get(key("dispatch")).unwrap();
        assert_eq!(
            dispatch.as_mapping().unwrap().get(key("failure_policy")),
            Some(&key("propagate"))
        );
    }

    #[test]
    fn test_missing_include() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "engine.yaml", "dispatch: !include nope.yaml\n");

        let err = load_yaml(dir.path(), "engine.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::IncludeNotFound { .. }));
    }

    #[test]
    fn test_circular_include() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "a.yaml", "b: !include b.yaml\n");
        write_file(dir.path(), "b.yaml", "a: !include a.yaml\n");

        let err = load_yaml(dir.path(), "a.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::CircularInclude { .. }));
    }

    #[test]
    fn test_env_var() {
        std::env::set_var("TEST_RB_CONFIG_ENGINE", "jinja");

        let value = load_yaml_string(
            ".",
            "default_engine: !env_var TEST_RB_CONFIG_ENGINE\n",
            "inline.yaml",
        )
        .unwrap();
        assert_eq!(
            value.as_mapping().unwrap().get(key("default_engine")),
            Some(&key("jinja"))
        );

        std::env::remove_var("TEST_RB_CONFIG_ENGINE");
    }

    #[test]
    fn test_missing_env_var() {
        let err = load_yaml_string(".", "x: !env_var TEST_RB_CONFIG_UNSET\n", "inline.yaml")
            .unwrap_err();
        assert!(matches!(err, ConfigError::EnvVarNotFound { .. }));
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let err = load_yaml_string(".", "x: !secret token\n", "inline.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedTag { tag } if tag == "!secret"));
    }
}
