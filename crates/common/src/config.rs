//! Run configuration.
//!
//! All fields have defaults, so an absent config file is the same as `{}`.
//! A config file is plain JSON; unknown keys are rejected so typos surface
//! early instead of silently falling back to defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Errors from loading or validating a [`Config`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed config {}: {source}", .path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Fixture/setup file name. Every tracked module at or below the
    /// directory holding one implicitly depends on it. `None` disables this.
    pub fixture_file: Option<String>,
    /// File name prefix identifying test files during discovery.
    pub test_prefix: String,
    /// Directory names never descended into during discovery.
    pub excluded_dirs: Vec<String>,
    /// Base directory used to shorten paths in diagnostics.
    pub base_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fixture_file: Some("conftest.py".to_string()),
            test_prefix: "test_".to_string(),
            excluded_dirs: [
                "__pycache__",
                ".git",
                "venv",
                ".venv",
                "node_modules",
                ".pytest_cache",
                "target",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            base_dir: None,
        }
    }
}

impl Config {
    /// Loads a config file, or returns the defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let cfg = match path {
            Some(path) => {
                let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                serde_json::from_str(&text).map_err(|source| ConfigError::Malformed {
                    path: path.to_path_buf(),
                    source,
                })?
            }
            None => Config::default(),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.test_prefix.is_empty() {
            return Err(ConfigError::Invalid("`test_prefix` must not be empty".into()));
        }
        if let Some(fixture) = &self.fixture_file {
            if fixture.is_empty() || fixture.contains('/') || fixture.contains('\\') {
                return Err(ConfigError::Invalid(format!(
                    "`fixture_file` must be a bare file name, got {:?}",
                    fixture
                )));
            }
        }
        if self.excluded_dirs.iter().any(|d| d.is_empty()) {
            return Err(ConfigError::Invalid(
                "`excluded_dirs` must not contain empty names".into(),
            ));
        }
        Ok(())
    }

    /// Returns `true` if a directory with this name is skipped during discovery.
    pub fn is_excluded_dir(&self, name: &str) -> bool {
        self.excluded_dirs.iter().any(|d| d == name)
    }

    /// Returns `true` if `file_name` looks like a test file.
    pub fn is_test_file_name(&self, file_name: &str) -> bool {
        file_name.starts_with(&self.test_prefix)
            && file_name.ends_with(&format!(".{}", crate::SOURCE_EXTENSION))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_validate() {
        let cfg = Config::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.fixture_file.as_deref(), Some("conftest.py"));
        assert!(cfg.is_excluded_dir("__pycache__"));
        assert!(!cfg.is_excluded_dir("src"));
    }

    #[test]
    fn test_load_none_is_default() {
        assert_eq!(Config::load(None).unwrap(), Config::default());
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"test_prefix": "check_", "fixture_file": null}}"#).unwrap();

        let cfg = Config::load(Some(file.path())).unwrap();
        assert_eq!(cfg.test_prefix, "check_");
        assert_eq!(cfg.fixture_file, None);
        // untouched fields keep their defaults
        assert_eq!(cfg.excluded_dirs, Config::default().excluded_dirs);
    }

    #[test]
    fn test_load_rejects_unknown_key() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"tset_prefix": "x"}}"#).unwrap();
        let err = Config::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::Malformed { .. }));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Some(Path::new("/no/such/incremental.json"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_invalid_values() {
        let cfg = Config {
            test_prefix: String::new(),
            ..Config::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = Config {
            fixture_file: Some("tests/conftest.py".into()),
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_is_test_file_name() {
        let cfg = Config::default();
        assert!(cfg.is_test_file_name("test_graph.py"));
        assert!(!cfg.is_test_file_name("graph.py"));
        assert!(!cfg.is_test_file_name("test_data.json"));
    }
}
