//! The `sense.toml` settings model and loader.

use crate::resolve::{resolve_config_path, ConfigSource};
use crate::validate::{validate_settings, ValidationError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while loading settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML in config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(#[from] ValidationError),
}

/// Tool settings. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Agent project directory holding the compose file.
    pub agent_dir: PathBuf,

    /// Compose file name inside `agent_dir`.
    pub compose_file: String,

    /// Worker threads used for detection (1 = sequential).
    pub max_parallel: usize,

    /// Interpreter used for python module probes.
    pub python: String,

    /// Connect timeout for services on the loopback interface.
    pub local_service_timeout_ms: u64,

    /// Connect timeout for all other services.
    pub remote_service_timeout_ms: u64,

    /// Deadline for a python import probe.
    pub module_probe_timeout_ms: u64,

    /// Copy the compose file aside before rewriting it.
    pub backup: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            agent_dir: PathBuf::from("."),
            compose_file: "agent-compose.yaml".to_string(),
            max_parallel: 4,
            python: "python3".to_string(),
            local_service_timeout_ms: 500,
            remote_service_timeout_ms: 2000,
            module_probe_timeout_ms: 5000,
            backup: false,
        }
    }
}

impl Settings {
    /// Parse settings from TOML text and validate them.
    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(text).map_err(|e| ConfigError::Parse {
            path: origin.to_path_buf(),
            source: e,
        })?;
        validate_settings(&settings)?;
        Ok(settings)
    }

    /// Load settings from a file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(&text, path)
    }

    /// Path of the compose file these settings point at.
    pub fn compose_path(&self) -> PathBuf {
        self.agent_dir.join(&self.compose_file)
    }

    pub fn local_service_timeout(&self) -> Duration {
        Duration::from_millis(self.local_service_timeout_ms)
    }

    pub fn remote_service_timeout(&self) -> Duration {
        Duration::from_millis(self.remote_service_timeout_ms)
    }

    pub fn module_probe_timeout(&self) -> Duration {
        Duration::from_millis(self.module_probe_timeout_ms)
    }
}

/// Settings together with where they came from.
#[derive(Debug, Clone)]
pub struct LoadedSettings {
    pub settings: Settings,
    pub path: Option<PathBuf>,
    pub source: ConfigSource,
}

/// Resolve and load settings using the standard resolution order.
pub fn load_settings(cli_path: Option<&Path>) -> Result<LoadedSettings, ConfigError> {
    let resolved = resolve_config_path(cli_path);
    let settings = match &resolved.path {
        Some(path) => Settings::from_file(path)?,
        None => Settings::default(),
    };
    Ok(LoadedSettings {
        settings,
        path: resolved.path,
        source: resolved.source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let s = Settings::default();
        assert!(validate_settings(&s).is_ok());
        assert_eq!(s.compose_path(), PathBuf::from("./agent-compose.yaml"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let s = Settings::from_toml_str("max_parallel = 8\n", Path::new("sense.toml")).unwrap();
        assert_eq!(s.max_parallel, 8);
        assert_eq!(s.python, "python3");
        assert_eq!(s.local_service_timeout(), Duration::from_millis(500));
    }

    #[test]
    fn test_unknown_field_is_parse_error() {
        let err = Settings::from_toml_str("max_paralel = 8\n", Path::new("sense.toml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_invalid_value_is_rejected() {
        let err = Settings::from_toml_str("max_parallel = 0\n", Path::new("sense.toml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let err = Settings::from_file(Path::new("/nonexistent/sense.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
        assert!(err.to_string().contains("/nonexistent/sense.toml"));
    }
}
