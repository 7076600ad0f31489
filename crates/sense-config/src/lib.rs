//! kuro-sense configuration loading and validation.
//!
//! This crate provides:
//! - The typed `sense.toml` settings model
//! - Config resolution (CLI → env → XDG → defaults)
//! - Semantic validation of probe timeouts and worker counts

pub mod resolve;
pub mod settings;
pub mod validate;

pub use resolve::{resolve_config_path, ConfigSource, ResolvedPath};
pub use settings::{load_settings, ConfigError, LoadedSettings, Settings};
pub use validate::{validate_settings, ValidationError};

/// File name of the settings file inside a config directory.
pub const SETTINGS_FILENAME: &str = "sense.toml";
