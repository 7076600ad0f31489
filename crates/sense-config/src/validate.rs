//! Semantic validation of settings.

use crate::settings::Settings;
use thiserror::Error;

/// Settings validation errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl ValidationError {
    fn invalid(field: &str, message: &str) -> Self {
        ValidationError::InvalidValue {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

/// Validate settings semantically.
pub fn validate_settings(settings: &Settings) -> Result<(), ValidationError> {
    if settings.max_parallel == 0 {
        return Err(ValidationError::invalid(
            "max_parallel",
            "must be at least 1",
        ));
    }
    if settings.compose_file.trim().is_empty() {
        return Err(ValidationError::invalid("compose_file", "must not be empty"));
    }
    if settings.python.trim().is_empty() {
        return Err(ValidationError::invalid("python", "must not be empty"));
    }

    for (field, value) in [
        ("local_service_timeout_ms", settings.local_service_timeout_ms),
        ("remote_service_timeout_ms", settings.remote_service_timeout_ms),
        ("module_probe_timeout_ms", settings.module_probe_timeout_ms),
    ] {
        if value == 0 {
            return Err(ValidationError::invalid(field, "timeout must be positive"));
        }
    }

    Ok(())
}
