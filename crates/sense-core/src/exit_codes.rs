//! Exit codes for the kuro-sense CLI.
//!
//! Exit code ranges:
//! - 0-9: Operational outcomes (parse outcome from code, not output)
//! - 10-19: User/environment errors (recoverable by user action)
//! - 20-29: Internal errors (bugs, should be reported)

use crate::compose::ComposeError;
use crate::reconcile::ReconcileError;
use sense_config::ConfigError;

/// Exit codes for kuro-sense operations.
///
/// These codes are a stable contract for automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success: nothing left to do.
    Clean = 0,

    /// Dry run found changes that were not written.
    ChangesPending = 1,

    /// Invalid arguments or conflicting request.
    ArgsError = 10,

    /// The compose file declares no plugin list to reconcile.
    TargetMissing = 11,

    /// The compose file is not valid or uses unsupported syntax.
    DocumentError = 12,

    /// The settings file is missing or invalid.
    ConfigError = 13,

    /// Internal error (bug - please report).
    InternalError = 20,

    /// I/O error reading or writing a file.
    IoError = 21,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_success(self) -> bool {
        self == ExitCode::Clean
    }

    /// Codes below 10 communicate workflow state, not failure.
    pub fn is_operational(self) -> bool {
        (self as i32) < 10
    }

    pub fn is_user_error(self) -> bool {
        (10..20).contains(&(self as i32))
    }

    pub fn is_internal_error(self) -> bool {
        (self as i32) >= 20
    }

    /// Error code name (for JSON output).
    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Clean => "OK_CLEAN",
            ExitCode::ChangesPending => "OK_PENDING",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::TargetMissing => "ERR_TARGET_MISSING",
            ExitCode::DocumentError => "ERR_DOCUMENT",
            ExitCode::ConfigError => "ERR_CONFIG",
            ExitCode::InternalError => "ERR_INTERNAL",
            ExitCode::IoError => "ERR_IO",
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}

impl From<&ComposeError> for ExitCode {
    fn from(err: &ComposeError) -> Self {
        match err {
            ComposeError::Unreadable { .. } | ComposeError::Unwritable { .. } => ExitCode::IoError,
            ComposeError::Malformed { .. } => ExitCode::DocumentError,
        }
    }
}

impl From<&ReconcileError> for ExitCode {
    fn from(err: &ReconcileError) -> Self {
        match err {
            ReconcileError::TargetMissing { .. } => ExitCode::TargetMissing,
            ReconcileError::ConflictingRequest { .. } => ExitCode::ArgsError,
            ReconcileError::UnsupportedEntry { .. } => ExitCode::DocumentError,
            ReconcileError::Document(inner) => ExitCode::from(inner),
        }
    }
}

impl From<&ConfigError> for ExitCode {
    fn from(err: &ConfigError) -> Self {
        match err {
            ConfigError::Io { .. } => ExitCode::IoError,
            _ => ExitCode::ConfigError,
        }
    }
}
