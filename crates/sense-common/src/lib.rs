//! kuro-sense common types.
//!
//! This crate provides the data shared by the detection engine, the compose
//! reconciler and the command-line front end:
//! - Capability catalog entries and their dependency descriptors
//! - Detection results and their classification
//! - Platform constraints and host matching
//! - Output format selection

pub mod capability;
pub mod output;
pub mod platform;

pub use capability::{
    Capability, CapabilityStatus, Category, Dependency, DependencyKind, DetectionResult,
    InstallHint, InstallMethod, DEFAULT_PLUGIN_TIMEOUT_MS,
};
pub use output::OutputFormat;
pub use platform::{HostPlatform, Platform};

/// Name of the compose file inside an agent project directory.
pub const COMPOSE_FILE_NAME: &str = "agent-compose.yaml";
