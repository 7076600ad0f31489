//! Capability catalog entries and detection results.
//!
//! A [`Capability`] is one perception plugin an agent may run. It declares the
//! external resources it needs as an ordered list of [`Dependency`] values.
//! Detection turns a capability into a [`DetectionResult`] that records
//! whether the plugin can run, and what is missing if not.

use crate::platform::Platform;
use serde::{Deserialize, Serialize};

/// Plugin timeout applied when a capability declares `timeout_ms == 0`.
pub const DEFAULT_PLUGIN_TIMEOUT_MS: u64 = 10_000;

/// Perception plugin category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Workspace,
    Chrome,
    Telegram,
    Heartbeat,
}

impl Category {
    /// All categories in display order.
    pub const ALL: [Category; 4] = [
        Category::Workspace,
        Category::Chrome,
        Category::Telegram,
        Category::Heartbeat,
    ];

    /// Title-cased label for human output.
    pub fn label(self) -> &'static str {
        match self {
            Category::Workspace => "Workspace",
            Category::Chrome => "Chrome",
            Category::Telegram => "Telegram",
            Category::Heartbeat => "Heartbeat",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Workspace => write!(f, "workspace"),
            Category::Chrome => write!(f, "chrome"),
            Category::Telegram => write!(f, "telegram"),
            Category::Heartbeat => write!(f, "heartbeat"),
        }
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "workspace" => Ok(Category::Workspace),
            "chrome" => Ok(Category::Chrome),
            "telegram" => Ok(Category::Telegram),
            "heartbeat" => Ok(Category::Heartbeat),
            _ => Err(format!("unknown category: {}", s)),
        }
    }
}

/// What kind of probe decides whether a dependency is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    /// Executable resolvable on `PATH`.
    Binary,
    /// TCP service listening at `host:port`.
    Service,
    /// File or directory on the local filesystem.
    File,
    /// Non-empty environment variable.
    #[serde(rename = "envvar")]
    EnvVar,
    /// Python module importable by the configured interpreter.
    Python,
}

impl std::fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DependencyKind::Binary => write!(f, "binary"),
            DependencyKind::Service => write!(f, "service"),
            DependencyKind::File => write!(f, "file"),
            DependencyKind::EnvVar => write!(f, "envvar"),
            DependencyKind::Python => write!(f, "python"),
        }
    }
}

/// How an external installer should obtain a dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallMethod {
    Brew,
    Apt,
    Pip,
    Manual,
}

impl std::fmt::Display for InstallMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstallMethod::Brew => write!(f, "brew"),
            InstallMethod::Apt => write!(f, "apt"),
            InstallMethod::Pip => write!(f, "pip"),
            InstallMethod::Manual => write!(f, "manual"),
        }
    }
}

/// Installation hint attached to a dependency.
///
/// The engine never runs installers itself; hints are handed to whatever
/// component does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallHint {
    pub method: InstallMethod,

    /// Package identifier for the package manager (empty for manual installs).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub package: String,

    /// Fallback shell command for manual installation.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub command: String,
}

impl InstallHint {
    pub fn brew(package: impl Into<String>) -> Self {
        Self {
            method: InstallMethod::Brew,
            package: package.into(),
            command: String::new(),
        }
    }

    pub fn apt(package: impl Into<String>) -> Self {
        Self {
            method: InstallMethod::Apt,
            package: package.into(),
            command: String::new(),
        }
    }

    pub fn pip(package: impl Into<String>) -> Self {
        Self {
            method: InstallMethod::Pip,
            package: package.into(),
            command: String::new(),
        }
    }

    pub fn manual(command: impl Into<String>) -> Self {
        Self {
            method: InstallMethod::Manual,
            package: String::new(),
            command: command.into(),
        }
    }

    /// One-line description, e.g. `brew install jq`.
    pub fn describe(&self) -> String {
        match self.method {
            InstallMethod::Brew => format!("brew install {}", self.package),
            InstallMethod::Apt => format!("sudo apt-get install -y {}", self.package),
            InstallMethod::Pip => format!("pip3 install {}", self.package),
            InstallMethod::Manual if !self.command.is_empty() => self.command.clone(),
            InstallMethod::Manual => "manual installation required".to_string(),
        }
    }
}

/// A prerequisite of a capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    pub kind: DependencyKind,

    /// Probe target: binary name, `host:port`, path, variable or module name.
    pub check: String,

    /// Required dependencies gate availability; optional ones only degrade.
    pub required: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install: Option<InstallHint>,
}

impl Dependency {
    pub fn new(
        name: impl Into<String>,
        kind: DependencyKind,
        check: impl Into<String>,
        required: bool,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            check: check.into(),
            required,
            install: None,
        }
    }

    /// Binary dependency whose probe target is its own name.
    pub fn binary(name: &str, required: bool) -> Self {
        Self::new(name, DependencyKind::Binary, name, required)
    }

    /// TCP service dependency.
    pub fn service(name: &str, addr: &str, required: bool) -> Self {
        Self::new(name, DependencyKind::Service, addr, required)
    }

    /// Environment variable dependency whose probe target is its own name.
    pub fn env_var(name: &str, required: bool) -> Self {
        Self::new(name, DependencyKind::EnvVar, name, required)
    }

    /// Python module dependency whose probe target is its own name.
    pub fn python(name: &str, required: bool) -> Self {
        Self::new(name, DependencyKind::Python, name, required)
    }

    /// Local file dependency.
    pub fn file(name: &str, path: &str, required: bool) -> Self {
        Self::new(name, DependencyKind::File, path, required)
    }

    pub fn with_install(mut self, hint: InstallHint) -> Self {
        self.install = Some(hint);
        self
    }
}

/// Full definition of a perception plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    pub name: String,

    /// Script the plugin runs, e.g. `./plugins/docker-status.sh`.
    pub script: String,

    pub description: String,
    pub category: Category,

    #[serde(default)]
    pub dependencies: Vec<Dependency>,

    #[serde(default, skip_serializing_if = "Platform::is_unconstrained")]
    pub platform: Platform,

    /// Plugin timeout in milliseconds; 0 means [`DEFAULT_PLUGIN_TIMEOUT_MS`].
    #[serde(default)]
    pub timeout_ms: u64,

    pub default_enabled: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl Capability {
    pub fn new(
        name: impl Into<String>,
        script: impl Into<String>,
        description: impl Into<String>,
        category: Category,
    ) -> Self {
        Self {
            name: name.into(),
            script: script.into(),
            description: description.into(),
            category,
            dependencies: Vec::new(),
            platform: Platform::default(),
            timeout_ms: 0,
            default_enabled: false,
            tags: Vec::new(),
        }
    }

    pub fn enabled_by_default(mut self) -> Self {
        self.default_enabled = true;
        self
    }

    pub fn with_dependency(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    /// Timeout with the implementation default applied.
    pub fn effective_timeout_ms(&self) -> u64 {
        if self.timeout_ms == 0 {
            DEFAULT_PLUGIN_TIMEOUT_MS
        } else {
            self.timeout_ms
        }
    }

    pub fn required_dependencies(&self) -> impl Iterator<Item = &Dependency> {
        self.dependencies.iter().filter(|d| d.required)
    }
}

/// Coarse classification of a detection result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityStatus {
    Available,
    Degraded,
    Unavailable,
}

impl std::fmt::Display for CapabilityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CapabilityStatus::Available => write!(f, "available"),
            CapabilityStatus::Degraded => write!(f, "degraded"),
            CapabilityStatus::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// Outcome of checking one capability against the environment.
///
/// `degraded` is only ever true when `available` is true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub capability: Capability,

    /// Platform matched and no required dependency is absent.
    pub available: bool,

    /// Available, but at least one optional dependency is absent.
    pub degraded: bool,

    /// Absent dependencies, required and optional, in catalog order.
    pub missing_dependencies: Vec<Dependency>,
}

impl DetectionResult {
    /// Result for a capability whose platform constraint excludes the host.
    pub fn platform_mismatch(capability: Capability) -> Self {
        Self {
            capability,
            available: false,
            degraded: false,
            missing_dependencies: Vec::new(),
        }
    }

    /// Classify a capability from the dependencies found absent.
    ///
    /// `missing` must be in catalog order; the platform is assumed to match.
    pub fn classify(capability: Capability, missing: Vec<Dependency>) -> Self {
        let available = !missing.iter().any(|d| d.required);
        let degraded = available && !missing.is_empty();
        Self {
            capability,
            available,
            degraded,
            missing_dependencies: missing,
        }
    }

    pub fn status(&self) -> CapabilityStatus {
        match (self.available, self.degraded) {
            (true, false) => CapabilityStatus::Available,
            (true, true) => CapabilityStatus::Degraded,
            (false, _) => CapabilityStatus::Unavailable,
        }
    }

    pub fn name(&self) -> &str {
        &self.capability.name
    }

    /// Names of the missing dependencies.
    pub fn missing_names(&self) -> Vec<&str> {
        self.missing_dependencies
            .iter()
            .map(|d| d.name.as_str())
            .collect()
    }
}
