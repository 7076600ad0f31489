//! Platform constraints and host matching.
//!
//! Catalog entries may spell operating systems and architectures either the
//! Go way (`darwin`, `amd64`, `arm64`) or the Rust way (`macos`, `x86_64`,
//! `aarch64`). Both sides are normalized before comparison.

use serde::{Deserialize, Serialize};

/// OS/architecture allow-list. An empty list places no restriction on that axis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub os: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arch: Vec<String>,
}

impl Platform {
    /// Restrict to the given operating systems.
    pub fn os(names: &[&str]) -> Self {
        Self {
            os: names.iter().map(|s| s.to_string()).collect(),
            arch: Vec::new(),
        }
    }

    pub fn with_arch(mut self, names: &[&str]) -> Self {
        self.arch = names.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn is_unconstrained(&self) -> bool {
        self.os.is_empty() && self.arch.is_empty()
    }

    /// Whether the constraint admits the given OS and architecture.
    pub fn matches(&self, os: &str, arch: &str) -> bool {
        axis_matches(&self.os, os, normalize_os) && axis_matches(&self.arch, arch, normalize_arch)
    }

    pub fn matches_host(&self, host: &HostPlatform) -> bool {
        self.matches(&host.os, &host.arch)
    }
}

fn axis_matches(allowed: &[String], current: &str, normalize: fn(&str) -> String) -> bool {
    if allowed.is_empty() {
        return true;
    }
    let current = normalize(current);
    allowed.iter().any(|a| normalize(a) == current)
}

/// Canonical OS name (Rust spelling, lowercase).
pub fn normalize_os(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    match lower.as_str() {
        "darwin" | "osx" | "mac" => "macos".to_string(),
        _ => lower,
    }
}

/// Canonical architecture name (Rust spelling, lowercase).
pub fn normalize_arch(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    match lower.as_str() {
        "amd64" | "x64" => "x86_64".to_string(),
        "arm64" => "aarch64".to_string(),
        "386" | "i386" | "i686" => "x86".to_string(),
        _ => lower,
    }
}

/// The OS and architecture detection runs against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostPlatform {
    pub os: String,
    pub arch: String,
}

impl HostPlatform {
    /// The platform this binary was built for.
    pub fn current() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
        }
    }

    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }
}

impl std::fmt::Display for HostPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_unconstrained_matches_everything() {
        let p = Platform::default();
        assert!(p.matches("linux", "x86_64"));
        assert!(p.matches("windows", "aarch64"));
    }

    #[test]
    fn test_os_only_constraint() {
        let p = Platform::os(&["darwin"]);
        assert!(p.matches("macos", "aarch64"));
        assert!(p.matches("macos", "x86_64"));
        assert!(!p.matches("linux", "aarch64"));
    }

    #[test]
    fn test_both_axes_must_match() {
        let p = Platform::os(&["linux"]).with_arch(&["arm64"]);
        assert!(p.matches("linux", "aarch64"));
        assert!(!p.matches("linux", "x86_64"));
        assert!(!p.matches("macos", "aarch64"));
    }

    #[test]
    fn test_arch_aliases() {
        let p = Platform::default().with_arch(&["amd64"]);
        assert!(p.matches("linux", "x86_64"));
        assert!(p.matches("linux", "AMD64"));
    }

    #[test]
    fn test_current_host_is_populated() {
        let host = HostPlatform::current();
        assert!(!host.os.is_empty());
        assert!(!host.arch.is_empty());
        assert!(Platform::default().matches_host(&host));
    }

    proptest! {
        #[test]
        fn prop_listing_the_host_always_matches(os in "[a-z]{1,8}", arch in "[a-z0-9_]{1,8}") {
            let p = Platform::os(&[os.as_str()]).with_arch(&[arch.as_str()]);
            prop_assert!(p.matches(&os, &arch));
        }
    }
}
