//! Dependency probes against the live environment.
//!
//! A probe answers one question: is this dependency present? Every failure
//! (spawn error, timeout, refused connection, bad input) means "absent" and
//! is only visible in trace logs.

pub mod network;
pub mod runner;

use sense_common::{Dependency, DependencyKind};
use sense_config::Settings;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::trace;

/// Answers whether a dependency is present.
///
/// Implementations are shared across detection worker threads.
pub trait DependencyChecker: Sync {
    fn check(&self, dependency: &Dependency) -> bool;
}

impl<T: DependencyChecker + ?Sized> DependencyChecker for &T {
    fn check(&self, dependency: &Dependency) -> bool {
        (**self).check(dependency)
    }
}

/// Probe timeouts and interpreter used by [`SystemChecker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    pub python: String,
    pub local_service_timeout: Duration,
    pub remote_service_timeout: Duration,
    pub module_probe_timeout: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for ProbeConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            python: settings.python.clone(),
            local_service_timeout: settings.local_service_timeout(),
            remote_service_timeout: settings.remote_service_timeout(),
            module_probe_timeout: settings.module_probe_timeout(),
        }
    }
}

/// Probes the real machine.
#[derive(Debug, Clone, Default)]
pub struct SystemChecker {
    config: ProbeConfig,
}

impl SystemChecker {
    pub fn new(config: ProbeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }
}

impl DependencyChecker for SystemChecker {
    fn check(&self, dependency: &Dependency) -> bool {
        let target = dependency.check.as_str();
        let present = match dependency.kind {
            DependencyKind::Binary => find_in_path(target).is_some(),
            DependencyKind::Service => network::service_reachable(
                target,
                self.config.local_service_timeout,
                self.config.remote_service_timeout,
            ),
            DependencyKind::File => file_exists(target),
            DependencyKind::EnvVar => has_env_var(target),
            DependencyKind::Python => python_module_importable(
                &self.config.python,
                target,
                self.config.module_probe_timeout,
            ),
        };
        trace!(
            dependency = %dependency.name,
            kind = %dependency.kind,
            target,
            present,
            "probed dependency"
        );
        present
    }
}

/// Resolve `name` against `PATH`. Names containing a separator are checked
/// directly.
pub fn find_in_path(name: &str) -> Option<PathBuf> {
    if name.is_empty() {
        return None;
    }
    if name.contains(std::path::MAIN_SEPARATOR) {
        let path = PathBuf::from(name);
        return is_executable(&path).then_some(path);
    }
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    if path.is_file() {
        return true;
    }
    ["exe", "cmd", "bat"]
        .iter()
        .any(|ext| path.with_extension(ext).is_file())
}

/// Set and non-empty.
pub fn has_env_var(name: &str) -> bool {
    std::env::var_os(name).is_some_and(|v| !v.is_empty())
}

/// Whether `path` exists. A leading `~/` expands to the home directory.
pub fn file_exists(path: &str) -> bool {
    expand_home(path).is_some_and(|p| p.exists())
}

fn expand_home(path: &str) -> Option<PathBuf> {
    if path == "~" {
        return dirs::home_dir();
    }
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir().map(|home| home.join(rest)),
        None => Some(PathBuf::from(path)),
    }
}

/// Dotted python identifiers only; anything else never reaches a shell.
pub fn is_valid_module_name(module: &str) -> bool {
    !module.is_empty()
        && module.split('.').all(|part| {
            let mut chars = part.chars();
            matches!(chars.next(), Some(c) if c == '_' || c.is_ascii_alphabetic())
                && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
        })
}

/// `python -c "import <module>"` exits successfully before the deadline.
pub fn python_module_importable(python: &str, module: &str, timeout: Duration) -> bool {
    if !is_valid_module_name(module) {
        trace!(module, "rejected invalid python module name");
        return false;
    }
    let code = format!("import {}", module);
    match runner::run_with_timeout(python, &["-c", &code], timeout) {
        Ok(output) => output.success(),
        Err(e) => {
            trace!(module, error = %e, "python import probe failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_name_validation() {
        assert!(is_valid_module_name("ocrmac"));
        assert!(is_valid_module_name("os.path"));
        assert!(is_valid_module_name("_private"));
        assert!(!is_valid_module_name(""));
        assert!(!is_valid_module_name("os; rm -rf /"));
        assert!(!is_valid_module_name("1abc"));
        assert!(!is_valid_module_name("a..b"));
    }

    #[test]
    fn test_empty_binary_name_is_absent() {
        assert!(find_in_path("").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_sh_is_on_path() {
        assert!(find_in_path("sh").is_some());
    }

    #[cfg(unix)]
    #[test]
    fn test_non_executable_file_is_not_a_binary() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("plain");
        std::fs::write(&path, "x").unwrap();
        assert!(!is_executable(&path));
    }

    #[test]
    fn test_file_exists() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("present");
        std::fs::write(&path, "x").unwrap();
        assert!(file_exists(path.to_str().unwrap()));
        assert!(!file_exists(dir.path().join("absent").to_str().unwrap()));
    }

    #[test]
    fn test_invalid_module_never_spawns() {
        assert!(!python_module_importable(
            "definitely-not-python",
            "bad name",
            Duration::from_millis(10)
        ));
    }

    #[test]
    fn test_missing_interpreter_is_absent() {
        assert!(!python_module_importable(
            "definitely-not-python-xyz",
            "os",
            Duration::from_millis(500)
        ));
    }

    #[test]
    fn test_system_checker_env_var() {
        let checker = SystemChecker::default();
        let dep = Dependency::env_var("KURO_SENSE_TEST_SURELY_UNSET_VAR", true);
        assert!(!checker.check(&dep));
    }
}
