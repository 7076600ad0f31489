//! Host facts reported alongside capability detection.

use crate::probe::runner::run_with_timeout;
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Duration;
use tracing::trace;

/// Deadline for each `--version` query.
pub const RUNTIME_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentInfo {
    pub os: String,
    pub arch: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kernel_release: Option<String>,
    pub runtimes: RuntimeVersions,
}

/// Versions of common runtimes; `None` when not installed or not answering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeVersions {
    pub node: Option<String>,
    pub python: Option<String>,
    pub go: Option<String>,
}

/// Collect host facts. `python` is the interpreter used for module probes.
pub fn detect_environment(python: &str) -> EnvironmentInfo {
    let (hostname, kernel_release) = uname_fields();
    EnvironmentInfo {
        os: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
        hostname,
        home: dirs::home_dir().map(|h| h.display().to_string()),
        kernel_release,
        runtimes: detect_runtimes(python),
    }
}

/// Query node, python and go concurrently.
pub fn detect_runtimes(python: &str) -> RuntimeVersions {
    thread::scope(|s| {
        let node = s.spawn(|| version_line("node", &["--version"]).map(|v| parse_node_version(&v)));
        let py = s.spawn(|| version_line(python, &["--version"]).map(|v| parse_python_version(&v)));
        let go = s.spawn(|| version_line("go", &["version"]).and_then(|v| parse_go_version(&v)));
        RuntimeVersions {
            node: node.join().ok().flatten(),
            python: py.join().ok().flatten(),
            go: go.join().ok().flatten(),
        }
    })
}

fn version_line(program: &str, args: &[&str]) -> Option<String> {
    match run_with_timeout(program, args, RUNTIME_PROBE_TIMEOUT) {
        Ok(out) if out.success() => out.first_line(),
        Ok(out) => {
            trace!(program, exit_code = ?out.exit_code, "version query failed");
            None
        }
        Err(e) => {
            trace!(program, error = %e, "version query failed");
            None
        }
    }
}

fn parse_node_version(line: &str) -> String {
    line.trim().to_string()
}

fn parse_python_version(line: &str) -> String {
    line.trim().trim_start_matches("Python ").to_string()
}

/// `go version go1.22.1 darwin/arm64` → `1.22.1`
fn parse_go_version(line: &str) -> Option<String> {
    line.split_whitespace()
        .nth(2)
        .map(|v| v.trim_start_matches("go").to_string())
}

#[cfg(unix)]
fn uname_fields() -> (Option<String>, Option<String>) {
    let mut uname = std::mem::MaybeUninit::<libc::utsname>::uninit();
    // SAFETY: uname fills the struct on success; we only read it then.
    let result = unsafe { libc::uname(uname.as_mut_ptr()) };
    if result != 0 {
        return (None, None);
    }
    let uname = unsafe { uname.assume_init() };
    let field = |raw: &[libc::c_char]| {
        let text = unsafe { std::ffi::CStr::from_ptr(raw.as_ptr()) }
            .to_string_lossy()
            .trim()
            .to_string();
        (!text.is_empty()).then_some(text)
    };
    (field(&uname.nodename), field(&uname.release))
}

#[cfg(not(unix))]
fn uname_fields() -> (Option<String>, Option<String>) {
    (std::env::var("COMPUTERNAME").ok(), None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_versions() {
        assert_eq!(parse_node_version("v20.11.0\n"), "v20.11.0");
        assert_eq!(parse_python_version("Python 3.12.2"), "3.12.2");
        assert_eq!(
            parse_go_version("go version go1.22.1 darwin/arm64").as_deref(),
            Some("1.22.1")
        );
        assert_eq!(parse_go_version("go version"), None);
    }

    #[test]
    fn test_environment_has_host_platform() {
        let env = detect_environment("definitely-not-python-xyz");
        assert_eq!(env.os, std::env::consts::OS);
        assert_eq!(env.arch, std::env::consts::ARCH);
        assert!(env.runtimes.python.is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_uname_reports_release() {
        let (_, release) = uname_fields();
        assert!(release.is_some());
    }
}
