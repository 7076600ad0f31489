//! Short-lived child processes with a hard deadline.
//!
//! Used for python import probes and runtime `--version` queries. The child
//! is polled with `try_wait` until the deadline, then terminated with
//! SIGTERM and, if it lingers, SIGKILL.

use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Grace period between SIGTERM and SIGKILL in milliseconds.
const SIGTERM_GRACE_MS: u64 = 100;

/// Poll interval while waiting for the child.
const POLL_INTERVAL_MS: u64 = 10;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to spawn {program}: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} did not finish within {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    #[error("failed to wait for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct RunOutput {
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub duration: Duration,
}

impl RunOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// First non-empty line of stdout, falling back to stderr.
    pub fn first_line(&self) -> Option<String> {
        [&self.stdout, &self.stderr].iter().find_map(|buf| {
            String::from_utf8_lossy(buf)
                .lines()
                .map(str::trim)
                .find(|l| !l.is_empty())
                .map(str::to_string)
        })
    }
}

/// Run `program args…` and wait at most `timeout` for it to exit.
pub fn run_with_timeout(
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<RunOutput, RunError> {
    let start = Instant::now();
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| RunError::SpawnFailed {
            program: program.to_string(),
            source: e,
        })?;

    let stdout = child.stdout.take().map(spawn_reader);
    let stderr = child.stderr.take().map(spawn_reader);

    let deadline = start + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                debug!(program, ?timeout, "probe deadline reached, terminating");
                terminate(&mut child);
                return Err(RunError::Timeout {
                    program: program.to_string(),
                    timeout,
                });
            }
            Ok(None) => thread::sleep(Duration::from_millis(POLL_INTERVAL_MS)),
            Err(e) => {
                terminate(&mut child);
                return Err(RunError::Wait {
                    program: program.to_string(),
                    source: e,
                });
            }
        }
    };

    let output = RunOutput {
        exit_code: status.code(),
        stdout: stdout.and_then(|h| h.join().ok()).unwrap_or_default(),
        stderr: stderr.and_then(|h| h.join().ok()).unwrap_or_default(),
        duration: start.elapsed(),
    };
    trace!(program, exit_code = ?output.exit_code, elapsed = ?output.duration, "process exited");
    Ok(output)
}

fn spawn_reader<R: Read + Send + 'static>(mut stream: R) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stream.read_to_end(&mut buf);
        buf
    })
}

#[cfg(unix)]
fn terminate(child: &mut Child) {
    let pid = child.id() as i32;

    // SAFETY: pid belongs to a child we spawned and have not yet reaped.
    unsafe {
        libc::kill(pid, libc::SIGTERM);
    }
    thread::sleep(Duration::from_millis(SIGTERM_GRACE_MS));

    match child.try_wait() {
        Ok(Some(_)) => trace!(pid, "process exited after SIGTERM"),
        _ => {
            warn!(pid, "process did not exit after SIGTERM, sending SIGKILL");
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_captures_stdout() {
        let out = run_with_timeout("sh", &["-c", "echo hello"], Duration::from_secs(5)).unwrap();
        assert!(out.success());
        assert_eq!(out.first_line().as_deref(), Some("hello"));
    }

    #[test]
    fn test_falls_back_to_stderr() {
        let out =
            run_with_timeout("sh", &["-c", "echo v1.2 >&2"], Duration::from_secs(5)).unwrap();
        assert_eq!(out.first_line().as_deref(), Some("v1.2"));
    }

    #[test]
    fn test_nonzero_exit() {
        let out = run_with_timeout("sh", &["-c", "exit 3"], Duration::from_secs(5)).unwrap();
        assert_eq!(out.exit_code, Some(3));
        assert!(!out.success());
    }

    #[test]
    fn test_deadline_kills_child() {
        let start = Instant::now();
        let err = run_with_timeout("sleep", &["10"], Duration::from_millis(100)).unwrap_err();
        assert!(matches!(err, RunError::Timeout { .. }));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_missing_program() {
        let err = run_with_timeout(
            "definitely-not-a-real-program-xyz",
            &[],
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert!(matches!(err, RunError::SpawnFailed { .. }));
    }
}
