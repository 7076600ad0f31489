//! End-to-end tests for the kuro-sense binary.
//!
//! Each test runs against a scratch agent directory and an isolated config
//! environment, and checks output plus the exit code contract.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const FIXTURE: &str = include_str!("fixtures/agent-compose.yaml");

/// Short probe timeouts so detection finishes quickly on any machine.
const FAST_SETTINGS: &str = "\
local_service_timeout_ms = 50
remote_service_timeout_ms = 50
module_probe_timeout_ms = 500
";

struct Workspace {
    agent: TempDir,
    config_home: TempDir,
}

impl Workspace {
    fn new(compose: Option<&str>) -> Self {
        let agent = TempDir::new().expect("agent dir");
        if let Some(text) = compose {
            fs::write(agent.path().join("agent-compose.yaml"), text).expect("write compose");
        }
        Self {
            agent,
            config_home: TempDir::new().expect("config home"),
        }
    }

    fn compose(&self) -> String {
        fs::read_to_string(self.agent.path().join("agent-compose.yaml")).expect("read compose")
    }

    fn settings(&self, text: &str) -> std::path::PathBuf {
        let path = self.config_home.path().join("sense.toml");
        fs::write(&path, text).expect("write settings");
        path
    }

    /// Command with config discovery pinned to this workspace.
    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("kuro-sense").expect("kuro-sense binary should exist");
        cmd.env_remove("KURO_SENSE_CONFIG")
            .env_remove("KURO_SENSE_CONFIG_DIR")
            .env_remove("KURO_SENSE_LOG")
            .env_remove("RUST_LOG")
            .env("XDG_CONFIG_HOME", self.config_home.path())
            .env("KURO_SENSE_AGENT_DIR", self.agent.path());
        cmd
    }
}

fn json_stdout(output: &[u8]) -> serde_json::Value {
    serde_json::from_slice(output).expect("stdout should be JSON")
}

// ============================================================================
// Catalog and hints
// ============================================================================

mod catalog {
    use super::*;

    #[test]
    fn lists_builtin_capabilities() {
        let ws = Workspace::new(None);
        ws.cmd()
            .arg("catalog")
            .assert()
            .success()
            .stdout(predicate::str::contains("x-feed [heartbeat]"))
            .stdout(predicate::str::contains("docker"));
    }

    #[test]
    fn json_catalog_is_an_array() {
        let ws = Workspace::new(None);
        let output = ws
            .cmd()
            .args(["catalog", "--format", "json", "--category", "telegram"])
            .output()
            .unwrap();
        assert!(output.status.success());
        let value = json_stdout(&output.stdout);
        let entries = value.as_array().expect("array");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["name"], "telegram-inbox");
    }

    #[test]
    fn unknown_category_is_rejected_by_parser() {
        let ws = Workspace::new(None);
        ws.cmd()
            .args(["catalog", "--category", "nope"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("unknown category"));
    }

    #[test]
    fn hint_prints_install_command() {
        let ws = Workspace::new(None);
        ws.cmd()
            .args(["hint", "jq"])
            .assert()
            .success()
            .stdout("brew install jq\n");
    }

    #[test]
    fn unknown_hint_exits_with_args_error() {
        let ws = Workspace::new(None);
        ws.cmd()
            .args(["hint", "no-such-tool"])
            .assert()
            .code(10)
            .stderr(predicate::str::contains("no install hint"));
    }
}

// ============================================================================
// Apply
// ============================================================================

mod apply {
    use super::*;

    #[test]
    fn dry_run_reports_pending_and_keeps_file() {
        let ws = Workspace::new(Some(FIXTURE));
        ws.cmd()
            .args(["apply", "--enable", "x-feed", "--dry-run"])
            .assert()
            .code(1)
            .stdout(predicate::str::contains("appended"))
            .stdout(predicate::str::contains("Dry run"));
        assert_eq!(ws.compose(), FIXTURE);
    }

    #[test]
    fn apply_writes_changes() {
        let ws = Workspace::new(Some(FIXTURE));
        ws.cmd()
            .args(["apply", "--enable", "x-feed,chrome", "--disable", "docker"])
            .assert()
            .success();
        let text = ws.compose();
        assert!(text.contains("        - name: x-feed\n          script: ./plugins/x-feed.sh\n"));
        assert!(text.contains("          script: ./plugins/docker-status.sh\n          enabled: false\n"));
        assert!(text.contains("# needs CDP\n          enabled: true\n"));

        // Applying again is a no-op.
        ws.cmd()
            .args(["apply", "--enable", "x-feed,chrome", "--disable", "docker", "--dry-run"])
            .assert()
            .code(0)
            .stdout(predicate::str::contains("No changes needed."));
    }

    #[test]
    fn agent_dir_flag_overrides_environment() {
        let ws = Workspace::new(None);
        let other = TempDir::new().unwrap();
        fs::write(other.path().join("agent-compose.yaml"), FIXTURE).unwrap();
        ws.cmd()
            .args(["apply", "--disable", "docker", "--agent-dir"])
            .arg(other.path())
            .assert()
            .success();
        let text = fs::read_to_string(other.path().join("agent-compose.yaml")).unwrap();
        assert!(text.contains("enabled: false\n        - name: chrome"));
    }

    #[test]
    fn missing_target_exits_11() {
        let ws = Workspace::new(Some("agents:\n  kuro:\n    port: 3001\n"));
        ws.cmd()
            .args(["apply", "--enable", "x-feed"])
            .assert()
            .code(11)
            .stderr(predicate::str::contains("no plugin list to reconcile"));
        assert_eq!(ws.compose(), "agents:\n  kuro:\n    port: 3001\n");
    }

    #[test]
    fn conflicting_request_exits_10() {
        let ws = Workspace::new(Some(FIXTURE));
        ws.cmd()
            .args(["apply", "--enable", "docker", "--disable", "docker"])
            .assert()
            .code(10)
            .stderr(predicate::str::contains("both enable and disable"));
        assert_eq!(ws.compose(), FIXTURE);
    }

    #[test]
    fn malformed_compose_exits_12() {
        let ws = Workspace::new(Some("agents:\n\tkuro: {}\n"));
        ws.cmd()
            .args(["apply", "--enable", "x-feed"])
            .assert()
            .code(12);
    }

    #[test]
    fn missing_compose_file_exits_21() {
        let ws = Workspace::new(None);
        ws.cmd()
            .args(["apply", "--enable", "x-feed"])
            .assert()
            .code(21);
    }

    #[test]
    fn json_error_envelope() {
        let ws = Workspace::new(Some("agents:\n  kuro:\n    port: 3001\n"));
        let output = ws
            .cmd()
            .args(["apply", "--enable", "x-feed", "--format", "json"])
            .output()
            .unwrap();
        assert_eq!(output.status.code(), Some(11));
        let stderr = String::from_utf8_lossy(&output.stderr);
        let start = stderr.find("{\n").expect("JSON error on stderr");
        let value: serde_json::Value = serde_json::from_str(&stderr[start..]).unwrap();
        assert_eq!(value["status"], "error");
        assert_eq!(value["error"]["code"], "ERR_TARGET_MISSING");
        assert_eq!(value["error"]["exit_code"], 11);
    }

    #[test]
    fn json_outcome_lists_changes() {
        let ws = Workspace::new(Some(FIXTURE));
        let output = ws
            .cmd()
            .args(["apply", "--disable", "docker,ghost", "-f", "json"])
            .output()
            .unwrap();
        assert!(output.status.success());
        let value = json_stdout(&output.stdout);
        assert_eq!(value["written"], true);
        assert_eq!(value["report"]["agent"], "kuro");
        let changes = value["report"]["changes"].as_array().unwrap();
        assert_eq!(changes[0]["name"], "docker");
        assert_eq!(changes[0]["kind"], "disabled");
        assert_eq!(changes[1]["kind"], "ignored");
    }
}

// ============================================================================
// Status, detect, config
// ============================================================================

mod inspect {
    use super::*;

    #[test]
    fn status_shows_first_agent_plugins() {
        let ws = Workspace::new(Some(FIXTURE));
        ws.cmd()
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("Agent: kuro"))
            .stdout(predicate::str::contains("[off] chrome"))
            .stdout(predicate::str::contains("[on ] git-detail"));
    }

    #[test]
    fn status_summary_counts_enabled() {
        let ws = Workspace::new(Some(FIXTURE));
        ws.cmd()
            .args(["status", "--format", "summary"])
            .assert()
            .success()
            .stdout("kuro: 2 of 3 plugins enabled\n");
    }

    #[test]
    fn detect_json_has_every_capability() {
        let ws = Workspace::new(None);
        let settings = ws.settings(FAST_SETTINGS);
        let output = ws
            .cmd()
            .args(["detect", "--format", "json", "--config"])
            .arg(&settings)
            .output()
            .unwrap();
        assert!(output.status.success());
        let value = json_stdout(&output.stdout);
        let capabilities = value["capabilities"].as_array().unwrap();
        assert_eq!(capabilities.len(), 27);
        assert_eq!(value["summary"]["total"], 27);
        assert_eq!(value["environment"]["os"], std::env::consts::OS);
        assert!(value["hardware"]["cameras"].is_array());
        assert!(value["network"]["internet"]["connected"].is_boolean());
        assert_eq!(value["network"]["services"].as_array().unwrap().len(), 4);
    }

    #[test]
    fn detect_category_limits_results() {
        let ws = Workspace::new(None);
        let settings = ws.settings(FAST_SETTINGS);
        ws.cmd()
            .args(["detect", "--category", "telegram", "--format", "summary", "--config"])
            .arg(&settings)
            .assert()
            .success()
            .stdout(predicate::str::contains("(1 total)"));
    }

    #[test]
    fn invalid_config_exits_13() {
        let ws = Workspace::new(None);
        let settings = ws.settings("max_parallel = 0\n");
        ws.cmd()
            .args(["catalog", "--config"])
            .arg(&settings)
            .assert()
            .code(13)
            .stderr(predicate::str::contains("invalid config"));
    }

    #[test]
    fn missing_explicit_config_exits_13() {
        let ws = Workspace::new(None);
        ws.cmd()
            .args(["catalog", "--config"])
            .arg(Path::new("/nonexistent/sense.toml"))
            .assert()
            .code(13)
            .stderr(predicate::str::contains("config file not found"));
    }

    #[test]
    fn version_prints_package_version() {
        let ws = Workspace::new(None);
        ws.cmd()
            .arg("version")
            .assert()
            .success()
            .stdout(predicate::str::starts_with("kuro-sense "));
    }
}
