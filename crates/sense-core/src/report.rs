//! Human-readable rendering of command results.
//!
//! JSON output is produced directly from the serde models; this module only
//! covers the `human` and `summary` formats.

use crate::catalog::Catalog;
use crate::compose::PerceptionPlugin;
use crate::detect::{DetectionReport, DetectionSummary, HardwareDevice, HardwareInfo, NetworkInfo};
use crate::reconcile::{ApplyOutcome, ChangeKind};
use sense_common::{Capability, CapabilityStatus, Category, DetectionResult};
use std::fmt::Write;

fn status_marker(status: CapabilityStatus) -> &'static str {
    match status {
        CapabilityStatus::Available => "+",
        CapabilityStatus::Degraded => "~",
        CapabilityStatus::Unavailable => "-",
    }
}

fn describe_result(result: &DetectionResult) -> String {
    let status = result.status();
    if result.missing_dependencies.is_empty() {
        if status == CapabilityStatus::Unavailable {
            return "unavailable (platform)".to_string();
        }
        return status.to_string();
    }
    format!("{} (missing: {})", status, result.missing_names().join(", "))
}

/// Detection grouped by category.
pub fn render_detection(report: &DetectionReport) -> String {
    let mut out = String::new();
    let env = &report.environment;
    let _ = writeln!(
        out,
        "Environment: {}/{}{}",
        env.os,
        env.arch,
        env.hostname
            .as_deref()
            .map(|h| format!("  host {}", h))
            .unwrap_or_default()
    );
    let runtimes = [
        ("node", &env.runtimes.node),
        ("python", &env.runtimes.python),
        ("go", &env.runtimes.go),
    ];
    let found: Vec<String> = runtimes
        .iter()
        .filter_map(|(name, v)| v.as_ref().map(|v| format!("{} {}", name, v)))
        .collect();
    if !found.is_empty() {
        let _ = writeln!(out, "Runtimes: {}", found.join(", "));
    }
    render_hardware(&mut out, &report.hardware);
    render_network(&mut out, &report.network);
    let _ = writeln!(out, "{}", summary_line(&report.summary));

    let width = report
        .capabilities
        .iter()
        .map(|r| r.name().len())
        .max()
        .unwrap_or(0);
    for category in Category::ALL {
        let in_category: Vec<&DetectionResult> = report
            .capabilities
            .iter()
            .filter(|r| r.capability.category == category)
            .collect();
        if in_category.is_empty() {
            continue;
        }
        let _ = writeln!(out, "\n[{}]", category.label());
        for result in in_category {
            let _ = writeln!(
                out,
                "  {} {:<width$}  {}",
                status_marker(result.status()),
                result.name(),
                describe_result(result),
                width = width
            );
        }
    }
    out
}

fn device_list(devices: &[HardwareDevice]) -> String {
    if devices.is_empty() {
        return "(none)".to_string();
    }
    devices
        .iter()
        .map(|d| d.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_hardware(out: &mut String, hardware: &HardwareInfo) {
    let displays = if hardware.displays.is_empty() {
        "(none)".to_string()
    } else {
        hardware
            .displays
            .iter()
            .map(|d| match &d.resolution {
                Some(res) => format!("{} ({})", d.name, res),
                None => d.name.clone(),
            })
            .collect::<Vec<_>>()
            .join(", ")
    };
    let _ = writeln!(out, "Hardware:");
    let _ = writeln!(out, "  camera      {}", device_list(&hardware.cameras));
    let _ = writeln!(out, "  microphone  {}", device_list(&hardware.microphones));
    let _ = writeln!(out, "  speaker     {}", device_list(&hardware.speakers));
    let _ = writeln!(out, "  display     {}", displays);
}

fn render_network(out: &mut String, network: &NetworkInfo) {
    let _ = writeln!(out, "Network:");
    match (network.internet.connected, network.internet.latency_ms) {
        (true, Some(ms)) => {
            let _ = writeln!(out, "  internet    connected ({}ms)", ms);
        }
        (true, None) => {
            let _ = writeln!(out, "  internet    connected");
        }
        (false, _) => {
            let _ = writeln!(out, "  internet    no connection");
        }
    }
    if !network.lan.ips.is_empty() {
        let _ = writeln!(out, "  lan         {}", network.lan.ips.join(", "));
    }
    if network.vpn.active {
        let _ = writeln!(out, "  vpn         active ({})", network.vpn.interfaces.join(", "));
    }
    let width = network.services.iter().map(|s| s.name.len()).max().unwrap_or(0);
    for service in &network.services {
        let detail = match (service.reachable, service.latency_ms) {
            (true, Some(ms)) => format!("{}ms", ms),
            (true, None) => "reachable".to_string(),
            (false, _) => "unreachable".to_string(),
        };
        let _ = writeln!(
            out,
            "  {} {:<width$}  {}",
            if service.reachable { "+" } else { "-" },
            service.name,
            detail,
            width = width
        );
    }
}

pub fn summary_line(summary: &DetectionSummary) -> String {
    format!(
        "{} available, {} degraded, {} unavailable ({} total)",
        summary.available, summary.degraded, summary.unavailable, summary.total
    )
}

/// Outcome of an apply run.
pub fn render_apply(outcome: &ApplyOutcome) -> String {
    let mut out = String::new();
    let report = &outcome.report;
    if !report.agent.is_empty() {
        let _ = writeln!(out, "Agent: {}", report.agent);
    }
    for change in &report.changes {
        let _ = writeln!(out, "  {:<9}  {}", change.kind.to_string(), change.name);
    }
    let footer = if !report.has_changes() {
        "No changes needed.".to_string()
    } else if outcome.dry_run {
        format!("Dry run: {} not modified.", outcome.path.display())
    } else {
        format!("Updated {}.", outcome.path.display())
    };
    let _ = writeln!(out, "{}", footer);
    if let Some(backup) = &outcome.backup {
        let _ = writeln!(out, "Backup: {}", backup.backup_path.display());
    }
    out
}

/// One-line form of an apply outcome.
pub fn apply_summary(outcome: &ApplyOutcome) -> String {
    let count = |kind| outcome.report.names(kind).len();
    format!(
        "{} enabled, {} disabled, {} appended, {} unchanged, {} ignored{}",
        count(ChangeKind::Enabled),
        count(ChangeKind::Disabled),
        count(ChangeKind::Appended),
        count(ChangeKind::Unchanged),
        count(ChangeKind::Ignored),
        if outcome.dry_run { " (dry run)" } else { "" }
    )
}

/// Plugins declared by the compose file with their state.
pub fn render_status(agent: Option<&str>, plugins: &[PerceptionPlugin], catalog: &Catalog) -> String {
    let mut out = String::new();
    match agent {
        Some(name) => {
            let _ = writeln!(out, "Agent: {}", name);
        }
        None => {
            let _ = writeln!(out, "No agents declared.");
            return out;
        }
    }
    if plugins.is_empty() {
        let _ = writeln!(out, "No perception plugins declared.");
        return out;
    }
    let width = plugins.iter().map(|p| p.name.len()).max().unwrap_or(0);
    for plugin in plugins {
        let state = if plugin.is_enabled() { "on " } else { "off" };
        let known = if catalog.by_name(&plugin.name).is_some() {
            ""
        } else {
            "  (not in catalog)"
        };
        let _ = writeln!(
            out,
            "  [{}] {:<width$}  {}{}",
            state,
            plugin.name,
            plugin.script,
            known,
            width = width
        );
    }
    out
}

/// Catalog listing, optionally for one category.
pub fn render_catalog<'a>(capabilities: impl IntoIterator<Item = &'a Capability>) -> String {
    let mut out = String::new();
    for cap in capabilities {
        let default = if cap.default_enabled { "default on" } else { "default off" };
        let _ = writeln!(
            out,
            "{} [{}] {} ({})",
            cap.name, cap.category, cap.description, default
        );
        for dep in &cap.dependencies {
            let _ = writeln!(
                out,
                "    {} {} {}{}",
                if dep.required { "requires" } else { "optional" },
                dep.kind,
                dep.name,
                dep.install
                    .as_ref()
                    .map(|h| format!("  [{}]", h.describe()))
                    .unwrap_or_default()
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{Display, EnvironmentInfo, InternetStatus, LanInfo, ServiceCheck, VpnInfo};
    use crate::reconcile::{PluginChange, ReconcileReport};
    use sense_common::Dependency;
    use std::path::PathBuf;

    fn result(name: &str, category: Category, missing: Vec<Dependency>) -> DetectionResult {
        let mut cap = Capability::new(name, format!("./plugins/{}.sh", name), "", category);
        cap.dependencies = missing.clone();
        DetectionResult::classify(cap, missing)
    }

    #[test]
    fn test_detection_groups_by_category() {
        let capabilities = vec![
            result("tasks", Category::Workspace, vec![]),
            result("x-feed", Category::Heartbeat, vec![Dependency::env_var("XAI_API_KEY", true)]),
            result("web", Category::Chrome, vec![Dependency::binary("jq", false)]),
        ];
        let report = DetectionReport {
            detected_at: "now".to_string(),
            environment: EnvironmentInfo {
                os: "linux".to_string(),
                arch: "x86_64".to_string(),
                ..EnvironmentInfo::default()
            },
            hardware: HardwareInfo::default(),
            network: NetworkInfo::default(),
            summary: DetectionSummary::from_results(&capabilities),
            capabilities,
        };
        let text = render_detection(&report);
        assert!(text.starts_with("Environment: linux/x86_64\n"));
        assert!(text.contains("1 available, 1 degraded, 1 unavailable (3 total)"));
        assert!(text.contains("[Workspace]"));
        assert!(text.contains("- x-feed  unavailable (missing: XAI_API_KEY)"));
        assert!(text.contains("~ web     degraded (missing: jq)"));
        let workspace = text.find("[Workspace]").unwrap();
        let heartbeat = text.find("[Heartbeat]").unwrap();
        assert!(workspace < heartbeat);
        assert!(text.contains("  camera      (none)\n"));
        assert!(text.contains("  internet    no connection\n"));
    }

    #[test]
    fn test_detection_lists_hardware_and_network() {
        let report = DetectionReport {
            detected_at: "now".to_string(),
            environment: EnvironmentInfo::default(),
            hardware: HardwareInfo {
                cameras: vec![HardwareDevice::new("/dev/video0")],
                microphones: vec![HardwareDevice::new("HDA Intel PCH")],
                speakers: vec![HardwareDevice::new("HDA Intel PCH")],
                displays: vec![Display {
                    name: "eDP-1".to_string(),
                    resolution: Some("1920x1080".to_string()),
                }],
            },
            network: NetworkInfo {
                internet: InternetStatus {
                    connected: true,
                    latency_ms: Some(21),
                },
                lan: LanInfo {
                    ips: vec!["192.168.1.20".to_string()],
                },
                services: vec![
                    ServiceCheck {
                        name: "GitHub API".to_string(),
                        endpoint: "api.github.com:443".to_string(),
                        reachable: true,
                        latency_ms: Some(34),
                    },
                    ServiceCheck {
                        name: "xAI API".to_string(),
                        endpoint: "api.x.ai:443".to_string(),
                        reachable: false,
                        latency_ms: None,
                    },
                ],
                vpn: VpnInfo {
                    active: true,
                    interfaces: vec!["wg0".to_string()],
                },
            },
            summary: DetectionSummary::default(),
            capabilities: Vec::new(),
        };
        let text = render_detection(&report);
        assert!(text.contains("  camera      /dev/video0\n"));
        assert!(text.contains("  speaker     HDA Intel PCH\n"));
        assert!(text.contains("  display     eDP-1 (1920x1080)\n"));
        assert!(text.contains("  internet    connected (21ms)\n"));
        assert!(text.contains("  lan         192.168.1.20\n"));
        assert!(text.contains("  vpn         active (wg0)\n"));
        assert!(text.contains("  + GitHub API  34ms\n"));
        assert!(text.contains("  - xAI API     unreachable\n"));
    }

    #[test]
    fn test_apply_rendering() {
        let outcome = ApplyOutcome {
            path: PathBuf::from("agent-compose.yaml"),
            report: ReconcileReport {
                agent: "kuro".to_string(),
                changes: vec![PluginChange {
                    name: "x-feed".to_string(),
                    kind: ChangeKind::Appended,
                }],
            },
            written: false,
            dry_run: true,
            backup: None,
        };
        let text = render_apply(&outcome);
        assert!(text.contains("appended   x-feed"));
        assert!(text.contains("Dry run: agent-compose.yaml not modified."));
        assert_eq!(
            apply_summary(&outcome),
            "0 enabled, 0 disabled, 1 appended, 0 unchanged, 0 ignored (dry run)"
        );
    }

    #[test]
    fn test_status_marks_unknown_plugins() {
        let plugins = vec![
            PerceptionPlugin {
                name: "tasks".to_string(),
                script: "./plugins/task-tracker.sh".to_string(),
                ..PerceptionPlugin::default()
            },
            PerceptionPlugin {
                name: "custom-thing".to_string(),
                script: "./plugins/custom-thing.sh".to_string(),
                enabled: Some(false),
                ..PerceptionPlugin::default()
            },
        ];
        let text = render_status(Some("kuro"), &plugins, &Catalog::builtin());
        assert!(text.contains("[on ] tasks"));
        assert!(text.contains("[off] custom-thing"));
        assert!(text.contains("(not in catalog)"));
    }

    #[test]
    fn test_catalog_lists_install_hints() {
        let catalog = Catalog::builtin();
        let text = render_catalog(catalog.by_name("github-prs"));
        assert!(text.contains("github-prs [heartbeat]"));
        assert!(text.contains("requires binary gh  [brew install gh]"));
    }
}
