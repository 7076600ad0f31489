//! The capability catalog.
//!
//! A [`Catalog`] is an immutable list of capability definitions passed to
//! detection and install-hint lookups. [`Catalog::builtin`] holds the
//! perception plugins shipped with the agent; tests build their own.

use sense_common::{
    Capability, Category, Dependency, InstallHint, Platform,
};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("duplicate capability name: {0}")]
    DuplicateName(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    capabilities: Vec<Capability>,
}

impl Catalog {
    /// Build a catalog. Names must be unique.
    pub fn new(capabilities: Vec<Capability>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::new();
        for cap in &capabilities {
            if !seen.insert(cap.name.as_str()) {
                return Err(CatalogError::DuplicateName(cap.name.clone()));
            }
        }
        Ok(Self { capabilities })
    }

    /// The built-in perception plugins.
    pub fn builtin() -> Self {
        Self {
            capabilities: builtin_capabilities(),
        }
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Capability> {
        self.capabilities.iter()
    }

    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    pub fn by_name(&self, name: &str) -> Option<&Capability> {
        self.capabilities.iter().find(|c| c.name == name)
    }

    pub fn by_category(&self, category: Category) -> impl Iterator<Item = &Capability> {
        self.capabilities
            .iter()
            .filter(move |c| c.category == category)
    }

    /// A catalog holding only the entries of one category.
    pub fn restricted_to(&self, category: Category) -> Catalog {
        Catalog {
            capabilities: self.by_category(category).cloned().collect(),
        }
    }

    /// First install hint declared for a dependency called `dependency`.
    pub fn find_install_hint(&self, dependency: &str) -> Option<&InstallHint> {
        self.capabilities
            .iter()
            .flat_map(|c| c.dependencies.iter())
            .filter(|d| d.name == dependency)
            .find_map(|d| d.install.as_ref())
    }
}

impl<'a> IntoIterator for &'a Catalog {
    type Item = &'a Capability;
    type IntoIter = std::slice::Iter<'a, Capability>;

    fn into_iter(self) -> Self::IntoIter {
        self.capabilities.iter()
    }
}

fn git(required: bool) -> Dependency {
    Dependency::binary("git", required).with_install(InstallHint::brew("git"))
}

fn docker(required: bool) -> Dependency {
    Dependency::binary("docker", required).with_install(InstallHint::brew("docker"))
}

fn jq(required: bool) -> Dependency {
    Dependency::binary("jq", required).with_install(InstallHint::brew("jq"))
}

fn gh(required: bool) -> Dependency {
    Dependency::binary("gh", required).with_install(InstallHint::brew("gh"))
}

fn python3(required: bool) -> Dependency {
    Dependency::binary("python3", required).with_install(InstallHint::brew("python@3.11"))
}

fn curl(required: bool) -> Dependency {
    Dependency::binary("curl", required)
}

fn pinchtab(required: bool) -> Dependency {
    Dependency::service("pinchtab", "localhost:9867", required)
}

fn macos_only() -> Platform {
    Platform::os(&["macos"])
}

fn builtin_capabilities() -> Vec<Capability> {
    use Category::{Chrome, Heartbeat, Telegram, Workspace};

    vec![
        // workspace
        Capability::new(
            "state-changes",
            "./plugins/state-watcher.sh",
            "Workspace state changes (files, processes, git)",
            Workspace,
        )
        .enabled_by_default()
        .with_dependency(docker(false))
        .with_dependency(git(false))
        .with_dependency(Dependency::binary("lsof", false)),
        Capability::new(
            "tasks",
            "./plugins/task-tracker.sh",
            "Task tracking from HEARTBEAT.md",
            Workspace,
        )
        .enabled_by_default()
        .with_dependency(git(false)),
        Capability::new(
            "focus-context",
            "./plugins/focus-context.sh",
            "Current app focus context (macOS)",
            Workspace,
        )
        .enabled_by_default()
        .with_platform(macos_only())
        .with_dependency(Dependency::binary("osascript", true)),
        Capability::new(
            "mobile",
            "./plugins/mobile-perception.sh",
            "Mobile sensor data (GPS, accelerometer)",
            Workspace,
        )
        .enabled_by_default()
        .with_dependency(jq(true))
        .with_dependency(curl(false))
        .with_dependency(python3(false)),
        Capability::new(
            "claude-code-inbox",
            "./plugins/claude-code-inbox.sh",
            "Claude Code message inbox",
            Workspace,
        )
        .enabled_by_default(),
        Capability::new(
            "chat-room-inbox",
            "./plugins/chat-room-inbox.sh",
            "Chat room message inbox",
            Workspace,
        )
        .enabled_by_default(),
        Capability::new(
            "git-detail",
            "./plugins/git-status.sh",
            "Detailed git status and recent commits",
            Workspace,
        )
        .with_dependency(git(true)),
        // chrome
        Capability::new(
            "chrome",
            "./plugins/chrome-status.sh",
            "Chrome browser tab and page status",
            Chrome,
        )
        .enabled_by_default()
        .with_dependency(curl(true))
        .with_dependency(python3(true))
        .with_dependency(pinchtab(false)),
        Capability::new(
            "web",
            "./plugins/web-fetch.sh",
            "Web page fetching via Pinchtab",
            Chrome,
        )
        .enabled_by_default()
        .with_timeout_ms(15_000)
        .with_dependency(curl(true))
        .with_dependency(pinchtab(false))
        .with_dependency(Dependency::env_var("XAI_API_KEY", false)),
        Capability::new(
            "screen-vision",
            "./plugins/screen-vision.sh",
            "Screen OCR via Pinchtab + ocrmac",
            Chrome,
        )
        .with_dependency(curl(true))
        .with_dependency(pinchtab(true))
        .with_dependency(Dependency::python("ocrmac", true).with_install(InstallHint::pip("ocrmac"))),
        // telegram
        Capability::new(
            "telegram-inbox",
            "./plugins/telegram-inbox.sh",
            "Telegram message inbox",
            Telegram,
        )
        .enabled_by_default()
        .with_dependency(Dependency::env_var("TELEGRAM_BOT_TOKEN", true)),
        // heartbeat
        Capability::new(
            "docker",
            "./plugins/docker-status.sh",
            "Docker container status",
            Heartbeat,
        )
        .with_dependency(docker(true)),
        Capability::new(
            "docker-services",
            "./plugins/docker-services.sh",
            "Docker service health checks",
            Heartbeat,
        )
        .enabled_by_default()
        .with_dependency(docker(true))
        .with_dependency(curl(false)),
        Capability::new(
            "github-issues",
            "./plugins/github-issues.sh",
            "GitHub issues tracking",
            Heartbeat,
        )
        .enabled_by_default()
        .with_dependency(gh(true))
        .with_dependency(jq(true)),
        Capability::new(
            "github-prs",
            "./plugins/github-prs.sh",
            "GitHub pull requests tracking",
            Heartbeat,
        )
        .enabled_by_default()
        .with_dependency(gh(true))
        .with_dependency(jq(true)),
        Capability::new(
            "x-feed",
            "./plugins/x-perception.sh",
            "X/Twitter feed via Grok API",
            Heartbeat,
        )
        .enabled_by_default()
        .with_timeout_ms(35_000)
        .with_dependency(curl(true))
        .with_dependency(jq(true))
        .with_dependency(Dependency::env_var("XAI_API_KEY", true)),
        Capability::new(
            "self-awareness",
            "./plugins/self-awareness.sh",
            "Agent self-awareness metrics",
            Heartbeat,
        )
        .enabled_by_default(),
        Capability::new(
            "self-healing",
            "./plugins/self-healing.sh",
            "Auto-detect and repair system issues",
            Heartbeat,
        )
        .enabled_by_default()
        .with_dependency(curl(false))
        .with_dependency(docker(false))
        .with_dependency(git(false)),
        Capability::new(
            "anomaly-detector",
            "./plugins/anomaly-detector.sh",
            "Anomaly detection in logs and metrics",
            Heartbeat,
        )
        .enabled_by_default(),
        Capability::new(
            "feedback-status",
            "./plugins/feedback-status.sh",
            "Feedback loop status monitoring",
            Heartbeat,
        )
        .enabled_by_default(),
        Capability::new(
            "website",
            "./plugins/website-monitor.sh",
            "Website monitoring and health check",
            Heartbeat,
        )
        .enabled_by_default()
        .with_timeout_ms(15_000)
        .with_dependency(curl(true)),
        // off by default
        Capability::new(
            "disk",
            "./plugins/disk-usage.sh",
            "Disk usage monitoring",
            Heartbeat,
        ),
        Capability::new(
            "brew",
            "./plugins/homebrew-outdated.sh",
            "Homebrew outdated packages",
            Heartbeat,
        )
        .with_timeout_ms(10_000)
        .with_platform(macos_only())
        .with_dependency(Dependency::binary("brew", true)),
        Capability::new(
            "ports",
            "./plugins/port-check.sh",
            "Network port status check",
            Heartbeat,
        )
        .with_dependency(Dependency::binary("lsof", false)),
        Capability::new(
            "handoff-watcher",
            "./plugins/handoff-watcher.sh",
            "Watch handoff directory for changes",
            Workspace,
        ),
        Capability::new(
            "lighthouse-audit",
            "./plugins/lighthouse-audit.sh",
            "Lighthouse web audit",
            Heartbeat,
        )
        .with_dependency(
            Dependency::binary("lighthouse", true)
                .with_install(InstallHint::manual("npm install -g lighthouse")),
        ),
        Capability::new(
            "skeptic",
            "./plugins/skeptic.sh",
            "Skeptic analysis plugin",
            Heartbeat,
        ),
    ]
}
