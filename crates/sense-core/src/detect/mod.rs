//! Capability detection.
//!
//! Each capability is checked independently: platform first, then every
//! dependency. A platform mismatch short-circuits without probing. Probes
//! never fail the pass; an error only makes a dependency absent.

pub mod environment;
pub mod hardware;
pub mod network;

pub use environment::{detect_environment, EnvironmentInfo, RuntimeVersions};
pub use hardware::{detect_hardware, Display, HardwareDevice, HardwareInfo};
pub use network::{detect_network, InternetStatus, LanInfo, NetworkInfo, ServiceCheck, VpnInfo};

use crate::catalog::Catalog;
use crate::probe::{DependencyChecker, ProbeConfig, SystemChecker};
use sense_common::{Capability, CapabilityStatus, DetectionResult, HostPlatform};
use sense_config::Settings;
use serde::Serialize;
use std::thread;
use tracing::{debug, error, info, instrument};

/// Default number of capabilities checked concurrently.
pub const DEFAULT_MAX_PARALLEL: usize = 4;

/// Classifies capabilities against a host using a dependency checker.
pub struct Detector<C> {
    checker: C,
    host: HostPlatform,
    max_parallel: usize,
}

impl<C: DependencyChecker> Detector<C> {
    pub fn new(checker: C) -> Self {
        Self {
            checker,
            host: HostPlatform::current(),
            max_parallel: DEFAULT_MAX_PARALLEL,
        }
    }

    /// Detect against another platform instead of the running one.
    pub fn with_host(mut self, host: HostPlatform) -> Self {
        self.host = host;
        self
    }

    /// Worker count; 0 is treated as 1.
    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel.max(1);
        self
    }

    pub fn host(&self) -> &HostPlatform {
        &self.host
    }

    /// Classify one capability.
    pub fn check_capability(&self, capability: &Capability) -> DetectionResult {
        if !capability.platform.matches_host(&self.host) {
            debug!(capability = %capability.name, host = %self.host, "platform mismatch");
            return DetectionResult::platform_mismatch(capability.clone());
        }

        let missing = capability
            .dependencies
            .iter()
            .filter(|dep| !self.checker.check(dep))
            .cloned()
            .collect();
        DetectionResult::classify(capability.clone(), missing)
    }

    /// Classify every capability. Results are in catalog order.
    #[instrument(skip(self, catalog), fields(count = catalog.len()))]
    pub fn detect(&self, catalog: &Catalog) -> Vec<DetectionResult> {
        let capabilities = catalog.capabilities();
        if self.max_parallel <= 1 {
            return capabilities
                .iter()
                .map(|cap| self.check_capability(cap))
                .collect();
        }

        capabilities
            .chunks(self.max_parallel)
            .flat_map(|chunk| {
                thread::scope(|s| {
                    let handles: Vec<_> = chunk
                        .iter()
                        .map(|cap| (cap, s.spawn(move || self.check_capability(cap))))
                        .collect();

                    handles
                        .into_iter()
                        .map(|(cap, h)| {
                            h.join().unwrap_or_else(|_| {
                                error!(capability = %cap.name, "detection thread panicked");
                                DetectionResult::classify(cap.clone(), cap.dependencies.clone())
                            })
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect()
    }
}

/// Counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DetectionSummary {
    pub total: usize,
    pub available: usize,
    pub degraded: usize,
    pub unavailable: usize,
}

impl DetectionSummary {
    pub fn from_results(results: &[DetectionResult]) -> Self {
        let mut summary = Self {
            total: results.len(),
            ..Self::default()
        };
        for result in results {
            match result.status() {
                CapabilityStatus::Available => summary.available += 1,
                CapabilityStatus::Degraded => summary.degraded += 1,
                CapabilityStatus::Unavailable => summary.unavailable += 1,
            }
        }
        summary
    }
}

/// Full detection output: host facts, per-capability results, counts.
#[derive(Debug, Clone, Serialize)]
pub struct DetectionReport {
    pub detected_at: String,
    pub environment: EnvironmentInfo,
    pub hardware: HardwareInfo,
    pub network: NetworkInfo,
    pub capabilities: Vec<DetectionResult>,
    pub summary: DetectionSummary,
}

/// Classify every capability in `catalog` on this machine.
pub fn detect_capabilities(catalog: &Catalog, settings: &Settings) -> Vec<DetectionResult> {
    let checker = SystemChecker::new(ProbeConfig::from(settings));
    Detector::new(checker)
        .with_max_parallel(settings.max_parallel)
        .detect(catalog)
}

/// Run detection for `catalog` on this machine with the given settings.
/// Host, hardware, and network facts are gathered alongside the
/// capabilities.
pub fn run_detection(catalog: &Catalog, settings: &Settings) -> DetectionReport {
    let (capabilities, environment, hardware, network) = thread::scope(|s| {
        let environment = s.spawn(|| detect_environment(&settings.python));
        let hardware = s.spawn(detect_hardware);
        let network = s.spawn(|| detect_network(settings.remote_service_timeout()));
        let capabilities = detect_capabilities(catalog, settings);
        (
            capabilities,
            environment.join().unwrap_or_else(|_| {
                error!("environment thread panicked");
                EnvironmentInfo::default()
            }),
            hardware.join().unwrap_or_else(|_| {
                error!("hardware thread panicked");
                HardwareInfo::default()
            }),
            network.join().unwrap_or_else(|_| {
                error!("network thread panicked");
                NetworkInfo::default()
            }),
        )
    });
    let summary = DetectionSummary::from_results(&capabilities);
    info!(
        total = summary.total,
        available = summary.available,
        degraded = summary.degraded,
        unavailable = summary.unavailable,
        "detection complete"
    );

    DetectionReport {
        detected_at: chrono::Utc::now().to_rfc3339(),
        environment,
        hardware,
        network,
        capabilities,
        summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sense_common::{Category, Dependency, Platform};
    use std::collections::HashSet;

    struct SetChecker(HashSet<&'static str>);

    impl DependencyChecker for SetChecker {
        fn check(&self, dependency: &Dependency) -> bool {
            self.0.contains(dependency.name.as_str())
        }
    }

    fn cap(name: &str) -> Capability {
        Capability::new(name, format!("./plugins/{}.sh", name), "", Category::Heartbeat)
    }

    #[test]
    fn test_zero_dependency_capability_is_available() {
        let detector = Detector::new(SetChecker(HashSet::new()));
        let result = detector.check_capability(&cap("skeptic"));
        assert!(result.available);
        assert!(!result.degraded);
    }

    #[test]
    fn test_results_keep_catalog_order_when_parallel() {
        let caps: Vec<_> = (0..11).map(|i| cap(&format!("c{}", i))).collect();
        let catalog = Catalog::new(caps).unwrap();
        let detector = Detector::new(SetChecker(HashSet::new())).with_max_parallel(3);
        let names: Vec<_> = detector
            .detect(&catalog)
            .iter()
            .map(|r| r.name().to_string())
            .collect();
        let expected: Vec<_> = (0..11).map(|i| format!("c{}", i)).collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn test_platform_mismatch_on_other_host() {
        let mac_only = cap("focus").with_platform(Platform::os(&["darwin"]));
        let detector = Detector::new(SetChecker(HashSet::new()))
            .with_host(HostPlatform::new("linux", "x86_64"));
        let result = detector.check_capability(&mac_only);
        assert!(!result.available);
        assert!(result.missing_dependencies.is_empty());
    }

    #[test]
    fn test_summary_counts() {
        let detector = Detector::new(SetChecker(["git"].into_iter().collect()));
        let catalog = Catalog::new(vec![
            cap("a"),
            cap("b").with_dependency(Dependency::binary("jq", false)),
            cap("c").with_dependency(Dependency::binary("gh", true)),
            cap("d").with_dependency(Dependency::binary("git", true)),
        ])
        .unwrap();
        let summary = DetectionSummary::from_results(&detector.detect(&catalog));
        assert_eq!(
            summary,
            DetectionSummary {
                total: 4,
                available: 2,
                degraded: 1,
                unavailable: 1
            }
        );
    }
}
