//! Network report: internet reachability, LAN addresses, VPN tunnels, and
//! the API endpoints plugins talk to.

use crate::probe::network::{connect_latency, split_host_port};
use crate::probe::runner::run_with_timeout;
use crate::probe::find_in_path;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::thread;
use std::time::Duration;
use tracing::trace;

/// Tried in order; the first that accepts a connection proves connectivity.
pub const INTERNET_TARGETS: &[&str] = &["api.github.com:443", "1.1.1.1:443", "8.8.8.8:443"];

/// Endpoints reported individually, as `(label, host:port)`.
pub const KNOWN_ENDPOINTS: &[(&str, &str)] = &[
    ("GitHub API", "api.github.com:443"),
    ("Telegram API", "api.telegram.org:443"),
    ("Anthropic API", "api.anthropic.com:443"),
    ("xAI API", "api.x.ai:443"),
];

/// Interface name prefixes used by tunnel and VPN software.
pub const VPN_PREFIXES: &[&str] = &["utun", "tun", "tap", "wg", "tailscale", "nordlynx", "proton"];

const TAILSCALE_STATUS_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInfo {
    pub internet: InternetStatus,
    pub lan: LanInfo,
    pub services: Vec<ServiceCheck>,
    pub vpn: VpnInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternetStatus {
    pub connected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanInfo {
    /// Non-loopback IPv4 addresses.
    pub ips: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceCheck {
    pub name: String,
    pub endpoint: String,
    pub reachable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpnInfo {
    pub active: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<String>,
}

/// One address entry of a network interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceAddr {
    pub name: String,
    pub up: bool,
    pub ipv4: Option<Ipv4Addr>,
}

/// Scan the network. Every connection attempt is bounded by `timeout`;
/// endpoints are checked concurrently.
pub fn detect_network(timeout: Duration) -> NetworkInfo {
    let interfaces = list_interfaces();
    let (internet, services) = thread::scope(|s| {
        let internet = s.spawn(|| check_internet(INTERNET_TARGETS, timeout));
        let services: Vec<_> = KNOWN_ENDPOINTS
            .iter()
            .map(|&(name, endpoint)| (name, endpoint, s.spawn(move || check_endpoint(name, endpoint, timeout))))
            .collect();
        let services = services
            .into_iter()
            .map(|(name, endpoint, handle)| {
                handle.join().unwrap_or_else(|_| ServiceCheck {
                    name: name.to_string(),
                    endpoint: endpoint.to_string(),
                    reachable: false,
                    latency_ms: None,
                })
            })
            .collect();
        (internet.join().unwrap_or_default(), services)
    });

    let mut vpn = vpn_from_interfaces(&interfaces);
    if !vpn.active && tailscale_online() {
        vpn.active = true;
        vpn.interfaces.push("tailscale".to_string());
    }

    NetworkInfo {
        internet,
        lan: LanInfo {
            ips: lan_ipv4(&interfaces),
        },
        services,
        vpn,
    }
}

fn millis(latency: Duration) -> u64 {
    u64::try_from(latency.as_millis()).unwrap_or(u64::MAX)
}

fn connect_to(endpoint: &str, timeout: Duration) -> Option<Duration> {
    let (host, port) = split_host_port(endpoint)?;
    connect_latency(host, port, timeout)
}

/// First target that accepts a connection decides connectivity.
pub fn check_internet(targets: &[&str], timeout: Duration) -> InternetStatus {
    for target in targets {
        if let Some(latency) = connect_to(target, timeout) {
            return InternetStatus {
                connected: true,
                latency_ms: Some(millis(latency)),
            };
        }
        trace!(endpoint = %target, "internet target unreachable");
    }
    InternetStatus::default()
}

pub fn check_endpoint(name: &str, endpoint: &str, timeout: Duration) -> ServiceCheck {
    let latency = connect_to(endpoint, timeout);
    ServiceCheck {
        name: name.to_string(),
        endpoint: endpoint.to_string(),
        reachable: latency.is_some(),
        latency_ms: latency.map(millis),
    }
}

/// Non-loopback IPv4 addresses in interface order, without repeats.
pub fn lan_ipv4(interfaces: &[InterfaceAddr]) -> Vec<String> {
    let mut ips: Vec<String> = Vec::new();
    for ip in interfaces.iter().filter_map(|i| i.ipv4) {
        let ip = ip.to_string();
        if !ips.contains(&ip) && !ip.starts_with("127.") {
            ips.push(ip);
        }
    }
    ips
}

/// Up interfaces whose name marks a tunnel.
pub fn vpn_from_interfaces(interfaces: &[InterfaceAddr]) -> VpnInfo {
    let mut names: Vec<String> = Vec::new();
    for iface in interfaces.iter().filter(|i| i.up) {
        let lower = iface.name.to_ascii_lowercase();
        if VPN_PREFIXES.iter().any(|p| lower.starts_with(p)) && !names.contains(&iface.name) {
            names.push(iface.name.clone());
        }
    }
    VpnInfo {
        active: !names.is_empty(),
        interfaces: names,
    }
}

/// Whether `tailscale status --json` reports a running, online node.
pub fn tailscale_status_online(json: &str) -> bool {
    let Ok(status) = serde_json::from_str::<serde_json::Value>(json) else {
        return false;
    };
    status["BackendState"] == "Running" || status["Self"]["Online"] == true
}

fn tailscale_online() -> bool {
    if find_in_path("tailscale").is_none() {
        return false;
    }
    match run_with_timeout("tailscale", &["status", "--json"], TAILSCALE_STATUS_TIMEOUT) {
        Ok(out) if out.success() => tailscale_status_online(&String::from_utf8_lossy(&out.stdout)),
        Ok(out) => {
            trace!(exit_code = ?out.exit_code, "tailscale status failed");
            false
        }
        Err(e) => {
            trace!(error = %e, "tailscale status failed");
            false
        }
    }
}

/// Interface addresses from `getifaddrs`. An interface appears once per
/// address family.
#[cfg(unix)]
pub fn list_interfaces() -> Vec<InterfaceAddr> {
    let mut head: *mut libc::ifaddrs = std::ptr::null_mut();
    // SAFETY: on success getifaddrs stores a list that is released below.
    if unsafe { libc::getifaddrs(&mut head) } != 0 {
        trace!(error = %std::io::Error::last_os_error(), "getifaddrs failed");
        return Vec::new();
    }

    let mut interfaces = Vec::new();
    let mut cursor = head;
    while !cursor.is_null() {
        // SAFETY: cursor walks the list returned by getifaddrs, which stays
        // valid until freeifaddrs.
        let entry = unsafe { &*cursor };
        if !entry.ifa_name.is_null() {
            let name = unsafe { std::ffi::CStr::from_ptr(entry.ifa_name) }
                .to_string_lossy()
                .into_owned();
            let flags = entry.ifa_flags as libc::c_int;
            let ipv4 = if entry.ifa_addr.is_null() {
                None
            } else if unsafe { (*entry.ifa_addr).sa_family } as libc::c_int == libc::AF_INET {
                let addr = unsafe { &*(entry.ifa_addr as *const libc::sockaddr_in) };
                Some(Ipv4Addr::from(u32::from_be(addr.sin_addr.s_addr)))
            } else {
                None
            };
            interfaces.push(InterfaceAddr {
                name,
                up: flags & libc::IFF_UP != 0,
                ipv4,
            });
        }
        cursor = entry.ifa_next;
    }

    // SAFETY: head came from a successful getifaddrs call.
    unsafe { libc::freeifaddrs(head) };
    interfaces
}

#[cfg(not(unix))]
pub fn list_interfaces() -> Vec<InterfaceAddr> {
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_check_internet_uses_first_reachable_target() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let live = listener.local_addr().unwrap().to_string();
        let closed = {
            let l = TcpListener::bind("127.0.0.1:0").unwrap();
            l.local_addr().unwrap().to_string()
        };
        let status = check_internet(&[closed.as_str(), live.as_str()], Duration::from_millis(500));
        assert!(status.connected);
        assert!(status.latency_ms.is_some());

        let status = check_internet(&[closed.as_str()], Duration::from_millis(200));
        assert_eq!(status, InternetStatus::default());
    }

    #[test]
    fn test_check_endpoint_reports_latency() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = listener.local_addr().unwrap().to_string();
        let check = check_endpoint("local", &endpoint, Duration::from_millis(500));
        assert!(check.reachable);
        assert!(check.latency_ms.is_some());
        assert!(!check_endpoint("bad", "no-port", Duration::from_millis(10)).reachable);
    }

    #[cfg(unix)]
    #[test]
    fn test_loopback_interface_is_listed() {
        let interfaces = list_interfaces();
        assert!(interfaces
            .iter()
            .any(|i| i.ipv4 == Some(Ipv4Addr::LOCALHOST)));
    }
}
