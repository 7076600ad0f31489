//! TCP reachability probes.
//!
//! Every probe has one deadline that covers name resolution and all connect
//! attempts together.

use std::net::{IpAddr, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::trace;

/// Split `host:port`, accepting bracketed IPv6 (`[::1]:8080`).
pub fn split_host_port(addr: &str) -> Option<(&str, u16)> {
    let (host, port) = addr.trim().rsplit_once(':')?;
    let port = port.parse().ok()?;
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    if host.is_empty() {
        return None;
    }
    Some((host, port))
}

/// Loopback names and addresses get the short timeout.
pub fn is_local_host(host: &str) -> bool {
    if host.eq_ignore_ascii_case("localhost") {
        return true;
    }
    host.parse::<IpAddr>()
        .map(|ip| ip.is_loopback() || ip.is_unspecified())
        .unwrap_or(false)
}

/// Resolve `host` within `timeout`.
///
/// The lookup runs on a helper thread; when the deadline passes the thread
/// is left to finish on its own and the host counts as unresolved.
pub fn resolve_within(host: &str, port: u16, timeout: Duration) -> Option<Vec<SocketAddr>> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Some(vec![SocketAddr::new(ip, port)]);
    }

    let (tx, rx) = mpsc::channel();
    let target = (host.to_string(), port);
    let spawned = thread::Builder::new()
        .name("sense-resolve".to_string())
        .spawn(move || {
            let resolved = target.to_socket_addrs().map(|iter| iter.collect::<Vec<_>>());
            let _ = tx.send(resolved);
        });
    if let Err(e) = spawned {
        trace!(host, error = %e, "could not start resolver thread");
        return None;
    }

    match rx.recv_timeout(timeout) {
        Ok(Ok(addrs)) => Some(addrs),
        Ok(Err(e)) => {
            trace!(host, error = %e, "address did not resolve");
            None
        }
        Err(mpsc::RecvTimeoutError::Timeout) => {
            trace!(host, ?timeout, "resolution timed out");
            None
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => None,
    }
}

/// Time to the first accepted TCP connection to `host:port`, or `None`.
///
/// Resolved addresses are tried in order with whatever remains of
/// `timeout`, so the whole call never runs much past it.
pub fn connect_latency(host: &str, port: u16, timeout: Duration) -> Option<Duration> {
    let started = Instant::now();
    let deadline = started + timeout;
    let candidates = resolve_within(host, port, timeout)?;

    for candidate in candidates {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            trace!(host, port, "deadline reached before all addresses were tried");
            break;
        }
        match TcpStream::connect_timeout(&candidate, remaining) {
            Ok(_) => return Some(started.elapsed()),
            Err(e) => trace!(addr = %candidate, error = %e, "connect failed"),
        }
    }
    None
}

/// Whether something accepts TCP connections at `addr`.
pub fn service_reachable(addr: &str, local_timeout: Duration, remote_timeout: Duration) -> bool {
    let Some((host, port)) = split_host_port(addr) else {
        trace!(addr, "unparsable service address");
        return false;
    };
    let timeout = if is_local_host(host) {
        local_timeout
    } else {
        remote_timeout
    };
    connect_latency(host, port, timeout).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_split_host_port() {
        assert_eq!(split_host_port("localhost:9867"), Some(("localhost", 9867)));
        assert_eq!(split_host_port("[::1]:80"), Some(("::1", 80)));
        assert_eq!(split_host_port("nohost"), None);
        assert_eq!(split_host_port(":80"), None);
        assert_eq!(split_host_port("host:notaport"), None);
    }

    #[test]
    fn test_local_hosts() {
        assert!(is_local_host("localhost"));
        assert!(is_local_host("127.0.0.1"));
        assert!(is_local_host("::1"));
        assert!(!is_local_host("example.com"));
        assert!(!is_local_host("10.0.0.1"));
    }

    #[test]
    fn test_reachable_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        assert!(service_reachable(
            &addr,
            Duration::from_millis(500),
            Duration::from_millis(500)
        ));
    }

    #[test]
    fn test_literal_address_skips_resolver() {
        let addrs = resolve_within("127.0.0.1", 80, Duration::from_millis(1)).unwrap();
        assert_eq!(addrs, vec!["127.0.0.1:80".parse::<SocketAddr>().unwrap()]);
    }

    #[test]
    fn test_latency_reported_for_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let latency = connect_latency("127.0.0.1", port, Duration::from_millis(500));
        assert!(matches!(latency, Some(l) if l < Duration::from_millis(500)));
    }

    #[test]
    fn test_unroutable_address_respects_deadline() {
        // TEST-NET-1 is reserved; connects either fail fast or hang.
        let started = Instant::now();
        let latency = connect_latency("192.0.2.1", 9, Duration::from_millis(150));
        assert!(latency.is_none());
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_closed_port_is_unreachable() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        assert!(!service_reachable(
            &format!("127.0.0.1:{}", port),
            Duration::from_millis(200),
            Duration::from_millis(200)
        ));
    }
}
