// Address resolution module
// Turns a textual port into IPv4 stream candidates on the local host

use socket2::{Domain, Protocol, Type};
use std::net::SocketAddr;

use crate::error::{Result, ServerError};

/// Candidate bind addresses for one port.
///
/// Consumed by listener setup and dropped once the socket is bound.
#[derive(Debug, Clone)]
pub struct ResolvedAddress {
    pub domain: Domain,
    pub socket_type: Type,
    pub protocol: Protocol,
    candidates: Vec<SocketAddr>,
}

impl ResolvedAddress {
    pub fn candidates(&self) -> &[SocketAddr] {
        &self.candidates
    }

    /// The address listener setup binds to
    pub fn first(&self) -> SocketAddr {
        self.candidates[0]
    }
}

/// Resolve `host:port` into IPv4 stream candidates suitable for binding.
///
/// Only decimal port numbers are accepted, without surrounding whitespace.
/// Fails when `port` is not a port number or the lookup yields no IPv4
/// address. Order of the lookup result is preserved. The lookup runs on
/// tokio's blocking pool so it never stalls the reactor.
pub async fn resolve(host: &str, port: &str) -> Result<ResolvedAddress> {
    let resolution_error = |reason: String| ServerError::Resolution {
        host: host.to_string(),
        port: port.to_string(),
        reason,
    };

    let port_num: u16 = port
        .parse()
        .map_err(|e| resolution_error(format!("invalid port: {e}")))?;

    let candidates: Vec<SocketAddr> = tokio::net::lookup_host((host, port_num))
        .await
        .map_err(|e| resolution_error(e.to_string()))?
        .filter(SocketAddr::is_ipv4)
        .collect();

    if candidates.is_empty() {
        return Err(resolution_error("no IPv4 address found".to_string()));
    }

    Ok(ResolvedAddress {
        domain: Domain::IPV4,
        socket_type: Type::STREAM,
        protocol: Protocol::TCP,
        candidates,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_localhost_is_ipv4_loopback() {
        let resolved = resolve("localhost", "9999").await.unwrap();
        assert!(!resolved.candidates().is_empty());
        for addr in resolved.candidates() {
            assert!(addr.is_ipv4());
            assert!(addr.ip().is_loopback());
            assert_eq!(addr.port(), 9999);
        }
        assert_eq!(resolved.domain, Domain::IPV4);
        assert_eq!(resolved.socket_type, Type::STREAM);
        assert_eq!(resolved.protocol, Protocol::TCP);
    }

    #[tokio::test]
    async fn test_resolve_port_zero() {
        let resolved = resolve("localhost", "0").await.unwrap();
        assert_eq!(resolved.first().port(), 0);
    }

    #[tokio::test]
    async fn test_resolve_rejects_non_numeric_port() {
        let err = resolve("localhost", "http!").await.unwrap_err();
        assert!(matches!(err, ServerError::Resolution { .. }));
    }

    #[tokio::test]
    async fn test_resolve_rejects_padded_port() {
        let err = resolve("localhost", " 9999 ").await.unwrap_err();
        assert!(err.to_string().contains("invalid port"));
    }

    #[tokio::test]
    async fn test_resolve_rejects_out_of_range_port() {
        let err = resolve("localhost", "70000").await.unwrap_err();
        assert!(err.to_string().contains("invalid port"));
    }

    #[tokio::test]
    async fn test_resolve_ipv6_only_host_has_no_candidates() {
        let err = resolve("::1", "9999").await.unwrap_err();
        assert!(err.to_string().contains("no IPv4 address"));
    }
}
