//! Client key identifying whose window a request counts against.

use std::fmt;
use std::net::{IpAddr, SocketAddr};

/// Key used when a request carries no usable origin.
const UNKNOWN_KEY: &str = "unknown";

/// An opaque identifier for the origin of a request.
///
/// Keys compare by value only. Requests with equal keys share one window.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientKey(String);

impl ClientKey {
    /// Create a key from any string-like value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The shared key for requests whose origin cannot be determined.
    pub fn unknown() -> Self {
        Self(UNKNOWN_KEY.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<IpAddr> for ClientKey {
    fn from(ip: IpAddr) -> Self {
        Self(ip.to_string())
    }
}

/// Only the address is kept; connections from different source ports of the
/// same host share a key.
impl From<SocketAddr> for ClientKey {
    fn from(addr: SocketAddr) -> Self {
        Self::from(addr.ip())
    }
}

impl From<&str> for ClientKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ClientKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_from_socket_addr_ignores_port() {
        let a: SocketAddr = "192.168.1.10:50000".parse().unwrap();
        let b: SocketAddr = "192.168.1.10:50001".parse().unwrap();

        assert_eq!(ClientKey::from(a), ClientKey::from(b));
        assert_eq!(ClientKey::from(a).as_str(), "192.168.1.10");
    }

    #[test]
    fn test_key_from_ipv6() {
        let ip: IpAddr = "::1".parse().unwrap();
        assert_eq!(ClientKey::from(ip).to_string(), "::1");
    }

    #[test]
    fn test_key_equality_is_by_value() {
        assert_eq!(ClientKey::from("client-a"), ClientKey::new(String::from("client-a")));
        assert_ne!(ClientKey::from("client-a"), ClientKey::from("client-b"));
        assert_eq!(ClientKey::unknown().as_str(), "unknown");
    }
}
