use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs};
use std::str::FromStr;

use crate::error::{Result, TransportError};

const TCP_SCHEME: &str = "tcp://";

/// Address of a broadcast publisher.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// Host name or IP literal (IPv6 literals without brackets).
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl Endpoint {
    /// Create an endpoint from a host and port.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse `host:port`, `tcp://host:port` or `[v6]:port`.
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = |reason| TransportError::InvalidEndpoint {
            input: input.to_string(),
            reason,
        };

        let rest = input.trim();
        let rest = rest.strip_prefix(TCP_SCHEME).unwrap_or(rest);
        let (host, port) = rest.rsplit_once(':').ok_or_else(|| invalid("missing port"))?;
        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);

        if host.is_empty() {
            return Err(invalid("missing host"));
        }
        let port: u16 = port.parse().map_err(|_| invalid("port is not a number"))?;
        if port == 0 {
            return Err(invalid("port must be non-zero"));
        }

        Ok(Self::new(host, port))
    }

    /// Resolve to the first socket address.
    pub fn resolve(&self) -> Result<SocketAddr> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|source| TransportError::Connect {
                endpoint: self.to_string(),
                source,
            })?
            .next()
            .ok_or_else(|| TransportError::Resolve {
                endpoint: self.to_string(),
            })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "{TCP_SCHEME}[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{TCP_SCHEME}{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for Endpoint {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), addr.port())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_host_port() {
        let ep = Endpoint::parse("10.100.4.20:40020").unwrap();
        assert_eq!(ep.host, "10.100.4.20");
        assert_eq!(ep.port, 40020);
    }

    #[test]
    fn parses_tcp_scheme() {
        let ep: Endpoint = "tcp://localhost:8881".parse().unwrap();
        assert_eq!(ep, Endpoint::new("localhost", 8881));
        assert_eq!(ep.to_string(), "tcp://localhost:8881");
    }

    #[test]
    fn parses_bracketed_ipv6() {
        let ep = Endpoint::parse("[::1]:9000").unwrap();
        assert_eq!(ep.host, "::1");
        assert_eq!(ep.to_string(), "tcp://[::1]:9000");
    }

    #[test]
    fn rejects_missing_or_bad_port() {
        assert!(matches!(
            Endpoint::parse("localhost"),
            Err(TransportError::InvalidEndpoint { .. })
        ));
        assert!(Endpoint::parse("localhost:http").is_err());
        assert!(Endpoint::parse("localhost:0").is_err());
        assert!(Endpoint::parse(":80").is_err());
    }

    #[test]
    fn resolves_loopback() {
        let addr = Endpoint::new("127.0.0.1", 4000).resolve().unwrap();
        assert_eq!(addr.port(), 4000);
        assert!(addr.ip().is_loopback());
    }
}
