use crate::error::DistSortError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Address and port of a reachable process.
///
/// Used both as a routing target and as the worker registry key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `host:port` form accepted by `TcpStream::connect`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl From<std::net::SocketAddr> for Endpoint {
    fn from(addr: std::net::SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), addr.port())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}:{}]", self.host, self.port)
    }
}

impl FromStr for Endpoint {
    type Err = DistSortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s.trim().rsplit_once(':').ok_or_else(|| {
            DistSortError::config_parse(format!("'{s}' is not of the form host:port"))
        })?;
        if host.is_empty() {
            return Err(DistSortError::config_parse(format!("'{s}' has an empty host")));
        }
        let port = port
            .parse::<u16>()
            .map_err(|e| DistSortError::config_parse(format!("'{s}' has an invalid port: {e}")))?;
        Ok(Self::new(host, port))
    }
}
