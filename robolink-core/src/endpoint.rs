//! Broker endpoint parsing

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Transport scheme of a broker URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BrokerScheme {
    /// Plain TCP (`mqtt://`, `tcp://`)
    Tcp,
    /// TLS over TCP (`mqtts://`, `ssl://`)
    Tls,
    /// Plain websocket (`ws://`)
    Ws,
    /// Secure websocket (`wss://`)
    Wss,
}

impl BrokerScheme {
    fn parse(scheme: &str) -> Option<Self> {
        match scheme.to_ascii_lowercase().as_str() {
            "mqtt" | "tcp" => Some(BrokerScheme::Tcp),
            "mqtts" | "ssl" => Some(BrokerScheme::Tls),
            "ws" => Some(BrokerScheme::Ws),
            "wss" => Some(BrokerScheme::Wss),
            _ => None,
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            BrokerScheme::Tcp => 1883,
            BrokerScheme::Tls => 8883,
            BrokerScheme::Ws => 80,
            BrokerScheme::Wss => 443,
        }
    }

    pub fn is_websocket(&self) -> bool {
        matches!(self, BrokerScheme::Ws | BrokerScheme::Wss)
    }

    pub fn is_secure(&self) -> bool {
        matches!(self, BrokerScheme::Tls | BrokerScheme::Wss)
    }

    fn as_str(&self) -> &'static str {
        match self {
            BrokerScheme::Tcp => "mqtt",
            BrokerScheme::Tls => "mqtts",
            BrokerScheme::Ws => "ws",
            BrokerScheme::Wss => "wss",
        }
    }
}

/// A validated broker address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerEndpoint {
    pub scheme: BrokerScheme,
    pub host: String,
    pub port: u16,
    /// Websocket path, always starting with `/`. `/` for TCP schemes.
    pub path: String,
}

impl BrokerEndpoint {
    /// Parse `scheme://host[:port][/path]`.
    pub fn parse(url: &str) -> Result<Self> {
        let url = url.trim();
        if url.is_empty() {
            return Err(Error::Endpoint("broker URL is empty".to_string()));
        }

        let (scheme, rest) = url
            .split_once("://")
            .ok_or_else(|| Error::Endpoint(format!("missing scheme in '{}'", url)))?;
        let scheme = BrokerScheme::parse(scheme)
            .ok_or_else(|| Error::Endpoint(format!("unsupported scheme '{}'", scheme)))?;

        let (authority, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, "/"),
        };

        if authority.contains('@') {
            return Err(Error::Endpoint(
                "credentials in the broker URL are not supported".to_string(),
            ));
        }

        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| Error::Endpoint(format!("invalid port '{}'", port)))?;
                (host, port)
            }
            None => (authority, scheme.default_port()),
        };

        if host.is_empty() {
            return Err(Error::Endpoint(format!("missing host in '{}'", url)));
        }
        if host.chars().any(|c| c.is_whitespace()) {
            return Err(Error::Endpoint(format!("invalid host '{}'", host)));
        }
        if port == 0 {
            return Err(Error::Endpoint("port must be greater than 0".to_string()));
        }

        let path = if scheme.is_websocket() { path } else { "/" };

        Ok(Self {
            scheme,
            host: host.to_string(),
            port,
            path: path.to_string(),
        })
    }
}

impl fmt::Display for BrokerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scheme.is_websocket() {
            write!(f, "{}://{}:{}{}", self.scheme.as_str(), self.host, self.port, self.path)
        } else {
            write!(f, "{}://{}:{}", self.scheme.as_str(), self.host, self.port)
        }
    }
}
