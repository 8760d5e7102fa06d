//! Endpoint URL parsing.
//!
//! # Responsibilities
//! - Split `scheme://host[:port][/]` into a scheme and a bind address
//! - Map wildcard hosts (`*`, `+`) and `localhost` onto their listen forms
//! - Recognise Unix domain sockets written as `http://unix:/abs/path`
//!
//! # Design Decisions
//! - Only `http` and `https` schemes are accepted; the scheme alone decides TLS
//! - A missing port falls back to the scheme's well-known port
//! - Host names other than `localhost` bind to every interface (logged)
//! - Endpoint URLs may not carry a path base

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;
use url::Host;

/// Errors produced while parsing an endpoint URL.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("'{0}' is missing a scheme, expected http:// or https://")]
    MissingScheme(String),

    #[error("unsupported scheme '{0}', expected http or https")]
    UnsupportedScheme(String),

    #[error("'{0}' has no host")]
    MissingHost(String),

    #[error("invalid port in '{0}'")]
    InvalidPort(String),

    #[error("invalid host in '{url}': {reason}")]
    InvalidHost { url: String, reason: String },

    #[error("a path base cannot be configured in an endpoint URL: '{0}'")]
    PathNotSupported(String),

    #[error("Unix socket path must be absolute: '{0}'")]
    RelativeUnixPath(String),
}

/// URL scheme of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    /// Port used when the URL does not name one.
    pub fn default_port(self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }

    /// Whether the scheme requires TLS.
    pub fn is_secure(self) -> bool {
        matches!(self, Scheme::Https)
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scheme::Http => write!(f, "http"),
            Scheme::Https => write!(f, "https"),
        }
    }
}

/// Where a listener binds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BindAddress {
    /// A specific IP address and port.
    Ip(SocketAddr),
    /// Loopback only (IPv4 and IPv6).
    Localhost(u16),
    /// Every interface.
    AnyIp(u16),
    /// Unix domain socket at an absolute path.
    UnixSocket(PathBuf),
    /// An already-open socket handle owned by the host.
    Handle(u64),
}

impl BindAddress {
    /// TCP port, when the address has one.
    pub fn port(&self) -> Option<u16> {
        match self {
            BindAddress::Ip(addr) => Some(addr.port()),
            BindAddress::Localhost(port) | BindAddress::AnyIp(port) => Some(*port),
            BindAddress::UnixSocket(_) | BindAddress::Handle(_) => None,
        }
    }
}

impl fmt::Display for BindAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindAddress::Ip(addr) => write!(f, "{}", addr),
            BindAddress::Localhost(port) => write!(f, "localhost:{}", port),
            BindAddress::AnyIp(port) => write!(f, "*:{}", port),
            BindAddress::UnixSocket(path) => write!(f, "unix:{}", path.display()),
            BindAddress::Handle(handle) => write!(f, "handle:{}", handle),
        }
    }
}

/// Result of parsing an endpoint URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAddress {
    pub scheme: Scheme,
    pub address: BindAddress,
}

impl ParsedAddress {
    pub fn is_https(&self) -> bool {
        self.scheme.is_secure()
    }
}

const UNIX_PREFIX: &str = "unix:";

/// Parse an endpoint URL such as `https://*:5001` or `http://unix:/run/app.sock`.
pub fn parse_url(url: &str) -> Result<ParsedAddress, AddressError> {
    let trimmed = url.trim();
    let (scheme, rest) = trimmed
        .split_once("://")
        .ok_or_else(|| AddressError::MissingScheme(url.to_string()))?;

    let scheme = match scheme.to_ascii_lowercase().as_str() {
        "http" => Scheme::Http,
        "https" => Scheme::Https,
        _ => return Err(AddressError::UnsupportedScheme(scheme.to_string())),
    };

    let unix_path = rest
        .get(..UNIX_PREFIX.len())
        .filter(|prefix| prefix.eq_ignore_ascii_case(UNIX_PREFIX))
        .and_then(|_| rest.get(UNIX_PREFIX.len()..));
    if let Some(path) = unix_path {
        if !path.starts_with('/') {
            return Err(AddressError::RelativeUnixPath(path.to_string()));
        }
        return Ok(ParsedAddress {
            scheme,
            address: BindAddress::UnixSocket(PathBuf::from(path)),
        });
    }

    let (authority, path) = match rest.find('/') {
        Some(index) => rest.split_at(index),
        None => (rest, ""),
    };
    if !path.is_empty() && path != "/" {
        return Err(AddressError::PathNotSupported(url.to_string()));
    }

    let (host, port) = split_host_port(authority, url)?;
    if host.is_empty() {
        return Err(AddressError::MissingHost(url.to_string()));
    }

    let port = match port {
        Some(p) => p
            .parse::<u16>()
            .map_err(|_| AddressError::InvalidPort(url.to_string()))?,
        None => scheme.default_port(),
    };

    let address = if host == "*" || host == "+" {
        BindAddress::AnyIp(port)
    } else if host.eq_ignore_ascii_case("localhost") {
        BindAddress::Localhost(port)
    } else {
        match Host::parse(host) {
            Ok(Host::Ipv4(ip)) => BindAddress::Ip(SocketAddr::new(ip.into(), port)),
            Ok(Host::Ipv6(ip)) => BindAddress::Ip(SocketAddr::new(ip.into(), port)),
            Ok(Host::Domain(domain)) => {
                tracing::warn!(
                    host = %domain,
                    port,
                    "Host names other than localhost cannot be bound directly, binding to all IPs"
                );
                BindAddress::AnyIp(port)
            }
            Err(e) => {
                return Err(AddressError::InvalidHost {
                    url: url.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    };

    Ok(ParsedAddress { scheme, address })
}

fn split_host_port<'a>(authority: &'a str, url: &str) -> Result<(&'a str, Option<&'a str>), AddressError> {
    if authority.starts_with('[') {
        let end = authority.find(']').ok_or_else(|| AddressError::InvalidHost {
            url: url.to_string(),
            reason: "unterminated IPv6 literal".to_string(),
        })?;
        let (host, after) = authority.split_at(end + 1);
        return match after {
            "" => Ok((host, None)),
            _ => after
                .strip_prefix(':')
                .map(|port| (host, Some(port)))
                .ok_or_else(|| AddressError::InvalidPort(url.to_string())),
        };
    }

    match authority.matches(':').count() {
        0 => Ok((authority, None)),
        1 => Ok(authority
            .split_once(':')
            .map(|(host, port)| (host, Some(port)))
            .unwrap_or((authority, None))),
        _ => Err(AddressError::InvalidHost {
            url: url.to_string(),
            reason: "IPv6 addresses must be enclosed in brackets".to_string(),
        }),
    }
}
