//! Server Name Indication based certificate selection.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::certificates::ServerCertificate;
use crate::net::listen_options::{
    CertificateSelector, ClientCertificateMode, HttpProtocols, ParseOptionError, SslProtocols,
};

/// Host name pattern of an SNI entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HostPattern {
    /// A single host name, stored lowercased.
    Exact(String),
    /// `*.example.com`; stores the suffix `.example.com` lowercased.
    Wildcard(String),
    /// `*`, matching any name, including connections without SNI.
    Any,
}

impl HostPattern {
    pub fn parse(pattern: &str) -> Result<Self, ParseOptionError> {
        let pattern = pattern.trim().to_lowercase();
        let invalid = || ParseOptionError {
            value: pattern.clone(),
            expected: "a host name, '*.suffix' or '*'",
        };

        if pattern == "*" {
            return Ok(HostPattern::Any);
        }
        if let Some(suffix) = pattern.strip_prefix('*') {
            if !suffix.starts_with('.') || suffix.len() < 2 || suffix.contains('*') {
                return Err(invalid());
            }
            return Ok(HostPattern::Wildcard(suffix.to_string()));
        }
        if pattern.is_empty() || pattern.contains('*') {
            return Err(invalid());
        }
        Ok(HostPattern::Exact(pattern))
    }

    pub fn matches(&self, server_name: &str) -> bool {
        let name = server_name.to_lowercase();
        match self {
            HostPattern::Exact(host) => *host == name,
            HostPattern::Wildcard(suffix) => name.len() > suffix.len() && name.ends_with(suffix.as_str()),
            HostPattern::Any => true,
        }
    }
}

impl fmt::Display for HostPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostPattern::Exact(host) => f.write_str(host),
            HostPattern::Wildcard(suffix) => write!(f, "*{}", suffix),
            HostPattern::Any => f.write_str("*"),
        }
    }
}

/// Connection settings for one SNI host pattern.
#[derive(Debug, Clone)]
pub struct SniOptions {
    pub certificate: Arc<ServerCertificate>,
    pub protocols: HttpProtocols,
    pub ssl_protocols: SslProtocols,
    pub client_certificate_mode: ClientCertificateMode,
}

/// Chooses per-connection options by server name.
///
/// An exact name beats the longest matching wildcard suffix, which beats `*`.
#[derive(Debug, Default)]
pub struct SniCertificateSelector {
    exact: HashMap<String, SniOptions>,
    /// Sorted by descending suffix length.
    wildcards: Vec<(String, SniOptions)>,
    any: Option<SniOptions>,
}

impl SniCertificateSelector {
    pub fn new(entries: impl IntoIterator<Item = (HostPattern, SniOptions)>) -> Self {
        let mut selector = Self::default();
        for (pattern, options) in entries {
            match pattern {
                HostPattern::Exact(host) => {
                    selector.exact.insert(host, options);
                }
                HostPattern::Wildcard(suffix) => selector.wildcards.push((suffix, options)),
                HostPattern::Any => selector.any = Some(options),
            }
        }
        selector
            .wildcards
            .sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()));
        selector
    }

    /// Options for a connection, by requested server name.
    pub fn options_for(&self, server_name: Option<&str>) -> Option<&SniOptions> {
        let Some(name) = server_name.map(str::to_lowercase) else {
            return self.any.as_ref();
        };

        self.exact
            .get(&name)
            .or_else(|| {
                self.wildcards
                    .iter()
                    .find(|(suffix, _)| name.len() > suffix.len() && name.ends_with(suffix.as_str()))
                    .map(|(_, options)| options)
            })
            .or(self.any.as_ref())
    }

    pub fn len(&self) -> usize {
        self.exact.len() + self.wildcards.len() + usize::from(self.any.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CertificateSelector for SniCertificateSelector {
    fn select(&self, server_name: Option<&str>) -> Option<Arc<ServerCertificate>> {
        self.options_for(server_name)
            .map(|options| Arc::clone(&options.certificate))
    }
}
