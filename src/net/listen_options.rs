//! Listen parameters and TLS options of a binding.
//!
//! # Responsibilities
//! - Describe one listener binding (`ListenOptions`): address, protocols, TLS
//! - Carry the TLS adapter settings (`HttpsOptions`) including the certificate
//!   or a per-connection certificate selector
//! - Expose the mutable view handed to named endpoint callbacks
//!
//! # Design Decisions
//! - A config-backed binding keeps a back-reference to its declaration, used
//!   only to recognise the same endpoint on the next reload
//! - `use_https()` only records the request; the default certificate is
//!   attached when the binding is materialised

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::certificates::ServerCertificate;
use crate::config::schema::EndpointDeclaration;
use crate::config::tree::ConfigSection;
use crate::net::address::BindAddress;

/// A value that did not name a known option.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{value}' is not a valid value, expected one of: {expected}")]
pub struct ParseOptionError {
    pub value: String,
    pub expected: &'static str,
}

/// Application protocols a binding serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HttpProtocols {
    None,
    Http1,
    Http2,
    #[default]
    Http1AndHttp2,
    Http3,
    Http1AndHttp2AndHttp3,
}

impl HttpProtocols {
    const NAMES: &'static [(&'static str, HttpProtocols)] = &[
        ("None", HttpProtocols::None),
        ("Http1", HttpProtocols::Http1),
        ("Http2", HttpProtocols::Http2),
        ("Http1AndHttp2", HttpProtocols::Http1AndHttp2),
        ("Http3", HttpProtocols::Http3),
        ("Http1AndHttp2AndHttp3", HttpProtocols::Http1AndHttp2AndHttp3),
    ];
}

impl FromStr for HttpProtocols {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::NAMES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(s.trim()))
            .map(|(_, value)| *value)
            .ok_or_else(|| ParseOptionError {
                value: s.to_string(),
                expected: "None, Http1, Http2, Http1AndHttp2, Http3, Http1AndHttp2AndHttp3",
            })
    }
}

impl fmt::Display for HttpProtocols {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = Self::NAMES
            .iter()
            .find(|(_, value)| value == self)
            .map(|(name, _)| *name)
            .unwrap_or("None");
        f.write_str(name)
    }
}

/// TLS protocol versions permitted on a binding. Empty means the platform default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SslProtocols(u8);

impl SslProtocols {
    pub const NONE: SslProtocols = SslProtocols(0);
    pub const TLS12: SslProtocols = SslProtocols(0b01);
    pub const TLS13: SslProtocols = SslProtocols(0b10);

    pub fn contains(self, other: SslProtocols) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    /// Parse a list of version names, e.g. `["Tls12", "Tls13"]`.
    pub fn from_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Result<Self, ParseOptionError> {
        names
            .into_iter()
            .map(str::parse::<SslProtocols>)
            .try_fold(SslProtocols::NONE, |acc, next| Ok(acc | next?))
    }
}

impl std::ops::BitOr for SslProtocols {
    type Output = SslProtocols;

    fn bitor(self, rhs: Self) -> Self::Output {
        SslProtocols(self.0 | rhs.0)
    }
}

/// Accepts a single name or a comma-separated list (`Tls12, Tls13`).
impl FromStr for SslProtocols {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut protocols = SslProtocols::NONE;
        for name in s.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            let protocol = if name.eq_ignore_ascii_case("Tls12") {
                SslProtocols::TLS12
            } else if name.eq_ignore_ascii_case("Tls13") {
                SslProtocols::TLS13
            } else if name.eq_ignore_ascii_case("None") {
                SslProtocols::NONE
            } else {
                return Err(ParseOptionError {
                    value: name.to_string(),
                    expected: "None, Tls12, Tls13",
                });
            };
            protocols = protocols | protocol;
        }
        Ok(protocols)
    }
}

impl fmt::Display for SslProtocols {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        if self.contains(SslProtocols::TLS12) {
            names.push("Tls12");
        }
        if self.contains(SslProtocols::TLS13) {
            names.push("Tls13");
        }
        if names.is_empty() {
            f.write_str("None")
        } else {
            f.write_str(&names.join(", "))
        }
    }
}

/// Whether clients are asked for a certificate during the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ClientCertificateMode {
    #[default]
    NoCertificate,
    AllowCertificate,
    RequireCertificate,
}

impl FromStr for ClientCertificateMode {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("NoCertificate") {
            Ok(ClientCertificateMode::NoCertificate)
        } else if s.eq_ignore_ascii_case("AllowCertificate") {
            Ok(ClientCertificateMode::AllowCertificate)
        } else if s.eq_ignore_ascii_case("RequireCertificate") {
            Ok(ClientCertificateMode::RequireCertificate)
        } else {
            Err(ParseOptionError {
                value: s.to_string(),
                expected: "NoCertificate, AllowCertificate, RequireCertificate",
            })
        }
    }
}

impl fmt::Display for ClientCertificateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientCertificateMode::NoCertificate => f.write_str("NoCertificate"),
            ClientCertificateMode::AllowCertificate => f.write_str("AllowCertificate"),
            ClientCertificateMode::RequireCertificate => f.write_str("RequireCertificate"),
        }
    }
}

/// Picks a server certificate for a connection from the requested server name.
pub trait CertificateSelector: Send + Sync {
    fn select(&self, server_name: Option<&str>) -> Option<Arc<ServerCertificate>>;
}

impl<F> CertificateSelector for F
where
    F: Fn(Option<&str>) -> Option<Arc<ServerCertificate>> + Send + Sync,
{
    fn select(&self, server_name: Option<&str>) -> Option<Arc<ServerCertificate>> {
        self(server_name)
    }
}

/// TLS adapter settings of a binding.
#[derive(Clone, Default)]
pub struct HttpsOptions {
    pub server_certificate: Option<Arc<ServerCertificate>>,
    pub server_certificate_selector: Option<Arc<dyn CertificateSelector>>,
    pub ssl_protocols: SslProtocols,
    pub client_certificate_mode: ClientCertificateMode,
}

impl HttpsOptions {
    /// Options serving a fixed certificate.
    pub fn with_certificate(certificate: Arc<ServerCertificate>) -> Self {
        Self {
            server_certificate: Some(certificate),
            ..Self::default()
        }
    }

    /// Whether a certificate or a selector is present.
    pub fn has_certificate_source(&self) -> bool {
        self.server_certificate.is_some() || self.server_certificate_selector.is_some()
    }
}

impl fmt::Debug for HttpsOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpsOptions")
            .field(
                "server_certificate",
                &self.server_certificate.as_ref().map(|c| c.subject()),
            )
            .field("has_selector", &self.server_certificate_selector.is_some())
            .field("ssl_protocols", &self.ssl_protocols)
            .field("client_certificate_mode", &self.client_certificate_mode)
            .finish()
    }
}

/// One listener binding.
#[derive(Debug, Clone)]
pub struct ListenOptions {
    address: BindAddress,
    pub protocols: HttpProtocols,
    https: Option<HttpsOptions>,
    https_requested: bool,
    uses_default_certificate: bool,
    declaration: Option<Arc<EndpointDeclaration>>,
}

impl ListenOptions {
    pub fn new(address: BindAddress) -> Self {
        Self {
            address,
            protocols: HttpProtocols::default(),
            https: None,
            https_requested: false,
            uses_default_certificate: false,
            declaration: None,
        }
    }

    pub fn address(&self) -> &BindAddress {
        &self.address
    }

    /// Serve TLS with the process default certificate.
    pub fn use_https(&mut self) -> &mut Self {
        self.https_requested = true;
        self
    }

    /// Serve TLS with explicit options.
    pub fn use_https_with(&mut self, options: HttpsOptions) -> &mut Self {
        self.https = Some(options);
        self
    }

    /// Whether TLS was requested or attached.
    pub fn is_tls(&self) -> bool {
        self.https.is_some() || self.https_requested
    }

    pub fn https_options(&self) -> Option<&HttpsOptions> {
        self.https.as_ref()
    }

    /// Name of the configuration endpoint this binding came from.
    pub fn endpoint_name(&self) -> Option<&str> {
        self.declaration.as_deref().map(|d| d.name.as_str())
    }

    pub fn declaration(&self) -> Option<&EndpointDeclaration> {
        self.declaration.as_deref()
    }

    /// Whether the certificate in use is the process default.
    pub fn uses_default_certificate(&self) -> bool {
        self.uses_default_certificate
    }

    /// Label used in logs and errors: the endpoint name, else the address.
    pub fn display_name(&self) -> String {
        self.endpoint_name()
            .map(str::to_string)
            .unwrap_or_else(|| self.address.to_string())
    }

    pub(crate) fn https_requested(&self) -> bool {
        self.https_requested && self.https.is_none()
    }

    pub(crate) fn attach_https(&mut self, options: HttpsOptions) {
        self.https = Some(options);
        self.https_requested = false;
    }

    pub(crate) fn set_uses_default_certificate(&mut self, uses_default_certificate: bool) {
        self.uses_default_certificate = uses_default_certificate;
    }

    pub(crate) fn https_mut(&mut self) -> Option<&mut HttpsOptions> {
        self.https.as_mut()
    }

    pub(crate) fn set_declaration(&mut self, declaration: EndpointDeclaration) {
        self.declaration = Some(Arc::new(declaration));
    }

    /// Serializable summary of this binding.
    pub fn describe(&self) -> BindingSummary {
        let https = self.https.as_ref();
        let certificate = https.and_then(|h| h.server_certificate.as_ref());
        BindingSummary {
            endpoint: self.endpoint_name().map(str::to_string),
            address: self.address.to_string(),
            protocols: self.protocols.to_string(),
            tls: self.is_tls(),
            certificate_subject: certificate.map(|c| c.subject().to_string()),
            certificate_thumbprint: certificate.map(|c| c.thumbprint().to_string()),
            certificate_selector: https.is_some_and(|h| h.server_certificate_selector.is_some()),
            ssl_protocols: https.map(|h| h.ssl_protocols.to_string()),
            client_certificate_mode: https.map(|h| h.client_certificate_mode.to_string()),
        }
    }
}

/// Flat description of a binding for logs and plan output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BindingSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    pub address: String,
    pub protocols: String,
    pub tls: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_thumbprint: Option<String>,
    pub certificate_selector: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_protocols: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_certificate_mode: Option<String>,
}

/// Mutable view handed to a named endpoint callback.
pub struct EndpointConfiguration<'a> {
    name: &'a str,
    is_https: bool,
    listen_options: &'a mut ListenOptions,
    https_options: &'a mut HttpsOptions,
    config_section: &'a ConfigSection,
}

impl<'a> EndpointConfiguration<'a> {
    pub(crate) fn new(
        name: &'a str,
        is_https: bool,
        listen_options: &'a mut ListenOptions,
        https_options: &'a mut HttpsOptions,
        config_section: &'a ConfigSection,
    ) -> Self {
        Self {
            name,
            is_https,
            listen_options,
            https_options,
            config_section,
        }
    }

    /// Endpoint name as written in configuration.
    pub fn name(&self) -> &str {
        self.name
    }

    /// Whether the endpoint URL uses a secure scheme.
    pub fn is_https(&self) -> bool {
        self.is_https
    }

    pub fn listen_options(&mut self) -> &mut ListenOptions {
        self.listen_options
    }

    /// TLS options attached after the callback returns, unless the callback
    /// attaches its own through `listen_options().use_https_with(..)`.
    pub fn https_options(&mut self) -> &mut HttpsOptions {
        self.https_options
    }

    /// Raw configuration of the endpoint, for custom keys.
    pub fn config_section(&self) -> &ConfigSection {
        self.config_section
    }
}
