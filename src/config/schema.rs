//! Typed view of the endpoint configuration.
//!
//! ```text
//! Endpoints:
//!   <Name>: { Url, Protocols?, SslProtocols?, ClientCertificateMode?,
//!             Certificate?: <name> | { ... }, Sni?: { <host>: { ... } } }
//! EndpointDefaults: { Protocols?, SslProtocols?, ClientCertificateMode? }
//! Certificates:
//!   Default | Development | <name>: { Path, KeyPath?, Password? }
//!                                 | { Subject, Store?, Location?, AllowInvalid? }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

use crate::certificates::error::CertificateError;
use crate::certificates::store::{StoreLocation, DEFAULT_STORE_NAME};
use crate::config::tree::{ConfigSection, ConfigTree};
use crate::net::listen_options::{ClientCertificateMode, HttpProtocols, ParseOptionError, SslProtocols};
use crate::net::sni::HostPattern;

pub const ENDPOINTS_KEY: &str = "Endpoints";
pub const ENDPOINT_DEFAULTS_KEY: &str = "EndpointDefaults";
pub const CERTIFICATES_KEY: &str = "Certificates";
pub const DEFAULT_CERTIFICATE_NAME: &str = "Default";
pub const DEVELOPMENT_CERTIFICATE_NAME: &str = "Development";

/// Errors produced while reading the configuration into typed records.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("the endpoint '{endpoint}' is missing the required 'Url' key")]
    MissingUrl { endpoint: String },

    #[error("invalid value '{value}' at '{path}', expected {expected}")]
    InvalidValue {
        path: String,
        value: String,
        expected: String,
    },

    #[error("the endpoint '{endpoint}' references the unknown certificate '{name}'")]
    UnknownCertificate { endpoint: String, name: String },
}

impl SchemaError {
    fn invalid(section: &ConfigSection, err: ParseOptionError) -> Self {
        SchemaError::InvalidValue {
            path: section.path().to_string(),
            value: err.value,
            expected: err.expected.to_string(),
        }
    }
}

/// A certificate entry as configured.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CertificateConfig {
    pub path: Option<String>,
    pub key_path: Option<String>,
    pub password: Option<String>,
    pub subject: Option<String>,
    pub store: Option<String>,
    pub location: Option<String>,
    pub allow_invalid: Option<bool>,
}

impl CertificateConfig {
    pub fn read(section: &ConfigSection) -> Result<Self, SchemaError> {
        let text = |key: &str| section.get(key).filter(|v| !v.is_empty());
        let allow_invalid = match text("AllowInvalid") {
            Some(value) => Some(parse_bool(&section.section("AllowInvalid"), &value)?),
            None => None,
        };

        Ok(Self {
            path: text("Path"),
            key_path: text("KeyPath"),
            password: text("Password"),
            subject: text("Subject"),
            store: text("Store"),
            location: text("Location"),
            allow_invalid,
        })
    }

    pub fn is_file_cert(&self) -> bool {
        self.path.is_some()
    }

    pub fn is_store_cert(&self) -> bool {
        self.subject.is_some()
    }

    /// Interpret the entry; `name` labels errors.
    pub fn reference(&self, name: &str) -> Result<CertificateReference, CertificateError> {
        match (&self.path, &self.subject) {
            (Some(_), Some(_)) => Err(CertificateError::ConflictingSources(name.to_string())),
            (Some(path), None) => Ok(CertificateReference::File {
                path: PathBuf::from(path),
                key_path: self.key_path.as_ref().map(PathBuf::from),
                password: self.password.clone(),
            }),
            (None, Some(subject)) => {
                let location = match &self.location {
                    Some(location) => location.parse::<StoreLocation>()?,
                    None => StoreLocation::default(),
                };
                Ok(CertificateReference::Store {
                    subject: subject.clone(),
                    store_name: self
                        .store
                        .clone()
                        .unwrap_or_else(|| DEFAULT_STORE_NAME.to_string()),
                    location,
                    allow_invalid: self.allow_invalid.unwrap_or(false),
                })
            }
            (None, None) => Ok(CertificateReference::None),
        }
    }
}

impl fmt::Debug for CertificateConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateConfig")
            .field("path", &self.path)
            .field("key_path", &self.key_path)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("subject", &self.subject)
            .field("store", &self.store)
            .field("location", &self.location)
            .field("allow_invalid", &self.allow_invalid)
            .finish()
    }
}

/// Where a certificate comes from.
#[derive(Clone, PartialEq, Eq)]
pub enum CertificateReference {
    File {
        path: PathBuf,
        key_path: Option<PathBuf>,
        password: Option<String>,
    },
    Store {
        subject: String,
        store_name: String,
        location: StoreLocation,
        allow_invalid: bool,
    },
    None,
}

impl fmt::Debug for CertificateReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CertificateReference::File {
                path,
                key_path,
                password,
            } => f
                .debug_struct("File")
                .field("path", path)
                .field("key_path", key_path)
                .field("password", &password.as_ref().map(|_| "<redacted>"))
                .finish(),
            CertificateReference::Store {
                subject,
                store_name,
                location,
                allow_invalid,
            } => f
                .debug_struct("Store")
                .field("subject", subject)
                .field("store_name", store_name)
                .field("location", location)
                .field("allow_invalid", allow_invalid)
                .finish(),
            CertificateReference::None => f.write_str("None"),
        }
    }
}

/// Values applied to every endpoint that does not set its own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EndpointDefaults {
    pub protocols: Option<HttpProtocols>,
    pub ssl_protocols: Option<SslProtocols>,
    pub client_certificate_mode: Option<ClientCertificateMode>,
}

impl EndpointDefaults {
    pub fn read(section: &ConfigSection) -> Result<Self, SchemaError> {
        Ok(Self {
            protocols: read_option(section, "Protocols")?,
            ssl_protocols: read_ssl_protocols(section)?,
            client_certificate_mode: read_option(section, "ClientCertificateMode")?,
        })
    }
}

/// Which endpoint values were taken from `EndpointDefaults`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InheritedDefaults {
    pub protocols: bool,
    pub ssl_protocols: bool,
    pub client_certificate_mode: bool,
}

impl InheritedDefaults {
    pub fn any(&self) -> bool {
        self.protocols || self.ssl_protocols || self.client_certificate_mode
    }
}

/// Per-host settings under `Endpoints:<Name>:Sni`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SniConfig {
    pub host: HostPattern,
    pub protocols: Option<HttpProtocols>,
    pub ssl_protocols: Option<SslProtocols>,
    pub client_certificate_mode: Option<ClientCertificateMode>,
    pub certificate: Option<CertificateConfig>,
}

/// Opaque identity of an endpoint's configuration subtree.
///
/// Holds the subtree's path and a snapshot of its contents, compared by value.
/// Two endpoints with identical contents under different names differ.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfigIdentity {
    path: String,
    entries: Vec<(String, String)>,
}

impl ConfigIdentity {
    pub fn of(section: &ConfigSection) -> Self {
        Self {
            path: section.path().to_lowercase(),
            entries: section.flatten(),
        }
    }
}

impl fmt::Display for ConfigIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

/// One entry under `Endpoints`.
#[derive(Debug, Clone)]
pub struct EndpointDeclaration {
    pub name: String,
    pub url: String,
    pub protocols: Option<HttpProtocols>,
    pub ssl_protocols: Option<SslProtocols>,
    pub client_certificate_mode: Option<ClientCertificateMode>,
    /// Inline entry, or the named entry from `Certificates` it references.
    pub certificate: Option<CertificateConfig>,
    pub sni: Vec<SniConfig>,
    identity: ConfigIdentity,
    section: ConfigSection,
    inherited: InheritedDefaults,
}

impl EndpointDeclaration {
    fn read(
        section: ConfigSection,
        certificates: &BTreeMap<String, CertificateConfig>,
    ) -> Result<Self, SchemaError> {
        let name = section.key().to_string();
        let url = section
            .get("Url")
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| SchemaError::MissingUrl {
                endpoint: name.clone(),
            })?;

        let certificate = read_certificate(&section.section("Certificate"), certificates, &name)?;

        let mut sni = Vec::new();
        for host in section.section("Sni").children() {
            let host_pattern = HostPattern::parse(host.key()).map_err(|e| SchemaError::invalid(&host, e))?;
            let label = format!("{}:Sni:{}", name, host_pattern);
            let sni_certificate = read_certificate(&host.section("Certificate"), certificates, &label)?;
            sni.push(SniConfig {
                host: host_pattern,
                protocols: read_option(&host, "Protocols")?,
                ssl_protocols: read_ssl_protocols(&host)?,
                client_certificate_mode: read_option(&host, "ClientCertificateMode")?,
                certificate: sni_certificate,
            });
        }

        Ok(Self {
            url,
            protocols: read_option(&section, "Protocols")?,
            ssl_protocols: read_ssl_protocols(&section)?,
            client_certificate_mode: read_option(&section, "ClientCertificateMode")?,
            certificate,
            sni,
            identity: ConfigIdentity::of(&section),
            inherited: InheritedDefaults::default(),
            section,
            name,
        })
    }

    /// Fill unset values from `defaults`, recording which ones were inherited.
    ///
    /// Applying the same defaults twice changes nothing.
    pub fn merge_defaults(&mut self, defaults: &EndpointDefaults) {
        if self.protocols.is_none() || self.inherited.protocols {
            self.inherited.protocols = defaults.protocols.is_some();
            self.protocols = defaults.protocols;
        }
        if self.ssl_protocols.is_none() || self.inherited.ssl_protocols {
            self.inherited.ssl_protocols = defaults.ssl_protocols.is_some();
            self.ssl_protocols = defaults.ssl_protocols;
        }
        if self.client_certificate_mode.is_none() || self.inherited.client_certificate_mode {
            self.inherited.client_certificate_mode = defaults.client_certificate_mode.is_some();
            self.client_certificate_mode = defaults.client_certificate_mode;
        }
    }

    pub fn identity(&self) -> &ConfigIdentity {
        &self.identity
    }

    pub fn config_section(&self) -> &ConfigSection {
        &self.section
    }

    pub fn inherited(&self) -> InheritedDefaults {
        self.inherited
    }

    /// Whether `previous` describes the same endpoint with the same effective settings.
    ///
    /// The subtree identity decides; inherited defaults and referenced
    /// certificate entries live outside the subtree and are compared as well.
    pub fn is_same_endpoint(&self, previous: &EndpointDeclaration) -> bool {
        self.identity == previous.identity
            && self.protocols == previous.protocols
            && self.ssl_protocols == previous.ssl_protocols
            && self.client_certificate_mode == previous.client_certificate_mode
            && self.certificate == previous.certificate
            && self.sni == previous.sni
    }
}

/// An inline `Certificate` section, or the name of an entry under `Certificates`.
fn read_certificate(
    section: &ConfigSection,
    certificates: &BTreeMap<String, CertificateConfig>,
    endpoint: &str,
) -> Result<Option<CertificateConfig>, SchemaError> {
    if section.has_children() {
        return CertificateConfig::read(section).map(Some);
    }
    match section.value().filter(|v| !v.is_empty()) {
        Some(reference) => certificates
            .get(&reference.to_lowercase())
            .cloned()
            .map(Some)
            .ok_or_else(|| SchemaError::UnknownCertificate {
                endpoint: endpoint.to_string(),
                name: reference.to_string(),
            }),
        None => Ok(None),
    }
}

/// The configuration tree read into typed records.
#[derive(Debug, Clone, Default)]
pub struct ConfigurationReader {
    pub endpoint_defaults: EndpointDefaults,
    /// Keyed by lowercased name.
    certificates: BTreeMap<String, CertificateConfig>,
    pub endpoints: Vec<EndpointDeclaration>,
}

impl ConfigurationReader {
    pub fn read(tree: &ConfigTree) -> Result<Self, SchemaError> {
        let endpoint_defaults = EndpointDefaults::read(&tree.section(ENDPOINT_DEFAULTS_KEY))?;

        let mut certificates = BTreeMap::new();
        for section in tree.section(CERTIFICATES_KEY).children() {
            certificates.insert(section.key().to_lowercase(), CertificateConfig::read(&section)?);
        }

        let endpoints = tree
            .section(ENDPOINTS_KEY)
            .children()
            .map(|section| EndpointDeclaration::read(section, &certificates))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            endpoint_defaults,
            certificates,
            endpoints,
        })
    }

    /// Named certificate entry, matched case-insensitively.
    pub fn certificate(&self, name: &str) -> Option<&CertificateConfig> {
        self.certificates.get(&name.to_lowercase())
    }

    pub fn default_certificate(&self) -> Option<&CertificateConfig> {
        self.certificate(DEFAULT_CERTIFICATE_NAME)
    }

    pub fn development_certificate(&self) -> Option<&CertificateConfig> {
        self.certificate(DEVELOPMENT_CERTIFICATE_NAME)
    }
}

fn read_option<T>(section: &ConfigSection, key: &str) -> Result<Option<T>, SchemaError>
where
    T: FromStr<Err = ParseOptionError>,
{
    let value_section = section.section(key);
    match value_section.value().filter(|v| !v.trim().is_empty()) {
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|e| SchemaError::invalid(&value_section, e)),
        None => Ok(None),
    }
}

fn read_ssl_protocols(section: &ConfigSection) -> Result<Option<SslProtocols>, SchemaError> {
    let value_section = section.section("SslProtocols");
    if value_section.has_children() {
        let names: Vec<String> = value_section
            .children()
            .filter_map(|child| child.value().map(str::to_string))
            .collect();
        return SslProtocols::from_names(names.iter().map(String::as_str))
            .map(Some)
            .map_err(|e| SchemaError::invalid(&value_section, e));
    }
    read_option(section, "SslProtocols")
}

fn parse_bool(section: &ConfigSection, value: &str) -> Result<bool, SchemaError> {
    if value.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if value.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(SchemaError::InvalidValue {
            path: section.path().to_string(),
            value: value.to_string(),
            expected: "true or false".to_string(),
        })
    }
}
