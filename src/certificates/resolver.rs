//! Certificate resolution.
//!
//! An explicit reference loads from a file or a store; failures propagate.
//! The process default comes from `Certificates:Default`, or else from a
//! discovered development certificate; failures loading either are logged
//! and leave no default installed.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::certificates::certificate::ServerCertificate;
use crate::certificates::dev_cert::{load_development_certificate, DeveloperCertificateLocator};
use crate::certificates::error::CertificateError;
use crate::certificates::store::{CertificateStore, DirectoryCertificateStore};
use crate::config::environment::HostEnvironment;
use crate::config::schema::{
    CertificateConfig, CertificateReference, DEFAULT_CERTIFICATE_NAME, DEVELOPMENT_CERTIFICATE_NAME,
};

/// Where the process default certificate came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultCertificateOrigin {
    /// `Certificates:Default`.
    Configured,
    /// A development certificate found on disk.
    Development { path: PathBuf },
}

/// The certificate used by TLS endpoints that name none.
#[derive(Debug, Clone)]
pub struct DefaultCertificate {
    /// The configuration entry it was resolved from.
    pub reference: CertificateConfig,
    pub origin: DefaultCertificateOrigin,
    pub certificate: Arc<ServerCertificate>,
}

impl DefaultCertificate {
    /// Same entry, same origin, same leaf certificate.
    pub fn is_same(&self, other: &DefaultCertificate) -> bool {
        self.reference == other.reference
            && self.origin == other.origin
            && self.certificate.thumbprint() == other.certificate.thumbprint()
    }
}

/// Resolves certificate references for endpoints and the process default.
pub struct CertificateResolver {
    environment: HostEnvironment,
    store: Arc<dyn CertificateStore>,
    locator: DeveloperCertificateLocator,
}

impl CertificateResolver {
    /// Resolver using the platform store and environment-derived locator.
    pub fn new(environment: HostEnvironment) -> Self {
        Self {
            environment,
            store: Arc::new(DirectoryCertificateStore::platform()),
            locator: DeveloperCertificateLocator::from_env(),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn CertificateStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_locator(mut self, locator: DeveloperCertificateLocator) -> Self {
        self.locator = locator;
        self
    }

    pub(crate) fn set_store(&mut self, store: Arc<dyn CertificateStore>) {
        self.store = store;
    }

    pub(crate) fn set_locator(&mut self, locator: DeveloperCertificateLocator) {
        self.locator = locator;
    }

    pub fn environment(&self) -> &HostEnvironment {
        &self.environment
    }

    /// Resolve an explicit certificate entry for `endpoint_name`.
    ///
    /// `None` and entries naming neither a file nor a store resolve to `None`;
    /// the caller applies its own fallback.
    pub fn resolve(
        &self,
        config: Option<&CertificateConfig>,
        endpoint_name: &str,
    ) -> Result<Option<Arc<ServerCertificate>>, CertificateError> {
        let Some(config) = config else {
            return Ok(None);
        };

        match config.reference(endpoint_name)? {
            CertificateReference::File {
                path,
                key_path,
                password,
            } => {
                let path = self.environment.resolve_path(&path);
                let key_path = key_path.map(|p| self.environment.resolve_path(&p));
                let certificate =
                    ServerCertificate::load_pem_file(&path, key_path.as_deref(), password.as_deref())?;
                if !certificate.has_private_key() {
                    return Err(CertificateError::MissingPrivateKey(path));
                }
                Ok(Some(Arc::new(certificate)))
            }
            CertificateReference::Store {
                subject,
                store_name,
                location,
                allow_invalid,
            } => self
                .store
                .find_by_subject(&subject, &store_name, location, allow_invalid)
                .map(Some),
            CertificateReference::None => Ok(None),
        }
    }

    /// Resolve the process default certificate.
    ///
    /// A `Default` entry wins when present; only without one is a development
    /// certificate considered, and only when a `Development` entry supplies a
    /// password and no path. Configuration errors propagate; load failures are
    /// logged and yield `None`.
    pub fn load_default(
        &self,
        default: Option<&CertificateConfig>,
        development: Option<&CertificateConfig>,
    ) -> Result<Option<DefaultCertificate>, CertificateError> {
        if let Some(config) = default {
            return match self.resolve(Some(config), DEFAULT_CERTIFICATE_NAME) {
                Ok(Some(certificate)) => {
                    tracing::info!(
                        subject = %certificate.subject(),
                        thumbprint = %certificate.thumbprint(),
                        "Using the configured default certificate"
                    );
                    Ok(Some(DefaultCertificate {
                        reference: config.clone(),
                        origin: DefaultCertificateOrigin::Configured,
                        certificate,
                    }))
                }
                Ok(None) => Ok(None),
                Err(e) if e.is_configuration_error() => Err(e),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to load the default certificate, no default installed");
                    Ok(None)
                }
            };
        }

        let Some(config) = development else {
            return Ok(None);
        };
        let Some(password) = config.password.as_deref().filter(|_| config.path.is_none()) else {
            return Ok(None);
        };
        Ok(self.find_development_certificate(config, password))
    }

    fn find_development_certificate(&self, config: &CertificateConfig, password: &str) -> Option<DefaultCertificate> {
        let Some(path) = self.locator.locate(&self.environment.application_name) else {
            tracing::debug!(
                certificate = DEVELOPMENT_CERTIFICATE_NAME,
                "No base directory available for the development certificate"
            );
            return None;
        };
        if !path.is_file() {
            tracing::debug!(path = %path.display(), "Development certificate not found");
            return None;
        }

        let certificate = load_development_certificate(&path, password)?;
        tracing::info!(
            path = %path.display(),
            thumbprint = %certificate.thumbprint(),
            "Using the development certificate as the default certificate"
        );
        Some(DefaultCertificate {
            reference: config.clone(),
            origin: DefaultCertificateOrigin::Development { path },
            certificate: Arc::new(certificate),
        })
    }
}

impl fmt::Debug for CertificateResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateResolver")
            .field("environment", &self.environment)
            .field("store", &self.store)
            .field("locator", &self.locator)
            .finish()
    }
}
