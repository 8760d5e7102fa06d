//! Certificate store adapter.
//!
//! Stores are looked up by subject, logical store name and location. The
//! lookup lives behind [`CertificateStore`] so the resolver never depends on a
//! particular platform.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use crate::certificates::certificate::ServerCertificate;
use crate::certificates::error::CertificateError;

/// Store consulted when a store reference names none.
pub const DEFAULT_STORE_NAME: &str = "My";

/// Scope of a certificate store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StoreLocation {
    #[default]
    CurrentUser,
    LocalMachine,
}

impl FromStr for StoreLocation {
    type Err = CertificateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("CurrentUser") {
            Ok(StoreLocation::CurrentUser)
        } else if s.eq_ignore_ascii_case("LocalMachine") {
            Ok(StoreLocation::LocalMachine)
        } else {
            Err(CertificateError::InvalidStoreLocation(s.to_string()))
        }
    }
}

impl fmt::Display for StoreLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreLocation::CurrentUser => write!(f, "CurrentUser"),
            StoreLocation::LocalMachine => write!(f, "LocalMachine"),
        }
    }
}

/// Lookup of server certificates in a certificate store.
pub trait CertificateStore: Send + Sync + fmt::Debug {
    /// Find the best certificate whose subject matches `subject`.
    ///
    /// Implementations skip certificates without a private key or whose usage
    /// excludes server authentication. Expired or not-yet-valid certificates
    /// are skipped unless `allow_invalid` is set. Among the remaining
    /// candidates the one expiring last wins.
    fn find_by_subject(
        &self,
        subject: &str,
        store_name: &str,
        location: StoreLocation,
        allow_invalid: bool,
    ) -> Result<Arc<ServerCertificate>, CertificateError>;
}

/// A store laid out on disk as `<root>/<store>/*.pem`, one root per location.
#[derive(Debug, Clone, Default)]
pub struct DirectoryCertificateStore {
    current_user: Option<PathBuf>,
    local_machine: Option<PathBuf>,
}

impl DirectoryCertificateStore {
    pub fn new(current_user: Option<PathBuf>, local_machine: Option<PathBuf>) -> Self {
        Self {
            current_user,
            local_machine,
        }
    }

    /// Roots used on this host: `$HOME/.reconciler/x509stores` and
    /// `/etc/reconciler/x509stores`.
    pub fn platform() -> Self {
        let current_user = std::env::var_os("HOME")
            .filter(|home| !home.is_empty())
            .map(|home| PathBuf::from(home).join(".reconciler").join("x509stores"));
        Self::new(current_user, Some(PathBuf::from("/etc/reconciler/x509stores")))
    }

    fn root(&self, location: StoreLocation) -> Option<&Path> {
        match location {
            StoreLocation::CurrentUser => self.current_user.as_deref(),
            StoreLocation::LocalMachine => self.local_machine.as_deref(),
        }
    }

    fn load_store(&self, dir: &Path) -> Vec<Arc<ServerCertificate>> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!(store = %dir.display(), error = %e, "Certificate store not readable");
                return Vec::new();
            }
        };

        let mut certificates = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            let is_pem = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("pem"));
            if !is_pem {
                continue;
            }
            match ServerCertificate::load_pem_file(&path, None, None) {
                Ok(cert) => certificates.push(Arc::new(cert)),
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "Skipping unreadable store entry")
                }
            }
        }
        certificates
    }
}

impl CertificateStore for DirectoryCertificateStore {
    fn find_by_subject(
        &self,
        subject: &str,
        store_name: &str,
        location: StoreLocation,
        allow_invalid: bool,
    ) -> Result<Arc<ServerCertificate>, CertificateError> {
        let not_found = || CertificateError::NotFoundInStore {
            subject: subject.to_string(),
            store: store_name.to_string(),
            location,
            allow_invalid,
        };

        let root = self.root(location).ok_or_else(|| CertificateError::StoreUnavailable {
            store: store_name.to_string(),
            location,
            reason: "no store root configured for this location".to_string(),
        })?;
        let dir = root.join(store_name.to_ascii_lowercase());

        select_best(self.load_store(&dir), subject, allow_invalid).ok_or_else(not_found)
    }
}

/// Store used where no certificate store is available; every lookup fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedCertificateStore;

impl CertificateStore for UnsupportedCertificateStore {
    fn find_by_subject(
        &self,
        _subject: &str,
        store_name: &str,
        location: StoreLocation,
        _allow_invalid: bool,
    ) -> Result<Arc<ServerCertificate>, CertificateError> {
        Err(CertificateError::StoreUnavailable {
            store: store_name.to_string(),
            location,
            reason: "certificate stores are not supported on this platform".to_string(),
        })
    }
}

fn matches_subject(cert: &ServerCertificate, subject: &str) -> bool {
    let needle = subject.to_lowercase();
    cert.common_names()
        .iter()
        .any(|cn| cn.to_lowercase().contains(&needle))
}

fn select_best(
    candidates: Vec<Arc<ServerCertificate>>,
    subject: &str,
    allow_invalid: bool,
) -> Option<Arc<ServerCertificate>> {
    candidates
        .into_iter()
        .filter(|cert| matches_subject(cert, subject))
        .filter(|cert| cert.has_private_key() && cert.allows_server_auth())
        .filter(|cert| allow_invalid || cert.is_currently_valid())
        .max_by_key(|cert| cert.not_after())
}
