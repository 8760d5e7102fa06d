//! Error types for certificate loading and resolution.

use std::path::PathBuf;

use thiserror::Error;
use x509_parser::error::X509Error;

use crate::certificates::store::StoreLocation;

/// An error that may arise loading, parsing or resolving a server certificate.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CertificateError {
    /// The certificate or key file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file held no certificate.
    #[error("no certificate found in {0}")]
    NoCertificate(PathBuf),

    /// No private key accompanies the certificate.
    #[error("no private key found for {0}")]
    MissingPrivateKey(PathBuf),

    /// PEM framing could not be decoded.
    #[error("malformed PEM data in {path}: {reason}")]
    Pem { path: PathBuf, reason: String },

    /// Error returned by the X.509 parsing library.
    #[error("failed parsing X.509 certificate")]
    ParseX509Certificate(#[from] X509Error),

    /// The encrypted private key could not be decrypted with the configured password.
    #[error("failed to decrypt the private key in {0}: wrong password or unsupported encryption")]
    Decrypt(PathBuf),

    /// A certificate entry names both a file and a store certificate.
    #[error("the certificate configuration for '{0}' specifies both a file (Path) and a store certificate (Subject)")]
    ConflictingSources(String),

    /// A store location name did not match a known location.
    #[error("'{0}' is not a valid certificate store location, expected CurrentUser or LocalMachine")]
    InvalidStoreLocation(String),

    /// No usable certificate matched the store lookup.
    #[error("the requested certificate {subject} could not be found in {location}/{store} with AllowInvalid setting: {allow_invalid}")]
    NotFoundInStore {
        subject: String,
        store: String,
        location: StoreLocation,
        allow_invalid: bool,
    },

    /// The platform has no certificate store this crate can read.
    #[error("certificate store {location}/{store} is not available: {reason}")]
    StoreUnavailable {
        store: String,
        location: StoreLocation,
        reason: String,
    },
}

impl CertificateError {
    /// Whether the error stems from the shape of the configuration rather than
    /// from loading the certificate material.
    ///
    /// Configuration errors are fatal wherever they occur; load failures are only
    /// fatal for certificates an endpoint references explicitly.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            CertificateError::ConflictingSources(_) | CertificateError::InvalidStoreLocation(_)
        )
    }
}
