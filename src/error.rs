//! Crate-level error taxonomy for reconciliation passes.

use thiserror::Error;

use crate::certificates::CertificateError;
use crate::config::{ConfigError, SchemaError};
use crate::net::AddressError;

/// A failure that aborts a whole load or reload. No binding changes when one is returned.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid endpoint configuration: {0}")]
    Schema(#[from] SchemaError),

    #[error("invalid URL for endpoint '{endpoint}': {source}")]
    Address {
        endpoint: String,
        #[source]
        source: AddressError,
    },

    #[error("the certificate for '{endpoint}' could not be resolved: {source}")]
    Certificate {
        endpoint: String,
        #[source]
        source: CertificateError,
    },

    #[error("unable to configure HTTPS endpoint '{endpoint}': no server certificate was specified and no default or development certificate is available")]
    MissingCertificate { endpoint: String },

    #[error("no certificate is available for SNI host '{host}' of endpoint '{endpoint}'")]
    MissingSniCertificate { endpoint: String, host: String },
}

impl ReconcileError {
    pub(crate) fn certificate(endpoint: &str, source: CertificateError) -> Self {
        ReconcileError::Certificate {
            endpoint: endpoint.to_string(),
            source,
        }
    }

    /// Whether the error comes from the shape of the configuration rather
    /// than from loading certificate material.
    pub fn is_configuration_error(&self) -> bool {
        match self {
            ReconcileError::Certificate { source, .. } => source.is_configuration_error(),
            ReconcileError::Schema(_) | ReconcileError::Address { .. } => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_endpoint() {
        let err = ReconcileError::MissingCertificate {
            endpoint: "Web".into(),
        };
        assert!(err.to_string().contains("'Web'"));

        let err = ReconcileError::certificate("Web", CertificateError::ConflictingSources("Web".into()));
        assert!(err.is_configuration_error());
        assert!(err.to_string().starts_with("the certificate for 'Web'"));
    }
}
