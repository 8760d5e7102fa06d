//! Developer certificate discovery.

use std::path::{Path, PathBuf};

use crate::certificates::certificate::ServerCertificate;

/// Extension marking a certificate as a locally issued development certificate.
pub const DEVELOPMENT_CERTIFICATE_OID: &str = "1.3.6.1.4.1.311.84.1.1";

/// Exact subject a development certificate carries.
pub const DEVELOPMENT_CERTIFICATE_SUBJECT: &str = "CN=localhost";

const NAMESPACE: &str = "reconciler";
const FILE_EXTENSION: &str = "pem";

/// Computes where a development certificate for an application lives.
///
/// Two base directories are consulted in order: an application-data root
/// (`$APPDATA/reconciler/https`) and the home directory
/// (`$HOME/.reconciler/https`).
#[derive(Debug, Clone, Default)]
pub struct DeveloperCertificateLocator {
    app_data: Option<PathBuf>,
    home: Option<PathBuf>,
}

impl DeveloperCertificateLocator {
    pub fn new(app_data: Option<PathBuf>, home: Option<PathBuf>) -> Self {
        Self { app_data, home }
    }

    /// Locator reading `APPDATA` and `HOME`; unset or empty variables are ignored.
    pub fn from_env() -> Self {
        let var = |name: &str| {
            std::env::var_os(name)
                .filter(|value| !value.is_empty())
                .map(PathBuf::from)
        };
        Self::new(var("APPDATA"), var("HOME"))
    }

    /// Candidate paths in precedence order.
    pub fn candidates(&self, application_name: &str) -> Vec<PathBuf> {
        let file = format!("{}.{}", application_name, FILE_EXTENSION);
        let mut candidates = Vec::with_capacity(2);
        if let Some(app_data) = &self.app_data {
            candidates.push(app_data.join(NAMESPACE).join("https").join(&file));
        }
        if let Some(home) = &self.home {
            candidates.push(home.join(format!(".{}", NAMESPACE)).join("https").join(&file));
        }
        candidates
    }

    /// First existing candidate, else the first candidate; `None` without any base directory.
    pub fn locate(&self, application_name: &str) -> Option<PathBuf> {
        let candidates = self.candidates(application_name);
        candidates
            .iter()
            .find(|path| path.is_file())
            .or_else(|| candidates.first())
            .cloned()
    }
}

/// Whether a certificate is a recognised development certificate.
pub fn is_development_certificate(certificate: &ServerCertificate) -> bool {
    certificate.subject() == DEVELOPMENT_CERTIFICATE_SUBJECT
        && certificate.has_extension(DEVELOPMENT_CERTIFICATE_OID)
}

/// Load and validate the certificate at `path`, logging why it was rejected.
pub(crate) fn load_development_certificate(path: &Path, password: &str) -> Option<ServerCertificate> {
    let certificate = match ServerCertificate::load_pem_file(path, None, Some(password)) {
        Ok(certificate) => certificate,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to load the development certificate");
            return None;
        }
    };

    if !is_development_certificate(&certificate) {
        tracing::warn!(
            path = %path.display(),
            subject = %certificate.subject(),
            "Certificate is not a valid development certificate"
        );
        return None;
    }

    Some(certificate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures")
            .join(name)
    }

    #[test]
    fn candidates_follow_base_directory_order() {
        let locator = DeveloperCertificateLocator::new(
            Some(PathBuf::from("/data")),
            Some(PathBuf::from("/home/dev")),
        );
        assert_eq!(
            locator.candidates("shop"),
            vec![
                PathBuf::from("/data/reconciler/https/shop.pem"),
                PathBuf::from("/home/dev/.reconciler/https/shop.pem"),
            ]
        );
    }

    #[test]
    fn locate_prefers_existing_file() {
        let app_data = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();
        let target = home.path().join(".reconciler/https");
        std::fs::create_dir_all(&target).unwrap();
        std::fs::copy(fixture("devcert.pem"), target.join("shop.pem")).unwrap();

        let locator = DeveloperCertificateLocator::new(
            Some(app_data.path().to_path_buf()),
            Some(home.path().to_path_buf()),
        );
        assert_eq!(locator.locate("shop"), Some(target.join("shop.pem")));
        // Nothing exists for another app: the first candidate is returned.
        assert_eq!(
            locator.locate("other"),
            Some(app_data.path().join("reconciler/https/other.pem"))
        );
    }

    #[test]
    fn no_base_directory_locates_nothing() {
        assert_eq!(DeveloperCertificateLocator::default().locate("shop"), None);
    }

    #[test]
    fn validation_requires_subject_and_marker() {
        let dev = load_development_certificate(&fixture("devcert.pem"), "devpass");
        assert!(dev.is_some());
        assert!(load_development_certificate(&fixture("localhost-unmarked.pem"), "devpass").is_none());
        assert!(load_development_certificate(&fixture("devcert.pem"), "wrong").is_none());
        assert!(load_development_certificate(&fixture("absent.pem"), "devpass").is_none());
    }
}
