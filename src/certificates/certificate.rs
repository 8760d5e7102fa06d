//! Server certificate material and metadata.

use std::fmt;
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use pkcs8::{EncryptedPrivateKeyInfo, PrivateKeyInfo};
use rustls_pemfile::Item;
use rustls_pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use sha2::{Digest, Sha256};
use x509_parser::certificate::X509Certificate;
use x509_parser::error::X509Error;
use x509_parser::nom::Err;
use x509_parser::pem::Pem;

use crate::certificates::error::CertificateError;

const ENCRYPTED_KEY_LABEL: &str = "ENCRYPTED PRIVATE KEY";

/// A server certificate chain with its private key and the metadata the
/// resolver needs for selection and validation.
///
/// The leaf is the first certificate of the chain.
pub struct ServerCertificate {
    chain: Vec<CertificateDer<'static>>,
    private_key: Option<PrivateKeyDer<'static>>,
    subject: String,
    common_names: Vec<String>,
    extension_oids: Vec<String>,
    not_before: i64,
    not_after: i64,
    server_auth: bool,
    thumbprint: String,
}

impl ServerCertificate {
    /// Build from DER material. Fails when the leaf is not a parseable X.509 certificate.
    pub fn from_der(
        chain: Vec<CertificateDer<'static>>,
        private_key: Option<PrivateKeyDer<'static>>,
    ) -> Result<Self, CertificateError> {
        let leaf = chain
            .first()
            .ok_or_else(|| CertificateError::NoCertificate("<memory>".into()))?;
        let x509 = parse_x509(leaf.as_ref())?;

        let subject = x509.subject().to_string();
        let common_names = x509
            .subject()
            .iter_common_name()
            .filter_map(|cn| cn.as_str().ok())
            .map(str::to_string)
            .collect();
        let extension_oids = x509
            .extensions()
            .iter()
            .map(|ext| ext.oid.to_id_string())
            .collect();
        // A certificate without EKU may be used for any purpose.
        let server_auth = match x509.extended_key_usage() {
            Ok(Some(eku)) => eku.value.any || eku.value.server_auth,
            Ok(None) => true,
            Err(_) => false,
        };
        let not_before = x509.validity().not_before.timestamp();
        let not_after = x509.validity().not_after.timestamp();
        let thumbprint = hex::encode_upper(Sha256::digest(leaf.as_ref()));

        Ok(Self {
            chain,
            private_key,
            subject,
            common_names,
            extension_oids,
            not_before,
            not_after,
            server_auth,
            thumbprint,
        })
    }

    /// Load a certificate chain and private key from PEM (or a bare DER certificate).
    ///
    /// The key is read from `key_path` when given, otherwise from the certificate
    /// file itself. With a `password`, an `ENCRYPTED PRIVATE KEY` block is
    /// decrypted; a wrong password is an error.
    pub fn load_pem_file(
        path: &Path,
        key_path: Option<&Path>,
        password: Option<&str>,
    ) -> Result<Self, CertificateError> {
        let cert_bytes = read_file(path)?;
        let (mut chain, mut private_key) = read_pem_items(path, &cert_bytes)?;

        // Not PEM at all: treat the file as one DER certificate.
        if chain.is_empty() && cert_bytes.first() == Some(&0x30) {
            chain.push(CertificateDer::from(cert_bytes.clone()));
        }
        if chain.is_empty() {
            return Err(CertificateError::NoCertificate(path.to_path_buf()));
        }

        let (key_source, key_bytes) = match key_path {
            Some(key_path) => {
                let bytes = read_file(key_path)?;
                private_key = read_pem_items(key_path, &bytes)?.1;
                (key_path, bytes)
            }
            None => (path, cert_bytes),
        };

        if let Some(password) = password {
            if let Some(decrypted) = decrypt_private_key(key_source, &key_bytes, password)? {
                private_key = Some(decrypted);
            }
        }

        if key_path.is_some() && private_key.is_none() {
            return Err(CertificateError::MissingPrivateKey(key_source.to_path_buf()));
        }

        let certificate = Self::from_der(chain, private_key)?;
        tracing::debug!(
            path = %path.display(),
            subject = %certificate.subject,
            thumbprint = %certificate.thumbprint,
            "Loaded certificate"
        );
        Ok(certificate)
    }

    /// Subject distinguished name, e.g. `CN=localhost`.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Common name attributes of the subject.
    pub fn common_names(&self) -> &[String] {
        &self.common_names
    }

    /// Dotted OIDs of every extension on the leaf.
    pub fn extension_oids(&self) -> &[String] {
        &self.extension_oids
    }

    pub fn has_extension(&self, oid: &str) -> bool {
        self.extension_oids.iter().any(|o| o == oid)
    }

    /// `notBefore` as seconds since the Unix epoch.
    pub fn not_before(&self) -> i64 {
        self.not_before
    }

    /// `notAfter` as seconds since the Unix epoch.
    pub fn not_after(&self) -> i64 {
        self.not_after
    }

    /// Whether `timestamp` falls within the validity window.
    pub fn is_valid_at(&self, timestamp: i64) -> bool {
        self.not_before <= timestamp && timestamp <= self.not_after
    }

    /// Whether the certificate is inside its validity window right now.
    pub fn is_currently_valid(&self) -> bool {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default();
        self.is_valid_at(now)
    }

    /// Whether extended key usage permits TLS server authentication.
    pub fn allows_server_auth(&self) -> bool {
        self.server_auth
    }

    pub fn has_private_key(&self) -> bool {
        self.private_key.is_some()
    }

    /// Upper-case hex SHA-256 of the leaf's DER encoding.
    pub fn thumbprint(&self) -> &str {
        &self.thumbprint
    }

    pub fn chain(&self) -> &[CertificateDer<'static>] {
        &self.chain
    }

    pub fn private_key(&self) -> Option<&PrivateKeyDer<'static>> {
        self.private_key.as_ref()
    }
}

impl PartialEq for ServerCertificate {
    fn eq(&self, other: &Self) -> bool {
        self.thumbprint == other.thumbprint
    }
}

impl Eq for ServerCertificate {}

impl fmt::Debug for ServerCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerCertificate")
            .field("subject", &self.subject)
            .field("thumbprint", &self.thumbprint)
            .field("chain_len", &self.chain.len())
            .field("has_private_key", &self.private_key.is_some())
            .finish()
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, CertificateError> {
    fs::read(path).map_err(|source| CertificateError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_x509(der: &[u8]) -> Result<X509Certificate<'_>, CertificateError> {
    match x509_parser::parse_x509_certificate(der) {
        Ok((_, cert)) => Ok(cert),
        Err(Err::Incomplete(_)) => Err(CertificateError::ParseX509Certificate(
            X509Error::InvalidCertificate,
        )),
        Err(Err::Error(e) | Err::Failure(e)) => Err(CertificateError::ParseX509Certificate(e)),
    }
}

type PemMaterial = (Vec<CertificateDer<'static>>, Option<PrivateKeyDer<'static>>);

/// Certificates and the first unencrypted private key found in PEM data.
fn read_pem_items(path: &Path, bytes: &[u8]) -> Result<PemMaterial, CertificateError> {
    let mut reader: &[u8] = bytes;
    let mut chain = Vec::new();
    let mut private_key: Option<PrivateKeyDer<'static>> = None;

    for item in rustls_pemfile::read_all(&mut reader) {
        let item = item.map_err(|e| CertificateError::Pem {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        match item {
            Item::X509Certificate(cert) => chain.push(cert),
            Item::Pkcs8Key(key) if private_key.is_none() => private_key = Some(key.into()),
            Item::Pkcs1Key(key) if private_key.is_none() => private_key = Some(key.into()),
            Item::Sec1Key(key) if private_key.is_none() => private_key = Some(key.into()),
            _ => {}
        }
    }

    Ok((chain, private_key))
}

/// Decrypt the first `ENCRYPTED PRIVATE KEY` block, if the data holds one.
fn decrypt_private_key(
    path: &Path,
    bytes: &[u8],
    password: &str,
) -> Result<Option<PrivateKeyDer<'static>>, CertificateError> {
    for pem in Pem::iter_from_buffer(bytes) {
        let pem = pem.map_err(|e| CertificateError::Pem {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        if pem.label != ENCRYPTED_KEY_LABEL {
            continue;
        }

        let info = EncryptedPrivateKeyInfo::try_from(pem.contents.as_slice())
            .map_err(|_| CertificateError::Decrypt(path.to_path_buf()))?;
        let document = info
            .decrypt(password.as_bytes())
            .map_err(|_| CertificateError::Decrypt(path.to_path_buf()))?;
        // Reject padding that happened to validate under a wrong password.
        PrivateKeyInfo::try_from(document.as_bytes())
            .map_err(|_| CertificateError::Decrypt(path.to_path_buf()))?;

        let key = PrivatePkcs8KeyDer::from(document.as_bytes().to_vec());
        return Ok(Some(key.into()));
    }
    Ok(None)
}
