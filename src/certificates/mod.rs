//! Certificate subsystem.
//!
//! # Data Flow
//! ```text
//! CertificateConfig (schema.rs)
//!     → resolver.rs (reference: file | store | none)
//!         → certificate.rs (PEM/DER + optional encrypted key)
//!         → store.rs (CertificateStore lookup by subject)
//!     → Arc<ServerCertificate>
//!
//! Default certificate:
//!     Certificates:Default → resolver.rs
//!     else Certificates:Development → dev_cert.rs (locate + validate)
//! ```
//!
//! # Design Decisions
//! - Store access sits behind a trait; platforms without a store get one that always fails
//! - Explicit references fail loudly, fallbacks fail softly
//! - Certificates are shared as `Arc` and compared by thumbprint

pub mod certificate;
pub mod dev_cert;
pub mod error;
pub mod resolver;
pub mod store;

pub use certificate::ServerCertificate;
pub use dev_cert::DeveloperCertificateLocator;
pub use error::CertificateError;
pub use resolver::{CertificateResolver, DefaultCertificate, DefaultCertificateOrigin};
pub use store::{CertificateStore, DirectoryCertificateStore, StoreLocation, UnsupportedCertificateStore};
