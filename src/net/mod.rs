//! Network binding descriptions.
//!
//! # Data Flow
//! ```text
//! Endpoint URL (config) or programmatic registration
//!     → address.rs (scheme + BindAddress)
//!     → listen_options.rs (ListenOptions, HttpsOptions)
//!     → sni.rs (per-host certificate selection)
//!     → handed to the networking layer to bind
//! ```
//!
//! # Design Decisions
//! - No socket I/O happens here; bindings are plain data
//! - The scheme alone decides whether TLS applies

pub mod address;
pub mod listen_options;
pub mod sni;

pub use address::{parse_url, AddressError, BindAddress, ParsedAddress, Scheme};
pub use listen_options::{
    BindingSummary, CertificateSelector, ClientCertificateMode, EndpointConfiguration, HttpProtocols,
    HttpsOptions, ListenOptions, SslProtocols,
};
pub use sni::{HostPattern, SniCertificateSelector, SniOptions};
