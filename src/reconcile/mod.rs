//! Reconciliation subsystem.
//!
//! # Data Flow
//! ```text
//! ConfigTree + registrations (builder.rs)
//!     → reconciler.rs
//!         → ConfigurationReader (typed records, defaults merged)
//!         → CertificateResolver (default certificate → state.rs)
//!         → per endpoint: match by identity, else build + callback
//!     → ReloadPlan { stopped, started }
//!     → caller binds and unbinds sockets
//! ```
//!
//! # Design Decisions
//! - Declaration identity decides whether a binding is kept, never value equality
//! - A kept binding is carried over as the same `Arc`, callbacks are not re-run
//! - Fatal errors abort the pass before any state changes

pub mod builder;
pub mod reconciler;
pub mod state;

pub use builder::{EndpointBuilder, RegistrationError};
pub use reconciler::{PlanSummary, Reconciler, ReloadPlan};
pub use state::DefaultCertificateState;
