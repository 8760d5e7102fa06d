//! Live-reloadable endpoint and certificate reconciliation.
//!
//! Reads listen endpoints from a configuration tree, resolves the certificate
//! behind every TLS endpoint and, on each reload, reports which bindings to
//! stop and which to start.

pub mod certificates;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod reconcile;

pub use config::{ConfigTree, HostEnvironment};
pub use error::ReconcileError;
pub use lifecycle::Shutdown;
pub use reconcile::{EndpointBuilder, Reconciler, ReloadPlan};
