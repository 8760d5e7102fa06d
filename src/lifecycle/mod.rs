//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown
//!     SIGHUP → reload the configuration file
//!
//! Shutdown (shutdown.rs):
//!     Shutdown triggered → watch loop exits → final bindings logged
//! ```
//!
//! # Design Decisions
//! - The host loop owns the reconciler; signals only produce events
//! - Shutdown is a broadcast so any number of tasks can observe it

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::{next_signal, HostSignal};
