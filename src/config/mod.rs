//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (read & parse)
//!     → tree.rs (case-insensitive ConfigTree)
//!     → schema.rs (typed endpoint, defaults and certificate records)
//!     → handed to the reconciler on every (re)load
//!
//! On change:
//!     watcher.rs detects change
//!     → loader.rs loads new tree
//!     → sent over a channel to the host loop
//!     → reconciler diffs against the bound endpoints
//! ```
//!
//! # Design Decisions
//! - The tree is untyped; typing happens on every reload so defaults are re-merged
//! - A tree that fails to parse is logged and the current configuration kept
//! - Keys are case-insensitive, original spelling kept for display

pub mod environment;
pub mod loader;
pub mod schema;
pub mod tree;
pub mod watcher;

pub use environment::HostEnvironment;
pub use loader::{load_config, ConfigError};
pub use schema::{CertificateConfig, ConfigurationReader, EndpointDeclaration, SchemaError};
pub use tree::{ConfigSection, ConfigTree};
pub use watcher::ConfigWatcher;
