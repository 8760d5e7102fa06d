//! Description of the hosting application.

use std::path::{Path, PathBuf};

/// Application name and content root supplied by the host.
///
/// Relative certificate paths resolve against `content_root`; the application
/// name selects the development certificate file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEnvironment {
    pub application_name: String,
    pub content_root: PathBuf,
}

impl HostEnvironment {
    pub fn new(application_name: impl Into<String>, content_root: impl Into<PathBuf>) -> Self {
        Self {
            application_name: application_name.into(),
            content_root: content_root.into(),
        }
    }

    /// Resolve `path` against the content root. Absolute paths are kept.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        self.content_root.join(path)
    }
}
