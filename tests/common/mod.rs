//! Shared utilities for reconciliation tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use endpoint_reconciler::certificates::{
    DeveloperCertificateLocator, DirectoryCertificateStore, UnsupportedCertificateStore,
};
use endpoint_reconciler::{ConfigTree, HostEnvironment, Reconciler};
use tempfile::TempDir;

pub const APP_NAME: &str = "shop";

/// Path of a PEM fixture.
pub fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

pub fn tree(pairs: &[(&str, &str)]) -> ConfigTree {
    ConfigTree::from_pairs(pairs.iter().copied())
}

/// Scratch directories for one test: content root, home and certificate store.
pub struct Harness {
    pub content_root: TempDir,
    pub home: TempDir,
    pub store: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            content_root: tempfile::tempdir().unwrap(),
            home: tempfile::tempdir().unwrap(),
            store: tempfile::tempdir().unwrap(),
        }
    }

    /// Copy a fixture into the content root under `name`.
    pub fn with_file(self, fixture_name: &str, name: &str) -> Self {
        fs::copy(fixture(fixture_name), self.content_root.path().join(name)).unwrap();
        self
    }

    /// Install a fixture as the application's development certificate.
    pub fn with_development_certificate(self, fixture_name: &str) -> Self {
        let dir = self.home.path().join(".reconciler").join("https");
        fs::create_dir_all(&dir).unwrap();
        fs::copy(fixture(fixture_name), dir.join(format!("{APP_NAME}.pem"))).unwrap();
        self
    }

    /// Add a fixture to the CurrentUser `My` store.
    pub fn with_store_certificate(self, fixture_name: &str) -> Self {
        let dir = self.store.path().join("my");
        fs::create_dir_all(&dir).unwrap();
        fs::copy(fixture(fixture_name), dir.join(fixture_name)).unwrap();
        self
    }

    pub fn environment(&self) -> HostEnvironment {
        HostEnvironment::new(APP_NAME, self.content_root.path())
    }

    pub fn locator(&self) -> DeveloperCertificateLocator {
        DeveloperCertificateLocator::new(None, Some(self.home.path().to_path_buf()))
    }

    /// Reconciler isolated from the host: scratch store and home directory.
    pub fn reconciler(&self, pairs: &[(&str, &str)]) -> Reconciler {
        Reconciler::new(tree(pairs), self.environment())
            .with_certificate_store(Arc::new(DirectoryCertificateStore::new(
                Some(self.store.path().to_path_buf()),
                None,
            )))
            .with_developer_certificate_locator(self.locator())
    }
}

/// Reconciler with no store, no development certificate and the crate root as content root.
pub fn bare_reconciler(pairs: &[(&str, &str)]) -> Reconciler {
    Reconciler::new(tree(pairs), HostEnvironment::new(APP_NAME, env!("CARGO_MANIFEST_DIR")))
        .with_certificate_store(Arc::new(UnsupportedCertificateStore))
        .with_developer_certificate_locator(DeveloperCertificateLocator::default())
}
