//! Process-wide default certificate slot.

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::certificates::{DefaultCertificate, ServerCertificate};

/// The currently installed default certificate.
///
/// Replaced wholesale at the end of each successful reload; readers never
/// observe a partial update.
#[derive(Default)]
pub struct DefaultCertificateState {
    current: ArcSwapOption<DefaultCertificate>,
}

impl DefaultCertificateState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Arc<DefaultCertificate>> {
        self.current.load_full()
    }

    pub fn certificate(&self) -> Option<Arc<ServerCertificate>> {
        self.current
            .load_full()
            .map(|default| Arc::clone(&default.certificate))
    }

    /// Whether installing `candidate` would change the default.
    pub fn differs_from(&self, candidate: Option<&DefaultCertificate>) -> bool {
        let current = self.current.load_full();
        match (current.as_deref(), candidate) {
            (None, None) => false,
            (Some(current), Some(candidate)) => !current.is_same(candidate),
            _ => true,
        }
    }

    pub fn replace(&self, next: Option<Arc<DefaultCertificate>>) {
        self.current.store(next);
    }
}

impl fmt::Debug for DefaultCertificateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let current = self.current.load_full();
        f.debug_struct("DefaultCertificateState")
            .field("subject", &current.as_ref().map(|d| d.certificate.subject().to_string()))
            .field("origin", &current.as_ref().map(|d| d.origin.clone()))
            .finish()
    }
}
