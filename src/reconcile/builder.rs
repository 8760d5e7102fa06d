//! Programmatic endpoint registration.
//!
//! Registrations are recorded, not applied: address, port, socket and handle
//! bindings stay pending until the reconciler loads, so replacing the loader
//! before the first load discards them.

use std::fmt;
use std::net::SocketAddr;
use std::path::Path;

use thiserror::Error;

use crate::net::{BindAddress, EndpointConfiguration, ListenOptions};

/// Callback for a named, configuration-backed endpoint.
pub type EndpointCallback = Box<dyn FnMut(&mut EndpointConfiguration<'_>) + Send>;

/// Callback for a programmatic binding.
pub type ListenCallback = Box<dyn FnOnce(&mut ListenOptions) + Send>;

/// Rejected registration arguments.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("an endpoint name must not be empty")]
    EmptyName,

    #[error("an endpoint named '{0}' is already registered")]
    DuplicateName(String),

    #[error("Unix socket path must be absolute: '{0}'")]
    InvalidUnixSocketPath(String),
}

/// A binding registered in code, applied at load time.
pub(crate) struct PendingListen {
    pub(crate) options: ListenOptions,
    pub(crate) configure: Option<ListenCallback>,
    /// Set once endpoint defaults and `configure` have run.
    pub(crate) prepared: bool,
}

/// Collects named endpoint callbacks and deferred programmatic bindings.
#[derive(Default)]
pub struct EndpointBuilder {
    named: Vec<(String, EndpointCallback)>,
    pending: Vec<PendingListen>,
}

impl EndpointBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for the configuration endpoint `name`.
    ///
    /// Names are case-insensitive and unique. The callback runs whenever the
    /// endpoint is (re)built, never for an unchanged endpoint.
    pub fn endpoint<F>(&mut self, name: &str, configure: F) -> Result<&mut Self, RegistrationError>
    where
        F: FnMut(&mut EndpointConfiguration<'_>) + Send + 'static,
    {
        let name = name.trim();
        if name.is_empty() {
            return Err(RegistrationError::EmptyName);
        }
        if self.named.iter().any(|(existing, _)| existing.eq_ignore_ascii_case(name)) {
            return Err(RegistrationError::DuplicateName(name.to_string()));
        }
        self.named.push((name.to_string(), Box::new(configure)));
        Ok(self)
    }

    /// Bind a specific IP address and port.
    pub fn listen(&mut self, address: SocketAddr) -> &mut Self {
        self.push(BindAddress::Ip(address), None)
    }

    pub fn listen_with<F>(&mut self, address: SocketAddr, configure: F) -> &mut Self
    where
        F: FnOnce(&mut ListenOptions) + Send + 'static,
    {
        self.push(BindAddress::Ip(address), Some(Box::new(configure)))
    }

    /// Bind the loopback interfaces only.
    pub fn listen_localhost(&mut self, port: u16) -> &mut Self {
        self.push(BindAddress::Localhost(port), None)
    }

    pub fn listen_localhost_with<F>(&mut self, port: u16, configure: F) -> &mut Self
    where
        F: FnOnce(&mut ListenOptions) + Send + 'static,
    {
        self.push(BindAddress::Localhost(port), Some(Box::new(configure)))
    }

    /// Bind every interface.
    pub fn listen_any_ip(&mut self, port: u16) -> &mut Self {
        self.push(BindAddress::AnyIp(port), None)
    }

    pub fn listen_any_ip_with<F>(&mut self, port: u16, configure: F) -> &mut Self
    where
        F: FnOnce(&mut ListenOptions) + Send + 'static,
    {
        self.push(BindAddress::AnyIp(port), Some(Box::new(configure)))
    }

    /// Bind a Unix domain socket. The path must be absolute.
    pub fn listen_unix_socket(&mut self, path: impl AsRef<Path>) -> Result<&mut Self, RegistrationError> {
        let address = unix_socket_address(path.as_ref())?;
        Ok(self.push(address, None))
    }

    pub fn listen_unix_socket_with<F>(
        &mut self,
        path: impl AsRef<Path>,
        configure: F,
    ) -> Result<&mut Self, RegistrationError>
    where
        F: FnOnce(&mut ListenOptions) + Send + 'static,
    {
        let address = unix_socket_address(path.as_ref())?;
        Ok(self.push(address, Some(Box::new(configure))))
    }

    /// Bind an already-open socket handle.
    pub fn listen_handle(&mut self, handle: u64) -> &mut Self {
        self.push(BindAddress::Handle(handle), None)
    }

    pub fn listen_handle_with<F>(&mut self, handle: u64, configure: F) -> &mut Self
    where
        F: FnOnce(&mut ListenOptions) + Send + 'static,
    {
        self.push(BindAddress::Handle(handle), Some(Box::new(configure)))
    }

    /// Number of programmatic bindings not yet applied.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Names with a registered endpoint callback.
    pub fn endpoint_names(&self) -> impl Iterator<Item = &str> {
        self.named.iter().map(|(name, _)| name.as_str())
    }

    pub(crate) fn callback_mut(&mut self, name: &str) -> Option<&mut EndpointCallback> {
        self.named
            .iter_mut()
            .find(|(registered, _)| registered.eq_ignore_ascii_case(name))
            .map(|(_, callback)| callback)
    }

    pub(crate) fn take_pending(&mut self) -> Vec<PendingListen> {
        std::mem::take(&mut self.pending)
    }

    /// Put bindings back in front of any registered since they were taken.
    pub(crate) fn restore_pending(&mut self, mut pending: Vec<PendingListen>) {
        pending.append(&mut self.pending);
        self.pending = pending;
    }

    fn push(&mut self, address: BindAddress, configure: Option<ListenCallback>) -> &mut Self {
        tracing::debug!(address = %address, "Registered endpoint, applied on load");
        self.pending.push(PendingListen {
            options: ListenOptions::new(address),
            configure,
            prepared: false,
        });
        self
    }
}

impl fmt::Debug for EndpointBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointBuilder")
            .field("endpoints", &self.endpoint_names().collect::<Vec<_>>())
            .field("pending", &self.pending.len())
            .finish()
    }
}

fn unix_socket_address(path: &Path) -> Result<BindAddress, RegistrationError> {
    let text = path.to_string_lossy();
    if text.is_empty() || !text.starts_with('/') {
        return Err(RegistrationError::InvalidUnixSocketPath(text.into_owned()));
    }
    Ok(BindAddress::UnixSocket(path.to_path_buf()))
}
