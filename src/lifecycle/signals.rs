//! OS signal handling.
//!
//! # Responsibilities
//! - Listen for SIGTERM, SIGINT and SIGHUP
//! - Translate them into host events
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - SIGHUP triggers a configuration reload, not shutdown
//! - Off Unix only Ctrl-C is observed

/// What the host should do in response to a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostSignal {
    Shutdown,
    Reload,
}

/// Wait for the next signal of interest.
#[cfg(unix)]
pub async fn next_signal() -> std::io::Result<HostSignal> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    let mut hangup = signal(SignalKind::hangup())?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => result.map(|_| HostSignal::Shutdown),
        _ = terminate.recv() => Ok(HostSignal::Shutdown),
        _ = hangup.recv() => Ok(HostSignal::Reload),
    }
}

/// Wait for the next signal of interest.
#[cfg(not(unix))]
pub async fn next_signal() -> std::io::Result<HostSignal> {
    tokio::signal::ctrl_c().await.map(|_| HostSignal::Shutdown)
}
