//! Capabilities consumed from the host shell.

use std::future::Future;
use std::pin::Pin;

/// A boxed future returned by host methods.
pub type HostFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors reported by the host shell.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    #[error("host capability unavailable")]
    Unavailable,

    #[error("permission denied")]
    PermissionDenied,

    #[error("host error: {0}")]
    Failed(String),
}

/// System services provided by the desktop shell.
pub trait HostShell: Send + Sync + 'static {
    /// Seconds since the last user input.
    fn idle_seconds(&self) -> HostFuture<'_, Result<u64, HostError>>;

    /// Shows a system notification.
    fn show_notification<'a>(
        &'a self,
        title: &'a str,
        body: &'a str,
    ) -> HostFuture<'a, Result<(), HostError>>;
}
