//! In-process [`HostShell`] for tests and offline runs.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use crate::host::{HostError, HostFuture, HostShell};

/// Records notifications and reports a settable idle time.
#[derive(Default)]
pub struct StubHost {
    idle: AtomicU64,
    idle_fails: AtomicBool,
    deny_notifications: AtomicBool,
    notifications: Mutex<Vec<(String, String)>>,
    idle_queries: AtomicUsize,
}

impl StubHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_idle(&self, seconds: u64) {
        self.idle.store(seconds, Ordering::Relaxed);
    }

    /// Makes `idle_seconds` fail.
    pub fn fail_idle(&self, fail: bool) {
        self.idle_fails.store(fail, Ordering::Relaxed);
    }

    /// Makes `show_notification` fail with [`HostError::PermissionDenied`].
    pub fn deny_notifications(&self, deny: bool) {
        self.deny_notifications.store(deny, Ordering::Relaxed);
    }

    /// Notifications shown so far as `(title, body)`.
    pub fn notifications(&self) -> Vec<(String, String)> {
        self.notifications
            .lock()
            .map(|n| n.clone())
            .unwrap_or_default()
    }

    pub fn idle_queries(&self) -> usize {
        self.idle_queries.load(Ordering::Relaxed)
    }
}

impl HostShell for StubHost {
    fn idle_seconds(&self) -> HostFuture<'_, Result<u64, HostError>> {
        Box::pin(async move {
            self.idle_queries.fetch_add(1, Ordering::Relaxed);
            if self.idle_fails.load(Ordering::Relaxed) {
                return Err(HostError::Failed("idle query failed".into()));
            }
            Ok(self.idle.load(Ordering::Relaxed))
        })
    }

    fn show_notification<'a>(
        &'a self,
        title: &'a str,
        body: &'a str,
    ) -> HostFuture<'a, Result<(), HostError>> {
        Box::pin(async move {
            if self.deny_notifications.load(Ordering::Relaxed) {
                return Err(HostError::PermissionDenied);
            }
            if let Ok(mut n) = self.notifications.lock() {
                n.push((title.to_string(), body.to_string()));
            }
            Ok(())
        })
    }
}
