//! Presence state and the notification front.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;
use tracing::{debug, info, warn};
use voffice_protocol::Presence;

use crate::host::HostShell;

/// Process-wide presence plus best-effort host notifications.
pub struct PresenceFacade {
    presence: watch::Sender<Presence>,
    notifications: AtomicBool,
    host: Arc<dyn HostShell>,
}

impl PresenceFacade {
    pub fn new(host: Arc<dyn HostShell>, initial: Presence, notifications: bool) -> Self {
        let (presence, _) = watch::channel(initial);
        Self {
            presence,
            notifications: AtomicBool::new(notifications),
            host,
        }
    }

    pub fn presence(&self) -> Presence {
        *self.presence.borrow()
    }

    /// Sets presence. Returns `true` if it changed; subscribers are only
    /// woken on change.
    pub fn set_presence(&self, presence: Presence) -> bool {
        let changed = self.presence.send_if_modified(|p| {
            if *p == presence {
                false
            } else {
                *p = presence;
                true
            }
        });
        if changed {
            info!(presence = %presence, "presence changed");
        }
        changed
    }

    /// Flips between online and away. Returns the new value.
    pub fn toggle_presence(&self) -> Presence {
        let next = self.presence().toggled();
        self.set_presence(next);
        next
    }

    /// Receives the current presence and every change after it.
    pub fn subscribe(&self) -> watch::Receiver<Presence> {
        self.presence.subscribe()
    }

    pub fn set_notifications_enabled(&self, enabled: bool) {
        self.notifications.store(enabled, Ordering::Relaxed);
    }

    pub fn notifications_enabled(&self) -> bool {
        self.notifications.load(Ordering::Relaxed)
    }

    /// Shows a system notification. Returns whether it was shown.
    pub async fn notify(&self, title: &str, body: &str) -> bool {
        if !self.notifications_enabled() {
            debug!(title, "notifications disabled, skipping");
            return false;
        }
        match self.host.show_notification(title, body).await {
            Ok(()) => true,
            Err(e) => {
                warn!(title, error = %e, "notification not shown");
                false
            }
        }
    }

    /// Seconds since the last user input; 0 when the host cannot tell.
    pub async fn idle_seconds(&self) -> u64 {
        match self.host.idle_seconds().await {
            Ok(s) => s,
            Err(e) => {
                debug!(error = %e, "idle time unavailable");
                0
            }
        }
    }
}
