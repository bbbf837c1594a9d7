//! Background idle-time polling.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::host::HostShell;

/// How often the host is asked for idle time.
pub const IDLE_POLL_PERIOD: Duration = Duration::from_secs(5);

/// Polls the host for idle seconds and publishes each reading.
///
/// Host errors publish 0, the same as [`PresenceFacade::idle_seconds`](crate::PresenceFacade::idle_seconds).
pub struct IdleMonitor {
    host: Arc<dyn HostShell>,
    idle: watch::Sender<u64>,
    cancel: Mutex<Option<CancellationToken>>,
}

impl IdleMonitor {
    pub fn new(host: Arc<dyn HostShell>) -> Self {
        let (idle, _) = watch::channel(0);
        Self {
            host,
            idle,
            cancel: Mutex::new(None),
        }
    }

    /// Starts polling every `period`, replacing a running loop.
    pub fn start(&self, period: Duration) {
        let cancel = CancellationToken::new();
        let previous = self
            .cancel
            .lock()
            .ok()
            .and_then(|mut slot| slot.replace(cancel.clone()));
        if let Some(previous) = previous {
            previous.cancel();
        }

        let host = Arc::clone(&self.host);
        let idle = self.idle.clone();
        tokio::spawn(poll_loop(host, idle, period, cancel));
        info!(period_secs = period.as_secs(), "idle monitor started");
    }

    pub fn stop(&self) {
        let token = self.cancel.lock().ok().and_then(|mut slot| slot.take());
        if let Some(token) = token {
            token.cancel();
            info!("idle monitor stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.cancel
            .lock()
            .map(|slot| slot.is_some())
            .unwrap_or(false)
    }

    /// Most recent reading.
    pub fn idle_seconds(&self) -> u64 {
        *self.idle.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.idle.subscribe()
    }
}

impl Drop for IdleMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn poll_loop(
    host: Arc<dyn HostShell>,
    idle: watch::Sender<u64>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let seconds = host.idle_seconds().await.unwrap_or_else(|e| {
                    debug!(error = %e, "idle time unavailable");
                    0
                });
                idle.send_replace(seconds);
            }
        }
    }
}
