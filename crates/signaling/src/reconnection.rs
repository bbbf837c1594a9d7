//! Reconnection with bounded exponential backoff.
//!
//! Holds the shared [`ChannelContext`], the handlers installed on each
//! fresh [`SignalingClient`] and the reconnect loop they spawn.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use voffice_protocol::SignalingMessage;

use crate::error::SignalingError;
use crate::types::{ChannelEvent, ChannelState, ReconnectConfig};
use crate::ws_client::{ClientHandlers, SignalingClient};

/// State shared between the channel, client callbacks and the reconnect
/// loop.
#[derive(Clone)]
pub(crate) struct ChannelContext {
    pub(crate) url: Arc<Mutex<Option<String>>>,
    pub(crate) client: Arc<Mutex<Option<Arc<SignalingClient>>>>,
    pub(crate) state: Arc<Mutex<ChannelState>>,
    pub(crate) events_tx: mpsc::Sender<ChannelEvent>,
    pub(crate) reconnect_cancel: Arc<Mutex<Option<CancellationToken>>>,
    pub(crate) manual_disconnect: Arc<AtomicBool>,
    pub(crate) config: ReconnectConfig,
}

impl ChannelContext {
    pub(crate) fn new(config: ReconnectConfig, events_tx: mpsc::Sender<ChannelEvent>) -> Self {
        Self {
            url: Arc::new(Mutex::new(None)),
            client: Arc::new(Mutex::new(None)),
            state: Arc::new(Mutex::new(ChannelState::Disconnected)),
            events_tx,
            reconnect_cancel: Arc::new(Mutex::new(None)),
            manual_disconnect: Arc::new(AtomicBool::new(false)),
            config,
        }
    }

    pub(crate) fn state(&self) -> ChannelState {
        self.state
            .lock()
            .map(|s| s.clone())
            .unwrap_or(ChannelState::Disconnected)
    }

    /// Stores `new_state` and emits `StateChanged` if it differs.
    pub(crate) fn set_state(&self, new_state: ChannelState) {
        let changed = match self.state.lock() {
            Ok(mut s) if *s != new_state => {
                *s = new_state.clone();
                true
            }
            _ => false,
        };
        if changed {
            debug!(state = ?new_state, "signaling state changed");
            self.emit(ChannelEvent::StateChanged(new_state));
        }
    }

    pub(crate) fn emit(&self, event: ChannelEvent) {
        if let Err(e) = self.events_tx.try_send(event) {
            warn!("failed to deliver signaling event: {e}");
        }
    }

    pub(crate) fn current_client(&self) -> Option<Arc<SignalingClient>> {
        self.client.lock().ok().and_then(|c| c.clone())
    }

    pub(crate) fn take_client(&self) -> Option<Arc<SignalingClient>> {
        self.client.lock().ok().and_then(|mut c| c.take())
    }

    fn url(&self) -> Option<String> {
        self.url.lock().ok().and_then(|u| u.clone())
    }
}

/// Cancels the active reconnect loop, if any.
pub(crate) fn cancel_reconnect(reconnect_cancel: &Mutex<Option<CancellationToken>>) {
    if let Ok(mut guard) = reconnect_cancel.lock()
        && let Some(token) = guard.take()
    {
        token.cancel();
    }
}

/// Opens a socket to `url` with this channel's handlers installed.
pub(crate) async fn open_client(
    url: &str,
    ctx: &ChannelContext,
) -> Result<SignalingClient, SignalingError> {
    SignalingClient::connect(url, client_handlers(ctx.clone())).await
}

/// Stores `client` as the live socket and marks the channel connected.
///
/// A socket that already dropped is discarded: its disconnect handler has
/// run and owns recovery.
pub(crate) async fn install_client(client: SignalingClient, ctx: &ChannelContext) {
    let previous = {
        let Ok(mut slot) = ctx.client.lock() else {
            return;
        };
        // Checked under the lock: the disconnect handler trips the socket's
        // token before it takes the slot.
        if !client.is_open() {
            debug!("signaling socket dropped before install");
            return;
        }
        slot.replace(Arc::new(client))
    };
    if let Some(old) = previous {
        old.close().await;
    }
    ctx.set_state(ChannelState::Connected);
}

/// Message forwarding plus the disconnect handler that starts reconnection.
fn client_handlers(ctx: ChannelContext) -> ClientHandlers {
    let events_tx = ctx.events_tx.clone();
    let on_message = Box::new(move |msg: SignalingMessage| {
        trace!(msg_type = msg.msg_type.as_str(), "forwarding signaling message");
        if let Err(e) = events_tx.try_send(ChannelEvent::Message(msg)) {
            warn!("failed to forward signaling message: {e}");
        }
    });

    let on_disconnect = Box::new(move || {
        ctx.take_client();
        ctx.set_state(ChannelState::Disconnected);

        if ctx.manual_disconnect.load(Ordering::Relaxed) {
            return;
        }

        let cancel = CancellationToken::new();
        cancel_reconnect(&ctx.reconnect_cancel);
        if let Ok(mut guard) = ctx.reconnect_cancel.lock() {
            *guard = Some(cancel.clone());
        }
        tokio::spawn(reconnect_loop(ctx.clone(), cancel));
    });

    ClientHandlers {
        on_message,
        on_disconnect,
    }
}

/// Retries the connection until it succeeds, is cancelled, or the attempt
/// ceiling is reached.
///
/// Boxed to break the type cycle with `client_handlers`, which spawns it.
pub(crate) fn reconnect_loop(
    ctx: ChannelContext,
    cancel: CancellationToken,
) -> Pin<Box<dyn std::future::Future<Output = ()> + Send>> {
    Box::pin(async move {
        let Some(url) = ctx.url() else {
            debug!("no signaling url recorded, not reconnecting");
            return;
        };

        let mut attempt: u32 = 0;
        loop {
            attempt = attempt.saturating_add(1);
            if !ctx.config.allows_attempt(attempt) {
                let attempts = attempt - 1;
                warn!(attempts, "signaling reconnection exhausted, giving up");
                ctx.set_state(ChannelState::Failed);
                ctx.emit(ChannelEvent::GaveUp { attempts });
                break;
            }

            let delay = ctx.config.delay_for_attempt(attempt);
            let delay_secs = delay.as_secs_f64();
            ctx.set_state(ChannelState::Reconnecting { attempt });
            ctx.emit(ChannelEvent::Reconnecting {
                attempt,
                next_retry_secs: delay_secs,
            });
            info!(
                attempt,
                delay_secs = format_args!("{delay_secs:.2}"),
                "reconnecting to signaling server"
            );

            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("signaling reconnect cancelled");
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }

            match open_client(&url, &ctx).await {
                Ok(client) => {
                    if cancel.is_cancelled() {
                        client.close().await;
                        return;
                    }
                    install_client(client, &ctx).await;
                    info!(attempt, "signaling reconnected");
                    break;
                }
                Err(e) => {
                    warn!(attempt, error = %e, "signaling reconnect attempt failed");
                }
            }

            if cancel.is_cancelled() {
                return;
            }
        }

        // A replacement loop always cancels this one first, so an
        // uncancelled token still in the slot is ours.
        if !cancel.is_cancelled()
            && let Ok(mut guard) = ctx.reconnect_cancel.lock()
        {
            *guard = None;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn fast_config(max_attempts: u32) -> ReconnectConfig {
        ReconnectConfig {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_factor: 2.0,
            max_attempts,
        }
    }

    async fn dead_url() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("ws://{addr}/ws/signaling")
    }

    #[test]
    fn cancel_reconnect_clears_token() {
        let slot = Mutex::new(None);
        let token = CancellationToken::new();
        *slot.lock().unwrap() = Some(token.clone());

        cancel_reconnect(&slot);

        assert!(slot.lock().unwrap().is_none());
        assert!(token.is_cancelled());
    }

    #[test]
    fn set_state_emits_only_on_change() {
        let (tx, mut rx) = mpsc::channel(8);
        let ctx = ChannelContext::new(ReconnectConfig::default(), tx);

        ctx.set_state(ChannelState::Connecting);
        ctx.set_state(ChannelState::Connecting);
        assert!(matches!(
            rx.try_recv(),
            Ok(ChannelEvent::StateChanged(ChannelState::Connecting))
        ));
        assert!(rx.try_recv().is_err());
        assert_eq!(ctx.state(), ChannelState::Connecting);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let (tx, mut rx) = mpsc::channel(64);
        let ctx = ChannelContext::new(fast_config(3), tx);
        *ctx.url.lock().unwrap() = Some(dead_url().await);

        reconnect_loop(ctx.clone(), CancellationToken::new()).await;

        let mut attempts_seen = Vec::new();
        let mut gave_up = None;
        while let Ok(ev) = rx.try_recv() {
            match ev {
                ChannelEvent::Reconnecting { attempt, .. } => attempts_seen.push(attempt),
                ChannelEvent::GaveUp { attempts } => gave_up = Some(attempts),
                _ => {}
            }
        }
        assert_eq!(attempts_seen, vec![1, 2, 3]);
        assert_eq!(gave_up, Some(3));
        assert_eq!(ctx.state(), ChannelState::Failed);
    }

    #[tokio::test]
    async fn zero_attempts_fails_immediately() {
        let (tx, mut rx) = mpsc::channel(8);
        let ctx = ChannelContext::new(fast_config(0), tx);
        *ctx.url.lock().unwrap() = Some(dead_url().await);

        reconnect_loop(ctx.clone(), CancellationToken::new()).await;

        assert!(matches!(
            rx.try_recv(),
            Ok(ChannelEvent::StateChanged(ChannelState::Failed))
        ));
        assert!(matches!(rx.try_recv(), Ok(ChannelEvent::GaveUp { attempts: 0 })));
    }

    #[tokio::test]
    async fn cancelled_loop_stops_quietly() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut config = fast_config(8);
        config.initial_delay = Duration::from_secs(60);
        config.max_delay = Duration::from_secs(60);
        let ctx = ChannelContext::new(config, tx);
        *ctx.url.lock().unwrap() = Some(dead_url().await);

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(reconnect_loop(ctx.clone(), cancel.clone()));
        tokio::task::yield_now().await;
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("loop should exit on cancel")
            .unwrap();

        let mut gave_up = false;
        while let Ok(ev) = rx.try_recv() {
            gave_up |= matches!(ev, ChannelEvent::GaveUp { .. });
        }
        assert!(!gave_up);
        assert_ne!(ctx.state(), ChannelState::Failed);
    }
}
