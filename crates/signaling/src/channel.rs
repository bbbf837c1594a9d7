//! The long-lived signaling channel.

use std::sync::Mutex;
use std::sync::atomic::Ordering;

use tokio::sync::mpsc;
use tracing::{debug, info};

use voffice_protocol::SignalingMessage;

use crate::error::SignalingError;
use crate::reconnection::{ChannelContext, cancel_reconnect, install_client, open_client};
use crate::types::{ChannelEvent, ChannelState, ReconnectConfig};

/// Capacity of the channel event queue.
const EVENT_BUFFER: usize = 256;

/// Outbound half of a signaling transport.
///
/// `send` never waits: it queues the frame or fails immediately.
pub trait SignalSink: Send + Sync {
    fn send(&self, msg: SignalingMessage) -> Result<(), SignalingError>;
}

/// A signaling connection that survives socket drops.
///
/// Inbound messages and state changes arrive as [`ChannelEvent`]s on the
/// receiver returned by [`take_events`](Self::take_events).
pub struct SignalingChannel {
    ctx: ChannelContext,
    events_rx: Mutex<Option<mpsc::Receiver<ChannelEvent>>>,
}

impl SignalingChannel {
    pub fn new(config: ReconnectConfig) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        Self {
            ctx: ChannelContext::new(config, events_tx),
            events_rx: Mutex::new(Some(events_rx)),
        }
    }

    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&self) -> Option<mpsc::Receiver<ChannelEvent>> {
        self.events_rx.lock().ok().and_then(|mut rx| rx.take())
    }

    pub fn state(&self) -> ChannelState {
        self.ctx.state()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Connects to `url`, replacing any existing connection.
    ///
    /// Also the way out of [`ChannelState::Failed`]. The url is remembered
    /// for automatic reconnection.
    pub async fn connect(&self, url: &str) -> Result<(), SignalingError> {
        cancel_reconnect(&self.ctx.reconnect_cancel);
        self.ctx.manual_disconnect.store(false, Ordering::Relaxed);
        if let Ok(mut u) = self.ctx.url.lock() {
            *u = Some(url.to_string());
        }

        if let Some(old) = self.ctx.take_client() {
            old.close().await;
        }

        self.ctx.set_state(ChannelState::Connecting);
        info!(url, "connecting to signaling server");

        match open_client(url, &self.ctx).await {
            Ok(client) => {
                install_client(client, &self.ctx).await;
                Ok(())
            }
            Err(e) => {
                self.ctx.set_state(ChannelState::Disconnected);
                Err(e)
            }
        }
    }

    /// Closes the connection. User-initiated, so it never reconnects.
    pub async fn disconnect(&self) {
        self.ctx.manual_disconnect.store(true, Ordering::Relaxed);
        cancel_reconnect(&self.ctx.reconnect_cancel);
        if let Some(client) = self.ctx.take_client() {
            client.close().await;
            debug!("signaling socket closed by user");
        }
        self.ctx.set_state(ChannelState::Disconnected);
    }

    /// Disconnects and stops all background work.
    pub async fn shutdown(&self) {
        self.disconnect().await;
        info!("signaling channel shut down");
    }
}

impl SignalSink for SignalingChannel {
    fn send(&self, msg: SignalingMessage) -> Result<(), SignalingError> {
        let client = self
            .ctx
            .current_client()
            .ok_or(SignalingError::NotConnected)?;
        client.send(&msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::Message;
    use voffice_protocol::MessageType;

    fn fast_config(max_attempts: u32) -> ReconnectConfig {
        ReconnectConfig {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(20),
            backoff_factor: 2.0,
            max_attempts,
        }
    }

    async fn listen() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}/ws/signaling", listener.local_addr().unwrap());
        (listener, url)
    }

    /// Accepts one socket, optionally greets it, then records every text
    /// frame until the peer goes away.
    async fn serve_one(
        listener: &TcpListener,
        greeting: Option<&str>,
        seen: &mpsc::UnboundedSender<String>,
    ) {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
        if let Some(g) = greeting {
            ws.send(Message::Text(g.into())).await.unwrap();
        }
        while let Some(Ok(frame)) = ws.next().await {
            if let Message::Text(t) = frame {
                let _ = seen.send(t.to_string());
            }
        }
    }

    async fn next_event(rx: &mut mpsc::Receiver<ChannelEvent>) -> ChannelEvent {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for channel event")
            .expect("event stream closed")
    }

    async fn wait_for_state(rx: &mut mpsc::Receiver<ChannelEvent>, want: ChannelState) {
        loop {
            if let ChannelEvent::StateChanged(s) = next_event(rx).await
                && s == want
            {
                return;
            }
        }
    }

    #[test]
    fn take_events_once() {
        let channel = SignalingChannel::new(ReconnectConfig::default());
        assert!(channel.take_events().is_some());
        assert!(channel.take_events().is_none());
        assert_eq!(channel.state(), ChannelState::Disconnected);
    }

    #[test]
    fn send_without_connection_fails() {
        let channel = SignalingChannel::new(ReconnectConfig::default());
        let err = channel.send(SignalingMessage::bye("s")).unwrap_err();
        assert!(matches!(err, SignalingError::NotConnected));
    }

    #[tokio::test]
    async fn messages_flow_both_ways() {
        let (listener, url) = listen().await;
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            serve_one(&listener, Some(r#"{"type":"bye","session":"srv"}"#), &seen_tx).await;
        });

        let channel = SignalingChannel::new(ReconnectConfig::default());
        let mut events = channel.take_events().unwrap();
        channel.connect(&url).await.unwrap();
        assert!(channel.is_connected());

        loop {
            if let ChannelEvent::Message(msg) = next_event(&mut events).await {
                assert_eq!(msg.msg_type, MessageType::Bye);
                assert_eq!(msg.session_id(), Some("srv"));
                break;
            }
        }

        channel.send(SignalingMessage::bye("client")).unwrap();
        let raw = tokio::time::timeout(Duration::from_secs(5), seen_rx.recv())
            .await
            .unwrap()
            .unwrap();
        let parsed: SignalingMessage = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.session_id(), Some("client"));

        channel.shutdown().await;
    }

    #[tokio::test]
    async fn refused_connect_reports_error() {
        let (listener, url) = listen().await;
        drop(listener);

        let channel = SignalingChannel::new(fast_config(3));
        let mut events = channel.take_events().unwrap();
        let err = channel.connect(&url).await.unwrap_err();
        assert!(err.is_connect_error());
        assert_eq!(channel.state(), ChannelState::Disconnected);

        assert!(matches!(
            next_event(&mut events).await,
            ChannelEvent::StateChanged(ChannelState::Connecting)
        ));
        assert!(matches!(
            next_event(&mut events).await,
            ChannelEvent::StateChanged(ChannelState::Disconnected)
        ));
    }

    #[tokio::test]
    async fn reconnects_after_server_drop() {
        let (listener, url) = listen().await;
        let (seen_tx, _seen_rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            // First socket is dropped right after the handshake.
            let (tcp, _) = listener.accept().await.unwrap();
            let ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            drop(ws);
            serve_one(&listener, None, &seen_tx).await;
        });

        let channel = SignalingChannel::new(fast_config(5));
        let mut events = channel.take_events().unwrap();
        channel.connect(&url).await.unwrap();

        wait_for_state(&mut events, ChannelState::Connected).await;
        wait_for_state(&mut events, ChannelState::Disconnected).await;
        let mut saw_retry = false;
        loop {
            match next_event(&mut events).await {
                ChannelEvent::Reconnecting { attempt, .. } => {
                    assert!(attempt >= 1);
                    saw_retry = true;
                }
                ChannelEvent::StateChanged(ChannelState::Connected) => break,
                _ => {}
            }
        }
        assert!(saw_retry);
        assert!(channel.is_connected());
        channel.shutdown().await;
    }

    #[tokio::test]
    async fn gives_up_when_server_stays_down() {
        let (listener, url) = listen().await;
        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            drop(ws);
            drop(listener);
        });

        let channel = SignalingChannel::new(fast_config(2));
        let mut events = channel.take_events().unwrap();
        channel.connect(&url).await.unwrap();

        loop {
            if let ChannelEvent::GaveUp { attempts } = next_event(&mut events).await {
                assert_eq!(attempts, 2);
                break;
            }
        }
        assert_eq!(channel.state(), ChannelState::Failed);
        assert!(matches!(
            channel.send(SignalingMessage::bye("s")),
            Err(SignalingError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn manual_disconnect_does_not_reconnect() {
        let (listener, url) = listen().await;
        let (seen_tx, _seen_rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            serve_one(&listener, None, &seen_tx).await;
        });

        let channel = SignalingChannel::new(fast_config(5));
        let mut events = channel.take_events().unwrap();
        channel.connect(&url).await.unwrap();
        channel.disconnect().await;
        assert_eq!(channel.state(), ChannelState::Disconnected);

        tokio::time::sleep(Duration::from_millis(100)).await;
        while let Ok(ev) = events.try_recv() {
            assert!(
                !matches!(ev, ChannelEvent::Reconnecting { .. }),
                "manual disconnect must not reconnect"
            );
        }
    }
}
