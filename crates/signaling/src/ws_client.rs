//! WebSocket client for the signaling server.
//!
//! One client is one socket. It never reconnects on its own; the
//! [`SignalingChannel`](crate::SignalingChannel) replaces dead clients.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::{Mutex, mpsc};
use tokio::sync::mpsc::error::TrySendError;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use voffice_protocol::SignalingMessage;
use voffice_protocol::constants::{
    WS_CONNECT_TIMEOUT, WS_MAX_MESSAGE_SIZE, WS_PING_PERIOD, WS_PONG_WAIT, WS_SEND_BUFFER,
};

use crate::error::SignalingError;

/// Boxed handler for inbound messages.
pub type MessageHandler = Box<dyn Fn(SignalingMessage) + Send + Sync>;

/// Boxed handler fired once when the socket drops.
pub type DisconnectHandler = Box<dyn FnOnce() + Send + Sync>;

pub(crate) type MessageCallback = Arc<Mutex<Option<MessageHandler>>>;
pub(crate) type DisconnectCallback = Arc<Mutex<Option<DisconnectHandler>>>;

/// Handlers installed before the first frame is read, so nothing the
/// server sends right after the handshake is lost.
pub struct ClientHandlers {
    pub on_message: MessageHandler,
    /// Fires when the socket drops. Not fired after [`SignalingClient::close`].
    pub on_disconnect: DisconnectHandler,
}

/// A connected signaling socket with its read, write and ping pumps.
pub struct SignalingClient {
    write_tx: mpsc::Sender<tungstenite::Message>,
    on_disconnect: DisconnectCallback,
    read_handle: tokio::task::JoinHandle<()>,
    _write_handle: tokio::task::JoinHandle<()>,
    ping_handle: tokio::task::JoinHandle<()>,
    cancel: CancellationToken,
}

impl SignalingClient {
    /// Opens a socket to `url`, bounded by [`WS_CONNECT_TIMEOUT`].
    pub async fn connect(url: &str, handlers: ClientHandlers) -> Result<Self, SignalingError> {
        let mut ws_config = tungstenite::protocol::WebSocketConfig::default();
        ws_config.max_message_size = Some(WS_MAX_MESSAGE_SIZE);
        ws_config.max_frame_size = Some(WS_MAX_MESSAGE_SIZE);

        let (ws_stream, _) = tokio::time::timeout(
            WS_CONNECT_TIMEOUT,
            tokio_tungstenite::connect_async_with_config(url, Some(ws_config), false),
        )
        .await
        .map_err(|_| SignalingError::Timeout)?
        .map_err(SignalingError::Connect)?;

        info!(url, "signaling socket open");
        let (write, read) = ws_stream.split();
        Ok(Self::spawn(write, read, handlers))
    }

    /// Starts the pumps over an already-split socket.
    fn spawn<W, R>(write: W, read: R, handlers: ClientHandlers) -> Self
    where
        W: futures_util::Sink<tungstenite::Message, Error = tungstenite::Error>
            + Unpin
            + Send
            + 'static,
        R: futures_util::Stream<Item = Result<tungstenite::Message, tungstenite::Error>>
            + Unpin
            + Send
            + 'static,
    {
        let (write_tx, write_rx) = mpsc::channel::<tungstenite::Message>(WS_SEND_BUFFER);
        let on_message: MessageCallback = Arc::new(Mutex::new(Some(handlers.on_message)));
        let on_disconnect: DisconnectCallback = Arc::new(Mutex::new(Some(handlers.on_disconnect)));
        let cancel = CancellationToken::new();

        let write_handle = tokio::spawn(crate::pumps::write::write_pump(
            write,
            write_rx,
            cancel.clone(),
        ));

        let read_handle = tokio::spawn(crate::pumps::read::read_pump(
            read,
            on_message,
            on_disconnect.clone(),
            write_tx.clone(),
            WS_PONG_WAIT,
            cancel.clone(),
        ));

        let ping_handle = tokio::spawn(crate::pumps::ping::ping_pump(
            write_tx.clone(),
            WS_PING_PERIOD,
            cancel.clone(),
        ));

        Self {
            write_tx,
            on_disconnect,
            read_handle,
            _write_handle: write_handle,
            ping_handle,
            cancel,
        }
    }

    /// Queues `msg` for sending without waiting.
    pub fn send(&self, msg: &SignalingMessage) -> Result<(), SignalingError> {
        let json = serde_json::to_string(msg)?;
        self.write_tx
            .try_send(tungstenite::Message::Text(json.into()))
            .map_err(|e| match e {
                TrySendError::Full(_) => SignalingError::BufferFull,
                TrySendError::Closed(_) => SignalingError::Closed,
            })
    }

    /// Returns `false` once the socket dropped or was closed.
    pub fn is_open(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// Closes the socket without firing the disconnect handler.
    pub async fn close(&self) {
        debug!("closing signaling socket");
        self.on_disconnect.lock().await.take();
        let _ = self.write_tx.try_send(tungstenite::Message::Close(None));
        self.cancel.cancel();
    }
}

impl Drop for SignalingClient {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.read_handle.abort();
        self.ping_handle.abort();
        // The writer flushes queued frames and exits on cancel.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{sink, stream};
    use voffice_protocol::MessageType;

    type Frame = Result<tungstenite::Message, tungstenite::Error>;

    fn capture_sink(
        tx: mpsc::Sender<tungstenite::Message>,
    ) -> std::pin::Pin<
        Box<dyn futures_util::Sink<tungstenite::Message, Error = tungstenite::Error> + Send>,
    > {
        Box::pin(sink::unfold(tx, |tx, msg: tungstenite::Message| async move {
            let _ = tx.send(msg).await;
            Ok::<_, tungstenite::Error>(tx)
        }))
    }

    fn feed() -> (
        mpsc::Sender<Frame>,
        std::pin::Pin<Box<dyn futures_util::Stream<Item = Frame> + Send>>,
    ) {
        let (tx, rx) = mpsc::channel::<Frame>(4);
        let read = Box::pin(stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|f| (f, rx))
        }));
        (tx, read)
    }

    fn handlers() -> (
        ClientHandlers,
        mpsc::UnboundedReceiver<SignalingMessage>,
        mpsc::UnboundedReceiver<()>,
    ) {
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        let (dc_tx, dc_rx) = mpsc::unbounded_channel();
        let handlers = ClientHandlers {
            on_message: Box::new(move |msg| {
                let _ = msg_tx.send(msg);
            }),
            on_disconnect: Box::new(move || {
                let _ = dc_tx.send(());
            }),
        };
        (handlers, msg_rx, dc_rx)
    }

    #[tokio::test]
    async fn send_serializes_to_text_frame() {
        let (sink_tx, mut sink_rx) = mpsc::channel(16);
        let (_feed_tx, read) = feed();
        let (h, _, _) = handlers();
        let client = SignalingClient::spawn(capture_sink(sink_tx), read, h);

        client.send(&SignalingMessage::bye("s-1")).unwrap();
        match sink_rx.recv().await {
            Some(tungstenite::Message::Text(t)) => {
                let msg: SignalingMessage = serde_json::from_str(&t).unwrap();
                assert_eq!(msg.msg_type, MessageType::Bye);
                assert_eq!(msg.session_id(), Some("s-1"));
            }
            other => panic!("expected text frame, got {other:?}"),
        }
        assert!(client.is_open());
    }

    #[tokio::test]
    async fn first_frame_reaches_handler() {
        let (sink_tx, _sink_rx) = mpsc::channel(16);
        let (feed_tx, read) = feed();
        feed_tx
            .send(Ok(tungstenite::Message::Text(
                r#"{"type":"bye","session":"x"}"#.into(),
            )))
            .await
            .unwrap();

        let (h, mut msg_rx, _) = handlers();
        let _client = SignalingClient::spawn(capture_sink(sink_tx), read, h);

        let msg = msg_rx.recv().await.unwrap();
        assert_eq!(msg.session_id(), Some("x"));
    }

    #[tokio::test]
    async fn stream_end_fires_disconnect_once() {
        let (sink_tx, _sink_rx) = mpsc::channel(16);
        let (feed_tx, read) = feed();
        let (h, _, mut dc_rx) = handlers();
        let client = SignalingClient::spawn(capture_sink(sink_tx), read, h);

        drop(feed_tx);
        assert_eq!(dc_rx.recv().await, Some(()));
        assert_eq!(dc_rx.recv().await, None);
        assert!(!client.is_open());
    }

    #[tokio::test]
    async fn close_suppresses_disconnect() {
        let (sink_tx, mut sink_rx) = mpsc::channel(16);
        let (_feed_tx, read) = feed();
        let (h, _, mut dc_rx) = handlers();
        let client = SignalingClient::spawn(capture_sink(sink_tx), read, h);

        client.close().await;
        assert!(!client.is_open());
        assert!(matches!(
            sink_rx.recv().await,
            Some(tungstenite::Message::Close(_))
        ));
        // close() dropped the handler, so its sender is gone.
        assert_eq!(dc_rx.recv().await, None);
    }

    #[tokio::test]
    async fn connect_to_closed_port_fails() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (h, _, _) = handlers();
        let err = SignalingClient::connect(&format!("ws://{addr}/ws/signaling"), h)
            .await
            .err()
            .expect("connect should fail");
        assert!(err.is_connect_error());
    }
}
