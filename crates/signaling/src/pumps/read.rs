//! Inbound frame reader for the signaling socket.

use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use voffice_protocol::SignalingMessage;
use voffice_protocol::constants::WS_MAX_MESSAGE_SIZE;

use crate::ws_client::{DisconnectCallback, MessageCallback};

/// Reads frames until the socket ends, errors, goes silent, or is cancelled.
///
/// Any inbound frame pushes the liveness deadline `pong_wait` forward. When
/// the loop exits for any reason other than cancellation, `cancel` is
/// tripped and the disconnect callback fires exactly once.
pub(crate) async fn read_pump<S>(
    mut read: S,
    on_message: MessageCallback,
    on_disconnect: DisconnectCallback,
    write_tx: mpsc::Sender<tungstenite::Message>,
    pong_wait: Duration,
    cancel: CancellationToken,
) where
    S: StreamExt<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
{
    let deadline = tokio::time::sleep(pong_wait);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,

            () = &mut deadline => {
                warn!("no traffic from signaling server within {pong_wait:?}, closing");
                break;
            }

            frame = read.next() => {
                let frame = match frame {
                    Some(Ok(frame)) => frame,
                    Some(Err(e)) => {
                        warn!("signaling read failed: {e}");
                        break;
                    }
                    None => {
                        debug!("signaling stream ended");
                        break;
                    }
                };
                deadline.as_mut().reset(tokio::time::Instant::now() + pong_wait);

                match frame {
                    tungstenite::Message::Text(text) => {
                        if let Some(msg) = decode_frame(&text) {
                            dispatch(msg, &on_message).await;
                        }
                    }
                    tungstenite::Message::Ping(data) => {
                        trace!("ping received");
                        let _ = write_tx.try_send(tungstenite::Message::Pong(data));
                    }
                    tungstenite::Message::Pong(_) => trace!("pong received"),
                    tungstenite::Message::Close(frame) => {
                        debug!(?frame, "signaling server closed the socket");
                        break;
                    }
                    _ => trace!("ignoring non-text frame"),
                }
            }
        }
    }

    // The socket is dead: stop the sibling pumps before reporting it.
    if cancel.is_cancelled() {
        return;
    }
    cancel.cancel();
    if let Some(cb) = on_disconnect.lock().await.take() {
        cb();
    }
}

/// Parses a text frame. Oversized or malformed frames are logged and dropped.
fn decode_frame(text: &str) -> Option<SignalingMessage> {
    if text.len() > WS_MAX_MESSAGE_SIZE {
        warn!(bytes = text.len(), "signaling frame too large, dropping");
        return None;
    }
    match serde_json::from_str::<SignalingMessage>(text) {
        Ok(msg) => Some(msg),
        Err(e) => {
            warn!("malformed signaling frame: {e}");
            None
        }
    }
}

async fn dispatch(msg: SignalingMessage, on_message: &MessageCallback) {
    trace!(msg_type = msg.msg_type.as_str(), session = ?msg.session, "signaling message received");
    let guard = on_message.lock().await;
    match guard.as_ref() {
        Some(cb) => cb(msg),
        None => warn!(msg_type = msg.msg_type.as_str(), "no message callback set, dropping"),
    }
}
