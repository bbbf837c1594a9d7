//! Outbound frame writer for the signaling socket.

use futures_util::SinkExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Drains queued frames into the socket until cancelled or closed.
///
/// On cancellation, frames already queued are still written before the
/// final close frame, so a `bye` queued just ahead of a close is not lost.
pub(crate) async fn write_pump<S>(
    mut write: S,
    mut write_rx: mpsc::Receiver<tungstenite::Message>,
    cancel: CancellationToken,
) where
    S: SinkExt<tungstenite::Message, Error = tungstenite::Error> + Unpin,
{
    loop {
        tokio::select! {
            biased;
            frame = write_rx.recv() => {
                let Some(frame) = frame else { break };
                match forward(&mut write, frame).await {
                    Flow::Continue => {}
                    Flow::Done => return,
                }
            }
            _ = cancel.cancelled() => break,
        }
    }

    while let Ok(frame) = write_rx.try_recv() {
        if let Flow::Done = forward(&mut write, frame).await {
            return;
        }
    }
    let _ = write.send(tungstenite::Message::Close(None)).await;
}

enum Flow {
    Continue,
    Done,
}

async fn forward<S>(write: &mut S, frame: tungstenite::Message) -> Flow
where
    S: SinkExt<tungstenite::Message, Error = tungstenite::Error> + Unpin,
{
    let closing = matches!(frame, tungstenite::Message::Close(_));
    if let Err(e) = write.send(frame).await {
        warn!("signaling write failed: {e}");
        return Flow::Done;
    }
    if closing {
        debug!("close frame sent");
        return Flow::Done;
    }
    Flow::Continue
}
