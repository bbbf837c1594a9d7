use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Time allowed for the WebSocket handshake with the signaling server.
pub const WS_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Read deadline: if nothing (pong, signal, bye) arrives within this window
/// the signaling link is considered dead.
pub const WS_PONG_WAIT: Duration = Duration::from_secs(30);

/// How often to send pings. Must stay well below [`WS_PONG_WAIT`].
pub const WS_PING_PERIOD: Duration = Duration::from_secs(5);

/// Maximum inbound signaling frame size (1 MiB). SDP blobs are a few KiB.
pub const WS_MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Capacity of the outbound frame queue.
pub const WS_SEND_BUFFER: usize = 256;

/// Signaling envelope type identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    /// Negotiation payload (offer, answer or ICE candidate).
    #[serde(rename = "signal")]
    Signal,
    /// The sender ended the session.
    #[serde(rename = "bye")]
    Bye,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Signal => "signal",
            MessageType::Bye => "bye",
        }
    }
}
