//! Error types for the signaling channel.

use tokio_tungstenite::tungstenite;

/// Errors from the signaling transport.
#[derive(Debug, thiserror::Error)]
pub enum SignalingError {
    #[error("connect failed: {0}")]
    Connect(#[source] tungstenite::Error),

    #[error("WebSocket error: {0}")]
    Ws(#[from] tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("connect timed out")]
    Timeout,

    #[error("channel closed")]
    Closed,

    #[error("not connected")]
    NotConnected,

    #[error("send buffer full")]
    BufferFull,
}

impl SignalingError {
    /// Whether the failure happened while establishing the connection.
    pub fn is_connect_error(&self) -> bool {
        matches!(self, SignalingError::Connect(_) | SignalingError::Timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signaling_error_display() {
        assert_eq!(SignalingError::Timeout.to_string(), "connect timed out");
        assert_eq!(SignalingError::Closed.to_string(), "channel closed");
        assert_eq!(SignalingError::NotConnected.to_string(), "not connected");
        assert!(SignalingError::Timeout.is_connect_error());
        assert!(!SignalingError::Closed.is_connect_error());
    }

    #[test]
    fn connect_error_wraps_tungstenite() {
        let err = SignalingError::Connect(tungstenite::Error::ConnectionClosed);
        assert!(err.is_connect_error());
        assert!(err.to_string().starts_with("connect failed"));
    }
}
