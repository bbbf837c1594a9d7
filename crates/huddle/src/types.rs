//! Session data model and events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use voffice_capture::{CaptureError, TrackKind};

/// Which side of the offer/answer exchange this peer plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionRole {
    /// Sends the offer.
    Initiator,
    /// Waits for an offer and answers it.
    Responder,
}

/// Lifecycle of the manager's session slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// No session has been started yet.
    Idle,
    Negotiating,
    Connected,
    /// The last session ended and none replaced it.
    Closed,
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq)]
pub enum EndReason {
    /// Local user left.
    Left,
    /// Remote peer sent `bye`.
    RemoteBye,
    /// A newer session took its place.
    Replaced,
    /// The signaling channel dropped or gave up.
    ChannelClosed,
    /// Sending a signaling message failed.
    SignalingFailed(String),
    /// The negotiator rejected a step.
    NegotiationFailed(String),
    /// Capture for this session could not be acquired.
    AcquisitionFailed(CaptureError),
}

/// STUN/TURN server handed to the negotiator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServer {
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl IceServer {
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }
}

/// A track announced by the remote peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTrack {
    pub id: String,
    pub kind: TrackKind,
}

/// Media the remote peer sends us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteStream {
    pub id: String,
    pub tracks: Vec<RemoteTrack>,
}

impl RemoteStream {
    pub fn has_video(&self) -> bool {
        self.tracks.iter().any(|t| t.kind == TrackKind::Video)
    }
}

/// Point-in-time view of the live session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionInfo {
    /// `None` for a responder that has not yet seen an offer.
    pub id: Option<String>,
    pub generation: u64,
    pub role: SessionRole,
    pub state: SessionState,
    pub started_at: DateTime<Utc>,
    pub muted: bool,
    pub local_stream: Option<String>,
    pub remote_stream: Option<RemoteStream>,
}

/// Notifications pushed by the [`SessionManager`](crate::SessionManager).
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StateChanged {
        generation: u64,
        state: SessionState,
    },
    RemoteStream {
        generation: u64,
        stream: RemoteStream,
    },
    Ended {
        generation: u64,
        reason: EndReason,
    },
    MuteChanged {
        generation: u64,
        muted: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ice_server_serializes_like_rtc_config() {
        let turn = IceServer {
            urls: vec!["turn:turn.example.com:3478".into()],
            username: Some("u".into()),
            credential: Some("p".into()),
        };
        let v = serde_json::to_value(&turn).unwrap();
        assert_eq!(v["urls"][0], "turn:turn.example.com:3478");
        assert_eq!(v["credential"], "p");

        let stun = serde_json::to_value(IceServer::stun("stun:stun.l.google.com:19302")).unwrap();
        assert!(stun.get("username").is_none());
    }

    #[test]
    fn role_and_state_wire_names() {
        assert_eq!(
            serde_json::to_string(&SessionRole::Initiator).unwrap(),
            "\"initiator\""
        );
        assert_eq!(
            serde_json::to_string(&SessionState::Negotiating).unwrap(),
            "\"negotiating\""
        );
    }

    #[test]
    fn remote_stream_video_detection() {
        let stream = RemoteStream {
            id: "r".into(),
            tracks: vec![RemoteTrack {
                id: "a".into(),
                kind: TrackKind::Audio,
            }],
        };
        assert!(!stream.has_video());
    }
}
