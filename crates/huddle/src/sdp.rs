//! Minimal session description text.
//!
//! Only what the offer/answer negotiator needs: a version, the ICE servers
//! in use and one media section per transceiver.

use std::fmt::Write as _;

use voffice_capture::TrackKind;

use crate::error::NegotiationError;
use crate::types::{RemoteStream, RemoteTrack};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    SendRecv,
    SendOnly,
    RecvOnly,
    Inactive,
}

impl Direction {
    fn as_str(self) -> &'static str {
        match self {
            Direction::SendRecv => "sendrecv",
            Direction::SendOnly => "sendonly",
            Direction::RecvOnly => "recvonly",
            Direction::Inactive => "inactive",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "sendrecv" => Some(Direction::SendRecv),
            "sendonly" => Some(Direction::SendOnly),
            "recvonly" => Some(Direction::RecvOnly),
            "inactive" => Some(Direction::Inactive),
            _ => None,
        }
    }

    /// Whether the side that wrote this direction sends media.
    pub(crate) fn sends(self) -> bool {
        matches!(self, Direction::SendRecv | Direction::SendOnly)
    }

    /// Whether the side that wrote this direction accepts media.
    pub(crate) fn receives(self) -> bool {
        matches!(self, Direction::SendRecv | Direction::RecvOnly)
    }

    pub(crate) fn from_flags(send: bool, recv: bool) -> Self {
        match (send, recv) {
            (true, true) => Direction::SendRecv,
            (true, false) => Direction::SendOnly,
            (false, true) => Direction::RecvOnly,
            (false, false) => Direction::Inactive,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MediaSection {
    pub(crate) kind: TrackKind,
    pub(crate) mid: String,
    pub(crate) direction: Direction,
    /// `(stream id, track id)` of the track sent on this section.
    pub(crate) msid: Option<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Description {
    pub(crate) version: u64,
    pub(crate) ice_servers: Vec<String>,
    pub(crate) media: Vec<MediaSection>,
}

fn kind_token(kind: TrackKind) -> (&'static str, u8) {
    match kind {
        TrackKind::Video => ("video", 96),
        TrackKind::Audio => ("audio", 111),
    }
}

impl Description {
    pub(crate) fn render(&self) -> String {
        let mut out = String::new();
        let _ = write!(out, "v=0\r\no=voffice {} 1 IN IP4 0.0.0.0\r\n", self.version);
        out.push_str("s=voffice-huddle\r\nt=0 0\r\n");
        for url in &self.ice_servers {
            let _ = write!(out, "a=ice-server:{url}\r\n");
        }
        for m in &self.media {
            let (token, pt) = kind_token(m.kind);
            let _ = write!(out, "m={token} 9 UDP/TLS/RTP/SAVPF {pt}\r\n");
            let _ = write!(out, "a=mid:{}\r\n", m.mid);
            let _ = write!(out, "a={}\r\n", m.direction.as_str());
            if let Some((stream, track)) = &m.msid {
                let _ = write!(out, "a=msid:{stream} {track}\r\n");
            }
        }
        out
    }

    pub(crate) fn parse(text: &str) -> Result<Self, NegotiationError> {
        let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
        if lines.next() != Some("v=0") {
            return Err(NegotiationError::BadDescription(
                "missing version line".into(),
            ));
        }

        let mut desc = Description {
            version: 0,
            ice_servers: Vec::new(),
            media: Vec::new(),
        };
        // Attribute lines after an unsupported media section are skipped.
        let mut in_unknown_section = false;

        for line in lines {
            if let Some(rest) = line.strip_prefix("o=") {
                desc.version = rest
                    .split_whitespace()
                    .nth(1)
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(0);
            } else if let Some(rest) = line.strip_prefix("m=") {
                let kind = match rest.split_whitespace().next() {
                    Some("video") => Some(TrackKind::Video),
                    Some("audio") => Some(TrackKind::Audio),
                    _ => None,
                };
                in_unknown_section = kind.is_none();
                if let Some(kind) = kind {
                    desc.media.push(MediaSection {
                        kind,
                        mid: desc.media.len().to_string(),
                        direction: Direction::SendRecv,
                        msid: None,
                    });
                }
            } else if let Some(attr) = line.strip_prefix("a=") {
                if in_unknown_section {
                    continue;
                }
                match desc.media.last_mut() {
                    None => {
                        if let Some(url) = attr.strip_prefix("ice-server:") {
                            desc.ice_servers.push(url.to_string());
                        }
                    }
                    Some(m) => {
                        if let Some(mid) = attr.strip_prefix("mid:") {
                            m.mid = mid.to_string();
                        } else if let Some(msid) = attr.strip_prefix("msid:") {
                            let mut parts = msid.split_whitespace();
                            if let (Some(s), Some(t)) = (parts.next(), parts.next()) {
                                m.msid = Some((s.to_string(), t.to_string()));
                            }
                        } else if let Some(dir) = Direction::parse(attr) {
                            m.direction = dir;
                        }
                    }
                }
            }
        }
        Ok(desc)
    }

    /// The media this description's author will send us.
    pub(crate) fn remote_stream(&self) -> RemoteStream {
        let stream_id = self
            .media
            .iter()
            .find_map(|m| m.msid.as_ref().map(|(s, _)| s.clone()))
            .unwrap_or_else(|| format!("remote-{}", self.version));
        let tracks = self
            .media
            .iter()
            .filter(|m| m.direction.sends())
            .map(|m| RemoteTrack {
                id: m
                    .msid
                    .as_ref()
                    .map(|(_, t)| t.clone())
                    .unwrap_or_else(|| format!("{stream_id}/{}", m.mid)),
                kind: m.kind,
            })
            .collect();
        RemoteStream {
            id: stream_id,
            tracks,
        }
    }
}
