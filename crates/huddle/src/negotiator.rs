//! Negotiation seam and the shipped offer/answer negotiator.
//!
//! The [`SessionManager`](crate::SessionManager) never inspects payloads: it
//! hands every inbound [`SignalData`] to the session's [`Negotiator`] and
//! sends whatever comes back. A real media engine plugs in here.

use tracing::{debug, trace};

use voffice_capture::{MediaTrack, TrackKind};
use voffice_protocol::SignalData;

use crate::error::NegotiationError;
use crate::sdp::{Description, Direction, MediaSection};
use crate::types::{IceServer, RemoteStream, SessionRole};

/// Outcome of feeding one inbound signal to a negotiator.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct NegotiationStep {
    /// Signals to send back to the peer.
    pub outgoing: Vec<SignalData>,
    /// Set once media can flow; carries the remote stream.
    pub connected: Option<RemoteStream>,
}

/// One session's negotiation state.
pub trait Negotiator: Send {
    /// Signals to send as soon as the session starts.
    fn open(&mut self) -> Result<Vec<SignalData>, NegotiationError>;

    /// Records the local stream whose tracks are offered to the peer.
    ///
    /// Returns the signals to send when a description was already
    /// exchanged and the peer has to learn about the new tracks.
    fn set_local_tracks(
        &mut self,
        stream_id: &str,
        tracks: &[MediaTrack],
    ) -> Result<Vec<SignalData>, NegotiationError>;

    /// Applies an inbound signal.
    fn handle(&mut self, signal: SignalData) -> Result<NegotiationStep, NegotiationError>;

    /// Tears down; later calls fail with [`NegotiationError::Closed`].
    fn close(&mut self);
}

/// Creates a fresh [`Negotiator`] per session.
pub trait NegotiatorFactory: Send + Sync {
    fn create(&self, role: SessionRole) -> Box<dyn Negotiator>;
}

/// Offer/answer exchange over text descriptions.
///
/// Every description carries one video and one audio section, so muting
/// never needs renegotiation. Changing the local stream once a description
/// is out produces a fresh offer; answers to superseded offers are skipped.
pub struct OfferAnswerNegotiator {
    role: SessionRole,
    ice_servers: Vec<String>,
    local_stream: Option<String>,
    local_tracks: Vec<(String, TrackKind)>,
    version: u64,
    remote: Option<Description>,
    /// Offers sent and not yet answered.
    pending_offers: u32,
    candidates: usize,
    closed: bool,
}

impl OfferAnswerNegotiator {
    pub fn new(role: SessionRole, ice_servers: &[IceServer]) -> Self {
        Self {
            role,
            ice_servers: ice_servers.iter().flat_map(|s| s.urls.clone()).collect(),
            local_stream: None,
            local_tracks: Vec::new(),
            version: 0,
            remote: None,
            pending_offers: 0,
            candidates: 0,
            closed: false,
        }
    }

    /// Remote ICE candidates accepted so far.
    pub fn candidates_received(&self) -> usize {
        self.candidates
    }

    /// Whether the peer's description has been applied.
    pub fn has_remote_description(&self) -> bool {
        self.remote.is_some()
    }

    fn local_track(&self, kind: TrackKind) -> Option<&str> {
        self.local_tracks
            .iter()
            .find(|(_, k)| *k == kind)
            .map(|(id, _)| id.as_str())
    }

    fn section(&self, kind: TrackKind, mid: String, direction: Direction) -> MediaSection {
        let msid = match (direction.sends(), &self.local_stream, self.local_track(kind)) {
            (true, Some(stream), Some(track)) => Some((stream.clone(), track.to_string())),
            _ => None,
        };
        MediaSection {
            kind,
            mid,
            direction,
            msid,
        }
    }

    fn describe(&mut self, media: Vec<MediaSection>) -> String {
        self.version += 1;
        Description {
            version: self.version,
            ice_servers: self.ice_servers.clone(),
            media,
        }
        .render()
    }

    fn create_offer(&mut self) -> String {
        let media = [TrackKind::Video, TrackKind::Audio]
            .into_iter()
            .enumerate()
            .map(|(i, kind)| {
                let sending = self.local_track(kind).is_some();
                self.section(kind, i.to_string(), Direction::from_flags(sending, true))
            })
            .collect();
        self.describe(media)
    }

    fn offer(&mut self) -> SignalData {
        let sdp = self.create_offer();
        self.pending_offers += 1;
        debug!(version = self.version, pending = self.pending_offers, "created offer");
        SignalData::Offer { sdp }
    }

    fn create_answer(&mut self, offer: &Description) -> String {
        let media = offer
            .media
            .iter()
            .map(|m| {
                let send = m.direction.receives() && self.local_track(m.kind).is_some();
                let recv = m.direction.sends();
                self.section(m.kind, m.mid.clone(), Direction::from_flags(send, recv))
            })
            .collect();
        self.describe(media)
    }
}

impl Negotiator for OfferAnswerNegotiator {
    fn open(&mut self) -> Result<Vec<SignalData>, NegotiationError> {
        if self.closed {
            return Err(NegotiationError::Closed);
        }
        match self.role {
            SessionRole::Initiator => Ok(vec![self.offer()]),
            SessionRole::Responder => Ok(Vec::new()),
        }
    }

    fn set_local_tracks(
        &mut self,
        stream_id: &str,
        tracks: &[MediaTrack],
    ) -> Result<Vec<SignalData>, NegotiationError> {
        if self.closed {
            return Err(NegotiationError::Closed);
        }
        self.local_tracks = tracks
            .iter()
            .filter(|t| !t.stopped)
            .map(|t| (t.id.clone(), t.kind))
            .collect();
        self.local_stream = Some(stream_id.to_string());
        trace!(tracks = self.local_tracks.len(), "local tracks updated");

        // Nothing sent yet: the first description picks the tracks up.
        if self.pending_offers == 0 && self.remote.is_none() {
            return Ok(Vec::new());
        }
        Ok(vec![self.offer()])
    }

    fn handle(&mut self, signal: SignalData) -> Result<NegotiationStep, NegotiationError> {
        if self.closed {
            return Err(NegotiationError::Closed);
        }
        let accepts_offer = self.role == SessionRole::Responder
            || (self.remote.is_some() && self.pending_offers == 0);
        match (self.role, signal) {
            (_, SignalData::Offer { sdp }) if accepts_offer => {
                let offer = Description::parse(&sdp)?;
                let answer = self.create_answer(&offer);
                let remote = offer.remote_stream();
                self.remote = Some(offer);
                debug!(tracks = remote.tracks.len(), "answered offer");
                Ok(NegotiationStep {
                    outgoing: vec![SignalData::Answer { sdp: answer }],
                    connected: Some(remote),
                })
            }
            (_, SignalData::Answer { sdp }) if self.pending_offers > 0 => {
                let answer = Description::parse(&sdp)?;
                self.pending_offers -= 1;
                if self.pending_offers > 0 {
                    debug!(pending = self.pending_offers, "answer to superseded offer, skipped");
                    return Ok(NegotiationStep::default());
                }
                let remote = answer.remote_stream();
                self.remote = Some(answer);
                debug!(tracks = remote.tracks.len(), "answer applied");
                Ok(NegotiationStep {
                    outgoing: Vec::new(),
                    connected: Some(remote),
                })
            }
            (_, SignalData::Candidate { candidate }) => {
                self.candidates += 1;
                trace!(candidate = %candidate.candidate, total = self.candidates, "remote candidate");
                Ok(NegotiationStep::default())
            }
            (_, other) => Err(NegotiationError::UnexpectedSignal(other.kind())),
        }
    }

    fn close(&mut self) {
        self.closed = true;
        self.remote = None;
        self.pending_offers = 0;
    }
}

/// Builds [`OfferAnswerNegotiator`]s sharing one ICE server list.
#[derive(Debug, Clone, Default)]
pub struct OfferAnswerFactory {
    ice_servers: Vec<IceServer>,
}

impl OfferAnswerFactory {
    pub fn new(ice_servers: Vec<IceServer>) -> Self {
        Self { ice_servers }
    }
}

impl NegotiatorFactory for OfferAnswerFactory {
    fn create(&self, role: SessionRole) -> Box<dyn Negotiator> {
        Box::new(OfferAnswerNegotiator::new(role, &self.ice_servers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voffice_protocol::IceCandidate;

    fn servers() -> Vec<IceServer> {
        vec![IceServer::stun("stun:stun.l.google.com:19302")]
    }

    fn track(id: &str, kind: TrackKind) -> MediaTrack {
        MediaTrack {
            id: id.into(),
            kind,
            enabled: true,
            stopped: false,
        }
    }

    fn sdp_of(signal: &SignalData) -> &str {
        match signal {
            SignalData::Offer { sdp } | SignalData::Answer { sdp } => sdp,
            SignalData::Candidate { .. } => panic!("not a description"),
        }
    }

    #[test]
    fn initiator_opens_with_single_offer() {
        let mut n = OfferAnswerNegotiator::new(SessionRole::Initiator, &servers());
        assert!(
            n.set_local_tracks("s1", &[track("s1/video", TrackKind::Video)])
                .unwrap()
                .is_empty()
        );
        let out = n.open().unwrap();
        assert_eq!(out.len(), 1);
        let sdp = sdp_of(&out[0]);
        assert!(sdp.contains("a=ice-server:stun:stun.l.google.com:19302"));
        assert!(sdp.contains("a=msid:s1 s1/video"));
        assert!(sdp.contains("m=audio"));
    }

    #[test]
    fn responder_opens_silently() {
        let mut n = OfferAnswerNegotiator::new(SessionRole::Responder, &servers());
        assert!(n.open().unwrap().is_empty());
    }

    #[test]
    fn full_exchange_connects_both_sides() {
        let mut caller = OfferAnswerNegotiator::new(SessionRole::Initiator, &servers());
        caller
            .set_local_tracks("a1", &[
                track("a1/video", TrackKind::Video),
                track("a1/audio", TrackKind::Audio),
            ])
            .unwrap();
        let mut callee = OfferAnswerNegotiator::new(SessionRole::Responder, &servers());
        callee
            .set_local_tracks("b1", &[track("b1/audio", TrackKind::Audio)])
            .unwrap();

        let offer = caller.open().unwrap().remove(0);
        let step = callee.handle(offer).unwrap();
        let callee_view = step.connected.unwrap();
        assert_eq!(callee_view.id, "a1");
        assert_eq!(callee_view.tracks.len(), 2);
        assert_eq!(step.outgoing.len(), 1);

        let answer = step.outgoing.into_iter().next().unwrap();
        assert!(!caller.has_remote_description());
        let step = caller.handle(answer).unwrap();
        assert!(caller.has_remote_description());
        assert!(step.outgoing.is_empty());
        let caller_view = step.connected.unwrap();
        assert_eq!(caller_view.id, "b1");
        assert_eq!(caller_view.tracks.len(), 1);
        assert_eq!(caller_view.tracks[0].kind, TrackKind::Audio);
    }

    #[test]
    fn tracks_attached_after_offer_are_reoffered() {
        let mut caller = OfferAnswerNegotiator::new(SessionRole::Initiator, &servers());
        let mut callee = OfferAnswerNegotiator::new(SessionRole::Responder, &servers());
        let first = caller.open().unwrap().remove(0);

        let mut reoffer = caller
            .set_local_tracks("a1", &[
                track("a1/video", TrackKind::Video),
                track("a1/audio", TrackKind::Audio),
            ])
            .unwrap();
        assert_eq!(reoffer.len(), 1);
        let second = reoffer.remove(0);
        assert!(sdp_of(&second).contains("a=msid:a1 a1/video"));

        let step = callee.handle(first).unwrap();
        assert!(step.connected.unwrap().tracks.is_empty());
        let stale_answer = step.outgoing.into_iter().next().unwrap();

        let step = callee.handle(second).unwrap();
        let seen = step.connected.unwrap();
        assert_eq!(seen.id, "a1");
        assert!(seen.has_video());
        let answer = step.outgoing.into_iter().next().unwrap();

        assert_eq!(caller.handle(stale_answer).unwrap(), NegotiationStep::default());
        assert!(!caller.has_remote_description());
        assert!(caller.handle(answer).unwrap().connected.is_some());
        assert!(caller.has_remote_description());
    }

    #[test]
    fn stream_change_after_connect_renegotiates() {
        let mut caller = OfferAnswerNegotiator::new(SessionRole::Initiator, &servers());
        let mut callee = OfferAnswerNegotiator::new(SessionRole::Responder, &servers());
        let offer = caller.open().unwrap().remove(0);
        let answer = callee.handle(offer).unwrap().outgoing.remove(0);
        caller.handle(answer).unwrap();

        // Either side may re-offer once the first exchange is done.
        let reoffer = callee
            .set_local_tracks("b1", &[track("b1/video", TrackKind::Video)])
            .unwrap()
            .remove(0);
        let step = caller.handle(reoffer).unwrap();
        assert!(step.connected.unwrap().has_video());
        let answer = step.outgoing.into_iter().next().unwrap();
        let step = callee.handle(answer).unwrap();
        assert!(step.connected.is_some());
    }

    #[test]
    fn wrong_role_signals_are_rejected() {
        let mut n = OfferAnswerNegotiator::new(SessionRole::Initiator, &servers());
        let err = n
            .handle(SignalData::Offer { sdp: "v=0".into() })
            .unwrap_err();
        assert_eq!(err, NegotiationError::UnexpectedSignal("offer"));

        let mut n = OfferAnswerNegotiator::new(SessionRole::Responder, &servers());
        assert!(n.handle(SignalData::Answer { sdp: "v=0".into() }).is_err());
    }

    #[test]
    fn candidates_are_counted() {
        let mut n = OfferAnswerNegotiator::new(SessionRole::Responder, &servers());
        for _ in 0..3 {
            let step = n
                .handle(SignalData::Candidate {
                    candidate: IceCandidate {
                        candidate: "candidate:1 1 udp 1 10.0.0.1 5000 typ host".into(),
                        sdp_mid: Some("0".into()),
                        sdp_mline_index: Some(0),
                    },
                })
                .unwrap();
            assert_eq!(step, NegotiationStep::default());
        }
        assert_eq!(n.candidates_received(), 3);
    }

    #[test]
    fn closed_negotiator_refuses_work() {
        let mut n = OfferAnswerNegotiator::new(SessionRole::Initiator, &servers());
        n.close();
        assert_eq!(n.open().unwrap_err(), NegotiationError::Closed);
    }

    #[test]
    fn factory_builds_per_role() {
        let factory = OfferAnswerFactory::new(servers());
        let mut n = factory.create(SessionRole::Initiator);
        assert_eq!(n.open().unwrap().len(), 1);
        let mut n = factory.create(SessionRole::Responder);
        assert!(n.open().unwrap().is_empty());
    }
}
