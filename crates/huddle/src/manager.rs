//! Peer session lifecycle.
//!
//! The manager owns at most one live session. All mutations go through a
//! single async mutex, and every session carries a generation number so
//! results of work started for an ended session can be recognised and
//! thrown away.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use voffice_capture::{CaptureError, MediaStream};
use voffice_protocol::{MessageType, SignalData, SignalingMessage};
use voffice_signaling::{SignalSink, SignalingError};

use crate::error::{NegotiationError, SessionError};
use crate::negotiator::{Negotiator, NegotiatorFactory};
use crate::types::{EndReason, RemoteStream, SessionEvent, SessionInfo, SessionRole, SessionState};

/// Ended session ids remembered for discarding late traffic.
const RETIRED_SESSIONS: usize = 16;

struct LiveSession {
    /// `None` until a responder adopts the id of the first offer.
    id: Option<String>,
    generation: u64,
    role: SessionRole,
    state: SessionState,
    negotiator: Box<dyn Negotiator>,
    local: Option<MediaStream>,
    remote: Option<RemoteStream>,
    muted: bool,
    /// Audio track enablement captured when muting.
    pre_mute: Vec<(String, bool)>,
    started_at: DateTime<Utc>,
}

impl LiveSession {
    fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id.clone(),
            generation: self.generation,
            role: self.role,
            state: self.state,
            started_at: self.started_at,
            muted: self.muted,
            local_stream: self.local.as_ref().map(|s| s.id().to_string()),
            remote_stream: self.remote.clone(),
        }
    }
}

#[derive(Default)]
struct Slot {
    live: Option<LiveSession>,
    retired: VecDeque<String>,
    ended_any: bool,
}

impl Slot {
    fn retire(&mut self, id: String) {
        if self.retired.len() == RETIRED_SESSIONS {
            self.retired.pop_front();
        }
        self.retired.push_back(id);
    }

    fn is_retired(&self, id: &str) -> bool {
        self.retired.iter().any(|r| r == id)
    }
}

/// What to do with an inbound message once it passed filtering.
enum Routed {
    Ignored,
    Applied,
    End(EndReason, bool),
}

/// Owns the single live peer session.
pub struct SessionManager {
    slot: Mutex<Slot>,
    sink: Arc<dyn SignalSink>,
    factory: Arc<dyn NegotiatorFactory>,
    generation: AtomicU64,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: std::sync::Mutex<Option<mpsc::UnboundedReceiver<SessionEvent>>>,
}

impl SessionManager {
    pub fn new(sink: Arc<dyn SignalSink>, factory: Arc<dyn NegotiatorFactory>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            slot: Mutex::new(Slot::default()),
            sink,
            factory,
            generation: AtomicU64::new(0),
            events_tx,
            events_rx: std::sync::Mutex::new(Some(events_rx)),
        }
    }

    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&self) -> Option<mpsc::UnboundedReceiver<SessionEvent>> {
        self.events_rx.lock().ok().and_then(|mut rx| rx.take())
    }

    pub async fn state(&self) -> SessionState {
        let slot = self.slot.lock().await;
        match &slot.live {
            Some(live) => live.state,
            None if slot.ended_any => SessionState::Closed,
            None => SessionState::Idle,
        }
    }

    pub async fn snapshot(&self) -> Option<SessionInfo> {
        self.slot.lock().await.live.as_ref().map(LiveSession::info)
    }

    /// Generation of the live session, if any.
    pub async fn current_generation(&self) -> Option<u64> {
        self.slot.lock().await.live.as_ref().map(|l| l.generation)
    }

    pub async fn is_live(&self) -> bool {
        self.slot.lock().await.live.is_some()
    }

    pub async fn is_muted(&self) -> bool {
        self.slot
            .lock()
            .await
            .live
            .as_ref()
            .is_some_and(|l| l.muted)
    }

    /// Starts a session, ending any live one first. Returns its generation.
    pub async fn start_session(&self, role: SessionRole) -> Result<u64, SessionError> {
        let mut slot = self.slot.lock().await;
        self.end_locked(&mut slot, EndReason::Replaced, true);

        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let id = match role {
            SessionRole::Initiator => Some(Uuid::new_v4().to_string()),
            SessionRole::Responder => None,
        };
        info!(generation, ?role, session = ?id, "starting session");

        let mut live = LiveSession {
            id,
            generation,
            role,
            state: SessionState::Negotiating,
            negotiator: self.factory.create(role),
            local: None,
            remote: None,
            muted: false,
            pre_mute: Vec::new(),
            started_at: Utc::now(),
        };
        let opening = live.negotiator.open();
        let session_id = live.id.clone();
        slot.live = Some(live);
        self.emit(SessionEvent::StateChanged {
            generation,
            state: SessionState::Negotiating,
        });

        let opening = match opening {
            Ok(signals) => signals,
            Err(e) => {
                warn!(generation, error = %e, "negotiator failed to open");
                self.end_locked(&mut slot, EndReason::NegotiationFailed(e.to_string()), false);
                return Err(e.into());
            }
        };

        if let Some(session_id) = session_id {
            for data in &opening {
                if let Err(e) = self.send_signal(&session_id, data) {
                    warn!(generation, error = %e, "could not send opening signal");
                    self.end_locked(&mut slot, EndReason::SignalingFailed(e.to_string()), false);
                    return Err(e.into());
                }
            }
        }
        Ok(generation)
    }

    /// Attaches `stream` to the live session, releasing any stream it
    /// replaces, and offers its tracks to the peer. Without a live session
    /// the stream is released.
    pub async fn attach_local_stream(&self, mut stream: MediaStream) -> Result<(), SessionError> {
        let mut slot = self.slot.lock().await;
        let Some(live) = slot.live.as_mut() else {
            debug!(stream = %stream.id(), "no live session, releasing stream");
            stream.stop();
            return Err(SessionError::NoSession);
        };
        let outgoing = attach(live, stream);
        self.renegotiate(&mut slot, outgoing)
    }

    /// Like [`attach_local_stream`](Self::attach_local_stream), but only
    /// for the session identified by `generation`.
    pub async fn attach_local_stream_to(
        &self,
        generation: u64,
        mut stream: MediaStream,
    ) -> Result<(), SessionError> {
        let mut slot = self.slot.lock().await;
        let outgoing = match slot.live.as_mut() {
            Some(live) if live.generation == generation => attach(live, stream),
            Some(_) => {
                debug!(generation, stream = %stream.id(), "stale generation, releasing stream");
                stream.stop();
                return Err(SessionError::Stale(generation));
            }
            None => {
                debug!(generation, stream = %stream.id(), "session gone, releasing stream");
                stream.stop();
                return Err(SessionError::Stale(generation));
            }
        };
        self.renegotiate(&mut slot, outgoing)
    }

    /// Enables or disables every local audio track without renegotiating.
    ///
    /// Unmuting restores each track's state from before the mute. Returns
    /// `false` when nothing changed, including when no stream is attached.
    pub async fn set_muted(&self, muted: bool) -> bool {
        let mut slot = self.slot.lock().await;
        let Some(live) = slot.live.as_mut() else {
            return false;
        };
        if live.muted == muted {
            return false;
        }
        let Some(stream) = live.local.as_mut() else {
            debug!("no local stream, mute ignored");
            return false;
        };

        if muted {
            live.pre_mute = silence(stream);
        } else {
            for (track, enabled) in live.pre_mute.drain(..) {
                stream.set_track_enabled(&track, enabled);
            }
        }
        live.muted = muted;
        let generation = live.generation;
        info!(generation, muted, "mute changed");
        self.emit(SessionEvent::MuteChanged { generation, muted });
        true
    }

    /// Routes an inbound signaling message into the live session.
    ///
    /// Returns `false` when the message was discarded: no live session,
    /// wrong or retired session id, or an unusable payload.
    pub async fn on_remote_signal(&self, msg: SignalingMessage) -> bool {
        let mut slot = self.slot.lock().await;
        let routed = self.route(&mut slot, msg);
        match routed {
            Routed::Ignored => false,
            Routed::Applied => true,
            Routed::End(reason, send_bye) => {
                self.end_locked(&mut slot, reason, send_bye);
                true
            }
        }
    }

    /// Ends the live session. Safe to call in any state.
    pub async fn end(&self) -> bool {
        let mut slot = self.slot.lock().await;
        self.end_locked(&mut slot, EndReason::Left, true)
    }

    /// Ends the live session after the signaling channel went away.
    pub async fn on_channel_closed(&self) -> bool {
        let mut slot = self.slot.lock().await;
        self.end_locked(&mut slot, EndReason::ChannelClosed, false)
    }

    /// Ends session `generation` because its capture could not be acquired.
    /// Ignored if that session is no longer live.
    pub async fn on_acquisition_failed(&self, generation: u64, err: CaptureError) -> bool {
        let mut slot = self.slot.lock().await;
        if slot.live.as_ref().map(|l| l.generation) != Some(generation) {
            debug!(generation, error = %err, "acquisition failure for stale session");
            return false;
        }
        self.end_locked(&mut slot, EndReason::AcquisitionFailed(err), true)
    }

    fn route(&self, slot: &mut Slot, msg: SignalingMessage) -> Routed {
        let Some(live) = slot.live.as_ref() else {
            debug!(msg_type = msg.msg_type.as_str(), "no live session, dropping signal");
            return Routed::Ignored;
        };

        if let Some(sid) = msg.session_id() {
            if slot.is_retired(sid) {
                debug!(session = sid, "signal for ended session, dropping");
                return Routed::Ignored;
            }
            match &live.id {
                Some(live_id) if live_id != sid => {
                    debug!(session = sid, live = %live_id, "signal for another session, dropping");
                    return Routed::Ignored;
                }
                None if msg.msg_type == MessageType::Bye => {
                    debug!(session = sid, "bye before any offer, dropping");
                    return Routed::Ignored;
                }
                _ => {}
            }
        }

        if msg.msg_type == MessageType::Bye {
            info!(generation = live.generation, "remote peer left");
            return Routed::End(EndReason::RemoteBye, false);
        }

        let data = match msg.parse_data() {
            Ok(Some(data)) => data,
            Ok(None) => {
                warn!("signal without payload, dropping");
                return Routed::Ignored;
            }
            Err(e) => {
                warn!("malformed signal payload: {e}");
                return Routed::Ignored;
            }
        };

        let Some(live) = slot.live.as_mut() else {
            return Routed::Ignored;
        };
        if live.id.is_none() {
            if !matches!(data, SignalData::Offer { .. }) {
                debug!(kind = data.kind(), "responder waiting for offer, dropping");
                return Routed::Ignored;
            }
            let id = msg
                .session
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().to_string());
            info!(generation = live.generation, session = %id, "adopted session id from offer");
            live.id = Some(id);
        }
        let session_id = live.id.clone().unwrap_or_default();
        let generation = live.generation;

        let step = match live.negotiator.handle(data) {
            Ok(step) => step,
            Err(e) => {
                warn!(generation, error = %e, "negotiation failed");
                return Routed::End(EndReason::NegotiationFailed(e.to_string()), true);
            }
        };

        for out in &step.outgoing {
            if let Err(e) = self.send_signal(&session_id, out) {
                warn!(generation, error = %e, "could not send signal");
                return Routed::End(EndReason::SignalingFailed(e.to_string()), false);
            }
        }

        if let Some(remote) = step.connected {
            if live.state != SessionState::Connected {
                live.state = SessionState::Connected;
                info!(generation, remote = %remote.id, "session connected");
                self.emit(SessionEvent::StateChanged {
                    generation,
                    state: SessionState::Connected,
                });
            }
            if live.remote.as_ref() != Some(&remote) {
                debug!(generation, tracks = remote.tracks.len(), "remote stream updated");
                live.remote = Some(remote.clone());
                self.emit(SessionEvent::RemoteStream {
                    generation,
                    stream: remote,
                });
            }
        }
        Routed::Applied
    }

    /// Sends what the negotiator produced for a new local stream. A failure
    /// ends the live session.
    fn renegotiate(
        &self,
        slot: &mut Slot,
        outgoing: Result<Vec<SignalData>, NegotiationError>,
    ) -> Result<(), SessionError> {
        let Some((generation, session_id)) =
            slot.live.as_ref().map(|l| (l.generation, l.id.clone()))
        else {
            return Ok(());
        };
        let signals = match outgoing {
            Ok(signals) => signals,
            Err(e) => {
                warn!(generation, error = %e, "renegotiation failed");
                self.end_locked(slot, EndReason::NegotiationFailed(e.to_string()), true);
                return Err(e.into());
            }
        };
        // A responder has nothing to renegotiate before the first offer.
        let Some(session_id) = session_id else {
            return Ok(());
        };
        for data in &signals {
            if let Err(e) = self.send_signal(&session_id, data) {
                warn!(generation, error = %e, "could not send renegotiation");
                self.end_locked(slot, EndReason::SignalingFailed(e.to_string()), false);
                return Err(e.into());
            }
        }
        Ok(())
    }

    /// Tears the live session down. Returns `false` if there was none.
    fn end_locked(&self, slot: &mut Slot, reason: EndReason, send_bye: bool) -> bool {
        let Some(mut live) = slot.live.take() else {
            return false;
        };
        if let Some(mut stream) = live.local.take() {
            stream.stop();
        }
        live.remote = None;
        live.negotiator.close();

        if let Some(id) = live.id.take() {
            if send_bye && let Err(e) = self.sink.send(SignalingMessage::bye(id.clone())) {
                debug!(session = %id, error = %e, "bye not delivered");
            }
            slot.retire(id);
        }
        slot.ended_any = true;

        let duration = Utc::now() - live.started_at;
        info!(
            generation = live.generation,
            ?reason,
            duration_secs = duration.num_seconds(),
            "session ended"
        );
        self.emit(SessionEvent::StateChanged {
            generation: live.generation,
            state: SessionState::Closed,
        });
        self.emit(SessionEvent::Ended {
            generation: live.generation,
            reason,
        });
        true
    }

    fn send_signal(&self, session_id: &str, data: &SignalData) -> Result<(), SignalingError> {
        let msg = SignalingMessage::signal(session_id, data)?;
        debug!(session = session_id, kind = data.kind(), "sending signal");
        self.sink.send(msg)
    }

    fn emit(&self, event: SessionEvent) {
        if self.events_tx.send(event).is_err() {
            trace!("session events receiver dropped");
        }
    }
}

/// Makes `stream` the session's local stream. Returns what the negotiator
/// wants sent to the peer for it.
fn attach(
    live: &mut LiveSession,
    mut stream: MediaStream,
) -> Result<Vec<SignalData>, NegotiationError> {
    if let Some(mut old) = live.local.take() {
        debug!(stream = %old.id(), "replacing local stream");
        old.stop();
    }
    if live.muted {
        live.pre_mute = silence(&mut stream);
    }
    let outgoing = live
        .negotiator
        .set_local_tracks(stream.id(), stream.tracks());
    info!(
        generation = live.generation,
        stream = %stream.id(),
        source = %stream.source_id(),
        "local stream attached"
    );
    live.local = Some(stream);
    outgoing
}

/// Disables every audio track, returning their prior enablement.
fn silence(stream: &mut MediaStream) -> Vec<(String, bool)> {
    let before: Vec<(String, bool)> = stream
        .audio_tracks()
        .map(|t| (t.id.clone(), t.enabled))
        .collect();
    for (track, _) in &before {
        stream.set_track_enabled(track, false);
    }
    before
}
