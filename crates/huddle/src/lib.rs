//! Huddle sessions: one peer link at a time, negotiated over the signaling
//! channel and fed by a local capture stream.

pub mod error;
pub mod manager;
pub mod negotiator;
mod sdp;
pub mod testing;
pub mod types;

pub use error::{NegotiationError, SessionError};
pub use manager::SessionManager;
pub use negotiator::{
    NegotiationStep, Negotiator, NegotiatorFactory, OfferAnswerFactory, OfferAnswerNegotiator,
};
pub use types::{
    EndReason, IceServer, RemoteStream, RemoteTrack, SessionEvent, SessionInfo, SessionRole,
    SessionState,
};
