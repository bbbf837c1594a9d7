//! Error types for peer sessions.

use voffice_signaling::SignalingError;

/// Failure inside a [`Negotiator`](crate::Negotiator).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NegotiationError {
    #[error("unexpected {0} for this role")]
    UnexpectedSignal(&'static str),

    #[error("malformed session description: {0}")]
    BadDescription(String),

    #[error("negotiator closed")]
    Closed,
}

/// Errors from [`SessionManager`](crate::SessionManager) operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no live session")]
    NoSession,

    #[error("session generation {0} is no longer live")]
    Stale(u64),

    #[error("signaling failed: {0}")]
    Signaling(#[from] SignalingError),

    #[error("negotiation failed: {0}")]
    Negotiation(#[from] NegotiationError),
}
