//! Signaling channel for peer session negotiation.
//!
//! A single long-lived WebSocket carries [`SignalingMessage`]s in both
//! directions. The [`SignalingChannel`] owns the client, exposes push
//! events, and reconnects with bounded exponential backoff after an
//! unexpected drop.
//!
//! [`SignalingMessage`]: voffice_protocol::SignalingMessage

pub mod channel;
pub mod error;
mod pumps;
pub(crate) mod reconnection;
pub mod types;
pub mod ws_client;

pub use channel::{SignalSink, SignalingChannel};
pub use error::SignalingError;
pub use types::{ChannelEvent, ChannelState, ReconnectConfig};
pub use ws_client::{ClientHandlers, SignalingClient};
