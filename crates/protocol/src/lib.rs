//! Wire protocol types for VOffice signaling plus the data model shared
//! between the capture, session, presence and settings crates.

pub mod constants;
pub mod envelope;
pub mod signal;
pub mod types;

pub use constants::MessageType;
pub use envelope::SignalingMessage;
pub use signal::{IceCandidate, SignalData};
pub use types::{CaptureSource, ImageBlob, Presence, SourceKind, SourceKinds};
