use serde::{Deserialize, Serialize};

use crate::constants::MessageType;
use crate::signal::SignalData;

/// Envelope for everything exchanged over the signaling channel.
///
/// The minimal form `{"type":"signal","data":{...}}` is accepted on input;
/// outbound messages always carry the `session` identifier so a peer can
/// discard traffic that belongs to a session it already ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalingMessage {
    #[serde(rename = "type")]
    pub msg_type: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl SignalingMessage {
    /// Creates a `signal` message carrying a negotiation payload.
    pub fn signal(session: impl Into<String>, data: &SignalData) -> Result<Self, serde_json::Error> {
        Ok(Self {
            msg_type: MessageType::Signal,
            session: Some(session.into()),
            data: Some(serde_json::to_value(data)?),
        })
    }

    /// Creates a `bye` message announcing the end of a session.
    pub fn bye(session: impl Into<String>) -> Self {
        Self {
            msg_type: MessageType::Bye,
            session: Some(session.into()),
            data: None,
        }
    }

    /// Deserializes the negotiation payload.
    pub fn parse_data(&self) -> Result<Option<SignalData>, serde_json::Error> {
        match &self.data {
            Some(v) => Ok(Some(serde_json::from_value(v.clone())?)),
            None => Ok(None),
        }
    }

    /// Returns the session identifier, if the sender supplied one.
    pub fn session_id(&self) -> Option<&str> {
        self.session.as_deref()
    }
}
