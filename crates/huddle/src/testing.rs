//! In-memory [`SignalSink`] for tests and offline runs.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use voffice_protocol::{MessageType, SignalData, SignalingMessage};
use voffice_signaling::{SignalSink, SignalingError};

/// Records every message instead of sending it.
#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<SignalingMessage>>,
    offline: AtomicBool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every send fail with [`SignalingError::NotConnected`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Relaxed);
    }

    pub fn sent(&self) -> Vec<SignalingMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Drains and returns everything recorded so far.
    pub fn take(&self) -> Vec<SignalingMessage> {
        self.sent
            .lock()
            .map(|mut s| std::mem::take(&mut *s))
            .unwrap_or_default()
    }

    /// Recorded `signal` payloads, in send order.
    pub fn signals(&self) -> Vec<SignalData> {
        self.sent()
            .iter()
            .filter(|m| m.msg_type == MessageType::Signal)
            .filter_map(|m| m.parse_data().ok().flatten())
            .collect()
    }

    /// Session ids of recorded `bye` messages.
    pub fn byes(&self) -> Vec<String> {
        self.sent()
            .iter()
            .filter(|m| m.msg_type == MessageType::Bye)
            .filter_map(|m| m.session.clone())
            .collect()
    }
}

impl SignalSink for RecordingSink {
    fn send(&self, msg: SignalingMessage) -> Result<(), SignalingError> {
        if self.offline.load(Ordering::Relaxed) {
            return Err(SignalingError::NotConnected);
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(msg);
        }
        Ok(())
    }
}
