//! Capture acquisition.

use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::error::CaptureError;
use crate::platform::CapturePlatform;
use crate::stream::{MediaStream, StreamInner};

/// Options for opening a capture stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureOptions {
    /// Also capture system audio alongside the video.
    pub audio: bool,
}

/// Opens capture streams, keeping at most one outstanding.
///
/// Acquiring while an earlier stream is still live releases the earlier
/// one; its owner will see [`MediaStream::is_released`] turn `true`.
pub struct CaptureAcquirer {
    platform: Arc<dyn CapturePlatform>,
    outstanding: Mutex<Option<Arc<StreamInner>>>,
}

impl CaptureAcquirer {
    pub fn new(platform: Arc<dyn CapturePlatform>) -> Self {
        Self {
            platform,
            outstanding: Mutex::new(None),
        }
    }

    /// Obtains a live stream for `source_id`.
    pub async fn acquire(
        &self,
        source_id: &str,
        options: CaptureOptions,
    ) -> Result<MediaStream, CaptureError> {
        if source_id.is_empty() {
            return Err(CaptureError::SourceNotFound(String::new()));
        }

        self.release_outstanding();

        debug!(source = %source_id, audio = options.audio, "acquiring capture stream");
        let desc = match self.platform.open_stream(source_id, options).await {
            Ok(d) => d,
            Err(e) => {
                warn!(source = %source_id, error = %e, "capture acquisition failed");
                return Err(e);
            }
        };

        let stream = MediaStream::new(desc, source_id, self.platform.clone());

        // Another acquisition may have completed while we were waiting on
        // the platform; whichever finishes last is the outstanding one.
        let previous = self
            .outstanding
            .lock()
            .ok()
            .and_then(|mut guard| guard.replace(stream.shared()));
        if let Some(prev) = previous
            && prev.release()
        {
            debug!(stream = %prev.id(), "released superseded capture stream");
        }

        info!(
            source = %source_id,
            stream = %stream.id(),
            tracks = stream.tracks().len(),
            "capture stream acquired"
        );
        Ok(stream)
    }

    /// Returns `true` if a stream handed out by this acquirer is still open.
    pub fn has_outstanding(&self) -> bool {
        self.outstanding
            .lock()
            .map(|g| g.as_ref().is_some_and(|s| !s.is_released()))
            .unwrap_or(false)
    }

    /// Releases the outstanding stream, if any.
    pub fn release_all(&self) {
        self.release_outstanding();
    }

    fn release_outstanding(&self) {
        let previous = self.outstanding.lock().ok().and_then(|mut g| g.take());
        if let Some(prev) = previous
            && prev.release()
        {
            debug!(stream = %prev.id(), "released previous capture stream before re-acquire");
        }
    }
}
