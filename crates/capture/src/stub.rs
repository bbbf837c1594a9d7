//! In-process [`CapturePlatform`] for tests and offline runs.
//!
//! Counts every open and close so callers can assert that no capture
//! handle outlives its session.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use voffice_protocol::{CaptureSource, SourceKinds};

use crate::acquirer::CaptureOptions;
use crate::error::CaptureError;
use crate::platform::{CapturePlatform, PlatformFuture, StreamDescriptor, TrackDescriptor};
use crate::stream::TrackKind;

#[derive(Default)]
struct StubState {
    /// Open streams: stream id -> track id -> enabled.
    open: HashMap<String, HashMap<String, bool>>,
}

/// Test double for the host capture capability.
pub struct StubPlatform {
    sources: Mutex<Vec<CaptureSource>>,
    state: Mutex<StubState>,
    unavailable: AtomicBool,
    deny_permission: AtomicBool,
    open_delay: Mutex<Option<Duration>>,
    list_delay: Mutex<Option<Duration>>,
    next_id: AtomicUsize,
    opened: AtomicUsize,
    closed: AtomicUsize,
}

impl StubPlatform {
    pub fn new(sources: Vec<CaptureSource>) -> Self {
        Self {
            sources: Mutex::new(sources),
            state: Mutex::new(StubState::default()),
            unavailable: AtomicBool::new(false),
            deny_permission: AtomicBool::new(false),
            open_delay: Mutex::new(None),
            list_delay: Mutex::new(None),
            next_id: AtomicUsize::new(0),
            opened: AtomicUsize::new(0),
            closed: AtomicUsize::new(0),
        }
    }

    /// One screen and one window.
    pub fn with_default_sources() -> Self {
        Self::new(vec![
            CaptureSource::new("screen:0", "Screen 1"),
            CaptureSource::new("window:1", "Chrome"),
        ])
    }

    pub fn set_sources(&self, sources: Vec<CaptureSource>) {
        if let Ok(mut s) = self.sources.lock() {
            *s = sources;
        }
    }

    /// Makes every call fail with [`CaptureError::PlatformUnavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Relaxed);
    }

    /// Makes `open_stream` fail with [`CaptureError::PermissionDenied`].
    pub fn deny_permission(&self, deny: bool) {
        self.deny_permission.store(deny, Ordering::Relaxed);
    }

    /// Delays `open_stream`, simulating a permission prompt.
    pub fn set_open_delay(&self, delay: Option<Duration>) {
        if let Ok(mut d) = self.open_delay.lock() {
            *d = delay;
        }
    }

    /// Delays `list_sources`, simulating a slow host round-trip.
    pub fn set_list_delay(&self, delay: Option<Duration>) {
        if let Ok(mut d) = self.list_delay.lock() {
            *d = delay;
        }
    }

    /// Registers an open stream directly, bypassing source lookup.
    pub fn register_stream(&self, audio: bool) -> StreamDescriptor {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        let id = format!("stub-stream-{n}");
        let mut tracks = vec![TrackDescriptor {
            id: format!("{id}/video"),
            kind: TrackKind::Video,
        }];
        if audio {
            tracks.push(TrackDescriptor {
                id: format!("{id}/audio"),
                kind: TrackKind::Audio,
            });
        }
        if let Ok(mut state) = self.state.lock() {
            state.open.insert(
                id.clone(),
                tracks.iter().map(|t| (t.id.clone(), true)).collect(),
            );
        }
        self.opened.fetch_add(1, Ordering::Relaxed);
        StreamDescriptor { id, tracks }
    }

    pub fn open_count(&self) -> usize {
        self.opened.load(Ordering::Relaxed)
    }

    pub fn close_count(&self) -> usize {
        self.closed.load(Ordering::Relaxed)
    }

    /// Number of streams opened and not yet closed.
    pub fn live_streams(&self) -> usize {
        self.state.lock().map(|s| s.open.len()).unwrap_or(0)
    }

    /// Enabled state of a track of a live stream.
    pub fn track_enabled(&self, stream_id: &str, track_id: &str) -> Option<bool> {
        let state = self.state.lock().ok()?;
        state.open.get(stream_id)?.get(track_id).copied()
    }

    fn delay(slot: &Mutex<Option<Duration>>) -> Option<Duration> {
        slot.lock().ok().and_then(|d| *d)
    }
}

impl CapturePlatform for StubPlatform {
    fn list_sources(
        &self,
        _kinds: SourceKinds,
    ) -> PlatformFuture<'_, Result<Vec<CaptureSource>, CaptureError>> {
        Box::pin(async move {
            if let Some(delay) = Self::delay(&self.list_delay) {
                tokio::time::sleep(delay).await;
            }
            if self.unavailable.load(Ordering::Relaxed) {
                return Err(CaptureError::PlatformUnavailable);
            }
            // Returned unfiltered on purpose: the enumerator must not trust
            // the platform to honour the requested kinds.
            Ok(self.sources.lock().map(|s| s.clone()).unwrap_or_default())
        })
    }

    fn open_stream<'a>(
        &'a self,
        source_id: &'a str,
        options: CaptureOptions,
    ) -> PlatformFuture<'a, Result<StreamDescriptor, CaptureError>> {
        Box::pin(async move {
            if let Some(delay) = Self::delay(&self.open_delay) {
                tokio::time::sleep(delay).await;
            }
            if self.unavailable.load(Ordering::Relaxed) {
                return Err(CaptureError::PlatformUnavailable);
            }
            if self.deny_permission.load(Ordering::Relaxed) {
                return Err(CaptureError::PermissionDenied(
                    "user declined screen recording".into(),
                ));
            }
            let known = self
                .sources
                .lock()
                .map(|s| s.iter().any(|src| src.id == source_id))
                .unwrap_or(false);
            if !known {
                return Err(CaptureError::SourceNotFound(source_id.to_string()));
            }
            Ok(self.register_stream(options.audio))
        })
    }

    fn close_stream(&self, stream_id: &str) {
        self.closed.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut state) = self.state.lock() {
            state.open.remove(stream_id);
        }
    }

    fn set_track_enabled(&self, stream_id: &str, track_id: &str, enabled: bool) {
        if let Ok(mut state) = self.state.lock()
            && let Some(track) = state
                .open
                .get_mut(stream_id)
                .and_then(|tracks| tracks.get_mut(track_id))
        {
            *track = enabled;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_and_close_are_counted() {
        let stub = StubPlatform::with_default_sources();
        let desc = stub
            .open_stream("screen:0", CaptureOptions { audio: true })
            .await
            .unwrap();
        assert_eq!(desc.tracks.len(), 2);
        assert_eq!(stub.open_count(), 1);
        assert_eq!(stub.live_streams(), 1);

        stub.close_stream(&desc.id);
        assert_eq!(stub.close_count(), 1);
        assert_eq!(stub.live_streams(), 0);
    }

    #[tokio::test]
    async fn unknown_source_is_not_found() {
        let stub = StubPlatform::with_default_sources();
        let err = stub
            .open_stream("window:99", CaptureOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err, CaptureError::SourceNotFound("window:99".into()));
        assert_eq!(stub.open_count(), 0);
    }

    #[tokio::test]
    async fn permission_denied_opens_nothing() {
        let stub = StubPlatform::with_default_sources();
        stub.deny_permission(true);
        let err = stub
            .open_stream("screen:0", CaptureOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CaptureError::PermissionDenied(_)));
        assert_eq!(stub.live_streams(), 0);
    }
}
