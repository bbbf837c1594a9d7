//! Media stream handles.
//!
//! A [`MediaStream`] owns an OS capture handle. [`MediaStream::stop`] stops
//! every track and releases the handle; dropping an unstopped stream
//! releases it too, so a forgotten handle cannot keep the capture open.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::platform::{CapturePlatform, StreamDescriptor};

/// Kind of media carried by a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Audio,
    Video,
}

/// A single track of a [`MediaStream`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaTrack {
    pub id: String,
    pub kind: TrackKind,
    pub enabled: bool,
    pub stopped: bool,
}

/// Shared release state. The acquirer keeps a clone so it can release a
/// superseded stream that is still owned elsewhere.
pub(crate) struct StreamInner {
    id: String,
    platform: Arc<dyn CapturePlatform>,
    released: AtomicBool,
}

impl StreamInner {
    /// Releases the OS handle. Returns `true` only for the call that
    /// actually released it.
    pub(crate) fn release(&self) -> bool {
        if self.released.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.platform.close_stream(&self.id);
        debug!(stream = %self.id, "capture stream released");
        true
    }

    pub(crate) fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    pub(crate) fn id(&self) -> &str {
        &self.id
    }
}

/// A live capture stream.
pub struct MediaStream {
    inner: Arc<StreamInner>,
    source_id: String,
    tracks: Vec<MediaTrack>,
}

impl MediaStream {
    pub(crate) fn new(
        desc: StreamDescriptor,
        source_id: &str,
        platform: Arc<dyn CapturePlatform>,
    ) -> Self {
        let tracks = desc
            .tracks
            .into_iter()
            .map(|t| MediaTrack {
                id: t.id,
                kind: t.kind,
                enabled: true,
                stopped: false,
            })
            .collect();
        Self {
            inner: Arc::new(StreamInner {
                id: desc.id,
                platform,
                released: AtomicBool::new(false),
            }),
            source_id: source_id.to_string(),
            tracks,
        }
    }

    pub(crate) fn shared(&self) -> Arc<StreamInner> {
        self.inner.clone()
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// The capture source this stream was opened for.
    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    pub fn audio_tracks(&self) -> impl Iterator<Item = &MediaTrack> {
        self.tracks.iter().filter(|t| t.kind == TrackKind::Audio)
    }

    pub fn video_tracks(&self) -> impl Iterator<Item = &MediaTrack> {
        self.tracks.iter().filter(|t| t.kind == TrackKind::Video)
    }

    /// Enables or disables one track. Returns `false` if the track is
    /// unknown or already stopped.
    pub fn set_track_enabled(&mut self, track_id: &str, enabled: bool) -> bool {
        let Some(track) = self
            .tracks
            .iter_mut()
            .find(|t| t.id == track_id && !t.stopped)
        else {
            return false;
        };
        if track.enabled != enabled {
            track.enabled = enabled;
            self.inner
                .platform
                .set_track_enabled(&self.inner.id, track_id, enabled);
        }
        true
    }

    /// Returns `true` once the OS handle has been released, either through
    /// [`stop`](Self::stop) or because the acquirer superseded the stream.
    pub fn is_released(&self) -> bool {
        self.inner.is_released()
    }

    /// Stops every track and releases the OS handle. Idempotent.
    pub fn stop(&mut self) {
        for track in &mut self.tracks {
            track.stopped = true;
            track.enabled = false;
        }
        self.inner.release();
    }
}

impl std::fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaStream")
            .field("id", &self.inner.id)
            .field("source_id", &self.source_id)
            .field("tracks", &self.tracks)
            .field("released", &self.is_released())
            .finish()
    }
}

impl Drop for MediaStream {
    fn drop(&mut self) {
        if self.inner.release() {
            debug!(stream = %self.inner.id, "capture stream dropped without stop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::TrackDescriptor;
    use crate::stub::StubPlatform;

    fn open(platform: &Arc<StubPlatform>) -> MediaStream {
        let desc = platform.register_stream(true);
        MediaStream::new(desc, "screen:0", platform.clone())
    }

    #[test]
    fn stop_releases_once() {
        let platform = Arc::new(StubPlatform::with_default_sources());
        let mut stream = open(&platform);
        assert!(!stream.is_released());

        stream.stop();
        stream.stop();
        assert!(stream.is_released());
        assert!(stream.tracks().iter().all(|t| t.stopped && !t.enabled));
        assert_eq!(platform.close_count(), 1);

        drop(stream);
        assert_eq!(platform.close_count(), 1);
    }

    #[test]
    fn drop_releases_unstopped_stream() {
        let platform = Arc::new(StubPlatform::with_default_sources());
        let stream = open(&platform);
        assert_eq!(platform.live_streams(), 1);
        drop(stream);
        assert_eq!(platform.live_streams(), 0);
    }

    #[test]
    fn track_enable_reaches_platform() {
        let platform = Arc::new(StubPlatform::with_default_sources());
        let mut stream = open(&platform);
        let audio_id = stream.audio_tracks().next().unwrap().id.clone();

        assert!(stream.set_track_enabled(&audio_id, false));
        assert_eq!(platform.track_enabled(stream.id(), &audio_id), Some(false));
        assert!(!stream.set_track_enabled("missing", false));

        stream.stop();
        assert!(!stream.set_track_enabled(&audio_id, true));
    }

    #[test]
    fn tracks_split_by_kind() {
        let platform = Arc::new(StubPlatform::with_default_sources());
        let desc = StreamDescriptor {
            id: "s".into(),
            tracks: vec![
                TrackDescriptor {
                    id: "v".into(),
                    kind: TrackKind::Video,
                },
                TrackDescriptor {
                    id: "a".into(),
                    kind: TrackKind::Audio,
                },
            ],
        };
        let stream = MediaStream::new(desc, "window:1", platform);
        assert_eq!(stream.video_tracks().count(), 1);
        assert_eq!(stream.audio_tracks().count(), 1);
        assert_eq!(stream.source_id(), "window:1");
    }
}
