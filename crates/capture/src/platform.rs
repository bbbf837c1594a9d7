//! Capability interface the capture layer consumes from the host shell.

use std::future::Future;
use std::pin::Pin;

use voffice_protocol::{CaptureSource, SourceKinds};

use crate::acquirer::CaptureOptions;
use crate::error::CaptureError;
use crate::stream::TrackKind;

/// A boxed future returned by platform methods.
pub type PlatformFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A track as reported by the platform when a stream is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackDescriptor {
    pub id: String,
    pub kind: TrackKind,
}

/// An opened capture stream as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDescriptor {
    pub id: String,
    pub tracks: Vec<TrackDescriptor>,
}

/// Host capture capability.
///
/// Every opened stream holds an OS capture handle until
/// [`close_stream`](CapturePlatform::close_stream) is called for it.
pub trait CapturePlatform: Send + Sync + 'static {
    /// Lists capturable sources of the given kinds.
    fn list_sources(
        &self,
        kinds: SourceKinds,
    ) -> PlatformFuture<'_, Result<Vec<CaptureSource>, CaptureError>>;

    /// Opens a live stream for a source. May prompt the user for permission.
    fn open_stream<'a>(
        &'a self,
        source_id: &'a str,
        options: CaptureOptions,
    ) -> PlatformFuture<'a, Result<StreamDescriptor, CaptureError>>;

    /// Releases the OS handle of a stream opened by [`open_stream`](Self::open_stream).
    fn close_stream(&self, stream_id: &str);

    /// Enables or disables a single track without closing it.
    fn set_track_enabled(&self, stream_id: &str, track_id: &str, enabled: bool) {
        let _ = (stream_id, track_id, enabled);
    }
}

/// Platform for hosts without any capture capability.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailablePlatform;

impl CapturePlatform for UnavailablePlatform {
    fn list_sources(
        &self,
        _kinds: SourceKinds,
    ) -> PlatformFuture<'_, Result<Vec<CaptureSource>, CaptureError>> {
        Box::pin(async { Err(CaptureError::PlatformUnavailable) })
    }

    fn open_stream<'a>(
        &'a self,
        _source_id: &'a str,
        _options: CaptureOptions,
    ) -> PlatformFuture<'a, Result<StreamDescriptor, CaptureError>> {
        Box::pin(async { Err(CaptureError::PlatformUnavailable) })
    }

    fn close_stream(&self, _stream_id: &str) {}
}
