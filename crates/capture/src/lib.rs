//! Capture sources and media streams.
//!
//! The host platform is reached only through [`CapturePlatform`]; the
//! production shell and the [`stub::StubPlatform`] test double both
//! implement it, so nothing here branches on "is the capability present".
//!
//! - [`SourceEnumerator`] lists screens and windows.
//! - [`CaptureAcquirer`] opens a [`MediaStream`] for a chosen source and
//!   keeps at most one outstanding.

pub mod acquirer;
pub mod enumerator;
pub mod error;
pub mod platform;
pub mod stream;
pub mod stub;

pub use acquirer::{CaptureAcquirer, CaptureOptions};
pub use enumerator::{SourceEnumerator, SourceFallback, placeholder_sources};
pub use error::CaptureError;
pub use platform::{
    CapturePlatform, PlatformFuture, StreamDescriptor, TrackDescriptor, UnavailablePlatform,
};
pub use stream::{MediaStream, MediaTrack, TrackKind};
