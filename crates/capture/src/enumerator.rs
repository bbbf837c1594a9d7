//! Source enumeration.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use voffice_protocol::{CaptureSource, ImageBlob, SourceKinds};

use crate::error::CaptureError;
use crate::platform::CapturePlatform;

/// Default bound on a single enumeration round-trip.
pub const ENUMERATE_TIMEOUT: Duration = Duration::from_secs(5);

/// What [`SourceEnumerator::list_sources_or_fallback`] returns when the
/// host has no capture capability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SourceFallback {
    /// An empty list.
    #[default]
    Empty,
    /// Synthetic sources for offline UI testing. Never enable in production.
    Placeholder,
}

/// Lists capturable screens and windows. Never caches: source ids are
/// transient, so every call asks the platform again.
pub struct SourceEnumerator {
    platform: Arc<dyn CapturePlatform>,
    timeout: Duration,
    fallback: SourceFallback,
}

impl SourceEnumerator {
    pub fn new(platform: Arc<dyn CapturePlatform>) -> Self {
        Self {
            platform,
            timeout: ENUMERATE_TIMEOUT,
            fallback: SourceFallback::Empty,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_fallback(mut self, fallback: SourceFallback) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn fallback(&self) -> SourceFallback {
        self.fallback
    }

    /// Queries the platform for sources of the requested kinds.
    ///
    /// Only sources whose kind is in `kinds` are returned, whatever the
    /// platform reports.
    pub async fn list_sources(&self, kinds: SourceKinds) -> Result<Vec<CaptureSource>, CaptureError> {
        let sources = tokio::time::timeout(self.timeout, self.platform.list_sources(kinds))
            .await
            .map_err(|_| CaptureError::Timeout(self.timeout))??;

        let total = sources.len();
        let filtered: Vec<CaptureSource> = sources
            .into_iter()
            .filter(|s| s.kind().is_some_and(|k| kinds.contains(k)))
            .collect();
        debug!(
            total,
            returned = filtered.len(),
            kinds = ?kinds.to_vec(),
            "enumerated capture sources"
        );
        Ok(filtered)
    }

    /// Like [`list_sources`](Self::list_sources), but never fails.
    ///
    /// A missing capability yields the configured [`SourceFallback`]; any
    /// other error yields an empty list.
    pub async fn list_sources_or_fallback(&self, kinds: SourceKinds) -> Vec<CaptureSource> {
        match self.list_sources(kinds).await {
            Ok(sources) => sources,
            Err(CaptureError::PlatformUnavailable) => match self.fallback {
                SourceFallback::Empty => Vec::new(),
                SourceFallback::Placeholder => {
                    warn!("capture platform unavailable, returning placeholder sources");
                    placeholder_sources(kinds)
                }
            },
            Err(e) => {
                warn!(error = %e, "source enumeration failed");
                Vec::new()
            }
        }
    }
}

fn placeholder_thumbnail(fill: &str) -> ImageBlob {
    let svg = format!(
        r#"<svg width="320" height="200" xmlns="http://www.w3.org/2000/svg"><rect width="100%" height="100%" fill="{fill}"/></svg>"#
    );
    ImageBlob::new("image/svg+xml", svg.into_bytes())
}

/// Synthetic sources used when [`SourceFallback::Placeholder`] is selected.
pub fn placeholder_sources(kinds: SourceKinds) -> Vec<CaptureSource> {
    let mut screen = CaptureSource::new("screen:0", "Screen 1");
    screen.thumbnail = Some(placeholder_thumbnail("#333"));
    let mut window = CaptureSource::new("window:1", "Chrome");
    window.thumbnail = Some(placeholder_thumbnail("#666"));

    [screen, window]
        .into_iter()
        .filter(|s| s.kind().is_some_and(|k| kinds.contains(k)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::StubPlatform;
    use voffice_protocol::SourceKind;

    fn mixed_sources() -> Vec<CaptureSource> {
        vec![
            CaptureSource::new("screen:0", "Screen 1"),
            CaptureSource::new("screen:1", "Screen 2"),
            CaptureSource::new("window:10", "Terminal"),
            CaptureSource::new("camera:0", "Webcam"),
        ]
    }

    #[tokio::test]
    async fn returns_only_requested_kinds() {
        let platform = Arc::new(StubPlatform::new(mixed_sources()));
        let enumerator = SourceEnumerator::new(platform);

        for kinds in [
            SourceKinds::all(),
            SourceKinds::only(SourceKind::Screen),
            SourceKinds::only(SourceKind::Window),
        ] {
            let sources = enumerator.list_sources(kinds).await.unwrap();
            assert!(!sources.is_empty());
            for s in &sources {
                assert!(kinds.contains(s.kind().unwrap()), "{} leaked", s.id);
            }
        }

        let all = enumerator.list_sources(SourceKinds::all()).await.unwrap();
        assert_eq!(all.len(), 3, "unknown-kind source must be dropped");
    }

    #[tokio::test]
    async fn every_call_requeries_platform() {
        let platform = Arc::new(StubPlatform::new(mixed_sources()));
        let enumerator = SourceEnumerator::new(platform.clone());
        assert_eq!(enumerator.list_sources(SourceKinds::all()).await.unwrap().len(), 3);

        platform.set_sources(vec![CaptureSource::new("screen:5", "Projector")]);
        let again = enumerator.list_sources(SourceKinds::all()).await.unwrap();
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].id, "screen:5");
    }

    #[tokio::test]
    async fn unavailable_platform_errors() {
        let platform = Arc::new(StubPlatform::with_default_sources());
        platform.set_unavailable(true);
        let enumerator = SourceEnumerator::new(platform);
        assert_eq!(
            enumerator.list_sources(SourceKinds::all()).await,
            Err(CaptureError::PlatformUnavailable)
        );
        assert!(
            enumerator
                .list_sources_or_fallback(SourceKinds::all())
                .await
                .is_empty()
        );
    }

    #[tokio::test]
    async fn placeholder_fallback_is_opt_in() {
        let platform = Arc::new(StubPlatform::with_default_sources());
        platform.set_unavailable(true);
        let enumerator =
            SourceEnumerator::new(platform).with_fallback(SourceFallback::Placeholder);

        let sources = enumerator
            .list_sources_or_fallback(SourceKinds::only(SourceKind::Screen))
            .await;
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].id, "screen:0");
        assert_eq!(sources[0].name, "Screen 1");
        assert!(sources[0].thumbnail.is_some());
    }

    #[tokio::test]
    async fn slow_platform_times_out() {
        tokio::time::pause();
        let platform = Arc::new(StubPlatform::with_default_sources());
        platform.set_list_delay(Some(Duration::from_secs(60)));
        let enumerator =
            SourceEnumerator::new(platform).with_timeout(Duration::from_secs(1));

        let err = enumerator.list_sources(SourceKinds::all()).await.unwrap_err();
        assert_eq!(err, CaptureError::Timeout(Duration::from_secs(1)));
        assert!(
            enumerator
                .list_sources_or_fallback(SourceKinds::all())
                .await
                .is_empty()
        );
    }

    #[test]
    fn placeholder_sources_respect_kinds() {
        assert_eq!(placeholder_sources(SourceKinds::all()).len(), 2);
        let windows = placeholder_sources(SourceKinds::only(SourceKind::Window));
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].name, "Chrome");
    }
}
