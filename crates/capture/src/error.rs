//! Error types for capture operations.

use std::time::Duration;

/// Errors produced while enumerating or acquiring capture sources.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    #[error("capture platform unavailable")]
    PlatformUnavailable,

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("source not found: {0}")]
    SourceNotFound(String),

    #[error("platform did not answer within {0:?}")]
    Timeout(Duration),

    #[error("platform error: {0}")]
    Platform(String),
}

impl CaptureError {
    /// Message suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            CaptureError::PlatformUnavailable => {
                "Screen capture is not available on this system.".into()
            }
            CaptureError::PermissionDenied(_) => {
                "Screen recording permission was denied. Grant it in system settings and try again."
                    .into()
            }
            CaptureError::SourceNotFound(_) => {
                "That screen or window is no longer available. Pick a source again.".into()
            }
            CaptureError::Timeout(_) => "The system took too long to respond. Try again.".into(),
            CaptureError::Platform(msg) => format!("Failed to capture source: {msg}"),
        }
    }

    /// Whether the caller should re-enumerate sources before retrying.
    pub fn needs_reselection(&self) -> bool {
        matches!(self, CaptureError::SourceNotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_error_display() {
        assert_eq!(
            CaptureError::PlatformUnavailable.to_string(),
            "capture platform unavailable"
        );
        assert_eq!(
            CaptureError::SourceNotFound("window:7".into()).to_string(),
            "source not found: window:7"
        );
        assert!(
            CaptureError::Timeout(Duration::from_secs(5))
                .to_string()
                .contains("5s")
        );
    }

    #[test]
    fn only_stale_source_requires_reselection() {
        assert!(CaptureError::SourceNotFound("screen:3".into()).needs_reselection());
        assert!(!CaptureError::PermissionDenied("user".into()).needs_reselection());
        assert!(
            CaptureError::PermissionDenied("user".into())
                .user_message()
                .contains("permission")
        );
    }
}
