//! Error types for settings.

/// Errors from loading or saving settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid hotkey {0:?}: {1}")]
    Hotkey(String, AcceleratorError),

    #[error("hotkey {0:?} is bound to more than one action")]
    HotkeyConflict(String),
}

/// Why a hotkey string was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AcceleratorError {
    #[error("empty accelerator")]
    Empty,

    #[error("unknown modifier {0:?}")]
    UnknownModifier(String),

    #[error("unknown key {0:?}")]
    UnknownKey(String),

    #[error("missing key")]
    MissingKey,

    #[error("more than one key")]
    MultipleKeys,

    #[error("at least one modifier is required")]
    NoModifier,

    #[error("duplicate modifier {0:?}")]
    DuplicateModifier(String),
}
