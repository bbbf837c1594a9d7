//! User-facing settings for VOffice Desktop.
//!
//! [`Settings`] is the persisted model, [`Accelerator`] validates hotkey
//! strings before they are handed to the host, and [`SettingsStore`] is the
//! persistence seam with a JSON file and an in-memory implementation.

pub mod accelerator;
pub mod error;
pub mod model;
pub mod store;

pub use accelerator::{Accelerator, Modifiers};
pub use error::{AcceleratorError, SettingsError};
pub use model::{Hotkeys, Settings};
pub use store::{JsonSettingsStore, MemorySettingsStore, SettingsStore, default_settings_path};
