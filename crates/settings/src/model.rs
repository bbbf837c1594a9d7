//! Persisted settings model.

use serde::{Deserialize, Serialize};
use voffice_protocol::Presence;

use crate::accelerator::Accelerator;
use crate::error::SettingsError;

pub const DEFAULT_HUDDLE_HOTKEY: &str = "CmdOrCtrl+Shift+H";
pub const DEFAULT_MUTE_HOTKEY: &str = "CmdOrCtrl+Shift+M";

/// Global shortcut bindings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hotkeys {
    #[serde(default = "default_huddle")]
    pub huddle: String,
    #[serde(default = "default_mute")]
    pub mute: String,
}

fn default_huddle() -> String {
    DEFAULT_HUDDLE_HOTKEY.into()
}

fn default_mute() -> String {
    DEFAULT_MUTE_HOTKEY.into()
}

impl Default for Hotkeys {
    fn default() -> Self {
        Self {
            huddle: default_huddle(),
            mute: default_mute(),
        }
    }
}

impl Hotkeys {
    /// Parses both bindings, rejecting invalid or conflicting ones.
    pub fn validate(&self) -> Result<(Accelerator, Accelerator), SettingsError> {
        let huddle = Accelerator::parse(&self.huddle)
            .map_err(|e| SettingsError::Hotkey(self.huddle.clone(), e))?;
        let mute = Accelerator::parse(&self.mute)
            .map_err(|e| SettingsError::Hotkey(self.mute.clone(), e))?;
        if huddle == mute {
            return Err(SettingsError::HotkeyConflict(self.mute.clone()));
        }
        Ok((huddle, mute))
    }
}

/// Everything the user can change in the settings window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub auto_start: bool,
    #[serde(default)]
    pub presence: Presence,
    #[serde(default = "default_true")]
    pub notifications: bool,
    #[serde(default)]
    pub hotkeys: Hotkeys,
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auto_start: false,
            presence: Presence::Online,
            notifications: true,
            hotkeys: Hotkeys::default(),
        }
    }
}
