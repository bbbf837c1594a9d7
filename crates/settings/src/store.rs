//! Settings persistence.
//!
//! The file keeps the settings under a top-level `settings` key so other
//! keys can share it:
//!
//! ```json
//! { "settings": { "autoStart": false, "presence": "online", ... } }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::SettingsError;
use crate::model::Settings;

/// Loads and saves [`Settings`].
pub trait SettingsStore: Send + Sync {
    fn load(&self) -> Result<Settings, SettingsError>;

    fn save(&self, settings: &Settings) -> Result<(), SettingsError>;

    /// Loads, applies `f` and saves. Returns the saved settings.
    fn update(&self, f: &mut dyn FnMut(&mut Settings)) -> Result<Settings, SettingsError> {
        let mut settings = self.load()?;
        f(&mut settings);
        self.save(&settings)?;
        Ok(settings)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SettingsFile {
    #[serde(default)]
    settings: Settings,
}

/// JSON file store.
pub struct JsonSettingsStore {
    path: PathBuf,
}

impl JsonSettingsStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where an unparseable settings file is moved to.
    pub fn corrupt_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".corrupt");
        self.path.with_file_name(name)
    }
}

impl SettingsStore for JsonSettingsStore {
    /// Missing file yields defaults. An unparseable one is moved to
    /// [`corrupt_path`](JsonSettingsStore::corrupt_path) before defaults are
    /// returned, so a later save cannot overwrite it.
    fn load(&self) -> Result<Settings, SettingsError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no settings file, using defaults");
            return Ok(Settings::default());
        }
        let content = std::fs::read_to_string(&self.path)?;
        match serde_json::from_str::<SettingsFile>(&content) {
            Ok(file) => Ok(file.settings),
            Err(e) => {
                let backup = self.corrupt_path();
                if let Err(io) = std::fs::rename(&self.path, &backup) {
                    warn!(path = %self.path.display(), error = %io, "unparseable settings could not be moved aside");
                    return Err(SettingsError::Json(e));
                }
                warn!(
                    path = %self.path.display(),
                    backup = %backup.display(),
                    "unparseable settings moved aside, using defaults: {e}"
                );
                Ok(Settings::default())
            }
        }
    }

    fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = SettingsFile {
            settings: settings.clone(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        std::fs::write(&self.path, json)?;
        set_permissions_0600(&self.path);
        debug!(path = %self.path.display(), "settings saved");
        Ok(())
    }
}

fn set_permissions_0600(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600));
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
}

/// In-memory store.
#[derive(Default)]
pub struct MemorySettingsStore {
    settings: Mutex<Settings>,
    saves: Mutex<usize>,
}

impl MemorySettingsStore {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: Mutex::new(settings),
            saves: Mutex::new(0),
        }
    }

    /// Number of successful `save` calls.
    pub fn save_count(&self) -> usize {
        self.saves.lock().map(|n| *n).unwrap_or(0)
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> Result<Settings, SettingsError> {
        Ok(self
            .settings
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default())
    }

    fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        if let Ok(mut s) = self.settings.lock() {
            *s = settings.clone();
        }
        if let Ok(mut n) = self.saves.lock() {
            *n += 1;
        }
        Ok(())
    }
}

/// Returns the default settings file path.
pub fn default_settings_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("voffice").join("settings.json"))
}

fn config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var("HOME")
                    .ok()
                    .map(|h| PathBuf::from(h).join(".config"))
            })
    }

    #[cfg(target_os = "windows")]
    {
        std::env::var("APPDATA").ok().map(PathBuf::from)
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join("Library").join("Application Support"))
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
    {
        std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join(".config"))
    }
}
