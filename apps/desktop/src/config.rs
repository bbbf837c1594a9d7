//! Application configuration.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/voffice/desktop.toml`
//! - Windows: `%APPDATA%/voffice/desktop.toml`

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use voffice_huddle::IceServer;
use voffice_signaling::ReconnectConfig;

/// A TURN relay with credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnServer {
    pub url: String,
    pub username: String,
    pub credential: String,
}

/// Desktop application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Name shown to huddle peers (hostname by default).
    #[serde(default = "default_display_name")]
    pub display_name: String,

    /// WebSocket URL of the signaling server.
    #[serde(default = "default_signaling_url")]
    pub signaling_url: String,

    #[serde(default = "default_stun_servers")]
    pub stun_servers: Vec<String>,

    /// Reconnection attempts before the channel gives up.
    #[serde(default = "default_reconnect_max_attempts")]
    pub reconnect_max_attempts: u32,

    /// Offer synthetic capture sources when the host cannot capture.
    /// Only meant for UI testing.
    #[serde(default)]
    pub placeholder_sources: bool,

    /// Use an in-process capture platform with one screen and one window.
    /// Lets huddles run on hosts without a capture backend.
    #[serde(default)]
    pub stub_capture: bool,

    /// Capture system audio alongside the shared screen.
    #[serde(default = "default_true")]
    pub share_audio: bool,

    /// Override for the settings file location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings_path: Option<PathBuf>,

    #[serde(default)]
    pub turn_servers: Vec<TurnServer>,
}

fn default_display_name() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "VOffice".into())
}

fn default_signaling_url() -> String {
    "ws://localhost:8080/ws/signaling".into()
}

fn default_stun_servers() -> Vec<String> {
    vec!["stun:stun.l.google.com:19302".into()]
}

fn default_reconnect_max_attempts() -> u32 {
    ReconnectConfig::default().max_attempts
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            display_name: default_display_name(),
            signaling_url: default_signaling_url(),
            stun_servers: default_stun_servers(),
            reconnect_max_attempts: default_reconnect_max_attempts(),
            placeholder_sources: false,
            stub_capture: false,
            share_audio: true,
            settings_path: None,
            turn_servers: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from disk, or creates a default if not found.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&config_path()?)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = AppConfig::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        // TURN credentials live here.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// STUN and TURN servers in the form the negotiator takes.
    pub fn ice_servers(&self) -> Vec<IceServer> {
        let mut servers: Vec<IceServer> = self
            .stun_servers
            .iter()
            .map(|url| IceServer::stun(url.clone()))
            .collect();
        servers.extend(self.turn_servers.iter().map(|t| IceServer {
            urls: vec![t.url.clone()],
            username: Some(t.username.clone()),
            credential: Some(t.credential.clone()),
        }));
        servers
    }

    pub fn reconnect(&self) -> ReconnectConfig {
        ReconnectConfig {
            max_attempts: self.reconnect_max_attempts,
            ..ReconnectConfig::default()
        }
    }

    pub fn settings_path(&self) -> Option<PathBuf> {
        self.settings_path
            .clone()
            .or_else(voffice_settings::default_settings_path)
    }
}

/// Returns the platform-specific configuration file path.
fn config_path() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        Ok(PathBuf::from(home)
            .join(".config")
            .join("voffice")
            .join("desktop.toml"))
    }

    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        Ok(PathBuf::from(appdata).join("voffice").join("desktop.toml"))
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        Ok(PathBuf::from(home)
            .join(".config")
            .join("voffice")
            .join("desktop.toml"))
    }
}
