//! Host shell integration for the headless build.
//!
//! Notifications and idle time come from standard desktop tools found on
//! `PATH`; a missing tool reports [`HostError::Unavailable`].

use std::io::ErrorKind;

use tokio::process::Command;
use tracing::debug;
use voffice_presence::{HostError, HostFuture, HostShell, Presence};
use voffice_tray::MenuAction;

/// Events pushed from the host shell into the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    /// Global huddle shortcut: start a huddle, or leave the current one.
    HuddleHotkey,
    MuteHotkey,
    PresenceChanged(Presence),
    Suspend,
    Resume,
    Lock,
    Unlock,
    Tray(MenuAction),
}

/// Host shell backed by command-line desktop tools.
#[derive(Debug, Clone, Default)]
pub struct HeadlessHost;

impl HeadlessHost {
    pub fn new() -> Self {
        Self
    }
}

impl HostShell for HeadlessHost {
    fn idle_seconds(&self) -> HostFuture<'_, Result<u64, HostError>> {
        Box::pin(async move { query_idle().await })
    }

    fn show_notification<'a>(
        &'a self,
        title: &'a str,
        body: &'a str,
    ) -> HostFuture<'a, Result<(), HostError>> {
        Box::pin(async move { notify(title, body).await })
    }
}

#[cfg(target_os = "linux")]
async fn query_idle() -> Result<u64, HostError> {
    // xprintidle reports milliseconds.
    let stdout = run(&mut Command::new("xprintidle")).await?;
    let ms: u64 = stdout
        .trim()
        .parse()
        .map_err(|_| HostError::Failed(format!("unexpected xprintidle output: {stdout:?}")))?;
    Ok(ms / 1000)
}

#[cfg(target_os = "macos")]
async fn query_idle() -> Result<u64, HostError> {
    let stdout = run(Command::new("ioreg").args(["-c", "IOHIDSystem"])).await?;
    parse_hid_idle(&stdout)
        .map(|ns| ns / 1_000_000_000)
        .ok_or_else(|| HostError::Failed("HIDIdleTime not reported".into()))
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
async fn query_idle() -> Result<u64, HostError> {
    Err(HostError::Unavailable)
}

#[cfg(target_os = "linux")]
async fn notify(title: &str, body: &str) -> Result<(), HostError> {
    run(Command::new("notify-send").args(["--app-name=VOffice", title, body]))
        .await
        .map(drop)
}

#[cfg(target_os = "macos")]
async fn notify(title: &str, body: &str) -> Result<(), HostError> {
    let script = format!(
        "display notification {} with title {}",
        applescript_string(body),
        applescript_string(title)
    );
    run(Command::new("osascript").args(["-e", &script]))
        .await
        .map(drop)
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
async fn notify(_title: &str, _body: &str) -> Result<(), HostError> {
    Err(HostError::Unavailable)
}

/// Runs a tool and returns its stdout.
#[allow(dead_code)]
async fn run(cmd: &mut Command) -> Result<String, HostError> {
    let output = cmd.output().await.map_err(|e| match e.kind() {
        ErrorKind::NotFound => HostError::Unavailable,
        ErrorKind::PermissionDenied => HostError::PermissionDenied,
        _ => HostError::Failed(e.to_string()),
    })?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        debug!(status = %output.status, stderr = %stderr, "host tool failed");
        return Err(HostError::Failed(stderr));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[allow(dead_code)]
fn parse_hid_idle(ioreg: &str) -> Option<u64> {
    ioreg
        .lines()
        .find(|l| l.contains("\"HIDIdleTime\""))
        .and_then(|l| l.rsplit('=').next())
        .and_then(|v| v.trim().parse().ok())
}

#[allow(dead_code)]
fn applescript_string(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}
