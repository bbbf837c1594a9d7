//! Headless run loop: stdin commands, tray polling and shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use voffice_capture::stub::StubPlatform;
use voffice_capture::{CapturePlatform, UnavailablePlatform};
use voffice_presence::HostShell;
use voffice_settings::{JsonSettingsStore, MemorySettingsStore, Settings, SettingsStore};
use voffice_tray::{TrayEvent, TrayUpdate};

use crate::commands::{self, Command, HELP};
use crate::config::AppConfig;
use crate::context::{AppContext, Services, TrayEnds};
use crate::host::{HeadlessHost, HostEvent};

const TRAY_POLL: Duration = Duration::from_millis(100);

/// Runs the desktop core until shutdown is requested.
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let host: Arc<dyn HostShell> = Arc::new(HeadlessHost::new());
    let capture: Arc<dyn CapturePlatform> = if config.stub_capture {
        info!("using in-process capture platform");
        Arc::new(StubPlatform::with_default_sources())
    } else {
        Arc::new(UnavailablePlatform)
    };
    let settings: Arc<dyn SettingsStore> = match config.settings_path() {
        Some(path) => {
            debug!(path = %path.display(), "settings file");
            Arc::new(JsonSettingsStore::new(path))
        }
        None => {
            warn!("no config directory, settings will not be saved");
            Arc::new(MemorySettingsStore::default())
        }
    };

    let services = Services {
        host,
        capture,
        settings,
        sink: None,
    };
    let (ctx, TrayEnds { events: _tray_events, updates }) = AppContext::init(config, services)?;
    let tray_thread = std::thread::spawn(move || headless_tray(updates));

    ctx.start().await;
    info!("ready; type `help` for commands");

    let cancel = ctx.cancel_token();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut tray_poll = tokio::time::interval(TRAY_POLL);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("shutdown requested");
                break;
            }
            _ = &mut ctrl_c => {
                info!("SIGINT received, shutting down");
                break;
            }
            _ = tray_poll.tick() => {
                while let Some(TrayEvent::Action(action)) = ctx.poll_tray() {
                    ctx.dispatch(HostEvent::Tray(action)).await;
                }
            }
            line = lines.next_line() => match line? {
                Some(line) => {
                    if !handle_line(&ctx, &line).await {
                        break;
                    }
                }
                None => {
                    info!("stdin closed, shutting down");
                    break;
                }
            },
        }
    }

    ctx.shutdown().await;
    if tray_thread.join().is_err() {
        warn!("tray thread panicked");
    }
    Ok(())
}

/// Executes one stdin line. Returns `false` to stop the loop.
async fn handle_line(ctx: &AppContext, line: &str) -> bool {
    let cmd = match commands::parse(line) {
        Ok(Some(cmd)) => cmd,
        Ok(None) => return true,
        Err(msg) => {
            println!("{msg}");
            return true;
        }
    };

    match cmd {
        Command::Event(event) => ctx.dispatch(event).await,
        Command::Share(id) => match ctx.start_huddle(Some(&id)).await {
            Ok(generation) => println!("sharing {id} (session {generation})"),
            Err(e) => println!("{}", e.user_message()),
        },
        Command::Leave => {
            if !ctx.leave_huddle().await {
                println!("not in a huddle");
            }
        }
        Command::Sources => {
            let sources = ctx.list_sources().await;
            if sources.is_empty() {
                println!("no capturable sources");
            }
            for s in sources {
                println!("{:<12} {}", s.id, s.name);
            }
        }
        Command::Status => {
            let status = ctx.status().await;
            println!("presence: {}", status.presence);
            println!("signaling: {:?}", status.channel);
            println!("idle: {}s", status.idle_seconds);
            match status.session {
                Some(s) => println!(
                    "huddle: {:?} as {:?}{}",
                    s.state,
                    s.role,
                    if s.muted { " (muted)" } else { "" }
                ),
                None => println!("huddle: none"),
            }
        }
        Command::NotifyTest => {
            if !ctx.test_notification().await {
                println!("notification not shown (disabled or unsupported)");
            }
        }
        Command::Settings => match ctx.settings() {
            Ok(s) => print_settings(&s),
            Err(e) => println!("could not read settings: {e}"),
        },
        Command::Set(edit) => {
            let result = ctx.settings().and_then(|mut s| {
                edit.apply(&mut s);
                ctx.update_settings(s)
            });
            match result {
                Ok(s) => print_settings(&s),
                Err(e) => println!("setting rejected: {e}"),
            }
        }
        Command::Help => println!("{HELP}"),
        Command::Quit => return false,
    }
    true
}

fn print_settings(s: &Settings) {
    println!("autostart: {}", if s.auto_start { "on" } else { "off" });
    println!("notifications: {}", if s.notifications { "on" } else { "off" });
    println!("presence: {}", s.presence);
    println!("huddle-key: {}", s.hotkeys.huddle);
    println!("mute-key: {}", s.hotkeys.mute);
}

/// Stands in for the tray event loop when no tray is available.
fn headless_tray(updates: std::sync::mpsc::Receiver<TrayUpdate>) {
    for update in updates {
        match update {
            TrayUpdate::Menu { items, tooltip } => {
                debug!(tooltip = %tooltip, items = items.len(), "tray menu updated");
            }
            TrayUpdate::Shutdown => break,
        }
    }
}
