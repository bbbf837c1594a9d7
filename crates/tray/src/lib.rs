//! Tray menu for VOffice Desktop.
//!
//! The tray icon itself is drawn by the host shell. This crate owns what
//! goes in its context menu and the channels between the tray event loop
//! and the application core:
//! - [`TrayEvent`]: tray to core (a menu item was clicked)
//! - [`TrayUpdate`]: core to tray (presence, auto-start or huddle changed)

mod menu;
mod tray;

pub use menu::{MenuAction, MenuItem, MenuState};
pub use tray::{TrayConfig, TrayEvent, TrayHandle, TrayUpdate};
