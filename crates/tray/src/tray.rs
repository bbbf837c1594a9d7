//! Tray handle, events, and update types.
//!
//! The tray event loop runs on the host's main thread; the core talks to it
//! only through the channel pair created by [`TrayHandle::new`].

use std::sync::mpsc;

use tracing::debug;
use voffice_protocol::Presence;

use crate::menu::{MenuAction, MenuItem, MenuState};

/// Configuration for the system tray.
#[derive(Debug, Clone)]
pub struct TrayConfig {
    pub app_name: String,
    /// Optional icon data (PNG bytes).
    pub icon_data: Option<Vec<u8>>,
    pub presence: Presence,
    pub auto_start: bool,
}

impl Default for TrayConfig {
    fn default() -> Self {
        Self {
            app_name: "VOffice".into(),
            icon_data: None,
            presence: Presence::Online,
            auto_start: false,
        }
    }
}

/// Events emitted by the tray to the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrayEvent {
    Action(MenuAction),
}

/// Updates sent from the core to the tray.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrayUpdate {
    /// Rebuilt menu and tooltip after a state change.
    Menu {
        items: Vec<MenuItem>,
        tooltip: String,
    },
    Shutdown,
}

/// Core side of the tray channels.
pub struct TrayHandle {
    update_tx: mpsc::Sender<TrayUpdate>,
    event_rx: mpsc::Receiver<TrayEvent>,
    state: MenuState,
}

impl TrayHandle {
    /// Creates a new tray handle with its channel pair.
    ///
    /// Returns `(handle, event_sender, update_receiver)`; the sender and
    /// receiver go to the tray event loop.
    pub fn new(config: TrayConfig) -> (Self, mpsc::Sender<TrayEvent>, mpsc::Receiver<TrayUpdate>) {
        let (update_tx, update_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();

        let handle = Self {
            update_tx,
            event_rx,
            state: MenuState {
                presence: config.presence,
                auto_start: config.auto_start,
                in_huddle: false,
                window_visible: false,
            },
        };
        handle.publish();

        (handle, event_tx, update_rx)
    }

    pub fn set_presence(&mut self, presence: Presence) {
        self.update(|s| s.presence = presence);
    }

    pub fn set_auto_start(&mut self, enabled: bool) {
        self.update(|s| s.auto_start = enabled);
    }

    pub fn set_in_huddle(&mut self, in_huddle: bool) {
        self.update(|s| s.in_huddle = in_huddle);
    }

    pub fn set_window_visible(&mut self, visible: bool) {
        self.update(|s| s.window_visible = visible);
    }

    /// Requests the tray to shut down.
    pub fn shutdown(&self) {
        let _ = self.update_tx.send(TrayUpdate::Shutdown);
    }

    /// Tries to receive a tray event (non-blocking).
    pub fn try_recv_event(&self) -> Option<TrayEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn state(&self) -> &MenuState {
        &self.state
    }

    fn update(&mut self, f: impl FnOnce(&mut MenuState)) {
        let before = self.state.clone();
        f(&mut self.state);
        if self.state != before {
            self.publish();
        }
    }

    fn publish(&self) {
        debug!(tooltip = %self.state.tooltip(), "updating tray menu");
        let _ = self.update_tx.send(TrayUpdate::Menu {
            items: self.state.build_menu(),
            tooltip: self.state.tooltip(),
        });
    }
}
