//! Dynamic context menu for the system tray.

use voffice_protocol::Presence;

/// Actions that can be triggered from the tray context menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    TogglePresence,
    /// Show the main window if hidden, hide it otherwise.
    ToggleWindow,
    StartHuddle,
    LeaveHuddle,
    ToggleAutoStart,
    Quit,
}

/// A single menu item. An empty disabled label is a separator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItem {
    pub label: String,
    pub enabled: bool,
    pub action: Option<MenuAction>,
}

impl MenuItem {
    fn header(label: String) -> Self {
        Self {
            label,
            enabled: false,
            action: None,
        }
    }

    fn separator() -> Self {
        Self::header(String::new())
    }

    fn action(label: &str, action: MenuAction) -> Self {
        Self {
            label: label.into(),
            enabled: true,
            action: Some(action),
        }
    }

    pub fn is_separator(&self) -> bool {
        self.label.is_empty() && self.action.is_none()
    }
}

/// Current state used to build the context menu.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MenuState {
    pub presence: Presence,
    pub auto_start: bool,
    pub in_huddle: bool,
    pub window_visible: bool,
}

impl MenuState {
    /// Builds the menu items from the current state.
    pub fn build_menu(&self) -> Vec<MenuItem> {
        let status = match self.presence {
            Presence::Online => "Online",
            Presence::Away => "Away",
        };
        let window = if self.window_visible {
            "Hide App"
        } else {
            "Open App"
        };
        let huddle = if self.in_huddle {
            MenuItem::action("Leave Huddle", MenuAction::LeaveHuddle)
        } else {
            MenuItem::action("Start Quick Huddle", MenuAction::StartHuddle)
        };
        let auto_start = if self.auto_start {
            "Disable Auto-Start"
        } else {
            "Enable Auto-Start"
        };

        vec![
            MenuItem::header(format!("Status: {status}")),
            MenuItem::separator(),
            MenuItem::action("Toggle Presence", MenuAction::TogglePresence),
            MenuItem::action(window, MenuAction::ToggleWindow),
            huddle,
            MenuItem::separator(),
            MenuItem::action(auto_start, MenuAction::ToggleAutoStart),
            MenuItem::separator(),
            MenuItem::action("Quit", MenuAction::Quit),
        ]
    }

    /// Tooltip shown when hovering the tray icon.
    pub fn tooltip(&self) -> String {
        if self.in_huddle {
            format!("VOffice - {} (in huddle)", self.presence)
        } else {
            format!("VOffice - {}", self.presence)
        }
    }
}
