//! Line commands accepted on stdin by the headless build.

use voffice_presence::Presence;
use voffice_settings::Settings;
use voffice_tray::MenuAction;

use crate::host::HostEvent;

pub const HELP: &str = "\
commands:
  huddle          start a huddle, or leave the current one
  share <id>      start a huddle sharing a specific source
  leave           leave the current huddle
  mute            toggle the microphone
  sources         list capturable screens and windows
  online | away   set presence
  toggle          flip presence
  autostart       flip auto-start
  suspend | resume | lock | unlock
                  simulate system power and session events
  status          show presence, connection and huddle
  notify-test     show a test notification
  settings        show saved settings
  set <key> <value>
                  change a setting: autostart on|off, notifications on|off,
                  presence online|away, huddle-key <keys>, mute-key <keys>
  quit            exit";

const SET_USAGE: &str = "usage: set <autostart|notifications|presence|huddle-key|mute-key> <value>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Event(HostEvent),
    Share(String),
    Leave,
    Sources,
    Status,
    NotifyTest,
    Settings,
    Set(SettingEdit),
    Help,
    Quit,
}

/// A single-field change to [`Settings`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingEdit {
    AutoStart(bool),
    Notifications(bool),
    Presence(Presence),
    HuddleHotkey(String),
    MuteHotkey(String),
}

impl SettingEdit {
    pub fn apply(self, settings: &mut Settings) {
        match self {
            SettingEdit::AutoStart(on) => settings.auto_start = on,
            SettingEdit::Notifications(on) => settings.notifications = on,
            SettingEdit::Presence(p) => settings.presence = p,
            SettingEdit::HuddleHotkey(keys) => settings.hotkeys.huddle = keys,
            SettingEdit::MuteHotkey(keys) => settings.hotkeys.mute = keys,
        }
    }
}

/// Parses one input line. Blank lines yield `Ok(None)`.
pub fn parse(line: &str) -> Result<Option<Command>, String> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };
    if head.eq_ignore_ascii_case("set") {
        let edit = parse_set(words.next(), words.next(), words.next())?;
        return Ok(Some(Command::Set(edit)));
    }
    let arg = words.next();
    if words.next().is_some() {
        return Err(format!("too many arguments for `{head}`"));
    }

    let cmd = match (head.to_ascii_lowercase().as_str(), arg) {
        ("huddle", None) => Command::Event(HostEvent::HuddleHotkey),
        ("share", Some(id)) => Command::Share(id.to_string()),
        ("share", None) => return Err("usage: share <source id>".into()),
        ("leave", None) => Command::Leave,
        ("mute", None) => Command::Event(HostEvent::MuteHotkey),
        ("sources", None) => Command::Sources,
        ("online", None) => Command::Event(HostEvent::PresenceChanged(Presence::Online)),
        ("away", None) => Command::Event(HostEvent::PresenceChanged(Presence::Away)),
        ("toggle", None) => Command::Event(HostEvent::Tray(MenuAction::TogglePresence)),
        ("autostart", None) => Command::Event(HostEvent::Tray(MenuAction::ToggleAutoStart)),
        ("suspend", None) => Command::Event(HostEvent::Suspend),
        ("resume", None) => Command::Event(HostEvent::Resume),
        ("lock", None) => Command::Event(HostEvent::Lock),
        ("unlock", None) => Command::Event(HostEvent::Unlock),
        ("status", None) => Command::Status,
        ("notify-test", None) => Command::NotifyTest,
        ("settings", None) => Command::Settings,
        ("help" | "?", None) => Command::Help,
        ("quit" | "exit", None) => Command::Quit,
        (_, Some(_)) if is_known(head) => return Err(format!("`{head}` takes no argument")),
        _ => return Err(format!("unknown command `{head}`, try `help`")),
    };
    Ok(Some(cmd))
}

fn parse_set(
    key: Option<&str>,
    value: Option<&str>,
    extra: Option<&str>,
) -> Result<SettingEdit, String> {
    let (Some(key), Some(value), None) = (key, value, extra) else {
        return Err(SET_USAGE.into());
    };
    let edit = match key.to_ascii_lowercase().as_str() {
        "autostart" => SettingEdit::AutoStart(parse_switch(value)?),
        "notifications" => SettingEdit::Notifications(parse_switch(value)?),
        "presence" => SettingEdit::Presence(match value.to_ascii_lowercase().as_str() {
            "online" => Presence::Online,
            "away" => Presence::Away,
            _ => return Err(format!("unknown presence `{value}`")),
        }),
        "huddle-key" => SettingEdit::HuddleHotkey(value.to_string()),
        "mute-key" => SettingEdit::MuteHotkey(value.to_string()),
        _ => return Err(format!("unknown setting `{key}`\n{SET_USAGE}")),
    };
    Ok(edit)
}

fn parse_switch(value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" => Ok(true),
        "off" | "false" | "no" => Ok(false),
        _ => Err(format!("expected on or off, got `{value}`")),
    }
}

fn is_known(word: &str) -> bool {
    const KNOWN: [&str; 19] = [
        "huddle", "leave", "mute", "sources", "online", "away", "toggle", "autostart",
        "suspend", "resume", "lock", "unlock", "status", "notify-test", "settings", "help",
        "?", "quit", "exit",
    ];
    KNOWN.contains(&word.to_ascii_lowercase().as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_events() {
        assert_eq!(
            parse("huddle").unwrap(),
            Some(Command::Event(HostEvent::HuddleHotkey))
        );
        assert_eq!(
            parse("  AWAY ").unwrap(),
            Some(Command::Event(HostEvent::PresenceChanged(Presence::Away)))
        );
        assert_eq!(
            parse("toggle").unwrap(),
            Some(Command::Event(HostEvent::Tray(MenuAction::TogglePresence)))
        );
        assert_eq!(parse("suspend").unwrap(), Some(Command::Event(HostEvent::Suspend)));
    }

    #[test]
    fn parses_share_with_id() {
        assert_eq!(
            parse("share window:1").unwrap(),
            Some(Command::Share("window:1".into()))
        );
        assert!(parse("share").is_err());
    }

    #[test]
    fn blank_and_bad_lines() {
        assert_eq!(parse("   ").unwrap(), None);
        assert!(parse("dance").unwrap_err().contains("unknown command"));
        assert!(parse("mute now").unwrap_err().contains("takes no argument"));
        assert!(parse("share a b").is_err());
    }

    #[test]
    fn parses_setting_edits() {
        assert_eq!(
            parse("set notifications off").unwrap(),
            Some(Command::Set(SettingEdit::Notifications(false)))
        );
        assert_eq!(
            parse("SET huddle-key Ctrl+Alt+H").unwrap(),
            Some(Command::Set(SettingEdit::HuddleHotkey("Ctrl+Alt+H".into())))
        );
        assert_eq!(
            parse("set presence away").unwrap(),
            Some(Command::Set(SettingEdit::Presence(Presence::Away)))
        );
        assert!(parse("set notifications maybe").is_err());
        assert!(parse("set colour blue").unwrap_err().contains("unknown setting"));
        assert!(parse("set autostart").unwrap_err().starts_with("usage"));
        assert!(parse("set autostart on now").is_err());
        assert_eq!(parse("notify-test").unwrap(), Some(Command::NotifyTest));
        assert!(parse("settings all").unwrap_err().contains("takes no argument"));
    }

    #[test]
    fn setting_edit_applies_one_field() {
        let mut settings = Settings::default();
        SettingEdit::MuteHotkey("Alt+M".into()).apply(&mut settings);
        SettingEdit::AutoStart(true).apply(&mut settings);
        assert_eq!(settings.hotkeys.mute, "Alt+M");
        assert!(settings.auto_start);
        assert!(settings.notifications);
    }

    #[test]
    fn quit_aliases() {
        assert_eq!(parse("exit").unwrap(), Some(Command::Quit));
        assert_eq!(parse("?").unwrap(), Some(Command::Help));
    }
}
