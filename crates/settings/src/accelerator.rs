//! Hotkey accelerator strings such as `CmdOrCtrl+Shift+H`.

use std::fmt;
use std::str::FromStr;

use crate::error::AcceleratorError;

/// Modifier bitmask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Modifiers(u8);

impl Modifiers {
    pub const NONE: Self = Self(0);
    /// Command on macOS, Control elsewhere.
    pub const CMD_OR_CTRL: Self = Self(1);
    pub const CTRL: Self = Self(1 << 1);
    pub const ALT: Self = Self(1 << 2);
    pub const SHIFT: Self = Self(1 << 3);
    pub const SUPER: Self = Self(1 << 4);

    /// Canonical order used when rendering.
    const ORDER: [(Self, &'static str); 5] = [
        (Self::CMD_OR_CTRL, "CmdOrCtrl"),
        (Self::CTRL, "Ctrl"),
        (Self::ALT, "Alt"),
        (Self::SHIFT, "Shift"),
        (Self::SUPER, "Super"),
    ];

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    fn from_token(token: &str) -> Option<Self> {
        let m = match token.to_ascii_lowercase().as_str() {
            "cmdorctrl" | "commandorcontrol" => Self::CMD_OR_CTRL,
            "ctrl" | "control" => Self::CTRL,
            "alt" | "option" => Self::ALT,
            "shift" => Self::SHIFT,
            "super" | "cmd" | "command" | "meta" => Self::SUPER,
            _ => return None,
        };
        Some(m)
    }
}

/// A parsed global shortcut: one or more modifiers plus exactly one key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Accelerator {
    modifiers: Modifiers,
    key: String,
}

impl Accelerator {
    /// Parses an accelerator. Tokens are `+`-separated and case-insensitive.
    pub fn parse(s: &str) -> Result<Self, AcceleratorError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(AcceleratorError::Empty);
        }

        let mut modifiers = Modifiers::NONE;
        let mut key: Option<String> = None;

        for token in split_tokens(s) {
            if let Some(m) = Modifiers::from_token(token) {
                if modifiers.contains(m) {
                    return Err(AcceleratorError::DuplicateModifier(token.into()));
                }
                modifiers.insert(m);
                continue;
            }
            let k = normalize_key(token).ok_or_else(|| {
                if key.is_none() && token.len() > 1 && token.chars().all(char::is_alphabetic) {
                    AcceleratorError::UnknownModifier(token.into())
                } else {
                    AcceleratorError::UnknownKey(token.into())
                }
            })?;
            if key.replace(k).is_some() {
                return Err(AcceleratorError::MultipleKeys);
            }
        }

        let key = key.ok_or(AcceleratorError::MissingKey)?;
        if modifiers.is_empty() {
            return Err(AcceleratorError::NoModifier);
        }
        Ok(Self { modifiers, key })
    }

    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    /// Canonical key name, e.g. `H`, `F5` or `Space`.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl FromStr for Accelerator {
    type Err = AcceleratorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Accelerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (m, name) in Modifiers::ORDER {
            if self.modifiers.contains(m) {
                write!(f, "{name}+")?;
            }
        }
        f.write_str(&self.key)
    }
}

/// Splits on `+`, keeping a trailing `+` as the `Plus` key (`Ctrl++`).
fn split_tokens(s: &str) -> Vec<&str> {
    if let Some(head) = s.strip_suffix("++") {
        let mut tokens: Vec<&str> = head.split('+').map(str::trim).collect();
        tokens.push("Plus");
        return tokens;
    }
    s.split('+').map(str::trim).collect()
}

fn normalize_key(token: &str) -> Option<String> {
    if token.is_empty() {
        return None;
    }
    let mut chars = token.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' => Some(c.to_ascii_uppercase().to_string()),
            ',' | '.' | '/' | ';' | '\'' | '[' | ']' | '\\' | '-' | '=' | '`' => {
                Some(c.to_string())
            }
            _ => None,
        };
    }

    let lower = token.to_ascii_lowercase();
    if let Some(n) = lower.strip_prefix('f')
        && let Ok(n) = n.parse::<u8>()
        && (1..=24).contains(&n)
    {
        return Some(format!("F{n}"));
    }

    let named = match lower.as_str() {
        "space" => "Space",
        "tab" => "Tab",
        "enter" | "return" => "Enter",
        "esc" | "escape" => "Escape",
        "backspace" => "Backspace",
        "delete" | "del" => "Delete",
        "insert" => "Insert",
        "home" => "Home",
        "end" => "End",
        "pageup" => "PageUp",
        "pagedown" => "PageDown",
        "up" => "Up",
        "down" => "Down",
        "left" => "Left",
        "right" => "Right",
        "plus" => "Plus",
        _ => return None,
    };
    Some(named.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_default_bindings() {
        let a = Accelerator::parse("CmdOrCtrl+Shift+H").unwrap();
        assert!(a.modifiers().contains(Modifiers::CMD_OR_CTRL));
        assert!(a.modifiers().contains(Modifiers::SHIFT));
        assert!(!a.modifiers().contains(Modifiers::ALT));
        assert_eq!(a.key(), "H");
        assert_eq!(a.to_string(), "CmdOrCtrl+Shift+H");
    }

    #[test]
    fn case_and_order_insensitive() {
        let a: Accelerator = "shift + commandorcontrol + m".parse().unwrap();
        assert_eq!(a.to_string(), "CmdOrCtrl+Shift+M");
        assert_eq!(a, Accelerator::parse("CmdOrCtrl+Shift+M").unwrap());
    }

    #[test]
    fn named_and_function_keys() {
        assert_eq!(Accelerator::parse("Alt+F12").unwrap().key(), "F12");
        assert_eq!(Accelerator::parse("Ctrl+esc").unwrap().key(), "Escape");
        assert_eq!(Accelerator::parse("Super+Space").unwrap().to_string(), "Super+Space");
        assert_eq!(Accelerator::parse("Ctrl++").unwrap().key(), "Plus");
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(Accelerator::parse("  "), Err(AcceleratorError::Empty));
        assert_eq!(
            Accelerator::parse("Ctrl+Shift"),
            Err(AcceleratorError::MissingKey)
        );
        assert_eq!(Accelerator::parse("M"), Err(AcceleratorError::NoModifier));
        assert_eq!(
            Accelerator::parse("Ctrl+A+B"),
            Err(AcceleratorError::MultipleKeys)
        );
        assert_eq!(
            Accelerator::parse("Hyper+A"),
            Err(AcceleratorError::UnknownModifier("Hyper".into()))
        );
        assert_eq!(
            Accelerator::parse("Ctrl+F25"),
            Err(AcceleratorError::UnknownKey("F25".into()))
        );
        assert_eq!(
            Accelerator::parse("Ctrl+Control+A"),
            Err(AcceleratorError::DuplicateModifier("Control".into()))
        );
    }
}
