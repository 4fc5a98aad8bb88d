//! Key representation for browser input
//!
//! Toolkit events are canonicalised into a [`KeyEvent`] once, at the input
//! boundary, so the mode state machine never sees toolkit types.

mod term;

pub use self::term::translate_key_event;

use crate::error::{ErrorType, RoamError};
use std::fmt;
use std::str::FromStr;

pub const ESCAPE: &str = "Escape";
pub const RETURN: &str = "Return";
pub const TAB: &str = "Tab";
/// Shift+Tab as reported by most toolkits
pub const LEFT_TAB: &str = "ISO_Left_Tab";
pub const INSERT: &str = "Insert";
pub const BACKSPACE: &str = "BackSpace";
pub const SPACE: &str = "space";

/// Keys that keep their shift modifier. Every other shifted key is expected
/// to arrive as a distinct name already (`G` rather than `S-g`).
const SHIFT_ALLOW_LIST: &[&str] = &[SPACE];

const BARE_MODIFIERS: &[&str] = &["Shift_L", "Shift_R"];

/// Toolkit key names that bind more naturally as their symbol
const SYMBOL_NAMES: &[(&str, &str)] = &[
    ("slash", "/"),
    ("question", "?"),
    ("plus", "+"),
    ("minus", "-"),
    ("equal", "="),
    ("colon", ":"),
    ("dollar", "$"),
    ("asciicircum", "^"),
];

/// Modifier state of a raw key press
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub control: bool,
    pub shift: bool,
    pub super_key: bool,
    pub alt: bool,
}

/// A normalized key press
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    /// Base key name (`g`, `G`, `Return`, `space`, `/`)
    pub key: String,
    pub control: bool,
    /// Only ever set for keys in the shift allow-list
    pub shift: bool,
    pub super_key: bool,
    pub alt: bool,
}

impl KeyEvent {
    /// An unmodified key
    pub fn new(key: impl Into<String>) -> Self {
        Self::from_parts(&key.into(), Modifiers::default())
    }

    /// Canonicalise a toolkit key name plus modifier state
    pub fn from_parts(name: &str, modifiers: Modifiers) -> Self {
        let key = SYMBOL_NAMES
            .iter()
            .find(|(raw, _)| *raw == name)
            .map_or(name, |(_, symbol)| symbol)
            .to_string();
        let shift = modifiers.shift && SHIFT_ALLOW_LIST.contains(&key.as_str());

        Self {
            key,
            control: modifiers.control,
            shift,
            super_key: modifiers.super_key,
            alt: modifiers.alt,
        }
    }

    /// Same key with control held
    #[must_use]
    pub fn ctrl(mut self) -> Self {
        self.control = true;
        self
    }

    /// Same key with shift held (dropped unless the key allows it)
    #[must_use]
    pub fn shifted(mut self) -> Self {
        self.shift = SHIFT_ALLOW_LIST.contains(&self.key.as_str());
        self
    }

    /// Same key with alt held
    #[must_use]
    pub fn alt(mut self) -> Self {
        self.alt = true;
        self
    }

    /// A press of a modifier key on its own
    pub fn is_bare_modifier(&self) -> bool {
        BARE_MODIFIERS.contains(&self.key.as_str())
    }

    fn has_modifiers(&self) -> bool {
        self.control || self.shift || self.super_key || self.alt
    }

    /// True for the unmodified key called `name`
    pub fn is(&self, name: &str) -> bool {
        !self.has_modifiers() && self.key == name
    }

    /// The printable character this key inserts into a text field, if any
    pub fn text(&self) -> Option<char> {
        if self.control || self.super_key || self.alt {
            return None;
        }
        if self.key == SPACE {
            return Some(' ');
        }
        let mut chars = self.key.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Some(c),
            _ => None,
        }
    }
}

impl fmt::Display for KeyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.control {
            write!(f, "C-")?;
        }
        if self.shift {
            write!(f, "S-")?;
        }
        if self.super_key {
            write!(f, "L-")?;
        }
        if self.alt {
            write!(f, "A-")?;
        }
        write!(f, "{}", self.key)
    }
}

impl FromStr for KeyEvent {
    type Err = RoamError;

    /// Parse a binding string such as `C-f`, `S-space` or `-`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut rest = s;
        let mut modifiers = Modifiers::default();

        while rest.len() > 2 && rest.as_bytes()[1] == b'-' {
            match rest.as_bytes()[0] {
                b'C' => modifiers.control = true,
                b'S' => modifiers.shift = true,
                b'L' => modifiers.super_key = true,
                b'A' => modifiers.alt = true,
                _ => break,
            }
            rest = &rest[2..];
        }

        if rest.is_empty() {
            return Err(RoamError::new(
                ErrorType::Parse,
                "KEY_EMPTY",
                format!("Key binding '{s}' has no key name"),
            ));
        }

        let event = Self::from_parts(rest, modifiers);
        if modifiers.shift && !event.shift {
            return Err(RoamError::new(
                ErrorType::Parse,
                "KEY_SHIFT_NOT_ALLOWED",
                format!(
                    "Key binding '{s}': shift is only encoded for {}; bind the shifted name instead",
                    SHIFT_ALLOW_LIST.join(", ")
                ),
            ));
        }
        Ok(event)
    }
}
