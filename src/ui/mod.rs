//! Chrome widgets the mode state machine drives

pub mod terminal;

use crate::key::{KeyEvent, BACKSPACE};

/// The prompt's text field
pub trait TextEntry {
    fn set_label(&mut self, label: &str);
    fn label(&self) -> &str;
    fn set_text(&mut self, text: &str);
    fn text(&self) -> String;
    fn show(&mut self);
    fn hide(&mut self);
    fn is_visible(&self) -> bool;
    fn set_focus(&mut self, focused: bool);
    /// Hide typed characters (password prompts)
    fn set_masked(&mut self, masked: bool);
    fn set_suggestions(&mut self, suggestions: &[String]);
    fn suggestions(&self) -> &[String];
    /// Cursor offset in chars
    fn cursor(&self) -> usize;
    /// Text as it should be drawn; masked entries show `*`
    fn display_text(&self) -> String;
    /// Apply an editing key; false when the key does not edit text
    fn feed_key(&mut self, key: &KeyEvent) -> bool;
}

/// Status line mode label
pub trait ModeIndicator {
    fn set_mode(&mut self, label: &str);
    fn mode(&self) -> &str;
    fn set_buffered_command(&mut self, text: &str);
    fn buffered_command(&self) -> &str;
}

/// Single line editor with a cursor counted in chars
#[derive(Debug, Clone, Default)]
pub struct LineEntry {
    label: String,
    text: Vec<char>,
    cursor: usize,
    visible: bool,
    focused: bool,
    masked: bool,
    suggestions: Vec<String>,
}

impl LineEntry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn is_masked(&self) -> bool {
        self.masked
    }

    fn insert(&mut self, c: char) {
        self.text.insert(self.cursor, c);
        self.cursor += 1;
    }

    fn delete_word_before_cursor(&mut self) {
        let mut start = self.cursor;
        while start > 0 && self.text[start - 1].is_whitespace() {
            start -= 1;
        }
        while start > 0 && !self.text[start - 1].is_whitespace() {
            start -= 1;
        }
        self.text.drain(start..self.cursor);
        self.cursor = start;
    }
}

impl TextEntry for LineEntry {
    fn set_label(&mut self, label: &str) {
        self.label = label.to_string();
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn set_text(&mut self, text: &str) {
        self.text = text.chars().collect();
        self.cursor = self.text.len();
    }

    fn text(&self) -> String {
        self.text.iter().collect()
    }

    fn show(&mut self) {
        self.visible = true;
    }

    fn hide(&mut self) {
        self.visible = false;
        self.focused = false;
        self.suggestions.clear();
    }

    fn is_visible(&self) -> bool {
        self.visible
    }

    fn set_focus(&mut self, focused: bool) {
        self.focused = focused;
    }

    fn set_masked(&mut self, masked: bool) {
        self.masked = masked;
    }

    fn set_suggestions(&mut self, suggestions: &[String]) {
        self.suggestions = suggestions.to_vec();
    }

    fn suggestions(&self) -> &[String] {
        &self.suggestions
    }

    fn cursor(&self) -> usize {
        self.cursor
    }

    fn display_text(&self) -> String {
        if self.masked {
            "*".repeat(self.text.len())
        } else {
            self.text.iter().collect()
        }
    }

    fn feed_key(&mut self, key: &KeyEvent) -> bool {
        if let Some(c) = key.text() {
            self.insert(c);
            return true;
        }

        if key.control && !key.alt && !key.super_key {
            match key.key.as_str() {
                "u" => {
                    self.text.drain(..self.cursor);
                    self.cursor = 0;
                }
                "w" => self.delete_word_before_cursor(),
                "a" => self.cursor = 0,
                "e" => self.cursor = self.text.len(),
                _ => return false,
            }
            return true;
        }

        if key.is(BACKSPACE) {
            if self.cursor > 0 {
                self.cursor -= 1;
                self.text.remove(self.cursor);
            }
            return true;
        }

        match key.key.as_str() {
            "Delete" if self.cursor < self.text.len() => {
                self.text.remove(self.cursor);
            }
            "Delete" => {}
            "Left" => self.cursor = self.cursor.saturating_sub(1),
            "Right" => self.cursor = (self.cursor + 1).min(self.text.len()),
            "Home" => self.cursor = 0,
            "End" => self.cursor = self.text.len(),
            _ => return false,
        }
        true
    }
}

/// Mode label plus the pending sub-command prefix
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusLine {
    pub mode: String,
    pub buffered: String,
}

impl ModeIndicator for StatusLine {
    fn set_mode(&mut self, label: &str) {
        self.mode = label.to_string();
    }

    fn mode(&self) -> &str {
        &self.mode
    }

    fn set_buffered_command(&mut self, text: &str) {
        self.buffered = text.to_string();
    }

    fn buffered_command(&self) -> &str {
        &self.buffered
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
