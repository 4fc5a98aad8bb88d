//! Terminal backend for the chrome
//!
//! The chrome draws one frame per tick: page title, page body, status line,
//! and the prompt with its suggestion list when one is open.

use std::io::{stdout, Write};
use std::time::Duration;

use crossterm::{
    cursor, event, execute, queue,
    style::{Attribute, Print, SetAttribute},
    terminal::{self, ClearType},
};
use unicode_width::UnicodeWidthChar;

use crate::error::{ErrorType, Result, RoamError};
use crate::key::{translate_key_event, KeyEvent};

/// Rows shown for suggestions above an open prompt
pub const MAX_SUGGESTION_ROWS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    pub rows: u16,
    pub cols: u16,
}

/// Everything the terminal needs to know to paint the chrome
pub trait TerminalBackend {
    fn init(&mut self) -> Result<()>;
    fn deinit(&mut self);
    /// Wait up to `timeout` for a key press
    fn poll_key(&mut self, timeout: Duration) -> Result<Option<KeyEvent>>;
    fn size(&self) -> Result<Size>;
    /// Replace row `row` with `text`, already clipped to the width
    fn write_line(&mut self, row: u16, text: &str, reverse: bool) -> Result<()>;
    fn place_cursor(&mut self, position: Option<(u16, u16)>) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
}

fn term_err(what: &str, err: std::io::Error) -> RoamError {
    RoamError::new(ErrorType::Io, "TERMINAL", format!("{what}: {err}"))
}

#[derive(Debug, Default)]
pub struct CrosstermBackend {
    raw_mode_enabled: bool,
    alternate_screen_enabled: bool,
}

impl CrosstermBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TerminalBackend for CrosstermBackend {
    fn init(&mut self) -> Result<()> {
        execute!(stdout(), terminal::EnterAlternateScreen)
            .map_err(|e| term_err("Failed to enter alternate screen", e))?;
        self.alternate_screen_enabled = true;

        terminal::enable_raw_mode().map_err(|e| term_err("Failed to enable raw mode", e))?;
        self.raw_mode_enabled = true;

        execute!(stdout(), cursor::Hide).map_err(|e| term_err("Failed to hide cursor", e))?;
        Ok(())
    }

    fn deinit(&mut self) {
        let _ = execute!(stdout(), cursor::Show);

        if self.raw_mode_enabled {
            let _ = terminal::disable_raw_mode();
            self.raw_mode_enabled = false;
        }

        if self.alternate_screen_enabled {
            let _ = execute!(stdout(), terminal::LeaveAlternateScreen);
            self.alternate_screen_enabled = false;
        }
    }

    fn poll_key(&mut self, timeout: Duration) -> Result<Option<KeyEvent>> {
        if !event::poll(timeout).map_err(|e| term_err("Failed to poll events", e))? {
            return Ok(None);
        }
        match event::read().map_err(|e| term_err("Failed to read event", e))? {
            event::Event::Key(key) => Ok(translate_key_event(key)),
            _ => Ok(None),
        }
    }

    fn size(&self) -> Result<Size> {
        let (cols, rows) =
            terminal::size().map_err(|e| term_err("Failed to get terminal size", e))?;
        Ok(Size { rows, cols })
    }

    fn write_line(&mut self, row: u16, text: &str, reverse: bool) -> Result<()> {
        let mut out = stdout();
        queue!(
            out,
            cursor::MoveTo(0, row),
            terminal::Clear(ClearType::CurrentLine)
        )
        .map_err(|e| term_err("Failed to clear line", e))?;
        if reverse {
            queue!(
                out,
                SetAttribute(Attribute::Reverse),
                Print(text),
                SetAttribute(Attribute::Reset)
            )
        } else {
            queue!(out, Print(text))
        }
        .map_err(|e| term_err("Failed to draw line", e))
    }

    fn place_cursor(&mut self, position: Option<(u16, u16)>) -> Result<()> {
        let mut out = stdout();
        match position {
            Some((row, col)) => queue!(out, cursor::MoveTo(col, row), cursor::Show),
            None => queue!(out, cursor::Hide),
        }
        .map_err(|e| term_err("Failed to move cursor", e))
    }

    fn flush(&mut self) -> Result<()> {
        stdout().flush().map_err(|e| term_err("Flush failed", e))
    }
}

impl Drop for CrosstermBackend {
    fn drop(&mut self) {
        self.deinit();
    }
}

/// Clip `text` to `width` terminal columns
pub fn fit(text: &str, width: usize) -> String {
    let mut used = 0;
    let mut out = String::new();
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > width {
            break;
        }
        used += w;
        out.push(c);
    }
    out
}

fn display_width(text: &str) -> usize {
    text.chars().map(|c| c.width().unwrap_or(0)).sum()
}

/// An open prompt as drawn on the bottom row
#[derive(Debug, Clone)]
pub struct PromptLine<'a> {
    pub label: &'a str,
    pub text: String,
    /// Cursor offset in chars into `text`
    pub cursor: usize,
    pub suggestions: &'a [String],
}

/// One screenful of chrome state
#[derive(Debug, Clone, Default)]
pub struct Frame<'a> {
    pub title: &'a str,
    pub body: &'a [String],
    pub mode: &'a str,
    pub buffered: &'a str,
    pub message: Option<&'a str>,
    pub prompt: Option<PromptLine<'a>>,
}

/// Paint `frame`. Needs at least three rows; smaller terminals draw nothing.
pub fn draw(backend: &mut dyn TerminalBackend, frame: &Frame<'_>) -> Result<()> {
    let Size { rows, cols } = backend.size()?;
    if rows < 3 {
        return Ok(());
    }
    let width = cols as usize;
    let status_row = rows - 2;
    let bottom_row = rows - 1;

    backend.write_line(0, &fit(frame.title, width), true)?;

    let suggestions: &[String] = frame.prompt.as_ref().map_or(&[], |p| p.suggestions);
    let shown = suggestions
        .len()
        .min(MAX_SUGGESTION_ROWS)
        .min(status_row.saturating_sub(1) as usize);
    let body_end = status_row - shown as u16;

    for row in 1..body_end {
        let line = frame
            .body
            .get(row as usize - 1)
            .map_or(String::new(), |l| fit(l, width));
        backend.write_line(row, &line, false)?;
    }
    for (i, suggestion) in suggestions.iter().take(shown).enumerate() {
        backend.write_line(body_end + i as u16, &fit(suggestion, width), false)?;
    }

    let status = if frame.buffered.is_empty() {
        format!("-- {} --", frame.mode)
    } else {
        format!("-- {} -- {}", frame.mode, frame.buffered)
    };
    backend.write_line(status_row, &fit(&status, width), true)?;

    match &frame.prompt {
        Some(prompt) => {
            let head = format!("{}: ", prompt.label);
            let line = format!("{head}{}", prompt.text);
            backend.write_line(bottom_row, &fit(&line, width), false)?;
            let before: String = prompt.text.chars().take(prompt.cursor).collect();
            let col = (display_width(&head) + display_width(&before)).min(width.saturating_sub(1));
            backend.place_cursor(Some((bottom_row, col as u16)))?;
        }
        None => {
            backend.write_line(bottom_row, &fit(frame.message.unwrap_or(""), width), false)?;
            backend.place_cursor(None)?;
        }
    }

    backend.flush()
}
