//! Clipboard collaborator

use std::cell::RefCell;

use arboard::Clipboard as ArboardClipboard;

use crate::error::{ErrorType, Result, RoamError};

pub trait Clipboard {
    fn set_text(&self, text: &str) -> Result<()>;
    fn text(&self) -> Result<String>;
}

fn clipboard_err(err: arboard::Error) -> RoamError {
    RoamError::new(ErrorType::Io, "CLIPBOARD", err.to_string())
}

/// The desktop clipboard. A handle is opened per call since the display
/// server connection may come and go.
#[derive(Debug, Default)]
pub struct SystemClipboard;

impl Clipboard for SystemClipboard {
    fn set_text(&self, text: &str) -> Result<()> {
        let mut clipboard = ArboardClipboard::new().map_err(clipboard_err)?;
        clipboard.set_text(text.to_string()).map_err(clipboard_err)
    }

    fn text(&self) -> Result<String> {
        let mut clipboard = ArboardClipboard::new().map_err(clipboard_err)?;
        clipboard.get_text().map_err(clipboard_err)
    }
}

/// Process-local clipboard for headless runs and tests
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    contents: RefCell<Option<String>>,
}

impl Clipboard for MemoryClipboard {
    fn set_text(&self, text: &str) -> Result<()> {
        *self.contents.borrow_mut() = Some(text.to_string());
        Ok(())
    }

    fn text(&self) -> Result<String> {
        self.contents.borrow().clone().ok_or_else(|| {
            RoamError::new(ErrorType::Io, "CLIPBOARD_EMPTY", "Clipboard is empty")
        })
    }
}
