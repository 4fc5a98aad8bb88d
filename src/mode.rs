//! Input modes of a browser view

use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use crate::error::{ErrorType, RoamError};
use crate::keymap::BindingTable;
use crate::prompt::PromptSession;
use crate::view::BrowserView;

/// A mode without its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModeKind {
    Normal,
    Insert,
    PassThrough,
    SubCommand,
    Prompt,
}

impl ModeKind {
    /// Status line label
    pub fn label(self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::Insert => "INSERT",
            Self::PassThrough => "PASSTHROUGH",
            Self::SubCommand => "COMMAND",
            Self::Prompt => "PROMPT",
        }
    }

    /// Whether the page may hold keyboard focus. `None` leaves it as is.
    pub fn page_focus(self) -> Option<bool> {
        match self {
            Self::Normal | Self::SubCommand => Some(false),
            Self::Insert | Self::PassThrough => Some(true),
            Self::Prompt => None,
        }
    }
}

impl fmt::Display for ModeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ModeKind {
    type Err = RoamError;

    /// Only the modes that carry no data can be named
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "normal" => Ok(Self::Normal),
            "insert" => Ok(Self::Insert),
            "passthrough" | "pass-through" => Ok(Self::PassThrough),
            _ => Err(RoamError::new(
                ErrorType::Parse,
                "UNKNOWN_MODE",
                format!("Unknown mode '{s}'"),
            )),
        }
    }
}

/// The active input mode. Sub-command and prompt state live inside their
/// variant and are dropped with it.
pub enum Mode {
    Normal,
    Insert,
    PassThrough,
    SubCommand {
        prefix: String,
        table: Rc<BindingTable>,
    },
    Prompt(Box<PromptSession<BrowserView>>),
}

impl Mode {
    pub fn kind(&self) -> ModeKind {
        match self {
            Self::Normal => ModeKind::Normal,
            Self::Insert => ModeKind::Insert,
            Self::PassThrough => ModeKind::PassThrough,
            Self::SubCommand { .. } => ModeKind::SubCommand,
            Self::Prompt(_) => ModeKind::Prompt,
        }
    }
}

impl Default for Mode {
    fn default() -> Self {
        Self::Normal
    }
}

impl fmt::Debug for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SubCommand { prefix, table } => f
                .debug_struct("SubCommand")
                .field("prefix", prefix)
                .field("bindings", &table.len())
                .finish(),
            Self::Prompt(session) => f.debug_tuple("Prompt").field(session).finish(),
            other => f.write_str(other.kind().label()),
        }
    }
}
