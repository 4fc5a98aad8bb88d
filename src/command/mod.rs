//! Commands bound to keys
//!
//! Everything a key can trigger implements [`Command`]. Built-in behavior
//! lives in the static [`CommandRegistry`]; bindings reach it through
//! [`Invoke`] lines, user scripts through [`ScriptCommand`].

mod definitions;
pub mod registry;
mod script;

pub use definitions::COMMANDS;
pub use registry::{CommandDescriptor, CommandMatch, CommandRegistry, Handler};
pub use script::ScriptCommand;

use tracing::debug;

use crate::error::{ErrorType, Result, RoamError};
use crate::mode::ModeKind;
use crate::view::BrowserView;

pub trait Command {
    fn invoke(&self, view: &mut BrowserView) -> Result<()>;
    /// Short text for help listings
    fn describe(&self) -> String;
}

/// Split a command line with shell quoting rules
pub fn split_line(line: &str) -> Result<Vec<String>> {
    shlex::split(line).ok_or_else(|| {
        RoamError::new(
            ErrorType::Parse,
            "UNBALANCED_QUOTES",
            format!("Unbalanced quotes in '{line}'"),
        )
    })
}

/// A registry command with fixed arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoke {
    name: String,
    args: Vec<String>,
    line: String,
}

impl Invoke {
    pub fn new(name: impl Into<String>, args: Vec<String>) -> Self {
        let name = name.into();
        let line = shlex::try_join(std::iter::once(name.as_str()).chain(args.iter().map(String::as_str)))
            .unwrap_or_else(|_| format!("{name} {}", args.join(" ")).trim_end().to_string());
        Self { name, args, line }
    }

    pub fn parse(line: &str) -> Result<Self> {
        let mut words = split_line(line)?.into_iter();
        let name = words.next().ok_or_else(|| {
            RoamError::new(ErrorType::Parse, "EMPTY_COMMAND", "Empty command line")
        })?;
        Ok(Self {
            name,
            args: words.collect(),
            line: line.trim().to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl Command for Invoke {
    fn invoke(&self, view: &mut BrowserView) -> Result<()> {
        view.execute(&self.name, &self.args)
    }

    fn describe(&self) -> String {
        self.line.clone()
    }
}

/// Switch to a mode that carries no data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnterMode(pub ModeKind);

impl Command for EnterMode {
    fn invoke(&self, view: &mut BrowserView) -> Result<()> {
        debug!(mode = %self.0, "enter mode");
        view.set_mode(self.0)
    }

    fn describe(&self) -> String {
        format!("{}-mode", self.0.label().to_lowercase())
    }
}

/// A command backed by a closure
pub struct FnCommand {
    description: String,
    run: Box<dyn Fn(&mut BrowserView) -> Result<()>>,
}

impl FnCommand {
    pub fn new(
        description: impl Into<String>,
        run: impl Fn(&mut BrowserView) -> Result<()> + 'static,
    ) -> Self {
        Self {
            description: description.into(),
            run: Box::new(run),
        }
    }
}

impl Command for FnCommand {
    fn invoke(&self, view: &mut BrowserView) -> Result<()> {
        (self.run)(view)
    }

    fn describe(&self) -> String {
        self.description.clone()
    }
}
