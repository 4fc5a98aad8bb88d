//! Command registry
//!
//! A fixed table of named commands. Names match exactly, through an alias,
//! or by an unambiguous prefix.

use std::fmt;

use tracing::{info, warn};

use super::split_line;
use crate::error::{ErrorType, Result, RoamError};
use crate::extensions::{Capability, ExtensionRegistry};
use crate::view::BrowserView;

/// Handler signature. Arguments are already split.
pub type Handler = fn(&mut BrowserView, &[String]) -> Result<()>;

pub struct CommandDescriptor {
    /// Display name, e.g. `view-source`
    pub name: &'static str,
    /// Other accepted names, e.g. `view_source`
    pub aliases: &'static [&'static str],
    /// One line for `help`
    pub description: &'static str,
    /// Hidden from completion and help
    pub private: bool,
    /// Services that must be enabled
    pub requires: &'static [Capability],
    pub handler: Handler,
}

impl CommandDescriptor {
    fn names(&self) -> impl Iterator<Item = &'static str> {
        let aliases: &'static [&'static str] = self.aliases;
        std::iter::once(self.name).chain(aliases.iter().copied())
    }

    /// Required services that are not enabled
    pub fn missing(&self, extensions: &ExtensionRegistry) -> Vec<Capability> {
        self.requires
            .iter()
            .copied()
            .filter(|cap| !extensions.is_enabled(*cap))
            .collect()
    }
}

impl fmt::Debug for CommandDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDescriptor")
            .field("name", &self.name)
            .field("private", &self.private)
            .field("requires", &self.requires)
            .finish()
    }
}

/// Result of matching typed input to a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandMatch {
    /// Command name or explicit alias
    Exact(&'static str),
    /// Shortest unambiguous prefix
    Prefix(&'static str),
    Ambiguous(Vec<&'static str>),
    Unknown,
}

#[derive(Debug, Clone, Copy)]
pub struct CommandRegistry {
    commands: &'static [CommandDescriptor],
}

impl CommandRegistry {
    pub const fn new(commands: &'static [CommandDescriptor]) -> Self {
        Self { commands }
    }

    /// The built-in commands
    pub fn builtin() -> Self {
        Self::new(super::COMMANDS)
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static CommandDescriptor> {
        let commands: &'static [CommandDescriptor] = self.commands;
        commands.iter()
    }

    /// Match `input` against names and aliases, case-insensitively
    pub fn match_command(&self, input: &str) -> CommandMatch {
        let input = input.trim().to_lowercase();
        if input.is_empty() {
            return CommandMatch::Unknown;
        }

        if let Some(cmd) = self
            .commands
            .iter()
            .find(|cmd| cmd.names().any(|n| n.eq_ignore_ascii_case(&input)))
        {
            return CommandMatch::Exact(cmd.name);
        }

        let matches: Vec<&'static str> = self
            .commands
            .iter()
            .filter(|cmd| cmd.names().any(|n| n.to_lowercase().starts_with(&input)))
            .map(|cmd| cmd.name)
            .collect();

        match matches.as_slice() {
            [] => CommandMatch::Unknown,
            [only] => CommandMatch::Prefix(*only),
            _ => CommandMatch::Ambiguous(matches),
        }
    }

    pub fn resolve(&self, name: &str) -> Option<&'static CommandDescriptor> {
        let found = match self.match_command(name) {
            CommandMatch::Exact(found) | CommandMatch::Prefix(found) => found,
            CommandMatch::Ambiguous(_) | CommandMatch::Unknown => return None,
        };
        self.commands.iter().find(|cmd| cmd.name == found)
    }

    /// Public commands whose services are all enabled, sorted
    pub fn completion_names(&self, extensions: &ExtensionRegistry) -> Vec<String> {
        let mut names: Vec<String> = self
            .commands
            .iter()
            .filter(|cmd| !cmd.private && cmd.missing(extensions).is_empty())
            .map(|cmd| cmd.name.to_string())
            .collect();
        names.sort();
        names
    }

    pub fn help(&self, name: &str) -> &'static str {
        self.resolve(name)
            .map_or("No help available", |cmd| cmd.description)
    }

    /// Run `name`, propagating its failure. Unmet requirements are
    /// reported to the user and are not a failure.
    pub fn execute(&self, view: &mut BrowserView, name: &str, args: &[String]) -> Result<()> {
        let cmd = self.resolve(name).ok_or_else(|| {
            RoamError::new(
                ErrorType::Execution,
                "NO_SUCH_COMMAND",
                format!("No such command '{name}'"),
            )
        })?;

        let missing = cmd.missing(view.ctx().extensions());
        if !missing.is_empty() {
            let needs: Vec<&str> = missing.iter().map(|c| c.name()).collect();
            warn!(command = cmd.name, ?missing, "command requirements unmet");
            view.notify(&format!(
                "'{}' needs {}, which is not enabled",
                cmd.name,
                needs.join(", ")
            ));
            return Ok(());
        }

        info!(command = cmd.name, ?args, "running command");
        (cmd.handler)(view, args)
    }

    /// Run `name` with a shell-quoted argument string. Failures become
    /// notifications.
    pub fn run_by_name(&self, view: &mut BrowserView, name: &str, args: &str) {
        let outcome = split_line(args).and_then(|args| self.execute(view, name, &args));
        self.report(view, name, outcome);
    }

    /// Run a full command line such as `zoom 150`
    pub fn run_line(&self, view: &mut BrowserView, line: &str) {
        let words = match split_line(line) {
            Ok(words) => words,
            Err(err) => {
                view.notify(&err.message);
                return;
            }
        };
        let Some((name, args)) = words.split_first() else {
            return;
        };
        let outcome = self.execute(view, name, args);
        self.report(view, name, outcome);
    }

    fn report(&self, view: &mut BrowserView, name: &str, outcome: Result<()>) {
        match outcome {
            Ok(()) => {}
            Err(err) if err.code == "NO_SUCH_COMMAND" => view.notify(&err.message),
            Err(err) => {
                warn!(command = name, error = %err, "command failed");
                view.notify(&format!("Error calling '{name}': {}", err.message));
            }
        }
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
