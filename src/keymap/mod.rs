//! Key bindings
//!
//! A table maps a key to either a command or a nested table. Binding a
//! nested table to a key turns that key into a sub-command prefix. Sub-command
//! mode lasts one key, so a nested table may only hold commands. Tables are
//! built once from configuration and shared read-only afterwards.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::command::{Command, Invoke};
use crate::error::{ErrorType, Result, RoamError};
use crate::key::KeyEvent;

#[derive(Clone)]
pub enum Binding {
    Command(Rc<dyn Command>),
    Table(Rc<BindingTable>),
}

impl Binding {
    /// A registry command line such as `follow --new-window`
    pub fn command(line: &str) -> Result<Self> {
        Ok(Self::Command(Rc::new(Invoke::parse(line)?)))
    }

    pub fn table(table: BindingTable) -> Self {
        Self::Table(Rc::new(table))
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Command(command) => write!(f, "Command({})", command.describe()),
            Self::Table(table) => write!(f, "Table({} keys)", table.len()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BindingTable {
    entries: HashMap<KeyEvent, Binding>,
}

impl BindingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `key` (e.g. `C-f`, `S-space`), replacing any previous binding
    pub fn bind(&mut self, key: &str, binding: Binding) -> Result<()> {
        let key: KeyEvent = key.parse()?;
        if let Binding::Table(table) = &binding {
            if table.entries.values().any(|b| matches!(b, Binding::Table(_))) {
                return Err(RoamError::new(
                    ErrorType::Config,
                    "NESTED_SUB_COMMAND",
                    format!("Sub-command table for '{key}' may only bind commands"),
                ));
            }
        }
        self.entries.insert(key, binding);
        Ok(())
    }

    pub fn bind_line(&mut self, key: &str, line: &str) -> Result<()> {
        self.bind(key, Binding::command(line)?)
    }

    pub fn get(&self, key: &KeyEvent) -> Option<&Binding> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `key: description` lines, nested keys space separated, sorted
    pub fn describe(&self) -> Vec<String> {
        let mut lines = Vec::new();
        self.describe_into("", &mut lines);
        lines.sort();
        lines
    }

    fn describe_into(&self, prefix: &str, lines: &mut Vec<String>) {
        for (key, binding) in &self.entries {
            let name = if prefix.is_empty() {
                key.to_string()
            } else {
                format!("{prefix} {key}")
            };
            match binding {
                Binding::Command(command) => lines.push(format!("{name}: {}", command.describe())),
                Binding::Table(table) => table.describe_into(&name, lines),
            }
        }
    }
}
