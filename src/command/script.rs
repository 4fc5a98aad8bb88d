//! User commands written in Lua

use mlua::{Function, Lua};
use tracing::debug;

use super::{Command, Invoke};
use crate::error::Result;
use crate::view::BrowserView;

/// A Lua function bound to a key. It receives the current URI and may
/// return a command line to run afterwards, or a command name plus a
/// quoted argument string.
pub struct ScriptCommand {
    /// Keeps the interpreter alive for as long as the function is bound
    _lua: Lua,
    function: Function,
    name: String,
}

impl ScriptCommand {
    pub fn new(lua: Lua, function: Function, name: impl Into<String>) -> Self {
        Self {
            _lua: lua,
            function,
            name: name.into(),
        }
    }
}

impl Command for ScriptCommand {
    fn invoke(&self, view: &mut BrowserView) -> Result<()> {
        let uri = view.engine().uri();
        let (next, args): (Option<String>, Option<String>) = self.function.call(uri)?;
        match (next, args) {
            (Some(name), Some(args)) => {
                debug!(script = %self.name, %name, %args, "script ran command");
                view.run_by_name(&name, &args);
                Ok(())
            }
            (Some(line), None) if !line.trim().is_empty() => {
                debug!(script = %self.name, %line, "script chained command");
                Invoke::parse(&line)?.invoke(view)
            }
            _ => Ok(()),
        }
    }

    fn describe(&self) -> String {
        format!("lua: {}", self.name)
    }
}
