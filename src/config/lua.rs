//! Lua config files
//!
//! The file runs once. Settings are read back from globals named like the
//! options, key bindings from a `commands` table, hooks from global
//! functions.

use std::path::Path;
use std::rc::Rc;

use mlua::{FromLua, Function, Lua, Table, Value};
use tracing::warn;

use super::options::{set_option, OPTIONS};
use super::{default_bindings, Config, Hooks, Settings};
use crate::command::ScriptCommand;
use crate::error::{ErrorType, Result, RoamError};
use crate::keymap::{Binding, BindingTable};

pub fn load_file(path: &Path) -> Result<Config> {
    let source = std::fs::read_to_string(path)?;
    load_str(&source, &path.display().to_string())
}

/// Evaluate `source` and build a config from what it left behind
pub fn load_str(source: &str, chunk_name: &str) -> Result<Config> {
    let lua = Lua::new();
    lua.load(source).set_name(chunk_name).exec()?;
    let globals = lua.globals();

    let settings = read_settings(&lua, &globals)?;
    let bindings = match globals.get::<Option<Table>>("commands")? {
        Some(commands) => read_bindings(&lua, &commands)?,
        None => default_bindings()?,
    };
    let hooks = LuaHooks::from_globals(lua.clone(), &globals)?;

    Ok(Config::new(settings, bindings, Box::new(hooks)))
}

fn read_settings(lua: &Lua, globals: &Table) -> Result<Settings> {
    let mut settings = Settings::default();
    for option in OPTIONS {
        let raw = match globals.get::<Value>(option.name)? {
            Value::Nil => continue,
            Value::Boolean(flag) => flag.to_string(),
            other => String::from_lua(other, lua)?,
        };
        set_option(&mut settings, option.name, &raw).map_err(|err| {
            RoamError::new(
                ErrorType::Config,
                "CONFIG_BAD_SETTING",
                format!("{}: {err}", option.name),
            )
        })?;
    }
    Ok(settings)
}

fn read_bindings(lua: &Lua, commands: &Table) -> Result<BindingTable> {
    let mut bindings = BindingTable::new();
    for pair in commands.pairs::<String, Value>() {
        let (key, value) = pair?;
        let binding = match value {
            Value::String(line) => Binding::command(&line.to_str()?)?,
            Value::Table(nested) => Binding::table(read_bindings(lua, &nested)?),
            Value::Function(function) => Binding::Command(Rc::new(ScriptCommand::new(
                lua.clone(),
                function,
                key.clone(),
            ))),
            other => {
                return Err(RoamError::new(
                    ErrorType::Config,
                    "CONFIG_BAD_BINDING",
                    format!(
                        "binding for '{key}' must be a string, table or function, not {}",
                        other.type_name()
                    ),
                ))
            }
        };
        bindings.bind(&key, binding)?;
    }
    Ok(bindings)
}

/// Hook functions found in the config file. A hook that errors is logged
/// and treated as absent.
pub struct LuaHooks {
    _lua: Lua,
    search_url: Option<Function>,
    should_open_popup: Option<Function>,
    user_agent_choices: Option<Function>,
    should_allow_notification: Option<Function>,
}

impl LuaHooks {
    fn from_globals(lua: Lua, globals: &Table) -> Result<Self> {
        Ok(Self {
            search_url: globals.get("search_url")?,
            should_open_popup: globals.get("should_open_popup")?,
            user_agent_choices: globals.get("user_agent_choices")?,
            should_allow_notification: globals.get("should_allow_notification")?,
            _lua: lua,
        })
    }
}

fn call_hook<R: FromLua>(name: &str, hook: Option<&Function>, arg: Option<&str>) -> Option<R> {
    let hook = hook?;
    match hook.call::<R>(arg) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(hook = name, "config hook failed: {err}");
            None
        }
    }
}

impl Hooks for LuaHooks {
    fn search_url(&self, text: &str) -> Option<String> {
        call_hook::<Option<String>>("search_url", self.search_url.as_ref(), Some(text)).flatten()
    }

    fn should_open_popup(&self, uri: &str) -> bool {
        call_hook("should_open_popup", self.should_open_popup.as_ref(), Some(uri)).unwrap_or(true)
    }

    fn user_agent_choices(&self) -> Vec<String> {
        call_hook("user_agent_choices", self.user_agent_choices.as_ref(), None).unwrap_or_default()
    }

    fn should_allow_notification(&self, origin: &str) -> bool {
        call_hook(
            "should_allow_notification",
            self.should_allow_notification.as_ref(),
            Some(origin),
        )
        .unwrap_or(true)
    }
}
