//! Browser configuration
//!
//! Built once at startup from defaults and an optional Lua file. Bindings
//! and hooks are read-only afterwards; scalar settings can still be changed
//! with `set` through the option descriptors.

pub mod lua;
pub mod options;

pub use lua::LuaHooks;
pub use options::{find_option, set_option, OptionDescriptor, OptionError, OptionType, OptionValue, OPTIONS};

use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use tracing::info;

use crate::channel::ChannelLimits;
use crate::error::Result;
use crate::keymap::{Binding, BindingTable};

pub const DEFAULT_HOME_PAGE: &str = "https://duckduckgo.com/";
pub const DEFAULT_SEARCH_PAGE: &str = "https://duckduckgo.com/?q={}";
pub const DEFAULT_ZOOM: u32 = 100;

const SCROLL_PAGE_DOWN: &str = "javascript 'window.scrollBy(0, window.innerHeight);'";
const SCROLL_PAGE_UP: &str = "javascript 'window.scrollBy(0, -window.innerHeight);'";

/// Top-level bindings used when the config file defines no `commands`
const DEFAULT_BINDINGS: &[(&str, &str)] = &[
    ("i", "insert-mode"),
    ("p", "passthrough-mode"),
    (":", "prompt-command"),
    ("d", "close"),
    ("o", "open-or-search"),
    ("O", "open-modify"),
    ("t", "open-or-search --new-window"),
    ("T", "open-modify --new-window"),
    ("r", "reload"),
    ("R", "reload-bypass-cache"),
    ("C-Up", "zoom-in"),
    ("C-Down", "zoom-out"),
    ("+", "zoom-in"),
    ("-", "zoom-out"),
    ("=", "zoom-reset"),
    ("/", "search-page"),
    ("?", "search-page --backwards"),
    ("n", "next-search-result"),
    ("N", "next-search-result --backwards"),
    ("H", "back"),
    ("L", "forward"),
    ("C-o", "back"),
    // Terminals report C-i as Tab; `L` covers forward there
    ("C-i", "forward"),
    ("f", "follow"),
    ("F", "follow --new-window"),
    ("C-f", SCROLL_PAGE_DOWN),
    ("C-b", SCROLL_PAGE_UP),
    ("space", SCROLL_PAGE_DOWN),
    ("S-space", SCROLL_PAGE_UP),
    ("C-c", "stop"),
    ("C-q", "quit"),
    ("h", "move -1 0"),
    ("j", "move 0 1"),
    ("k", "move 0 -1"),
    ("l", "move 1 0"),
    ("y", "yank"),
    ("Y", "yank-link"),
    ("G", "javascript 'window.scrollBy(0, document.body.scrollHeight);'"),
];

/// The `g` sub-command table
const DEFAULT_G_BINDINGS: &[(&str, &str)] = &[
    ("u", "navigate-up"),
    ("U", "navigate-top"),
    ("g", "javascript 'window.scrollTo(0, 0);'"),
    ("s", "view-source"),
];

/// Scalar settings. Every field has an entry in [`OPTIONS`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub home_page: String,
    /// URL template, `{}` is replaced by the encoded query
    pub search_page: String,
    /// Percent
    pub default_zoom: u32,
    /// `None` keeps the engine's own user agent
    pub default_user_agent: Option<String>,
    pub request_timeout_ms: u64,
    pub max_message_bytes: usize,
    pub log_level: String,
    pub profile: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            home_page: DEFAULT_HOME_PAGE.to_string(),
            search_page: DEFAULT_SEARCH_PAGE.to_string(),
            default_zoom: DEFAULT_ZOOM,
            default_user_agent: None,
            request_timeout_ms: 10_000,
            max_message_bytes: crate::protocol::DEFAULT_MAX_MESSAGE_BYTES,
            log_level: "info".to_string(),
            profile: "default".to_string(),
        }
    }
}

impl Settings {
    /// Fill the search template with `text`
    pub fn search_url(&self, text: &str) -> String {
        let query: String = url::form_urlencoded::byte_serialize(text.as_bytes()).collect();
        self.search_page.replacen("{}", &query, 1)
    }

    pub fn channel_limits(&self) -> ChannelLimits {
        ChannelLimits {
            timeout: Duration::from_millis(self.request_timeout_ms),
            max_message_bytes: self.max_message_bytes,
        }
    }
}

/// Optional user hooks. The defaults are what a config without hooks gets.
pub trait Hooks {
    /// Replace the search URL built from `search_page`
    fn search_url(&self, _text: &str) -> Option<String> {
        None
    }

    fn should_open_popup(&self, _uri: &str) -> bool {
        true
    }

    /// Extra choices for `change-user-agent`
    fn user_agent_choices(&self) -> Vec<String> {
        Vec::new()
    }

    fn should_allow_notification(&self, _origin: &str) -> bool {
        true
    }
}

/// No hooks at all
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl Hooks for NoHooks {}

pub struct Config {
    /// Startup values; the live copy is owned by the chrome
    pub settings: Settings,
    pub bindings: Rc<BindingTable>,
    pub hooks: Box<dyn Hooks>,
}

impl Config {
    pub fn new(settings: Settings, bindings: BindingTable, hooks: Box<dyn Hooks>) -> Self {
        Self {
            settings,
            bindings: Rc::new(bindings),
            hooks,
        }
    }

    pub fn defaults() -> Result<Self> {
        Ok(Self::new(Settings::default(), default_bindings()?, Box::new(NoHooks)))
    }

    /// Load `path` if given and present. A missing file means defaults; a
    /// broken one is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) if path.exists() => {
                info!(path = %path.display(), "loading config");
                lua::load_file(path)
            }
            Some(path) => {
                info!(path = %path.display(), "no config file, using defaults");
                Self::defaults()
            }
            None => Self::defaults(),
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("settings", &self.settings)
            .field("bindings", &self.bindings.len())
            .finish()
    }
}

/// The stock key bindings
pub fn default_bindings() -> Result<BindingTable> {
    let mut table = BindingTable::new();
    for (key, line) in DEFAULT_BINDINGS {
        table.bind_line(key, line)?;
    }

    let mut g = BindingTable::new();
    for (key, line) in DEFAULT_G_BINDINGS {
        g.bind_line(key, line)?;
    }
    table.bind("g", Binding::table(g))?;
    Ok(table)
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
