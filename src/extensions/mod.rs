//! Optional browser services
//!
//! Commands only ever reach a service through the registry: look it up by
//! capability, then call the typed accessor. A command that needs a service
//! declares the capability and is refused when it is missing.

pub mod memory;

use std::fmt;

use tracing::{debug, warn};

use crate::error::Result;
use crate::notification::Notifier;
use crate::protocol::PayloadMap;

pub use memory::{
    MemoryCertificateBypass, MemoryDownloads, MemoryHistory, MemoryPasswords, MemorySessions,
};

/// A service a command may require
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Capability {
    History,
    Sessions,
    Downloads,
    CookiePolicy,
    PasswordStore,
    CertificateBypass,
    Hsts,
}

impl Capability {
    pub fn name(self) -> &'static str {
        match self {
            Self::History => "history",
            Self::Sessions => "sessions",
            Self::Downloads => "downloads",
            Self::CookiePolicy => "cookie policy",
            Self::PasswordStore => "password store",
            Self::CertificateBypass => "certificate bypass",
            Self::Hsts => "HSTS cache",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub trait HistoryStore {
    fn record_visit(&self, uri: &str);
    /// Most visited first
    fn most_popular_urls(&self) -> Vec<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEntry {
    pub uri: String,
    pub title: String,
}

pub trait SessionStore {
    /// Replace the saved session. Returns how many pages were kept.
    fn save_session(&self, pages: &[SessionEntry]) -> usize;
    fn saved_session(&self) -> Vec<SessionEntry>;
}

/// A saved set of form values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormFill {
    pub id: u64,
    /// Larger is more recent
    pub last_used: u64,
    pub description: String,
    pub domain: String,
    pub form_data: PayloadMap,
}

pub trait PasswordStore {
    fn is_initialised(&self) -> bool;
    /// Set the master passphrase of an empty store
    fn initialise(&self, passphrase: &str) -> Result<()>;
    fn is_unlocked(&self) -> bool;
    fn unlock(&self, passphrase: &str) -> Result<()>;
    fn lock(&self);
    /// Fills for `domain`, most recently used first
    fn forms_for_domain(&self, domain: &str) -> Result<Vec<FormFill>>;
    fn save_form(&self, domain: &str, form: PayloadMap, description: Option<&str>) -> Result<u64>;
    fn touch(&self, id: u64) -> Result<()>;
}

pub trait DownloadTracker {
    fn start(&self, name: &str) -> u64;
    fn finish(&self, id: u64);
    fn cancel(&self, id: u64) -> bool;
    /// Names of downloads still running
    fn active(&self) -> Vec<String>;
}

pub trait CertificateBypass {
    fn bypass(&self, host: &str) -> Result<()>;
    fn is_bypassed(&self, host: &str) -> bool;
}

/// An optional service. Setup failures disable the extension, they never
/// stop the browser.
pub trait Extension {
    fn name(&self) -> &str;
    fn capability(&self) -> Capability;

    /// Lower runs first
    fn sort_order(&self) -> i32 {
        0
    }

    fn setup(&self) -> Result<()> {
        Ok(())
    }

    /// Very early hook, before any window exists
    fn before_run(&self) -> Result<()> {
        Ok(())
    }

    fn as_history(&self) -> Option<&dyn HistoryStore> {
        None
    }

    fn as_sessions(&self) -> Option<&dyn SessionStore> {
        None
    }

    fn as_passwords(&self) -> Option<&dyn PasswordStore> {
        None
    }

    fn as_downloads(&self) -> Option<&dyn DownloadTracker> {
        None
    }

    fn as_certificate_bypass(&self) -> Option<&dyn CertificateBypass> {
        None
    }
}

struct Slot {
    extension: Box<dyn Extension>,
    enabled: bool,
}

/// Ordered set of extensions
#[derive(Default)]
pub struct ExtensionRegistry {
    slots: Vec<Slot>,
}

impl ExtensionRegistry {
    pub fn new(mut extensions: Vec<Box<dyn Extension>>) -> Self {
        extensions.sort_by_key(|e| e.sort_order());
        Self {
            slots: extensions
                .into_iter()
                .map(|extension| Slot {
                    extension,
                    enabled: true,
                })
                .collect(),
        }
    }

    /// Every in-memory service
    pub fn in_memory() -> Self {
        Self::new(vec![
            Box::new(MemoryHistory::default()),
            Box::new(MemorySessions::default()),
            Box::new(MemoryDownloads::default()),
            Box::new(MemoryPasswords::default()),
            Box::new(MemoryCertificateBypass::default()),
        ])
    }

    pub fn before_run_all(&mut self, notifier: &dyn Notifier) {
        self.run_hook(notifier, "before_run", |e| e.before_run());
    }

    /// Set up every enabled extension in order
    pub fn setup_all(&mut self, notifier: &dyn Notifier) {
        self.run_hook(notifier, "setup", |e| e.setup());
    }

    fn run_hook(
        &mut self,
        notifier: &dyn Notifier,
        hook: &str,
        run: impl Fn(&dyn Extension) -> Result<()>,
    ) {
        for slot in self.slots.iter_mut().filter(|s| s.enabled) {
            match run(slot.extension.as_ref()) {
                Ok(()) => debug!(extension = slot.extension.name(), hook, "extension ready"),
                Err(err) => {
                    warn!(extension = slot.extension.name(), hook, error = %err, "extension disabled");
                    notifier.notify(
                        &format!("Error setting up {}: {}", slot.extension.name(), err.message),
                        false,
                        "extensions",
                    );
                    slot.enabled = false;
                }
            }
        }
    }

    pub fn is_enabled(&self, capability: Capability) -> bool {
        self.get_extension(capability).is_some()
    }

    pub fn get_extension(&self, capability: Capability) -> Option<&dyn Extension> {
        self.enabled()
            .find(|e| e.capability() == capability)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&dyn Extension> {
        self.enabled().find(|e| e.name() == name)
    }

    /// Enabled extensions in run order
    pub fn enabled(&self) -> impl Iterator<Item = &dyn Extension> {
        self.slots
            .iter()
            .filter(|s| s.enabled)
            .map(|s| s.extension.as_ref())
    }

    pub fn history(&self) -> Option<&dyn HistoryStore> {
        self.get_extension(Capability::History)?.as_history()
    }

    pub fn sessions(&self) -> Option<&dyn SessionStore> {
        self.get_extension(Capability::Sessions)?.as_sessions()
    }

    pub fn passwords(&self) -> Option<&dyn PasswordStore> {
        self.get_extension(Capability::PasswordStore)?.as_passwords()
    }

    pub fn downloads(&self) -> Option<&dyn DownloadTracker> {
        self.get_extension(Capability::Downloads)?.as_downloads()
    }

    pub fn certificate_bypass(&self) -> Option<&dyn CertificateBypass> {
        self.get_extension(Capability::CertificateBypass)?
            .as_certificate_bypass()
    }

    /// Popular history for open prompts; empty without a history service
    pub fn most_popular_urls(&self) -> Vec<String> {
        self.history()
            .map(|h| h.most_popular_urls())
            .unwrap_or_default()
    }
}

impl fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.slots.iter().map(|s| (s.extension.name(), s.enabled)))
            .finish()
    }
}
