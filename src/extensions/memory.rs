//! In-memory services. Nothing here touches the disk.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};

use super::{
    Capability, CertificateBypass, DownloadTracker, Extension, FormFill, HistoryStore,
    PasswordStore, SessionEntry, SessionStore,
};
use crate::error::{ErrorType, Result, RoamError};
use crate::protocol::PayloadMap;

/// Most URLs offered by history completion
pub const MAX_POPULAR_URLS: usize = 500;

/// URIs that are never worth remembering
fn is_blank(uri: &str) -> bool {
    matches!(uri, "" | "about:blank" | "http:/")
}

#[derive(Debug, Default)]
pub struct MemoryHistory {
    /// uri -> (view count, first visit order)
    visits: RefCell<BTreeMap<String, (u64, u64)>>,
    order: Cell<u64>,
}

impl Extension for MemoryHistory {
    fn name(&self) -> &str {
        "history"
    }

    fn capability(&self) -> Capability {
        Capability::History
    }

    fn as_history(&self) -> Option<&dyn HistoryStore> {
        Some(self)
    }
}

impl HistoryStore for MemoryHistory {
    fn record_visit(&self, uri: &str) {
        if is_blank(uri) {
            return;
        }
        let order = self.order.get();
        self.order.set(order + 1);
        self.visits
            .borrow_mut()
            .entry(uri.to_string())
            .and_modify(|(count, _)| *count += 1)
            .or_insert((1, order));
    }

    fn most_popular_urls(&self) -> Vec<String> {
        let visits = self.visits.borrow();
        let mut ranked: Vec<_> = visits.iter().collect();
        ranked.sort_by(|(_, (ca, oa)), (_, (cb, ob))| cb.cmp(ca).then(oa.cmp(ob)));
        ranked
            .into_iter()
            .take(MAX_POPULAR_URLS)
            .map(|(uri, _)| uri.clone())
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct MemorySessions {
    saved: RefCell<Vec<SessionEntry>>,
}

impl Extension for MemorySessions {
    fn name(&self) -> &str {
        "sessions"
    }

    fn capability(&self) -> Capability {
        Capability::Sessions
    }

    /// Restores after certificate exclusions are in place
    fn sort_order(&self) -> i32 {
        1
    }

    fn as_sessions(&self) -> Option<&dyn SessionStore> {
        Some(self)
    }
}

impl SessionStore for MemorySessions {
    fn save_session(&self, pages: &[SessionEntry]) -> usize {
        let kept: Vec<SessionEntry> = pages
            .iter()
            .filter(|p| !is_blank(&p.uri))
            .map(|p| SessionEntry {
                uri: p.uri.clone(),
                title: if p.title.is_empty() {
                    "No Title".to_string()
                } else {
                    p.title.clone()
                },
            })
            .collect();
        let count = kept.len();
        *self.saved.borrow_mut() = kept;
        count
    }

    fn saved_session(&self) -> Vec<SessionEntry> {
        self.saved.borrow().clone()
    }
}

/// Form store guarded by a master passphrase
#[derive(Debug, Default)]
pub struct MemoryPasswords {
    passphrase: RefCell<Option<String>>,
    unlocked: Cell<bool>,
    forms: RefCell<Vec<FormFill>>,
    clock: Cell<u64>,
}

impl MemoryPasswords {
    fn tick(&self) -> u64 {
        let now = self.clock.get() + 1;
        self.clock.set(now);
        now
    }

    fn require_unlocked(&self) -> Result<()> {
        if self.unlocked.get() {
            Ok(())
        } else {
            Err(RoamError::new(
                ErrorType::Requirement,
                "PASSWORDS_LOCKED",
                "Password store is locked",
            ))
        }
    }
}

impl Extension for MemoryPasswords {
    fn name(&self) -> &str {
        "passwords"
    }

    fn capability(&self) -> Capability {
        Capability::PasswordStore
    }

    fn as_passwords(&self) -> Option<&dyn PasswordStore> {
        Some(self)
    }
}

impl PasswordStore for MemoryPasswords {
    fn is_initialised(&self) -> bool {
        self.passphrase.borrow().is_some()
    }

    fn initialise(&self, passphrase: &str) -> Result<()> {
        if self.is_initialised() {
            return Err(RoamError::new(
                ErrorType::Execution,
                "PASSWORDS_INITIALISED",
                "Password store already has a master password",
            ));
        }
        if passphrase.is_empty() {
            return Err(RoamError::new(
                ErrorType::Execution,
                "PASSWORD_EMPTY",
                "Master password cannot be empty",
            ));
        }
        *self.passphrase.borrow_mut() = Some(passphrase.to_string());
        self.unlocked.set(true);
        Ok(())
    }

    fn is_unlocked(&self) -> bool {
        self.unlocked.get()
    }

    fn unlock(&self, passphrase: &str) -> Result<()> {
        match self.passphrase.borrow().as_deref() {
            None => Err(RoamError::new(
                ErrorType::Execution,
                "PASSWORDS_UNINITIALISED",
                "Database not initialised",
            )),
            Some(expected) if expected == passphrase => {
                self.unlocked.set(true);
                Ok(())
            }
            Some(_) => Err(RoamError::new(
                ErrorType::Execution,
                "PASSWORD_INCORRECT",
                "Incorrect password",
            )),
        }
    }

    fn lock(&self) {
        self.unlocked.set(false);
    }

    fn forms_for_domain(&self, domain: &str) -> Result<Vec<FormFill>> {
        self.require_unlocked()?;
        let mut forms: Vec<FormFill> = self
            .forms
            .borrow()
            .iter()
            .filter(|f| f.domain == domain)
            .cloned()
            .collect();
        forms.sort_by(|a, b| b.last_used.cmp(&a.last_used));
        Ok(forms)
    }

    fn save_form(&self, domain: &str, form: PayloadMap, description: Option<&str>) -> Result<u64> {
        self.require_unlocked()?;
        let stamp = self.tick();
        let mut forms = self.forms.borrow_mut();
        let id = forms.len() as u64 + 1;
        forms.push(FormFill {
            id,
            last_used: stamp,
            description: description.map_or_else(|| format!("Form for {domain}"), str::to_string),
            domain: domain.to_string(),
            form_data: form,
        });
        Ok(id)
    }

    fn touch(&self, id: u64) -> Result<()> {
        self.require_unlocked()?;
        let stamp = self.tick();
        let mut forms = self.forms.borrow_mut();
        let form = forms.iter_mut().find(|f| f.id == id).ok_or_else(|| {
            RoamError::new(
                ErrorType::Execution,
                "FORM_NOT_FOUND",
                format!("No saved form with id {id}"),
            )
        })?;
        form.last_used = stamp;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryDownloads {
    active: RefCell<BTreeMap<u64, String>>,
    next_id: Cell<u64>,
}

impl Extension for MemoryDownloads {
    fn name(&self) -> &str {
        "downloads"
    }

    fn capability(&self) -> Capability {
        Capability::Downloads
    }

    fn as_downloads(&self) -> Option<&dyn DownloadTracker> {
        Some(self)
    }
}

impl DownloadTracker for MemoryDownloads {
    fn start(&self, name: &str) -> u64 {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        self.active.borrow_mut().insert(id, name.to_string());
        id
    }

    fn finish(&self, id: u64) {
        self.active.borrow_mut().remove(&id);
    }

    fn cancel(&self, id: u64) -> bool {
        self.active.borrow_mut().remove(&id).is_some()
    }

    fn active(&self) -> Vec<String> {
        self.active.borrow().values().cloned().collect()
    }
}

#[derive(Debug, Default)]
pub struct MemoryCertificateBypass {
    hosts: RefCell<BTreeSet<String>>,
}

impl Extension for MemoryCertificateBypass {
    fn name(&self) -> &str {
        "certificate-bypass"
    }

    fn capability(&self) -> Capability {
        Capability::CertificateBypass
    }

    fn as_certificate_bypass(&self) -> Option<&dyn CertificateBypass> {
        Some(self)
    }
}

impl CertificateBypass for MemoryCertificateBypass {
    fn bypass(&self, host: &str) -> Result<()> {
        let host = host.trim().to_lowercase();
        if host.is_empty() || host.contains(['/', ' ']) {
            return Err(RoamError::new(
                ErrorType::Execution,
                "BAD_HOST",
                format!("'{host}' is not a host name"),
            ));
        }
        self.hosts.borrow_mut().insert(host);
        Ok(())
    }

    fn is_bypassed(&self, host: &str) -> bool {
        self.hosts.borrow().contains(&host.to_lowercase())
    }
}
