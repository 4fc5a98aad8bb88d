//! The chrome process
//!
//! [`ChromeContext`] holds everything shared by all views of one profile.
//! [`Browser`] owns the views and routes worker requests and page replies
//! back to the view they belong to.

use std::cell::{Ref, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::channel::{PageChannel, RequestIds};
use crate::clipboard::{Clipboard, MemoryClipboard};
use crate::command::CommandRegistry;
use crate::config::{self, Config, Hooks, Settings};
use crate::engine::{HeadlessWindows, WindowContent, WindowHost};
use crate::error::Result;
use crate::extensions::{ExtensionRegistry, SessionEntry};
use crate::key::KeyEvent;
use crate::keymap::BindingTable;
use crate::mode::ModeKind;
use crate::notification::{NotificationManager, Notifier};
use crate::transport::{Endpoint, MemoryTransport, Transport};
use crate::view::{BrowserView, KeyOutcome};
use crate::worker::{ChromeEvent, ChromeReceiver, ChromeRequest, ChromeSender, LogControl};

/// Header used for ordinary notices
pub const NOTIFY_HEADER: &str = "roam";

/// Process-wide chrome state. Created once at startup and shared by every
/// view through an `Rc`.
pub struct ChromeContext {
    config: Config,
    settings: RefCell<Settings>,
    commands: CommandRegistry,
    notifier: Rc<dyn Notifier>,
    extensions: ExtensionRegistry,
    clipboard: Box<dyn Clipboard>,
    windows: Rc<dyn WindowHost>,
    transport: Arc<dyn Transport>,
    request_ids: Arc<RequestIds>,
    /// The process log filter, when one is installed
    log: Option<Arc<dyn LogControl>>,
    /// Last known URI and title of every open page
    pages: RefCell<BTreeMap<u64, SessionEntry>>,
}

impl ChromeContext {
    pub fn builder(config: Config) -> ChromeBuilder {
        ChromeBuilder::new(config)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Live settings, starting from the config file's values
    pub fn settings(&self) -> Ref<'_, Settings> {
        self.settings.borrow()
    }

    /// `set <option> <value>`. A new `log_level` also reloads the chrome's
    /// own log filter.
    pub fn set_option(&self, name: &str, value: &str) -> Result<()> {
        config::set_option(&mut self.settings.borrow_mut(), name, value)?;
        info!(option = name, value, "option changed");

        let is_log_level = config::find_option(name).is_some_and(|o| o.name == "log_level");
        if let Some(log) = self.log.as_ref().filter(|_| is_log_level) {
            let level = self.settings().log_level.clone();
            log.set_level(&level)?;
        }
        Ok(())
    }

    pub fn commands(&self) -> CommandRegistry {
        self.commands
    }

    pub fn bindings(&self) -> Rc<BindingTable> {
        Rc::clone(&self.config.bindings)
    }

    pub fn hooks(&self) -> &dyn Hooks {
        self.config.hooks.as_ref()
    }

    pub fn notifier(&self) -> &Rc<dyn Notifier> {
        &self.notifier
    }

    pub fn notify(&self, message: &str) {
        self.notifier.notify(message, false, NOTIFY_HEADER);
    }

    pub fn extensions(&self) -> &ExtensionRegistry {
        &self.extensions
    }

    pub fn windows(&self) -> &Rc<dyn WindowHost> {
        &self.windows
    }

    pub fn open_window(&self, content: WindowContent, background: bool) {
        debug!(?content, background, "new window");
        self.windows.open_window(content, background);
    }

    pub fn clipboard(&self) -> &dyn Clipboard {
        self.clipboard.as_ref()
    }

    pub fn set_clipboard(&self, text: &str) -> Result<()> {
        self.clipboard.set_text(text)?;
        self.notify(&format!("Set clipboard to '{text}'"));
        Ok(())
    }

    /// Quit unless downloads are still running. Returns whether quitting.
    pub fn quit(&self) -> bool {
        let active = self
            .extensions
            .downloads()
            .map(|d| d.active().len())
            .unwrap_or(0);
        if active > 0 {
            self.notify(&format!("Not quitting, {active} downloads in progress."));
            return false;
        }
        info!("quitting");
        self.windows.quit();
        true
    }

    /// A client channel to the worker serving `page_id`
    pub fn channel_for(&self, page_id: u64) -> PageChannel<BrowserView> {
        let settings = self.settings();
        PageChannel::new(
            Endpoint::new(settings.profile.clone(), page_id),
            Arc::clone(&self.transport),
            Arc::clone(&self.request_ids),
        )
        .with_limits(settings.channel_limits())
    }

    /// A page finished navigating
    pub fn page_loaded(&self, page_id: u64, uri: &str, title: &str) {
        if let Some(history) = self.extensions.history() {
            history.record_visit(uri);
        }
        self.pages.borrow_mut().insert(
            page_id,
            SessionEntry {
                uri: uri.to_string(),
                title: title.to_string(),
            },
        );
    }

    pub fn page_closed(&self, page_id: u64) {
        self.pages.borrow_mut().remove(&page_id);
    }

    /// Open pages in page id order
    pub fn open_pages(&self) -> Vec<SessionEntry> {
        self.pages.borrow().values().cloned().collect()
    }
}

impl fmt::Debug for ChromeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChromeContext")
            .field("settings", &*self.settings.borrow())
            .field("extensions", &self.extensions)
            .field("pages", &self.pages.borrow().len())
            .finish()
    }
}

/// Collaborators default to in-process ones
pub struct ChromeBuilder {
    config: Config,
    notifier: Option<Rc<dyn Notifier>>,
    extensions: Option<ExtensionRegistry>,
    clipboard: Option<Box<dyn Clipboard>>,
    windows: Option<Rc<dyn WindowHost>>,
    transport: Option<Arc<dyn Transport>>,
    request_ids: Option<Arc<RequestIds>>,
    log: Option<Arc<dyn LogControl>>,
}

impl ChromeBuilder {
    fn new(config: Config) -> Self {
        Self {
            config,
            notifier: None,
            extensions: None,
            clipboard: None,
            windows: None,
            transport: None,
            request_ids: None,
            log: None,
        }
    }

    pub fn notifier(mut self, notifier: Rc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn extensions(mut self, extensions: ExtensionRegistry) -> Self {
        self.extensions = Some(extensions);
        self
    }

    pub fn clipboard(mut self, clipboard: Box<dyn Clipboard>) -> Self {
        self.clipboard = Some(clipboard);
        self
    }

    pub fn windows(mut self, windows: Rc<dyn WindowHost>) -> Self {
        self.windows = Some(windows);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn request_ids(mut self, request_ids: Arc<RequestIds>) -> Self {
        self.request_ids = Some(request_ids);
        self
    }

    pub fn log(mut self, log: Arc<dyn LogControl>) -> Self {
        self.log = Some(log);
        self
    }

    /// Run extension hooks and hand out the shared context
    pub fn start(self) -> Rc<ChromeContext> {
        let notifier = self
            .notifier
            .unwrap_or_else(|| Rc::new(RefCell::new(NotificationManager::new())));
        let mut extensions = self.extensions.unwrap_or_default();
        extensions.before_run_all(notifier.as_ref());
        extensions.setup_all(notifier.as_ref());

        let settings = RefCell::new(self.config.settings.clone());
        info!(profile = %settings.borrow().profile, ?extensions, "chrome started");

        Rc::new(ChromeContext {
            config: self.config,
            settings,
            commands: CommandRegistry::builtin(),
            notifier,
            extensions,
            clipboard: self
                .clipboard
                .unwrap_or_else(|| Box::new(MemoryClipboard::default())),
            windows: self
                .windows
                .unwrap_or_else(|| Rc::new(HeadlessWindows::default())),
            transport: self
                .transport
                .unwrap_or_else(|| Arc::new(MemoryTransport::new())),
            request_ids: self.request_ids.unwrap_or_default(),
            log: self.log,
            pages: RefCell::new(BTreeMap::new()),
        })
    }
}

/// All views of one chrome process
pub struct Browser {
    ctx: Rc<ChromeContext>,
    views: BTreeMap<u64, BrowserView>,
    events_tx: ChromeSender,
    events: ChromeReceiver,
}

impl Browser {
    pub fn new(ctx: Rc<ChromeContext>) -> Self {
        let (events_tx, events) = mpsc::unbounded_channel();
        Self {
            ctx,
            views: BTreeMap::new(),
            events_tx,
            events,
        }
    }

    pub fn ctx(&self) -> &Rc<ChromeContext> {
        &self.ctx
    }

    /// Where page workers send their requests
    pub fn chrome_sender(&self) -> ChromeSender {
        self.events_tx.clone()
    }

    pub fn add_view(&mut self, view: BrowserView) -> u64 {
        let page_id = view.page_id();
        debug!(page_id, "view added");
        self.views.insert(page_id, view);
        page_id
    }

    pub fn view(&self, page_id: u64) -> Option<&BrowserView> {
        self.views.get(&page_id)
    }

    pub fn view_mut(&mut self, page_id: u64) -> Option<&mut BrowserView> {
        self.views.get_mut(&page_id)
    }

    pub fn close_view(&mut self, page_id: u64) -> Option<BrowserView> {
        self.ctx.page_closed(page_id);
        self.views.remove(&page_id)
    }

    pub fn page_ids(&self) -> Vec<u64> {
        self.views.keys().copied().collect()
    }

    pub fn handle_key(&mut self, page_id: u64, key: &KeyEvent) -> KeyOutcome {
        match self.views.get_mut(&page_id) {
            Some(view) => view.handle_key(key),
            None => {
                warn!(page_id, %key, "key for unknown page");
                KeyOutcome::Ignored
            }
        }
    }

    /// Handle every queued worker request. Returns how many were routed.
    pub fn pump(&mut self) -> usize {
        let mut routed = 0;
        while let Ok(event) = self.events.try_recv() {
            if self.route(event) {
                routed += 1;
            }
        }
        routed
    }

    fn route(&mut self, event: ChromeEvent) -> bool {
        let ChromeEvent { page_id, request } = event;
        let Some(view) = self.views.get_mut(&page_id) else {
            warn!(page_id, ?request, "request from unknown page dropped");
            return false;
        };

        debug!(page_id, ?request, "worker request");
        let outcome = match request {
            ChromeRequest::OpenWindow { uri } => {
                view.open_uri(&uri, true, false);
                Ok(())
            }
            ChromeRequest::InsertMode => view.set_mode(ModeKind::Insert),
            ChromeRequest::SetClipboard { text } => self.ctx.set_clipboard(&text),
        };
        if let Err(err) = outcome {
            warn!(page_id, error = %err, "worker request failed");
            self.ctx.notify(&err.message);
        }
        true
    }

    /// Deliver page replies that already arrived, across all views
    pub fn settle(&mut self) -> usize {
        self.views.values_mut().map(BrowserView::settle).sum()
    }

    /// Replies still outstanding across all views
    pub fn pending_requests(&self) -> usize {
        self.views.values().map(BrowserView::pending_requests).sum()
    }

    /// The engine wants to open a popup. Returns whether it was opened.
    pub fn popup_requested(&self, uri: &str) -> bool {
        if !self.ctx.hooks().should_open_popup(uri) {
            info!(uri, "popup blocked by hook");
            return false;
        }
        self.ctx.open_window(WindowContent::Uri(uri.to_string()), false);
        true
    }

    /// A page wants to show a desktop notification
    pub fn notification_requested(&self, origin: &str, title: &str, body: &str) -> bool {
        if !self.ctx.hooks().should_allow_notification(origin) {
            info!(origin, "notification blocked by hook");
            return false;
        }
        self.ctx.notifier().notify(body, false, title);
        true
    }
}

impl fmt::Debug for Browser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Browser")
            .field("views", &self.views.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
