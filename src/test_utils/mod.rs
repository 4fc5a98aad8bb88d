//! Test utilities
//! Shared testing helpers and mocks

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use crate::chrome::ChromeContext;
use crate::config::Config;
use crate::engine::{HeadlessEngine, HeadlessWindows};
use crate::error::Result;
use crate::extensions::ExtensionRegistry;
use crate::key::KeyEvent;
use crate::notification::Notifier;
use crate::transport::MemoryTransport;
use crate::ui::terminal::{Size, TerminalBackend};
use crate::ui::{LineEntry, StatusLine};
use crate::view::BrowserView;
use crate::worker::{ChromeSender, LogControl, MemoryDom, PageWorkerServer, WorkerHost};

/// One call to [`Notifier::notify`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotification {
    pub message: String,
    pub critical: bool,
    pub header: String,
}

/// Notifier that remembers everything it was asked to show
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: RefCell<Vec<SentNotification>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<SentNotification> {
        self.sent.borrow().clone()
    }

    /// Just the message texts, oldest first
    pub fn texts(&self) -> Vec<String> {
        self.sent.borrow().iter().map(|n| n.message.clone()).collect()
    }

    pub fn clear(&self) {
        self.sent.borrow_mut().clear();
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str, critical: bool, header: &str) {
        self.sent.borrow_mut().push(SentNotification {
            message: message.to_string(),
            critical,
            header: header.to_string(),
        });
    }
}

/// Worker log control that accepts any level
#[derive(Debug, Default)]
pub struct NullLog;

impl LogControl for NullLog {
    fn set_level(&self, _level: &str) -> Result<()> {
        Ok(())
    }
}

/// A chrome context wired to in-memory collaborators
pub struct TestChrome {
    pub ctx: Rc<ChromeContext>,
    pub notifier: Rc<RecordingNotifier>,
    pub windows: Rc<HeadlessWindows>,
    pub transport: Arc<MemoryTransport>,
}

impl TestChrome {
    /// Default config, every in-memory service, one open window
    pub fn new() -> Self {
        Self::build(Config::defaults().unwrap(), ExtensionRegistry::in_memory(), 1)
    }

    pub fn with_config(config: Config) -> Self {
        Self::build(config, ExtensionRegistry::in_memory(), 1)
    }

    pub fn build(config: Config, extensions: ExtensionRegistry, windows: usize) -> Self {
        let notifier = Rc::new(RecordingNotifier::default());
        let windows = Rc::new(HeadlessWindows::new(windows));
        let transport = Arc::new(MemoryTransport::new());
        let ctx = ChromeContext::builder(config)
            .notifier(notifier.clone())
            .windows(windows.clone())
            .transport(transport.clone())
            .extensions(extensions)
            .start();
        Self {
            ctx,
            notifier,
            windows,
            transport,
        }
    }

    /// A view on a fresh headless page. The returned engine shares the
    /// view's state.
    pub fn view(&self, page_id: u64) -> (BrowserView, HeadlessEngine) {
        let engine = HeadlessEngine::new(page_id);
        let view = BrowserView::new(
            Rc::clone(&self.ctx),
            Box::new(engine.clone()),
            Box::new(LineEntry::new()),
            Box::new(StatusLine::default()),
        );
        (view, engine)
    }

    /// Serve `dom` as page `page_id` of the default profile
    pub async fn serve(&self, page_id: u64, dom: MemoryDom, chrome: ChromeSender) -> PageWorkerServer {
        let profile = self.ctx.settings().profile.clone();
        let host = WorkerHost::new(self.transport.clone(), profile, chrome, Arc::new(NullLog));
        let (server, _handle) = host.on_page_created(page_id, Box::new(dom)).await.unwrap();
        server
    }

    pub fn texts(&self) -> Vec<String> {
        self.notifier.texts()
    }
}

/// Mock terminal backend for testing
/// Records the last text written to every row
pub struct MockTerminal {
    pub lines: BTreeMap<u16, (String, bool)>,
    pub cursor: Option<(u16, u16)>,
    pub flushes: usize,
    pub keys: VecDeque<KeyEvent>,
    pub size: (u16, u16),
}

impl MockTerminal {
    /// Create a new mock terminal with specified dimensions
    pub fn new(rows: u16, cols: u16) -> Self {
        MockTerminal {
            lines: BTreeMap::new(),
            cursor: None,
            flushes: 0,
            keys: VecDeque::new(),
            size: (rows, cols),
        }
    }

    /// Queue keys for `poll_key`, parsed from binding names
    pub fn with_keys(mut self, keys: &[&str]) -> Self {
        for key in keys {
            self.keys.push_back(key.parse().unwrap());
        }
        self
    }

    /// Text and reverse-video flag of `row`
    pub fn line(&self, row: u16) -> Option<(&str, bool)> {
        self.lines.get(&row).map(|(text, rev)| (text.as_str(), *rev))
    }
}

impl TerminalBackend for MockTerminal {
    fn init(&mut self) -> Result<()> {
        Ok(())
    }

    fn deinit(&mut self) {}

    fn poll_key(&mut self, _timeout: Duration) -> Result<Option<KeyEvent>> {
        Ok(self.keys.pop_front())
    }

    fn size(&self) -> Result<Size> {
        Ok(Size {
            rows: self.size.0,
            cols: self.size.1,
        })
    }

    fn write_line(&mut self, row: u16, text: &str, reverse: bool) -> Result<()> {
        self.lines.insert(row, (text.to_string(), reverse));
        Ok(())
    }

    fn place_cursor(&mut self, position: Option<(u16, u16)>) -> Result<()> {
        self.cursor = position;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.flushes += 1;
        Ok(())
    }
}
