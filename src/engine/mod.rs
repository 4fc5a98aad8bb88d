//! Page engine boundary
//!
//! The chrome never renders or runs scripts itself. It drives a page engine
//! through [`PageEngine`] and asks the host for windows through
//! [`WindowHost`]. The headless implementations here record every call so
//! the front end and the tests can observe what the chrome asked for.

use std::cell::{Cell, Ref, RefCell};
use std::rc::Rc;

use tracing::{debug, info};

use crate::error::{ErrorType, Result, RoamError};

pub const MIN_ZOOM: u32 = 10;
pub const MAX_ZOOM: u32 = 500;

/// Find-in-page flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FindOptions {
    pub case_sensitive: bool,
    pub backwards: bool,
    pub wrap_around: bool,
    pub max_matches: u32,
}

impl Default for FindOptions {
    fn default() -> Self {
        Self {
            case_sensitive: false,
            backwards: false,
            wrap_around: true,
            max_matches: 1000,
        }
    }
}

/// One page as seen by the chrome
pub trait PageEngine {
    fn page_id(&self) -> u64;
    fn uri(&self) -> Option<String>;
    fn title(&self) -> String;
    fn load(&mut self, uri: &str);
    fn back(&mut self);
    fn forward(&mut self);
    fn reload(&mut self, bypass_cache: bool);
    fn stop(&mut self);
    /// Zoom in percent
    fn zoom(&self) -> u32;
    fn set_zoom(&mut self, percent: u32);
    fn run_javascript(&mut self, script: &str) -> Result<()>;
    fn find(&mut self, text: &str, options: FindOptions);
    fn find_next(&mut self);
    fn find_previous(&mut self);
    fn find_finish(&mut self);
    /// Whether the page may take keyboard focus
    fn set_can_focus(&mut self, can_focus: bool);
    fn set_user_agent(&mut self, user_agent: &str);
}

/// What a new window shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowContent {
    Uri(String),
    PlainText { title: String, text: String },
    Html { title: String, html: String },
}

/// Window management collaborator
pub trait WindowHost {
    fn open_window(&self, content: WindowContent, background: bool);
    fn close_window(&self, page_id: u64);
    fn window_count(&self) -> usize;
    fn quit(&self);
}

/// Observable state of a [`HeadlessEngine`]
#[derive(Debug, Clone, Default)]
pub struct HeadlessState {
    pub history: Vec<String>,
    pub position: usize,
    pub zoom: u32,
    pub scripts: Vec<String>,
    pub reloads: Vec<bool>,
    pub stops: usize,
    pub find: Option<(String, FindOptions)>,
    /// +1 per `find_next`, -1 per `find_previous`
    pub find_steps: Vec<i8>,
    pub can_focus: bool,
    pub user_agent: Option<String>,
}

/// Engine that keeps navigation state in memory. Clones share state.
#[derive(Debug, Clone)]
pub struct HeadlessEngine {
    page_id: u64,
    state: Rc<RefCell<HeadlessState>>,
}

impl HeadlessEngine {
    pub fn new(page_id: u64) -> Self {
        Self {
            page_id,
            state: Rc::new(RefCell::new(HeadlessState {
                zoom: 100,
                ..HeadlessState::default()
            })),
        }
    }

    pub fn state(&self) -> Ref<'_, HeadlessState> {
        self.state.borrow()
    }
}

impl PageEngine for HeadlessEngine {
    fn page_id(&self) -> u64 {
        self.page_id
    }

    fn uri(&self) -> Option<String> {
        let state = self.state.borrow();
        state.history.get(state.position).cloned()
    }

    fn title(&self) -> String {
        self.uri().unwrap_or_default()
    }

    fn load(&mut self, uri: &str) {
        info!(page_id = self.page_id, uri, "load");
        let mut state = self.state.borrow_mut();
        if !state.history.is_empty() {
            let keep = state.position + 1;
            state.history.truncate(keep);
        }
        state.history.push(uri.to_string());
        state.position = state.history.len() - 1;
    }

    fn back(&mut self) {
        let mut state = self.state.borrow_mut();
        state.position = state.position.saturating_sub(1);
    }

    fn forward(&mut self) {
        let mut state = self.state.borrow_mut();
        if state.position + 1 < state.history.len() {
            state.position += 1;
        }
    }

    fn reload(&mut self, bypass_cache: bool) {
        self.state.borrow_mut().reloads.push(bypass_cache);
    }

    fn stop(&mut self) {
        self.state.borrow_mut().stops += 1;
    }

    fn zoom(&self) -> u32 {
        self.state.borrow().zoom
    }

    fn set_zoom(&mut self, percent: u32) {
        self.state.borrow_mut().zoom = percent.clamp(MIN_ZOOM, MAX_ZOOM);
    }

    fn run_javascript(&mut self, script: &str) -> Result<()> {
        if script.trim().is_empty() {
            return Err(RoamError::new(
                ErrorType::Execution,
                "EMPTY_SCRIPT",
                "No script to run",
            ));
        }
        debug!(page_id = self.page_id, script, "run javascript");
        self.state.borrow_mut().scripts.push(script.to_string());
        Ok(())
    }

    fn find(&mut self, text: &str, options: FindOptions) {
        let mut state = self.state.borrow_mut();
        state.find = Some((text.to_string(), options));
        state.find_steps.clear();
    }

    fn find_next(&mut self) {
        self.state.borrow_mut().find_steps.push(1);
    }

    fn find_previous(&mut self) {
        self.state.borrow_mut().find_steps.push(-1);
    }

    fn find_finish(&mut self) {
        let mut state = self.state.borrow_mut();
        state.find = None;
        state.find_steps.clear();
    }

    fn set_can_focus(&mut self, can_focus: bool) {
        self.state.borrow_mut().can_focus = can_focus;
    }

    fn set_user_agent(&mut self, user_agent: &str) {
        self.state.borrow_mut().user_agent = Some(user_agent.to_string());
    }
}

/// Window host that only records requests
#[derive(Debug)]
pub struct HeadlessWindows {
    opened: RefCell<Vec<(WindowContent, bool)>>,
    closed: RefCell<Vec<u64>>,
    windows: Cell<usize>,
    quit: Cell<bool>,
}

impl HeadlessWindows {
    /// A host that already shows `windows` windows
    pub fn new(windows: usize) -> Self {
        Self {
            opened: RefCell::new(Vec::new()),
            closed: RefCell::new(Vec::new()),
            windows: Cell::new(windows),
            quit: Cell::new(false),
        }
    }

    pub fn opened(&self) -> Vec<(WindowContent, bool)> {
        self.opened.borrow().clone()
    }

    pub fn closed(&self) -> Vec<u64> {
        self.closed.borrow().clone()
    }

    pub fn quit_requested(&self) -> bool {
        self.quit.get()
    }
}

impl Default for HeadlessWindows {
    fn default() -> Self {
        Self::new(1)
    }
}

impl WindowHost for HeadlessWindows {
    fn open_window(&self, content: WindowContent, background: bool) {
        info!(?content, background, "open window");
        self.opened.borrow_mut().push((content, background));
        self.windows.set(self.windows.get() + 1);
    }

    fn close_window(&self, page_id: u64) {
        self.closed.borrow_mut().push(page_id);
        self.windows.set(self.windows.get().saturating_sub(1));
    }

    fn window_count(&self) -> usize {
        self.windows.get()
    }

    fn quit(&self) {
        info!("quit requested");
        self.quit.set(true);
    }
}
