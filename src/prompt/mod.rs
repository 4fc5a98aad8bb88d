//! Prompt sessions
//!
//! One modal text-entry interaction (command line, search, confirmation).
//! A session resolves exactly once: either its submit callback or its
//! cancel callback is handed out, never both, and never twice.

mod filter;

pub use filter::{filter_suggestions, FilterOptions, MAX_DISPLAYED};

use crate::error::Result;

/// Callback receiving the submitted value
pub type SubmitCallback<C> = Box<dyn FnOnce(&mut C, String) -> Result<()>>;
/// Callback run when the prompt is dismissed
pub type CancelCallback<C> = Box<dyn FnOnce(&mut C) -> Result<()>>;

/// Configuration for a prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptOptions {
    /// Replace unmatched input with the first displayed suggestion
    pub force_match: bool,
    pub glob: bool,
    pub case_sensitive: bool,
    pub match_from_beginning: bool,
    /// Text placed in the entry when the prompt opens
    pub initial: String,
    /// Mask the entry (passwords)
    pub private: bool,
}

impl Default for PromptOptions {
    fn default() -> Self {
        Self {
            force_match: false,
            glob: false,
            case_sensitive: false,
            match_from_beginning: true,
            initial: String::new(),
            private: false,
        }
    }
}

impl PromptOptions {
    fn filter(&self) -> FilterOptions {
        FilterOptions {
            glob: self.glob,
            case_sensitive: self.case_sensitive,
            match_from_beginning: self.match_from_beginning,
        }
    }
}

/// How a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptOutcome {
    Submitted(String),
    Cancelled,
}

/// A callback detached from its session, ready to run against the context
pub enum Resolution<C> {
    Submit {
        value: String,
        callback: SubmitCallback<C>,
    },
    Cancel(Option<CancelCallback<C>>),
}

impl<C> Resolution<C> {
    /// Run the detached callback
    pub fn run(self, ctx: &mut C) -> Result<PromptOutcome> {
        match self {
            Resolution::Submit { value, callback } => {
                callback(ctx, value.clone())?;
                Ok(PromptOutcome::Submitted(value))
            }
            Resolution::Cancel(callback) => {
                if let Some(callback) = callback {
                    callback(ctx)?;
                }
                Ok(PromptOutcome::Cancelled)
            }
        }
    }
}

/// An active prompt
pub struct PromptSession<C> {
    label: String,
    suggestions: Vec<String>,
    options: PromptOptions,
    displayed: Vec<String>,
    /// Position in `displayed` while Tab-cycling; `None` until the first Tab
    cycle_position: Option<usize>,
    on_submit: Option<SubmitCallback<C>>,
    on_cancel: Option<CancelCallback<C>>,
    closed: bool,
}

impl<C> PromptSession<C> {
    /// Open a session. Suggestions are displayed filtered by the initial text.
    pub fn open(label: impl Into<String>, suggestions: Vec<String>, options: PromptOptions) -> Self {
        let displayed = filter_suggestions(&suggestions, &options.initial, options.filter());
        Self {
            label: label.into(),
            suggestions,
            options,
            displayed,
            cycle_position: None,
            on_submit: None,
            on_cancel: None,
            closed: false,
        }
    }

    /// Set the submit callback
    pub fn on_submit<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(&mut C, String) -> Result<()> + 'static,
    {
        self.on_submit = Some(Box::new(callback));
        self
    }

    /// Set the cancel callback
    pub fn on_cancel<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(&mut C) -> Result<()> + 'static,
    {
        self.on_cancel = Some(Box::new(callback));
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn options(&self) -> &PromptOptions {
        &self.options
    }

    /// Suggestions currently shown, in display order
    pub fn displayed(&self) -> &[String] {
        &self.displayed
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// The entry text changed: refilter and release the cycle lock
    pub fn update(&mut self, text: &str) {
        self.cycle_position = None;
        self.displayed = filter_suggestions(&self.suggestions, text, self.options.filter());
    }

    /// Step through the displayed suggestions, wrapping around. Returns the
    /// text the entry should now hold.
    pub fn cycle(&mut self, forward: bool) -> Option<String> {
        let len = self.displayed.len();
        if len == 0 {
            return None;
        }

        let next = match self.cycle_position {
            None if forward => 0,
            None => len - 1,
            Some(pos) if forward => (pos + 1) % len,
            Some(pos) => (pos + len - 1) % len,
        };
        self.cycle_position = Some(next);
        self.displayed.get(next).cloned()
    }

    /// Resolve the value `text` would submit, applying `force_match`
    pub fn resolve(&self, text: &str) -> String {
        if self.options.force_match
            && !self.displayed.is_empty()
            && !self.displayed.iter().any(|s| s == text)
        {
            return self.displayed[0].clone();
        }
        text.to_string()
    }

    /// Close the session with `text`. `None` if it was already closed or
    /// has no submit callback.
    pub fn submit(&mut self, text: &str) -> Option<Resolution<C>> {
        if self.closed {
            return None;
        }
        self.closed = true;
        self.on_cancel = None;

        let value = self.resolve(text);
        self.on_submit
            .take()
            .map(|callback| Resolution::Submit { value, callback })
    }

    /// Dismiss the session. `None` if it was already closed.
    pub fn cancel(&mut self) -> Option<Resolution<C>> {
        if self.closed {
            return None;
        }
        self.closed = true;
        self.on_submit = None;
        Some(Resolution::Cancel(self.on_cancel.take()))
    }
}

impl<C> std::fmt::Debug for PromptSession<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptSession")
            .field("label", &self.label)
            .field("options", &self.options)
            .field("displayed", &self.displayed.len())
            .field("closed", &self.closed)
            .finish()
    }
}
