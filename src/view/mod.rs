//! One browser view: a page, its mode and its prompt
//!
//! Keys enter here. The active [`Mode`] decides whether a key runs a bound
//! command, edits the prompt, or goes to the page.

use std::rc::Rc;

use tracing::{debug, info, warn};

use crate::channel::{PageChannel, ReplyCallback};
use crate::chrome::ChromeContext;
use crate::engine::{PageEngine, WindowContent};
use crate::error::{ErrorType, Result, RoamError};
use crate::key::{KeyEvent, ESCAPE, INSERT, LEFT_TAB, RETURN, TAB};
use crate::keymap::{Binding, BindingTable};
use crate::mode::{Mode, ModeKind};
use crate::prompt::{PromptOutcome, PromptSession, Resolution};
use crate::protocol::{PageCommand, PayloadMap};
use crate::ui::{ModeIndicator, TextEntry};

/// What happened to a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Consumed by the chrome
    Handled,
    /// The page should handle it
    PassToPage,
    /// Dropped
    Ignored,
}

pub struct BrowserView {
    ctx: Rc<ChromeContext>,
    engine: Box<dyn PageEngine>,
    mode: Mode,
    bindings: Rc<BindingTable>,
    entry: Box<dyn TextEntry>,
    indicator: Box<dyn ModeIndicator>,
    channel: PageChannel<BrowserView>,
    /// Direction of the last page search
    search_forwards: bool,
}

impl BrowserView {
    pub fn new(
        ctx: Rc<ChromeContext>,
        mut engine: Box<dyn PageEngine>,
        entry: Box<dyn TextEntry>,
        indicator: Box<dyn ModeIndicator>,
    ) -> Self {
        let channel = ctx.channel_for(engine.page_id());
        {
            let settings = ctx.settings();
            engine.set_zoom(settings.default_zoom);
            if let Some(agent) = &settings.default_user_agent {
                engine.set_user_agent(agent);
            }
        }

        let mut view = Self {
            bindings: ctx.bindings(),
            ctx,
            engine,
            mode: Mode::Normal,
            entry,
            indicator,
            channel,
            search_forwards: true,
        };
        view.enter(Mode::Normal);
        view
    }

    pub fn ctx(&self) -> &Rc<ChromeContext> {
        &self.ctx
    }

    pub fn page_id(&self) -> u64 {
        self.engine.page_id()
    }

    pub fn engine(&self) -> &dyn PageEngine {
        self.engine.as_ref()
    }

    pub fn engine_mut(&mut self) -> &mut dyn PageEngine {
        self.engine.as_mut()
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn entry(&self) -> &dyn TextEntry {
        self.entry.as_ref()
    }

    pub fn indicator(&self) -> &dyn ModeIndicator {
        self.indicator.as_ref()
    }

    pub fn search_forwards(&self) -> bool {
        self.search_forwards
    }

    pub fn set_search_forwards(&mut self, forwards: bool) {
        self.search_forwards = forwards;
    }

    /// Switch to a mode that carries no data
    pub fn set_mode(&mut self, kind: ModeKind) -> Result<()> {
        let mode = match kind {
            ModeKind::Normal => Mode::Normal,
            ModeKind::Insert => Mode::Insert,
            ModeKind::PassThrough => Mode::PassThrough,
            ModeKind::SubCommand | ModeKind::Prompt => {
                return Err(RoamError::new(
                    ErrorType::Internal,
                    "MODE_NEEDS_DATA",
                    format!("{kind} mode cannot be entered by name"),
                ))
            }
        };
        self.enter(mode);
        Ok(())
    }

    /// Wait for one more key from `table`
    pub fn enter_sub_command(&mut self, prefix: &str, table: Rc<BindingTable>) {
        self.enter(Mode::SubCommand {
            prefix: prefix.to_string(),
            table,
        });
    }

    /// Show `session` in the entry and start routing keys to it. An open
    /// prompt is cancelled first.
    pub fn prompt(&mut self, session: PromptSession<BrowserView>) {
        let options = session.options();
        self.entry.set_label(session.label());
        self.entry.set_masked(options.private);
        self.entry.set_text(&options.initial);
        self.entry.set_suggestions(session.displayed());
        self.entry.show();
        self.entry.set_focus(true);
        self.enter(Mode::Prompt(Box::new(session)));
    }

    fn enter(&mut self, mode: Mode) {
        let kind = mode.kind();
        info!(page_id = self.page_id(), from = %self.mode.kind(), to = %kind, "mode change");

        if let Some(focus) = kind.page_focus() {
            self.engine.set_can_focus(focus);
        }
        self.indicator.set_mode(kind.label());
        let buffered = match &mode {
            Mode::SubCommand { prefix, .. } => prefix.as_str(),
            _ => "",
        };
        self.indicator.set_buffered_command(buffered);

        let previous = std::mem::replace(&mut self.mode, mode);
        if let Mode::Prompt(mut session) = previous {
            if kind != ModeKind::Prompt {
                self.entry.hide();
            }
            if let Some(resolution) = session.cancel() {
                self.finish_prompt(resolution);
            }
        }
    }

    pub fn handle_key(&mut self, key: &KeyEvent) -> KeyOutcome {
        if key.is_bare_modifier() {
            return KeyOutcome::Ignored;
        }

        match self.mode.kind() {
            ModeKind::Normal => self.handle_normal_key(key),
            ModeKind::SubCommand => self.handle_sub_command_key(key),
            ModeKind::Prompt => self.handle_prompt_key(key),
            ModeKind::PassThrough if key.is(INSERT) => {
                self.enter(Mode::Normal);
                KeyOutcome::Handled
            }
            ModeKind::Insert if key.is(ESCAPE) => {
                self.enter(Mode::Normal);
                KeyOutcome::Handled
            }
            ModeKind::PassThrough | ModeKind::Insert => KeyOutcome::PassToPage,
        }
    }

    fn handle_normal_key(&mut self, key: &KeyEvent) -> KeyOutcome {
        let Some(binding) = self.bindings.get(key).cloned() else {
            return KeyOutcome::PassToPage;
        };
        self.run_binding(key, binding);
        KeyOutcome::Handled
    }

    fn handle_sub_command_key(&mut self, key: &KeyEvent) -> KeyOutcome {
        let binding = match &self.mode {
            Mode::SubCommand { table, .. } => table.get(key).cloned(),
            _ => None,
        };
        match binding {
            Some(binding) => self.run_binding(key, binding),
            None => debug!(%key, "unbound sub-command key"),
        }

        // One key deep unless the command moved on by itself
        if self.mode.kind() == ModeKind::SubCommand {
            self.enter(Mode::Normal);
        }
        KeyOutcome::Handled
    }

    fn run_binding(&mut self, key: &KeyEvent, binding: Binding) {
        match binding {
            Binding::Command(command) => {
                debug!(%key, command = %command.describe(), "bound command");
                if let Err(err) = command.invoke(self) {
                    warn!(%key, error = %err, "bound command failed");
                    self.notify(&format!("Error invoking command '{key}': {}", err.message));
                }
            }
            Binding::Table(table) => self.enter_sub_command(&key.to_string(), table),
        }
    }

    fn handle_prompt_key(&mut self, key: &KeyEvent) -> KeyOutcome {
        if key.is(ESCAPE) || is_cancel_chord(key) {
            self.close_prompt(false);
            return KeyOutcome::Handled;
        }
        if key.is(RETURN) {
            self.close_prompt(true);
            return KeyOutcome::Handled;
        }

        let Mode::Prompt(session) = &mut self.mode else {
            return KeyOutcome::Ignored;
        };
        if key.is(TAB) || key.is(LEFT_TAB) {
            if let Some(text) = session.cycle(key.is(TAB)) {
                self.entry.set_text(&text);
            }
            return KeyOutcome::Handled;
        }

        if self.entry.feed_key(key) {
            session.update(&self.entry.text());
            self.entry.set_suggestions(session.displayed());
            KeyOutcome::Handled
        } else {
            KeyOutcome::Ignored
        }
    }

    fn close_prompt(&mut self, submit: bool) {
        let Mode::Prompt(mut session) = std::mem::take(&mut self.mode) else {
            return;
        };
        debug!(label = session.label(), submit, "prompt closed");
        let text = self.entry.text();
        self.entry.hide();
        self.enter(Mode::Normal);

        let resolution = if submit {
            session.submit(&text)
        } else {
            session.cancel()
        };
        if let Some(resolution) = resolution {
            self.finish_prompt(resolution);
        }
    }

    fn finish_prompt(&mut self, resolution: Resolution<BrowserView>) {
        match resolution.run(self) {
            Ok(PromptOutcome::Submitted(_)) => debug!("prompt callback done"),
            Ok(PromptOutcome::Cancelled) => debug!("prompt cancel callback done"),
            Err(err) => {
                warn!(error = %err, "prompt callback failed");
                self.notify(&format!("Error invoking callback: {}", err.message));
            }
        }
    }

    /// Run a registry command, propagating its failure
    pub fn execute(&mut self, name: &str, args: &[String]) -> Result<()> {
        let commands = self.ctx.commands();
        commands.execute(self, name, args)
    }

    /// Run `name` with a shell-quoted argument string; failures become
    /// notifications
    pub fn run_by_name(&mut self, name: &str, args: &str) {
        let commands = self.ctx.commands();
        commands.run_by_name(self, name, args);
    }

    /// Run a typed command line; failures become notifications
    pub fn run_line(&mut self, line: &str) {
        let commands = self.ctx.commands();
        commands.run_line(self, line);
    }

    pub fn notify(&self, message: &str) {
        self.ctx.notify(message);
    }

    /// Load `uri` here, or in a new window
    pub fn open_uri(&mut self, uri: &str, new_window: bool, background: bool) {
        if new_window || background {
            info!(uri, background, "loading in a new window");
            self.ctx
                .open_window(WindowContent::Uri(uri.to_string()), background);
            return;
        }

        info!(uri, "loading");
        self.engine.load(uri);
        self.ctx.page_loaded(self.page_id(), uri, &self.engine.title());
    }

    /// Send a page command. Failures without a callback are only logged.
    pub fn request(&mut self, command: &PageCommand, callback: Option<ReplyCallback<BrowserView>>) -> u64 {
        self.channel.send(command, callback)
    }

    /// Send a page command and run `then` with its reply. Faults are
    /// reported instead.
    pub fn request_then<F>(&mut self, command: &PageCommand, then: F) -> u64
    where
        F: FnOnce(&mut BrowserView, PayloadMap) -> Result<()> + 'static,
    {
        let name = command.name();
        self.request(
            command,
            Some(Box::new(move |view: &mut BrowserView, reply: Result<PayloadMap>| {
                let outcome = reply
                    .map_err(|err| {
                        RoamError::protocol(err.code, format!("'{name}' failed: {}", err.message))
                    })
                    .and_then(|payload| then(view, payload));
                if let Err(err) = outcome {
                    warn!(command = name, error = %err, "page reply handling failed");
                    view.notify(&err.message);
                }
            })),
        )
    }

    pub fn pending_requests(&self) -> usize {
        self.channel.pending_count()
    }

    /// Deliver replies that already arrived
    pub fn settle(&mut self) -> usize {
        let ready = self.channel.take_ready();
        let count = ready.len();
        for reply in ready {
            reply.deliver(self);
        }
        count
    }

    /// Wait for the next reply and deliver it. False when nothing is
    /// outstanding.
    pub async fn settle_next(&mut self) -> bool {
        match self.channel.next_reply().await {
            Some(reply) => {
                reply.deliver(self);
                true
            }
            None => false,
        }
    }
}

/// `C-c` dismisses a prompt like Escape
fn is_cancel_chord(key: &KeyEvent) -> bool {
    key.control && !key.alt && !key.super_key && key.key == "c"
}

impl std::fmt::Debug for BrowserView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserView")
            .field("page_id", &self.page_id())
            .field("mode", &self.mode)
            .field("channel", &self.channel)
            .finish()
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
