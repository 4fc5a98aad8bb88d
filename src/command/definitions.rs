//! Built-in commands
//!
//! Handlers receive already split arguments. Flags are `--name`; anything
//! else is a word. Commands that need text and got none open a prompt.

use std::rc::Rc;

use tracing::{debug, info};
use url::Url;

use super::registry::CommandDescriptor;
use crate::chrome::ChromeContext;
use crate::config::find_option;
use crate::engine::{FindOptions, WindowContent, MAX_ZOOM, MIN_ZOOM};
use crate::error::{ErrorType, Result, RoamError};
use crate::extensions::{Capability, PasswordStore};
use crate::logging::parse_level;
use crate::mode::ModeKind;
use crate::prompt::{PromptOptions, PromptSession};
use crate::protocol::{HighlightMatches, PageCommand, HTML_KEY};
use crate::view::BrowserView;

const ZOOM_STEP: u32 = 10;
/// Pixels per `move` unit
const SCROLL_STEP: i64 = 30;
/// Zero-sized elements are skipped by highlight itself
const FOLLOW_SELECTOR: &str = "a, input:not([type=hidden]), textarea, select, button";
const MAX_UNLOCK_ATTEMPTS: u32 = 3;

type Prompt = PromptSession<BrowserView>;

/// Runs once the password store is unlocked
type Unlocked = Box<dyn FnOnce(&mut BrowserView) -> Result<()>>;

pub static COMMANDS: &[CommandDescriptor] = &[
    CommandDescriptor {
        name: "open",
        aliases: &[],
        description: "Open a URL, prompting for it if none is given.",
        private: true,
        requires: &[],
        handler: open,
    },
    CommandDescriptor {
        name: "open-or-search",
        aliases: &["open_or_search"],
        description: "Open a URL or search for the text.",
        private: true,
        requires: &[],
        handler: open_or_search,
    },
    CommandDescriptor {
        name: "open-modify",
        aliases: &["open_modify"],
        description: "Edit the current URL and open it.",
        private: true,
        requires: &[],
        handler: open_modify,
    },
    CommandDescriptor {
        name: "search",
        aliases: &[],
        description: "Search the web.",
        private: true,
        requires: &[],
        handler: search,
    },
    CommandDescriptor {
        name: "back",
        aliases: &[],
        description: "Go backward in navigation history.",
        private: false,
        requires: &[],
        handler: back,
    },
    CommandDescriptor {
        name: "forward",
        aliases: &[],
        description: "Go forward in navigation history.",
        private: false,
        requires: &[],
        handler: forward,
    },
    CommandDescriptor {
        name: "reload",
        aliases: &[],
        description: "Reload the page.",
        private: false,
        requires: &[],
        handler: reload,
    },
    CommandDescriptor {
        name: "reload-bypass-cache",
        aliases: &["reload_bypass_cache"],
        description: "Reload the page, ignoring the cache.",
        private: false,
        requires: &[],
        handler: reload_bypass_cache,
    },
    CommandDescriptor {
        name: "stop",
        aliases: &[],
        description: "Stop loading the current page.",
        private: false,
        requires: &[],
        handler: stop,
    },
    CommandDescriptor {
        name: "zoom",
        aliases: &[],
        description: "Set zoom to given level, e.g. 'zoom 200' for 200%.",
        private: false,
        requires: &[],
        handler: zoom,
    },
    CommandDescriptor {
        name: "zoom-in",
        aliases: &["zoom_in"],
        description: "Zoom in by 10%.",
        private: true,
        requires: &[],
        handler: zoom_in,
    },
    CommandDescriptor {
        name: "zoom-out",
        aliases: &["zoom_out"],
        description: "Zoom out by 10%.",
        private: true,
        requires: &[],
        handler: zoom_out,
    },
    CommandDescriptor {
        name: "zoom-reset",
        aliases: &["zoom_reset"],
        description: "Reset zoom to the default.",
        private: true,
        requires: &[],
        handler: zoom_reset,
    },
    CommandDescriptor {
        name: "javascript",
        aliases: &[],
        description: "Execute given JavaScript.",
        private: false,
        requires: &[],
        handler: javascript,
    },
    CommandDescriptor {
        name: "move",
        aliases: &[],
        description: "Scroll by x and y steps.",
        private: true,
        requires: &[],
        handler: scroll_by,
    },
    CommandDescriptor {
        name: "navigate-up",
        aliases: &["navigate_up"],
        description: "Open the parent path of the current URL.",
        private: true,
        requires: &[],
        handler: navigate_up,
    },
    CommandDescriptor {
        name: "navigate-top",
        aliases: &["navigate_top"],
        description: "Open the root of the current site.",
        private: true,
        requires: &[],
        handler: navigate_top,
    },
    CommandDescriptor {
        name: "follow",
        aliases: &[],
        description: "Pick a link or control by number.",
        private: true,
        requires: &[],
        handler: follow,
    },
    CommandDescriptor {
        name: "yank",
        aliases: &[],
        description: "Copy the current URL.",
        private: true,
        requires: &[],
        handler: yank,
    },
    CommandDescriptor {
        name: "yank-link",
        aliases: &["yank_link"],
        description: "Copy a link target picked by number.",
        private: true,
        requires: &[],
        handler: yank_link,
    },
    CommandDescriptor {
        name: "view-source",
        aliases: &["view_source"],
        description: "Show the page source in a new window.",
        private: false,
        requires: &[],
        handler: view_source,
    },
    CommandDescriptor {
        name: "remove-overlay",
        aliases: &["remove_overlay"],
        description: "Remove link numbers from the page.",
        private: true,
        requires: &[],
        handler: remove_overlay,
    },
    CommandDescriptor {
        name: "set-log-level",
        aliases: &["set_log_level"],
        description: "Set the page worker's log level.",
        private: true,
        requires: &[],
        handler: set_log_level,
    },
    CommandDescriptor {
        name: "search-page",
        aliases: &["search_page"],
        description: "Find text in the page.",
        private: true,
        requires: &[],
        handler: search_page,
    },
    CommandDescriptor {
        name: "next-search-result",
        aliases: &["next_search_result"],
        description: "Jump to the next match of the last page search.",
        private: true,
        requires: &[],
        handler: next_search_result,
    },
    CommandDescriptor {
        name: "form-fill",
        aliases: &["form_fill"],
        description: "Fill a form with saved values.",
        private: false,
        requires: &[Capability::PasswordStore],
        handler: form_fill,
    },
    CommandDescriptor {
        name: "form-save",
        aliases: &["form_save"],
        description: "Save the values of a form on this page.",
        private: false,
        requires: &[Capability::PasswordStore],
        handler: form_save,
    },
    CommandDescriptor {
        name: "save-session",
        aliases: &["save_session"],
        description: "Save the current session.",
        private: false,
        requires: &[Capability::Sessions],
        handler: save_session,
    },
    CommandDescriptor {
        name: "bypass",
        aliases: &[],
        description: "Set up a certificate exclusion for a given domain.",
        private: false,
        requires: &[Capability::CertificateBypass],
        handler: bypass,
    },
    CommandDescriptor {
        name: "change-user-agent",
        aliases: &["change_user_agent"],
        description: "Switch the user agent.",
        private: true,
        requires: &[],
        handler: change_user_agent,
    },
    CommandDescriptor {
        name: "set",
        aliases: &[],
        description: "Show or change a setting, e.g. 'set zoom 120'.",
        private: false,
        requires: &[],
        handler: set,
    },
    CommandDescriptor {
        name: "help",
        aliases: &[],
        description: "This very informative help.",
        private: false,
        requires: &[],
        handler: help,
    },
    CommandDescriptor {
        name: "close",
        aliases: &[],
        description: "Close the current window. Quits if there's only one window.",
        private: false,
        requires: &[],
        handler: close,
    },
    CommandDescriptor {
        name: "quit",
        aliases: &[],
        description: "Close the browser.",
        private: false,
        requires: &[],
        handler: quit,
    },
    CommandDescriptor {
        name: "insert-mode",
        aliases: &["insert_mode"],
        description: "Send keys to the page until Escape.",
        private: true,
        requires: &[],
        handler: insert_mode,
    },
    CommandDescriptor {
        name: "passthrough-mode",
        aliases: &["passthrough_mode"],
        description: "Send keys to the page until Insert.",
        private: true,
        requires: &[],
        handler: passthrough_mode,
    },
    CommandDescriptor {
        name: "normal-mode",
        aliases: &["normal_mode"],
        description: "Return to normal mode.",
        private: true,
        requires: &[],
        handler: normal_mode,
    },
    CommandDescriptor {
        name: "prompt-command",
        aliases: &["prompt_command"],
        description: "Type a command.",
        private: true,
        requires: &[],
        handler: prompt_command,
    },
];

/// `--flags` and plain words of one invocation
struct Args<'a> {
    flags: Vec<&'a str>,
    words: Vec<&'a str>,
}

impl<'a> Args<'a> {
    fn parse(args: &'a [String], allowed: &[&str]) -> Result<Self> {
        let mut parsed = Self {
            flags: Vec::new(),
            words: Vec::new(),
        };
        for arg in args {
            match arg.strip_prefix("--") {
                Some(flag) if allowed.contains(&flag) => parsed.flags.push(flag),
                Some(flag) => {
                    return Err(RoamError::execution(
                        "UNKNOWN_FLAG",
                        format!("Unknown flag '--{flag}'"),
                    ))
                }
                None => parsed.words.push(arg.as_str()),
            }
        }
        Ok(parsed)
    }

    fn has(&self, flag: &str) -> bool {
        self.flags.contains(&flag)
    }

    /// Words joined with spaces, `None` when there are none
    fn text(&self) -> Option<String> {
        (!self.words.is_empty()).then(|| self.words.join(" "))
    }
}

fn usage(text: &str) -> RoamError {
    RoamError::execution("USAGE", format!("Usage: {text}"))
}

fn window_label(base: &str, new_window: bool, background: bool) -> String {
    if background {
        format!("{base} (new background window)")
    } else if new_window {
        format!("{base} (new window)")
    } else {
        base.to_string()
    }
}

/// The index in a highlight label such as `3: Docs`
fn label_index(label: &str) -> Option<usize> {
    label.split_once(':')?.0.trim().parse().ok()
}

fn current_url(view: &BrowserView) -> Result<Url> {
    let uri = view
        .engine()
        .uri()
        .ok_or_else(|| RoamError::execution("NO_URI", "The page has no URL"))?;
    Url::parse(&uri)
        .map_err(|err| RoamError::new(ErrorType::Parse, "BAD_URL", format!("'{uri}': {err}")))
}

/// Host and port of the current page
fn current_domain(view: &BrowserView) -> Result<String> {
    let url = current_url(view)?;
    let host = url
        .host_str()
        .ok_or_else(|| RoamError::execution("NO_DOMAIN", format!("'{url}' has no domain")))?;
    Ok(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

fn passwords(ctx: &ChromeContext) -> Result<&dyn PasswordStore> {
    ctx.extensions().passwords().ok_or_else(|| {
        RoamError::new(
            ErrorType::Requirement,
            "REQUIREMENT_UNMET",
            "The password store is not enabled",
        )
    })
}

fn open(view: &mut BrowserView, args: &[String]) -> Result<()> {
    let args = Args::parse(args, &["new-window", "background"])?;
    let (new_window, background) = (args.has("new-window"), args.has("background"));
    if let Some(uri) = args.text() {
        view.open_uri(&uri, new_window, background);
        return Ok(());
    }

    let suggestions = view.ctx().extensions().most_popular_urls();
    let options = PromptOptions {
        glob: true,
        ..PromptOptions::default()
    };
    let session = Prompt::open(window_label("open", new_window, background), suggestions, options)
        .on_submit(move |view, uri| {
            if !uri.trim().is_empty() {
                view.open_uri(uri.trim(), new_window, background);
            }
            Ok(())
        });
    view.prompt(session);
    Ok(())
}

fn open_or_search(view: &mut BrowserView, args: &[String]) -> Result<()> {
    let args = Args::parse(args, &["new-window", "background"])?;
    let (new_window, background) = (args.has("new-window"), args.has("background"));
    if let Some(text) = args.text() {
        open_or_search_text(view, &text, new_window, background);
        return Ok(());
    }

    let suggestions = view.ctx().extensions().most_popular_urls();
    let options = PromptOptions {
        glob: true,
        ..PromptOptions::default()
    };
    let session = Prompt::open(window_label("open/search", new_window, background), suggestions, options)
        .on_submit(move |view, text| {
            open_or_search_text(view, &text, new_window, background);
            Ok(())
        });
    view.prompt(session);
    Ok(())
}

/// Decide whether `text` is an address or a query
fn open_or_search_text(view: &mut BrowserView, text: &str, new_window: bool, background: bool) {
    let text = text.trim();
    if text.is_empty() {
        return;
    }

    if has_scheme(text) {
        view.open_uri(text, new_window, background);
    } else if looks_like_host(text) {
        view.open_uri(&format!("http://{text}"), new_window, background);
    } else {
        search_for(view, text, new_window);
    }
}

fn has_scheme(text: &str) -> bool {
    match Url::parse(text) {
        Ok(url) => text.contains("://") || matches!(url.scheme(), "about" | "data" | "mailto"),
        Err(_) => false,
    }
}

fn looks_like_host(text: &str) -> bool {
    let host = text.split(['/', '?', '#']).next().unwrap_or_default();
    let host = host.split(':').next().unwrap_or_default();
    if host.is_empty() || host.contains([' ', '_']) {
        return false;
    }
    (host.contains('.') || host.eq_ignore_ascii_case("localhost"))
        && Url::parse(&format!("http://{text}")).is_ok()
}

fn search_for(view: &mut BrowserView, text: &str, new_window: bool) {
    let url = {
        let ctx = view.ctx();
        ctx.hooks()
            .search_url(text)
            .unwrap_or_else(|| ctx.settings().search_url(text))
    };
    view.open_uri(&url, new_window, false);
}

fn open_modify(view: &mut BrowserView, args: &[String]) -> Result<()> {
    let args = Args::parse(args, &["new-window"])?;
    let new_window = args.has("new-window");
    let options = PromptOptions {
        initial: view.engine().uri().unwrap_or_default(),
        ..PromptOptions::default()
    };
    let session = Prompt::open(window_label("open", new_window, false), Vec::new(), options)
        .on_submit(move |view, uri| {
            if !uri.trim().is_empty() {
                view.open_uri(uri.trim(), new_window, false);
            }
            Ok(())
        });
    view.prompt(session);
    Ok(())
}

fn search(view: &mut BrowserView, args: &[String]) -> Result<()> {
    let args = Args::parse(args, &["new-window"])?;
    let new_window = args.has("new-window");
    if let Some(text) = args.text() {
        search_for(view, &text, new_window);
        return Ok(());
    }

    let session = Prompt::open("Search", Vec::new(), PromptOptions::default()).on_submit(
        move |view, text| {
            if !text.trim().is_empty() {
                search_for(view, &text, new_window);
            }
            Ok(())
        },
    );
    view.prompt(session);
    Ok(())
}

fn back(view: &mut BrowserView, _args: &[String]) -> Result<()> {
    view.engine_mut().back();
    Ok(())
}

fn forward(view: &mut BrowserView, _args: &[String]) -> Result<()> {
    view.engine_mut().forward();
    Ok(())
}

fn reload(view: &mut BrowserView, _args: &[String]) -> Result<()> {
    view.engine_mut().reload(false);
    Ok(())
}

fn reload_bypass_cache(view: &mut BrowserView, _args: &[String]) -> Result<()> {
    view.engine_mut().reload(true);
    Ok(())
}

fn stop(view: &mut BrowserView, _args: &[String]) -> Result<()> {
    view.engine_mut().stop();
    Ok(())
}

fn zoom(view: &mut BrowserView, args: &[String]) -> Result<()> {
    let raw = args.first().ok_or_else(|| usage("zoom <percent>"))?;
    let level: u32 = raw.trim().trim_end_matches('%').parse().map_err(|_| {
        RoamError::new(ErrorType::Parse, "BAD_ZOOM", format!("'{raw}' is not a zoom level"))
    })?;
    if !(MIN_ZOOM..=MAX_ZOOM).contains(&level) {
        return Err(RoamError::execution(
            "BAD_ZOOM",
            format!("Zoom must be between {MIN_ZOOM} and {MAX_ZOOM}"),
        ));
    }
    view.engine_mut().set_zoom(level);
    Ok(())
}

fn zoom_in(view: &mut BrowserView, _args: &[String]) -> Result<()> {
    let level = (view.engine().zoom() + ZOOM_STEP).min(MAX_ZOOM);
    view.engine_mut().set_zoom(level);
    Ok(())
}

fn zoom_out(view: &mut BrowserView, _args: &[String]) -> Result<()> {
    if let Some(level) = view
        .engine()
        .zoom()
        .checked_sub(ZOOM_STEP)
        .filter(|level| *level >= MIN_ZOOM)
    {
        view.engine_mut().set_zoom(level);
    }
    Ok(())
}

fn zoom_reset(view: &mut BrowserView, _args: &[String]) -> Result<()> {
    let level = view.ctx().settings().default_zoom;
    view.engine_mut().set_zoom(level);
    Ok(())
}

fn javascript(view: &mut BrowserView, args: &[String]) -> Result<()> {
    view.engine_mut().run_javascript(&args.join(" "))
}

fn scroll_by(view: &mut BrowserView, args: &[String]) -> Result<()> {
    let step = |i: usize| -> Result<i64> {
        args.get(i).map_or(Ok(0), |raw| {
            raw.parse().map_err(|_| usage("move <x> <y>"))
        })
    };
    let (x, y) = (step(0)?, step(1)?);
    view.engine_mut().run_javascript(&format!(
        "window.scrollBy({}, {});",
        x * SCROLL_STEP,
        y * SCROLL_STEP
    ))
}

/// Parent of a URL path; `/a/b/` and `/a/b` both give `/a`
fn parent_path(path: &str) -> &str {
    match path.trim_end_matches('/').rsplit_once('/') {
        Some(("", _)) | None => "/",
        Some((parent, _)) => parent,
    }
}

fn navigate_up(view: &mut BrowserView, _args: &[String]) -> Result<()> {
    let mut url = current_url(view)?;
    let path = url.path().to_string();
    if path.is_empty() || path == "/" {
        return Ok(());
    }
    url.set_path(parent_path(&path));
    view.open_uri(url.as_str(), false, false);
    Ok(())
}

fn navigate_top(view: &mut BrowserView, _args: &[String]) -> Result<()> {
    let mut url = current_url(view)?;
    url.set_path("");
    view.open_uri(url.as_str(), false, false);
    Ok(())
}

fn remove_overlay_quietly(view: &mut BrowserView) {
    view.request(&PageCommand::RemoveOverlay, None);
}

/// Highlight `selector`, let the user pick a number, hand it to `pick`.
/// Cancelling or finding nothing removes the overlay.
fn pick_highlighted<F>(view: &mut BrowserView, selector: &str, label: String, pick: F)
where
    F: FnOnce(&mut BrowserView, usize, Option<u64>) + 'static,
{
    let highlight = PageCommand::Highlight {
        selector: selector.to_string(),
    };
    view.request_then(&highlight, move |view, payload| {
        let matches = HighlightMatches::from_payload(&payload);
        if matches.is_empty() {
            remove_overlay_quietly(view);
            view.notify("Nothing to pick on this page");
            return Ok(());
        }

        let snapshot = matches.snapshot;
        let options = PromptOptions {
            force_match: true,
            match_from_beginning: false,
            ..PromptOptions::default()
        };
        let session = Prompt::open(label, matches.labels(), options)
            .on_submit(move |view, choice| {
                match label_index(&choice) {
                    Some(index) => pick(view, index, snapshot),
                    None => remove_overlay_quietly(view),
                }
                Ok(())
            })
            .on_cancel(|view| {
                remove_overlay_quietly(view);
                Ok(())
            });
        view.prompt(session);
        Ok(())
    });
}

fn follow(view: &mut BrowserView, args: &[String]) -> Result<()> {
    let args = Args::parse(args, &["new-window"])?;
    let new_window = args.has("new-window");
    let selector = if new_window { "a" } else { FOLLOW_SELECTOR };

    pick_highlighted(
        view,
        selector,
        window_label("Follow", new_window, false),
        move |view, click_id, snapshot| {
            view.request(
                &PageCommand::Click {
                    click_id,
                    new_window,
                    snapshot,
                },
                None,
            );
        },
    );
    Ok(())
}

fn yank(view: &mut BrowserView, _args: &[String]) -> Result<()> {
    let uri = view
        .engine()
        .uri()
        .ok_or_else(|| RoamError::execution("NO_URI", "The page has no URL"))?;
    view.ctx().set_clipboard(&uri)
}

fn yank_link(view: &mut BrowserView, _args: &[String]) -> Result<()> {
    pick_highlighted(view, "a", "Yank".to_string(), |view, yank_id, snapshot| {
        view.request(&PageCommand::YankLinks { yank_id, snapshot }, None);
    });
    Ok(())
}

fn view_source(view: &mut BrowserView, _args: &[String]) -> Result<()> {
    view.request_then(&PageCommand::GetSource, |view, payload| {
        let text = payload.get(HTML_KEY).cloned().unwrap_or_default();
        let title = view.engine().uri().unwrap_or_default();
        view.ctx()
            .open_window(WindowContent::PlainText { title, text }, false);
        Ok(())
    });
    Ok(())
}

fn remove_overlay(view: &mut BrowserView, _args: &[String]) -> Result<()> {
    remove_overlay_quietly(view);
    Ok(())
}

fn set_log_level(view: &mut BrowserView, args: &[String]) -> Result<()> {
    let level = args.first().ok_or_else(|| usage("set-log-level <level>"))?;
    parse_level(level)?;
    view.request(
        &PageCommand::SetLogLevel {
            log_level: level.clone(),
        },
        None,
    );
    Ok(())
}

fn search_page(view: &mut BrowserView, args: &[String]) -> Result<()> {
    let args = Args::parse(args, &["backwards", "case-sensitive", "ignore-case"])?;
    let forwards = !args.has("backwards");
    let case_sensitive = if args.has("case-sensitive") {
        Some(true)
    } else if args.has("ignore-case") {
        Some(false)
    } else {
        None
    };

    if let Some(text) = args.text() {
        find_in_page(view, &text, forwards, case_sensitive);
        return Ok(());
    }

    let session = Prompt::open("Search page", Vec::new(), PromptOptions::default())
        .on_submit(move |view, text| {
            find_in_page(view, &text, forwards, case_sensitive);
            Ok(())
        });
    view.prompt(session);
    Ok(())
}

/// Without an explicit case flag an all-lowercase query ignores case
fn find_in_page(view: &mut BrowserView, text: &str, forwards: bool, case_sensitive: Option<bool>) {
    if text.is_empty() {
        view.engine_mut().find_finish();
        return;
    }

    let case_sensitive = case_sensitive.unwrap_or_else(|| text.to_lowercase() != text);
    view.set_search_forwards(forwards);
    view.engine_mut().find(
        text,
        FindOptions {
            case_sensitive,
            backwards: !forwards,
            ..FindOptions::default()
        },
    );
}

fn next_search_result(view: &mut BrowserView, args: &[String]) -> Result<()> {
    let args = Args::parse(args, &["backwards"])?;
    let forwards = !args.has("backwards");
    if forwards == view.search_forwards() {
        view.engine_mut().find_next();
    } else {
        view.engine_mut().find_previous();
    }
    Ok(())
}

fn private_prompt(label: &str) -> Prompt {
    let options = PromptOptions {
        private: true,
        ..PromptOptions::default()
    };
    Prompt::open(label, Vec::new(), options)
}

/// Run `then` with the store unlocked, asking for the master password
/// (or a new one) first when needed
fn with_unlocked(view: &mut BrowserView, then: Unlocked) -> Result<()> {
    let ctx = Rc::clone(view.ctx());
    let store = passwords(&ctx)?;
    if store.is_unlocked() {
        return then(view);
    }

    if store.is_initialised() {
        ask_master_password(view, 1, then);
    } else {
        choose_master_password(view, then);
    }
    Ok(())
}

fn choose_master_password(view: &mut BrowserView, then: Unlocked) {
    let session = private_prompt("Enter password (pick a good one)").on_submit(move |view, password| {
        let confirm = private_prompt("Confirm password").on_submit(move |view, confirmation| {
            if password != confirmation {
                view.notify("Password doesn't match confirmation");
                return Ok(());
            }
            let ctx = Rc::clone(view.ctx());
            passwords(&ctx)?.initialise(&password)?;
            info!("password store initialised");
            then(view)
        });
        view.prompt(confirm);
        Ok(())
    });
    view.prompt(session);
}

fn ask_master_password(view: &mut BrowserView, attempt: u32, then: Unlocked) {
    let session = private_prompt("Master password").on_submit(move |view, password| {
        let ctx = Rc::clone(view.ctx());
        match passwords(&ctx)?.unlock(&password) {
            Ok(()) => then(view),
            Err(err) if err.code == "PASSWORD_INCORRECT" => {
                view.notify("Incorrect password");
                if attempt < MAX_UNLOCK_ATTEMPTS {
                    ask_master_password(view, attempt + 1, then);
                }
                Ok(())
            }
            Err(err) => Err(err),
        }
    });
    view.prompt(session);
}

fn form_fill(view: &mut BrowserView, _args: &[String]) -> Result<()> {
    let domain = current_domain(view)?;
    with_unlocked(view, Box::new(move |view| choose_form_fill(view, domain)))
}

fn choose_form_fill(view: &mut BrowserView, domain: String) -> Result<()> {
    let ctx = Rc::clone(view.ctx());
    let forms = passwords(&ctx)?.forms_for_domain(&domain)?;
    if forms.is_empty() {
        view.notify(&format!("No form fills for {domain}"));
        return Ok(());
    }

    let suggestions = forms
        .iter()
        .enumerate()
        .map(|(i, form)| format!("{i}: {} (last used {})", form.description, form.last_used))
        .collect();
    let options = PromptOptions {
        force_match: true,
        ..PromptOptions::default()
    };
    let session = Prompt::open(format!("Select form fill for {domain}"), suggestions, options)
        .on_submit(move |view, choice| {
            let Some(form) = label_index(&choice).and_then(|i| forms.get(i)) else {
                return Ok(());
            };
            let ctx = Rc::clone(view.ctx());
            passwords(&ctx)?.touch(form.id)?;
            debug!(form = form.id, "filling form");
            view.request(
                &PageCommand::FormFill {
                    fields: form.form_data.clone(),
                },
                None,
            );
            Ok(())
        });
    view.prompt(session);
    Ok(())
}

fn form_save(view: &mut BrowserView, _args: &[String]) -> Result<()> {
    pick_highlighted(
        view,
        "form",
        "Select form to save".to_string(),
        |view, form_id, snapshot| {
            view.request_then(&PageCommand::SerialiseForm { form_id, snapshot }, |view, form| {
                remove_overlay_quietly(view);
                if form.is_empty() {
                    view.notify("Form has nothing to save");
                    return Ok(());
                }
                let domain = current_domain(view)?;
                with_unlocked(
                    view,
                    Box::new(move |view| {
                        let ctx = Rc::clone(view.ctx());
                        let id = passwords(&ctx)?.save_form(&domain, form, None)?;
                        info!(form = id, %domain, "form saved");
                        view.notify(&format!("Saved form for {domain}"));
                        Ok(())
                    }),
                )
            });
        },
    );
    Ok(())
}

fn save_session(view: &mut BrowserView, _args: &[String]) -> Result<()> {
    let ctx = Rc::clone(view.ctx());
    let sessions = ctx.extensions().sessions().ok_or_else(|| {
        RoamError::new(ErrorType::Requirement, "REQUIREMENT_UNMET", "Sessions are not enabled")
    })?;
    let saved = sessions.save_session(&ctx.open_pages());
    view.notify(&format!("Saved session with {saved} pages"));
    Ok(())
}

fn bypass(view: &mut BrowserView, args: &[String]) -> Result<()> {
    let host = args.first().ok_or_else(|| usage("bypass <host>"))?;
    let ctx = Rc::clone(view.ctx());
    let store = ctx.extensions().certificate_bypass().ok_or_else(|| {
        RoamError::new(
            ErrorType::Requirement,
            "REQUIREMENT_UNMET",
            "Certificate bypass is not enabled",
        )
    })?;
    store.bypass(host)?;
    view.notify(&format!("Certificate exclusion added for {host}"));
    Ok(())
}

fn apply_user_agent(view: &mut BrowserView, agent: &str) -> Result<()> {
    let agent = agent.trim();
    if agent.is_empty() {
        return Ok(());
    }
    view.engine_mut().set_user_agent(agent);
    view.ctx().set_option("default_user_agent", agent)
}

fn change_user_agent(view: &mut BrowserView, args: &[String]) -> Result<()> {
    if !args.is_empty() {
        return apply_user_agent(view, &args.join(" "));
    }

    let suggestions: Vec<String> = {
        let ctx = view.ctx();
        let default = ctx.settings().default_user_agent.clone();
        default
            .into_iter()
            .chain(ctx.hooks().user_agent_choices())
            .collect()
    };
    let session = Prompt::open("User Agent", suggestions, PromptOptions::default())
        .on_submit(|view, agent| apply_user_agent(view, &agent));
    view.prompt(session);
    Ok(())
}

fn set(view: &mut BrowserView, args: &[String]) -> Result<()> {
    let (name, value) = match args {
        [] => return Err(usage("set <option> [value]")),
        [name] => (name, None),
        [name, rest @ ..] => (name, Some(rest.join(" "))),
    };
    let option = find_option(name)
        .ok_or_else(|| RoamError::new(ErrorType::Config, "UNKNOWN_OPTION", format!("Unknown option: {name}")))?;

    if let Some(value) = value {
        view.ctx().set_option(option.name, &value)?;
    }
    let current = (option.get)(&view.ctx().settings());
    view.notify(&format!("{} = {current}", option.name));
    Ok(())
}

fn help(view: &mut BrowserView, _args: &[String]) -> Result<()> {
    let text = {
        let ctx = view.ctx();
        let commands = ctx.commands();
        let command_info: Vec<String> = commands
            .completion_names(ctx.extensions())
            .iter()
            .map(|name| format!("\t{name} - {}", commands.help(name)))
            .collect();
        let binding_info: Vec<String> = ctx
            .bindings()
            .describe()
            .iter()
            .map(|line| format!("\t{line}"))
            .collect();
        let settings_info: Vec<String> = crate::config::options::describe(&ctx.settings())
            .iter()
            .map(|line| format!("\t{line}"))
            .collect();

        [
            "Commands".to_string(),
            command_info.join("\n"),
            "\nBindings:".to_string(),
            binding_info.join("\n"),
            "\nSettings:".to_string(),
            settings_info.join("\n"),
        ]
        .join("\n")
    };

    view.ctx().open_window(
        WindowContent::PlainText {
            title: "Help".to_string(),
            text,
        },
        false,
    );
    Ok(())
}

fn close(view: &mut BrowserView, _args: &[String]) -> Result<()> {
    let ctx = Rc::clone(view.ctx());
    if ctx.windows().window_count() <= 1 {
        ctx.quit();
        return Ok(());
    }
    let page_id = view.page_id();
    info!(page_id, "closing window");
    ctx.page_closed(page_id);
    ctx.windows().close_window(page_id);
    Ok(())
}

fn quit(view: &mut BrowserView, _args: &[String]) -> Result<()> {
    view.ctx().quit();
    Ok(())
}

fn insert_mode(view: &mut BrowserView, _args: &[String]) -> Result<()> {
    view.set_mode(ModeKind::Insert)
}

fn passthrough_mode(view: &mut BrowserView, _args: &[String]) -> Result<()> {
    view.set_mode(ModeKind::PassThrough)
}

fn normal_mode(view: &mut BrowserView, _args: &[String]) -> Result<()> {
    view.set_mode(ModeKind::Normal)
}

fn prompt_command(view: &mut BrowserView, _args: &[String]) -> Result<()> {
    let suggestions = {
        let ctx = view.ctx();
        ctx.commands().completion_names(ctx.extensions())
    };
    let options = PromptOptions {
        force_match: true,
        match_from_beginning: false,
        ..PromptOptions::default()
    };
    let session = Prompt::open("command", suggestions, options).on_submit(|view, line| {
        if !line.trim().is_empty() {
            view.run_line(&line);
        }
        Ok(())
    });
    view.prompt(session);
    Ok(())
}
