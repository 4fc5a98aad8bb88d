//! Roam - terminal front end
//! Runs the chrome against a headless page served over the local socket

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{debug, info};

use monster_roam::chrome::{Browser, ChromeContext};
use monster_roam::clipboard::SystemClipboard;
use monster_roam::config::Config;
use monster_roam::engine::{HeadlessEngine, HeadlessWindows, WindowContent};
use monster_roam::error::ErrorManager;
use monster_roam::extensions::ExtensionRegistry;
use monster_roam::logging;
use monster_roam::notification::{NotificationManager, Notifier};
use monster_roam::transport::{default_runtime_dir, UnixTransport};
use monster_roam::ui::terminal::{draw, CrosstermBackend, Frame, PromptLine, TerminalBackend};
use monster_roam::ui::{LineEntry, StatusLine};
use monster_roam::view::{BrowserView, KeyOutcome};
use monster_roam::worker::{MemoryDom, MemoryElement, WorkerHost};

const PAGE_ID: u64 = 1;
/// Time given to background tasks per tick
const TICK: Duration = Duration::from_millis(5);
const KEY_POLL: Duration = Duration::from_millis(30);

fn main() {
    if let Err(e) = run() {
        eprintln!("roam: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = Config::load(config_path.as_deref()).context("loading config")?;
    let runtime_dir = default_runtime_dir();
    let log = logging::init(&config.settings.log_level, Some(&runtime_dir.join("roam.log")))
        .context("starting logging")?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("starting runtime")?;
    let _guard = runtime.enter();

    let notifications = Rc::new(RefCell::new(NotificationManager::new()));
    let notifier: Rc<dyn Notifier> = notifications.clone();
    let errors = ErrorManager::new(Rc::clone(&notifier));
    let windows = Rc::new(HeadlessWindows::new(1));
    let transport = Arc::new(UnixTransport::new(runtime_dir));

    let ctx = ChromeContext::builder(config)
        .notifier(notifier)
        .clipboard(Box::new(SystemClipboard))
        .windows(windows.clone())
        .extensions(ExtensionRegistry::in_memory())
        .transport(transport.clone())
        .log(Arc::new(log.clone()))
        .start();
    let mut browser = Browser::new(Rc::clone(&ctx));

    let (profile, max_message_bytes) = {
        let settings = ctx.settings();
        (settings.profile.clone(), settings.max_message_bytes)
    };
    let host = WorkerHost::new(transport, profile, browser.chrome_sender(), Arc::new(log))
        .with_max_message_bytes(max_message_bytes);
    // Keeps the page server alive for the whole session
    let _server = match runtime.block_on(host.on_page_created(PAGE_ID, Box::new(demo_page()?))) {
        Ok(server) => Some(server),
        Err(err) => {
            errors.report("page server", &err);
            None
        }
    };

    let mut view = BrowserView::new(
        Rc::clone(&ctx),
        Box::new(HeadlessEngine::new(PAGE_ID)),
        Box::new(LineEntry::new()),
        Box::new(StatusLine::default()),
    );
    let home = ctx.settings().home_page.clone();
    view.open_uri(&home, false, false);
    browser.add_view(view);

    let mut backend = CrosstermBackend::new();
    backend.init().context("opening terminal")?;
    let outcome = event_loop(&runtime, &mut backend, &mut browser, &notifications, &windows);
    backend.deinit();
    info!("roam exiting");
    outcome
}

fn event_loop(
    runtime: &tokio::runtime::Runtime,
    backend: &mut dyn TerminalBackend,
    browser: &mut Browser,
    notifications: &RefCell<NotificationManager>,
    windows: &HeadlessWindows,
) -> anyhow::Result<()> {
    while !windows.quit_requested() {
        runtime.block_on(tokio::time::sleep(TICK));
        browser.settle();
        browser.pump();

        render(backend, browser, notifications, windows)?;

        let Some(key) = backend.poll_key(KEY_POLL).context("reading keys")? else {
            continue;
        };
        if browser.handle_key(PAGE_ID, &key) == KeyOutcome::PassToPage {
            debug!(%key, "key left to the page");
        }
    }
    Ok(())
}

fn render(
    backend: &mut dyn TerminalBackend,
    browser: &Browser,
    notifications: &RefCell<NotificationManager>,
    windows: &HeadlessWindows,
) -> anyhow::Result<()> {
    let Some(view) = browser.view(PAGE_ID) else {
        return Ok(());
    };

    notifications.borrow_mut().prune_expired();
    let message = notifications.borrow().last().map(|n| n.message.clone());

    let title = match view.engine().uri() {
        Some(uri) => format!("{} - {uri}", view.engine().title()),
        None => view.engine().title(),
    };
    let body = page_body(windows);

    let entry = view.entry();
    let prompt = entry.is_visible().then(|| PromptLine {
        label: entry.label(),
        text: entry.display_text(),
        cursor: entry.cursor(),
        suggestions: entry.suggestions(),
    });

    let frame = Frame {
        title: &title,
        body: &body,
        mode: view.indicator().mode(),
        buffered: view.indicator().buffered_command(),
        message: message.as_deref(),
        prompt,
    };
    draw(backend, &frame).context("drawing")?;
    Ok(())
}

/// Text of the newest window that has any; pages opened by URI only list
/// their address
fn page_body(windows: &HeadlessWindows) -> Vec<String> {
    let opened = windows.opened();
    let text = opened.iter().rev().find_map(|(content, _)| match content {
        WindowContent::PlainText { text, .. } => Some(text.clone()),
        WindowContent::Html { html, .. } => Some(html.clone()),
        WindowContent::Uri(_) => None,
    });
    match text {
        Some(text) => text.lines().map(str::to_string).collect(),
        None => opened
            .iter()
            .filter_map(|(content, background)| match content {
                WindowContent::Uri(uri) if *background => Some(format!("[background] {uri}")),
                WindowContent::Uri(uri) => Some(format!("[window] {uri}")),
                _ => None,
            })
            .collect(),
    }
}

/// The page served to the chrome: a few links and a login form
fn demo_page() -> anyhow::Result<MemoryDom> {
    let mut dom = MemoryDom::new();
    let body = dom.append_to_frame(0, MemoryElement::new("body"))?;
    dom.append(body, MemoryElement::link("https://www.rust-lang.org/", "Rust").at(0, 0))?;
    dom.append(body, MemoryElement::link("https://docs.rs/", "Docs").at(0, 20))?;
    dom.append(body, MemoryElement::link("https://crates.io/", "Crates").at(0, 40))?;

    let form = dom.append(body, MemoryElement::new("form").at(0, 60))?;
    dom.append(form, MemoryElement::input("text", "user").at(0, 60))?;
    dom.append(form, MemoryElement::input("password", "pass").at(0, 80))?;
    Ok(dom)
}
