use super::*;
use crate::config::lua;
use crate::key::KeyEvent;
use crate::test_utils::{RecordingNotifier, TestChrome};
use crate::worker::{MemoryDom, MemoryElement};
use std::sync::Mutex;

#[derive(Default)]
struct RecordingLog {
    levels: Mutex<Vec<String>>,
}

impl LogControl for RecordingLog {
    fn set_level(&self, level: &str) -> Result<()> {
        self.levels.lock().unwrap().push(level.to_string());
        Ok(())
    }
}

fn event(page_id: u64, request: ChromeRequest) -> ChromeEvent {
    ChromeEvent { page_id, request }
}

#[test]
fn test_builder_defaults() {
    let ctx = ChromeContext::builder(Config::defaults().unwrap()).start();

    assert_eq!(ctx.settings().profile, "default");
    assert!(ctx.commands().resolve("quit").is_some());
    assert!(!ctx.bindings().is_empty());
    assert!(ctx.extensions().history().is_none());
    assert_eq!(ctx.windows().window_count(), 1);

    ctx.set_clipboard("copied").unwrap();
    assert_eq!(ctx.clipboard().text().unwrap(), "copied");
}

#[test]
fn test_set_option_changes_live_settings_only() {
    let chrome = TestChrome::new();
    chrome.ctx.set_option("home", "https://start.example/").unwrap();

    assert_eq!(chrome.ctx.settings().home_page, "https://start.example/");
    assert_eq!(chrome.ctx.config().settings.home_page, config::DEFAULT_HOME_PAGE);
    assert_eq!(
        chrome.ctx.set_option("zoom", "9000").unwrap_err().code,
        "OPTION_VALIDATION_ERROR"
    );
}

#[test]
fn test_set_log_level_reloads_log_filter() {
    let log = Arc::new(RecordingLog::default());
    let ctx = ChromeContext::builder(Config::defaults().unwrap())
        .log(log.clone())
        .start();

    ctx.set_option("log_level", "DEBUG").unwrap();
    ctx.set_option("home", "https://start.example/").unwrap();
    assert!(ctx.set_option("log_level", "loud").is_err());
    assert_eq!(*log.levels.lock().unwrap(), vec!["debug"]);
    assert_eq!(ctx.settings().log_level, "debug");
}

#[test]
fn test_channel_uses_profile_and_limits() {
    let chrome = TestChrome::new();
    chrome.ctx.set_option("profile", "work").unwrap();

    let channel = chrome.ctx.channel_for(4);
    assert_eq!(channel.endpoint(), &Endpoint::new("work", 4));
}

#[test]
fn test_quit_waits_for_downloads() {
    let chrome = TestChrome::new();
    let downloads = chrome.ctx.extensions().downloads().unwrap();
    let id = downloads.start("image.iso");

    assert!(!chrome.ctx.quit());
    assert!(!chrome.windows.quit_requested());
    assert_eq!(chrome.texts(), vec!["Not quitting, 1 downloads in progress."]);

    downloads.finish(id);
    assert!(chrome.ctx.quit());
    assert!(chrome.windows.quit_requested());
}

#[test]
fn test_pages_are_tracked() {
    let chrome = TestChrome::new();
    chrome.ctx.page_loaded(7, "https://b.example/", "B");
    chrome.ctx.page_loaded(2, "https://a.example/", "A");
    chrome.ctx.page_loaded(7, "https://c.example/", "C");

    let uris: Vec<String> = chrome.ctx.open_pages().into_iter().map(|p| p.uri).collect();
    assert_eq!(uris, vec!["https://a.example/", "https://c.example/"]);

    chrome.ctx.page_closed(2);
    assert_eq!(chrome.ctx.open_pages()[0].title, "C");
}

#[test]
fn test_keys_reach_the_right_view() {
    let chrome = TestChrome::new();
    let mut browser = Browser::new(Rc::clone(&chrome.ctx));
    let (first, _) = chrome.view(1);
    let (second, _) = chrome.view(2);
    browser.add_view(first);
    browser.add_view(second);
    assert_eq!(browser.page_ids(), vec![1, 2]);

    assert_eq!(browser.handle_key(2, &KeyEvent::new("i")), KeyOutcome::Handled);
    assert_eq!(browser.view(2).unwrap().mode().kind(), ModeKind::Insert);
    assert_eq!(browser.view(1).unwrap().mode().kind(), ModeKind::Normal);
    assert_eq!(browser.handle_key(3, &KeyEvent::new("i")), KeyOutcome::Ignored);

    assert!(browser.close_view(2).is_some());
    assert_eq!(browser.page_ids(), vec![1]);
}

#[test]
fn test_pump_routes_worker_requests() {
    let chrome = TestChrome::new();
    let mut browser = Browser::new(Rc::clone(&chrome.ctx));
    let (view, _engine) = chrome.view(1);
    browser.add_view(view);

    let tx = browser.chrome_sender();
    tx.send(event(1, ChromeRequest::InsertMode)).unwrap();
    tx.send(event(
        1,
        ChromeRequest::OpenWindow {
            uri: "https://docs.rs".into(),
        },
    ))
    .unwrap();
    tx.send(event(
        1,
        ChromeRequest::SetClipboard {
            text: "https://crates.io".into(),
        },
    ))
    .unwrap();
    tx.send(event(9, ChromeRequest::InsertMode)).unwrap();

    assert_eq!(browser.pump(), 3);
    assert_eq!(browser.pump(), 0);
    assert_eq!(browser.view(1).unwrap().mode().kind(), ModeKind::Insert);
    assert_eq!(
        chrome.windows.opened(),
        vec![(WindowContent::Uri("https://docs.rs".into()), false)]
    );
    assert_eq!(chrome.ctx.clipboard().text().unwrap(), "https://crates.io");
}

#[test]
fn test_popup_hook() {
    let chrome = TestChrome::new();
    let browser = Browser::new(Rc::clone(&chrome.ctx));
    assert!(browser.popup_requested("https://popup.example/"));
    assert_eq!(chrome.windows.opened().len(), 1);

    let config = lua::load_str(
        r#"function should_open_popup(uri) return not uri:find("ads") end"#,
        "popups",
    )
    .unwrap();
    let chrome = TestChrome::with_config(config);
    let browser = Browser::new(Rc::clone(&chrome.ctx));
    assert!(!browser.popup_requested("https://ads.example/"));
    assert!(browser.popup_requested("https://docs.rs/"));
    assert_eq!(chrome.windows.opened().len(), 1);
}

#[test]
fn test_notification_hook() {
    let config = lua::load_str(
        r#"function should_allow_notification(origin) return origin == "https://chat.example" end"#,
        "notifications",
    )
    .unwrap();
    let notifier = Rc::new(RecordingNotifier::default());
    let ctx = ChromeContext::builder(config).notifier(notifier.clone()).start();
    let browser = Browser::new(ctx);

    assert!(browser.notification_requested("https://chat.example", "New message", "hi"));
    assert!(!browser.notification_requested("https://spam.example", "Win", "now"));

    let sent = notifier.messages();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].header, "New message");
    assert_eq!(sent[0].message, "hi");
}

#[test]
fn test_extension_setup_runs_at_start() {
    let chrome = TestChrome::new();
    assert!(chrome.ctx.extensions().is_enabled(crate::extensions::Capability::History));
    assert!(chrome.texts().is_empty());
}

#[tokio::test]
async fn test_yank_link_reaches_clipboard() {
    let chrome = TestChrome::new();
    let mut browser = Browser::new(Rc::clone(&chrome.ctx));

    let mut dom = MemoryDom::new();
    let body = dom.append_to_frame(0, MemoryElement::new("body")).unwrap();
    dom.append(body, MemoryElement::link("https://example.org", "Home").at(0, 0))
        .unwrap();
    dom.append(body, MemoryElement::link("https://docs.rs", "Docs").at(0, 30))
        .unwrap();
    let _server = chrome.serve(1, dom, browser.chrome_sender()).await;
    let (view, _engine) = chrome.view(1);
    browser.add_view(view);

    browser.handle_key(1, &KeyEvent::new("Y"));
    assert_eq!(browser.pending_requests(), 1);
    assert!(browser.view_mut(1).unwrap().settle_next().await);
    assert_eq!(browser.view(1).unwrap().entry().label(), "Yank");

    for key in ["2", "Return"] {
        browser.handle_key(1, &KeyEvent::new(key));
    }
    assert!(browser.view_mut(1).unwrap().settle_next().await);
    assert_eq!(browser.settle(), 0);
    assert_eq!(browser.pending_requests(), 0);

    assert_eq!(browser.pump(), 1);
    assert_eq!(chrome.ctx.clipboard().text().unwrap(), "https://docs.rs");
    assert_eq!(chrome.texts(), vec!["Set clipboard to 'https://docs.rs'"]);
}
