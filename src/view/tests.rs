use std::cell::Cell;

use super::*;
use crate::config::{default_bindings, Config, NoHooks, Settings};
use crate::prompt::PromptOptions;
use crate::test_utils::TestChrome;
use crate::worker::{ChromeRequest, MemoryDom, MemoryElement, OVERLAY_CLASS};
use tokio::sync::mpsc;

fn key(name: &str) -> KeyEvent {
    name.parse().unwrap()
}

fn press(view: &mut BrowserView, keys: &[&str]) {
    for name in keys {
        view.handle_key(&key(name));
    }
}

fn type_text(view: &mut BrowserView, text: &str) {
    for c in text.chars() {
        let name = if c == ' ' { "space".to_string() } else { c.to_string() };
        assert_eq!(view.handle_key(&KeyEvent::new(name)), KeyOutcome::Handled);
    }
}

fn chrome_with_bindings(lines: &[(&str, &str)]) -> TestChrome {
    let mut bindings = BindingTable::new();
    for (key, line) in lines {
        bindings.bind_line(key, line).unwrap();
    }
    TestChrome::with_config(Config::new(Settings::default(), bindings, Box::new(NoHooks)))
}

fn two_links() -> MemoryDom {
    let mut dom = MemoryDom::new();
    let body = dom.append_to_frame(0, MemoryElement::new("body")).unwrap();
    dom.append(body, MemoryElement::link("https://example.org", "Home").at(10, 10))
        .unwrap();
    dom.append(body, MemoryElement::link("https://docs.rs", "Docs").at(10, 40))
        .unwrap();
    dom
}

#[test]
fn test_new_view_starts_in_normal_mode() {
    let chrome = TestChrome::new();
    let (view, engine) = chrome.view(1);

    assert_eq!(view.mode().kind(), ModeKind::Normal);
    assert_eq!(view.indicator().mode(), "NORMAL");
    assert_eq!(view.indicator().buffered_command(), "");
    assert!(!view.entry().is_visible());
    assert!(!engine.state().can_focus);
    assert_eq!(engine.state().zoom, 100);
    assert_eq!(engine.state().user_agent, None);
}

#[test]
fn test_new_view_applies_settings() {
    let settings = Settings {
        default_zoom: 150,
        default_user_agent: Some("roam/1".into()),
        ..Settings::default()
    };
    let chrome = TestChrome::with_config(Config::new(
        settings,
        default_bindings().unwrap(),
        Box::new(NoHooks),
    ));
    let (_view, engine) = chrome.view(1);

    assert_eq!(engine.state().zoom, 150);
    assert_eq!(engine.state().user_agent.as_deref(), Some("roam/1"));
}

#[test]
fn test_insert_mode_round_trip() {
    let chrome = TestChrome::new();
    let (mut view, engine) = chrome.view(1);

    assert_eq!(view.handle_key(&key("i")), KeyOutcome::Handled);
    assert_eq!(view.mode().kind(), ModeKind::Insert);
    assert_eq!(view.indicator().mode(), "INSERT");
    assert!(engine.state().can_focus);

    assert_eq!(view.handle_key(&key("j")), KeyOutcome::PassToPage);
    assert_eq!(view.handle_key(&key("Insert")), KeyOutcome::PassToPage);

    assert_eq!(view.handle_key(&key("Escape")), KeyOutcome::Handled);
    assert_eq!(view.mode().kind(), ModeKind::Normal);
    assert!(!engine.state().can_focus);
}

#[test]
fn test_passthrough_leaves_only_on_insert() {
    let chrome = TestChrome::new();
    let (mut view, engine) = chrome.view(1);

    press(&mut view, &["p"]);
    assert_eq!(view.mode().kind(), ModeKind::PassThrough);
    assert!(engine.state().can_focus);

    assert_eq!(view.handle_key(&key("Escape")), KeyOutcome::PassToPage);
    assert_eq!(view.mode().kind(), ModeKind::PassThrough);

    assert_eq!(view.handle_key(&key("Insert")), KeyOutcome::Handled);
    assert_eq!(view.mode().kind(), ModeKind::Normal);
}

#[test]
fn test_bare_modifier_and_unbound_keys() {
    let chrome = TestChrome::new();
    let (mut view, _engine) = chrome.view(1);

    assert_eq!(view.handle_key(&KeyEvent::new("Shift_L")), KeyOutcome::Ignored);
    assert_eq!(view.handle_key(&key("z")), KeyOutcome::PassToPage);
    assert_eq!(view.mode().kind(), ModeKind::Normal);
}

#[test]
fn test_sub_command_runs_one_key() {
    let chrome = TestChrome::new();
    let (mut view, engine) = chrome.view(1);
    view.open_uri("https://example.com/a/b?q=1", false, false);

    assert_eq!(view.handle_key(&key("g")), KeyOutcome::Handled);
    assert_eq!(view.mode().kind(), ModeKind::SubCommand);
    assert_eq!(view.indicator().mode(), "COMMAND");
    assert_eq!(view.indicator().buffered_command(), "g");

    assert_eq!(view.handle_key(&key("u")), KeyOutcome::Handled);
    assert_eq!(engine.uri().as_deref(), Some("https://example.com/a?q=1"));
    assert_eq!(view.mode().kind(), ModeKind::Normal);
    assert_eq!(view.indicator().buffered_command(), "");
}

#[test]
fn test_sub_command_unbound_key_returns_to_normal() {
    let chrome = TestChrome::new();
    let (mut view, engine) = chrome.view(1);

    press(&mut view, &["g"]);
    assert_eq!(view.handle_key(&key("z")), KeyOutcome::Handled);
    assert_eq!(view.mode().kind(), ModeKind::Normal);
    assert!(engine.state().scripts.is_empty());
}

#[test]
fn test_sub_command_keeps_mode_entered_by_command() {
    let mut sub = BindingTable::new();
    sub.bind_line("i", "insert-mode").unwrap();
    let mut bindings = BindingTable::new();
    bindings.bind("g", Binding::table(sub)).unwrap();
    let chrome = TestChrome::with_config(Config::new(Settings::default(), bindings, Box::new(NoHooks)));
    let (mut view, _engine) = chrome.view(1);

    press(&mut view, &["g", "i"]);
    assert_eq!(view.mode().kind(), ModeKind::Insert);
}

#[test]
fn test_bound_command_failure_is_reported() {
    let chrome = chrome_with_bindings(&[("x", "zoom abc")]);
    let (mut view, engine) = chrome.view(1);

    assert_eq!(view.handle_key(&key("x")), KeyOutcome::Handled);
    assert_eq!(engine.state().zoom, 100);
    assert_eq!(
        chrome.texts(),
        vec!["Error invoking command 'x': 'abc' is not a zoom level"]
    );
}

#[test]
fn test_prompt_command_submits_typed_line() {
    let chrome = TestChrome::new();
    let (mut view, engine) = chrome.view(1);

    press(&mut view, &[":"]);
    assert_eq!(view.mode().kind(), ModeKind::Prompt);
    assert!(view.entry().is_visible());
    assert_eq!(view.entry().label(), "command");
    assert!(view.entry().suggestions().contains(&"stop".to_string()));
    assert!(!view.entry().suggestions().contains(&"zoom-in".to_string()));

    type_text(&mut view, "stop");
    assert_eq!(view.entry().suggestions(), ["stop"]);

    assert_eq!(view.handle_key(&key("Return")), KeyOutcome::Handled);
    assert_eq!(engine.state().stops, 1);
    assert_eq!(view.mode().kind(), ModeKind::Normal);
    assert!(!view.entry().is_visible());
}

#[test]
fn test_prompt_force_match_picks_first_suggestion() {
    let chrome = TestChrome::new();
    let (mut view, engine) = chrome.view(1);

    press(&mut view, &[":"]);
    type_text(&mut view, "rel");
    assert_eq!(view.entry().suggestions(), ["reload", "reload-bypass-cache"]);

    press(&mut view, &["Return"]);
    assert_eq!(engine.state().reloads, vec![false]);
}

#[test]
fn test_prompt_tab_cycles_suggestions() {
    let chrome = TestChrome::new();
    let (mut view, engine) = chrome.view(1);

    press(&mut view, &[":"]);
    type_text(&mut view, "rel");

    press(&mut view, &["Tab"]);
    assert_eq!(view.entry().text(), "reload");
    press(&mut view, &["Tab"]);
    assert_eq!(view.entry().text(), "reload-bypass-cache");
    press(&mut view, &["Tab"]);
    assert_eq!(view.entry().text(), "reload");
    press(&mut view, &["ISO_Left_Tab"]);
    assert_eq!(view.entry().text(), "reload-bypass-cache");

    press(&mut view, &["Return"]);
    assert_eq!(engine.state().reloads, vec![true]);
}

#[test]
fn test_prompt_escape_and_ctrl_c_cancel() {
    let chrome = TestChrome::new();
    let (mut view, engine) = chrome.view(1);

    for cancel in ["Escape", "C-c"] {
        press(&mut view, &[":"]);
        type_text(&mut view, "stop");
        assert_eq!(view.handle_key(&key(cancel)), KeyOutcome::Handled);
        assert_eq!(view.mode().kind(), ModeKind::Normal);
        assert!(!view.entry().is_visible());
    }
    assert_eq!(engine.state().stops, 0);
}

#[test]
fn test_prompt_ignores_non_editing_keys() {
    let chrome = TestChrome::new();
    let (mut view, _engine) = chrome.view(1);

    press(&mut view, &[":"]);
    assert_eq!(view.handle_key(&key("F5")), KeyOutcome::Ignored);
    assert_eq!(view.mode().kind(), ModeKind::Prompt);
}

#[test]
fn test_replacing_prompt_cancels_previous() {
    let chrome = TestChrome::new();
    let (mut view, _engine) = chrome.view(1);
    let cancelled = Rc::new(Cell::new(0));

    let seen = Rc::clone(&cancelled);
    view.prompt(
        PromptSession::open("first", Vec::new(), PromptOptions::default()).on_cancel(move |_| {
            seen.set(seen.get() + 1);
            Ok(())
        }),
    );
    view.prompt(PromptSession::open("second", Vec::new(), PromptOptions::default()));

    assert_eq!(cancelled.get(), 1);
    assert_eq!(view.mode().kind(), ModeKind::Prompt);
    assert_eq!(view.entry().label(), "second");
    assert!(view.entry().is_visible());

    view.set_mode(ModeKind::Normal).unwrap();
    assert!(!view.entry().is_visible());
    assert_eq!(cancelled.get(), 1);
}

#[test]
fn test_prompt_initial_text_filters() {
    let chrome = TestChrome::new();
    let (mut view, _engine) = chrome.view(1);
    let options = PromptOptions {
        initial: "b".into(),
        ..PromptOptions::default()
    };
    view.prompt(PromptSession::open(
        "pick",
        vec!["apple".into(), "banana".into()],
        options,
    ));

    assert_eq!(view.entry().text(), "b");
    assert_eq!(view.entry().suggestions(), ["banana"]);
}

#[test]
fn test_prompt_callback_error_is_reported() {
    let chrome = TestChrome::new();
    let (mut view, _engine) = chrome.view(1);
    view.prompt(
        PromptSession::open("fail", Vec::new(), PromptOptions::default())
            .on_submit(|_, _| Err(RoamError::execution("BOOM", "boom"))),
    );

    press(&mut view, &["Return"]);
    assert_eq!(chrome.texts(), vec!["Error invoking callback: boom"]);
    assert_eq!(view.mode().kind(), ModeKind::Normal);
}

#[test]
fn test_data_modes_cannot_be_set_by_name() {
    let chrome = TestChrome::new();
    let (mut view, _engine) = chrome.view(1);

    for kind in [ModeKind::SubCommand, ModeKind::Prompt] {
        let err = view.set_mode(kind).unwrap_err();
        assert_eq!(err.code, "MODE_NEEDS_DATA");
    }
    assert_eq!(view.mode().kind(), ModeKind::Normal);
}

#[test]
fn test_open_uri_records_page() {
    let chrome = TestChrome::new();
    let (mut view, engine) = chrome.view(3);

    view.open_uri("https://example.com/", false, false);
    assert_eq!(engine.uri().as_deref(), Some("https://example.com/"));
    assert_eq!(chrome.ctx.open_pages()[0].uri, "https://example.com/");
    assert_eq!(
        chrome.ctx.extensions().most_popular_urls(),
        vec!["https://example.com/"]
    );

    view.open_uri("https://docs.rs/", true, false);
    view.open_uri("https://crates.io/", false, true);
    assert_eq!(engine.uri().as_deref(), Some("https://example.com/"));
    assert_eq!(
        chrome.windows.opened(),
        vec![
            (WindowContent::Uri("https://docs.rs/".into()), false),
            (WindowContent::Uri("https://crates.io/".into()), true),
        ]
    );
}

#[tokio::test]
async fn test_request_fault_is_reported() {
    let chrome = TestChrome::new();
    let (mut view, _engine) = chrome.view(9);

    view.request_then(&PageCommand::GetSource, |_, _| Ok(()));
    assert_eq!(view.pending_requests(), 1);
    assert!(view.settle_next().await);
    assert_eq!(view.pending_requests(), 0);
    assert!(!view.settle_next().await);

    let texts = chrome.texts();
    assert_eq!(texts.len(), 1);
    assert!(texts[0].starts_with("'get_source' failed: "));
}

#[tokio::test]
async fn test_follow_new_window_opens_picked_link() {
    let chrome = TestChrome::new();
    let (tx, mut events) = mpsc::unbounded_channel();
    let _server = chrome.serve(1, two_links(), tx).await;
    let (mut view, _engine) = chrome.view(1);

    press(&mut view, &["F"]);
    assert!(view.settle_next().await);
    assert_eq!(view.mode().kind(), ModeKind::Prompt);
    assert_eq!(view.entry().label(), "Follow (new window)");
    assert_eq!(
        view.entry().suggestions(),
        ["1: Home (https://example.org)", "2: Docs (https://docs.rs)"]
    );

    type_text(&mut view, "docs");
    assert_eq!(view.entry().suggestions(), ["2: Docs (https://docs.rs)"]);
    press(&mut view, &["Return"]);
    assert!(view.settle_next().await);

    let event = events.try_recv().unwrap();
    assert_eq!(event.page_id, 1);
    assert_eq!(
        event.request,
        ChromeRequest::OpenWindow {
            uri: "https://docs.rs".into()
        }
    );
}

#[tokio::test]
async fn test_cancelled_follow_removes_overlay() {
    let chrome = TestChrome::new();
    let (tx, _events) = mpsc::unbounded_channel();
    let server = chrome.serve(2, two_links(), tx).await;
    let (mut view, _engine) = chrome.view(2);
    let overlays = |server: &crate::worker::PageWorkerServer| {
        server
            .with_page(|page| {
                page.dom()
                    .query_selector_all(0, &format!(".{OVERLAY_CLASS}"))
                    .unwrap()
                    .len()
            })
            .unwrap()
    };

    press(&mut view, &["f"]);
    assert!(view.settle_next().await);
    assert_eq!(overlays(&server), 1);

    press(&mut view, &["Escape"]);
    assert!(view.settle_next().await);
    assert_eq!(overlays(&server), 0);
    assert_eq!(view.mode().kind(), ModeKind::Normal);
}
