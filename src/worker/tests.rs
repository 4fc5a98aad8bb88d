use super::*;
use crate::channel::{PageChannel, RequestIds};
use crate::protocol::{HighlightMatches, HTML_KEY};
use crate::transport::MemoryTransport;

#[derive(Default)]
struct RecordingLog {
    levels: Mutex<Vec<String>>,
}

impl LogControl for RecordingLog {
    fn set_level(&self, level: &str) -> Result<()> {
        if level == "bogus" {
            return Err(RoamError::new(ErrorType::Config, "BAD_LOG_LEVEL", "bogus"));
        }
        self.levels.lock().unwrap().push(level.to_string());
        Ok(())
    }
}

struct Page {
    server: PageWorkerServer,
    events: ChromeReceiver,
    log: Arc<RecordingLog>,
    agree: NodeRef,
}

impl Page {
    fn run(&self, command: PageCommand) -> PayloadMap {
        self.server
            .dispatch(&Request::new(1, command.name(), command.params()))
    }

    fn highlight(&self, selector: &str) -> HighlightMatches {
        HighlightMatches::from_payload(&self.run(PageCommand::Highlight {
            selector: selector.into(),
        }))
    }

    fn element(&self, node: NodeRef) -> ElementInfo {
        self.server
            .with_page(|page| page.dom().element(node))
            .unwrap()
            .unwrap()
    }

    fn overlays(&self) -> usize {
        self.server
            .with_page(|page| {
                page.dom()
                    .query_selector_all(0, &format!(".{OVERLAY_CLASS}"))
                    .unwrap()
                    .len()
            })
            .unwrap()
    }

    fn events(&mut self) -> Vec<ChromeRequest> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            assert_eq!(event.page_id, 5);
            events.push(event.request);
        }
        events
    }
}

fn page() -> Page {
    let mut dom = MemoryDom::new();
    let body = dom.append_to_frame(0, MemoryElement::new("body")).unwrap();
    dom.append(body, MemoryElement::link("https://example.org", "Home").at(10, 10))
        .unwrap();
    dom.append(body, MemoryElement::link("https://hidden.example", "Hidden").hidden())
        .unwrap();
    dom.append(body, MemoryElement::link("https://docs.rs", "Docs\n\n   guide").at(10, 40))
        .unwrap();
    let agree = dom.append(body, MemoryElement::input("checkbox", "agree")).unwrap();
    let frame = dom.add_frame();
    dom.append_to_frame(frame, MemoryElement::input("text", "q"))
        .unwrap();

    let (tx, events) = mpsc::unbounded_channel();
    let log = Arc::new(RecordingLog::default());
    let server = PageWorkerServer::new(5, Box::new(dom), ChromeLink::new(5, tx), log.clone());
    Page {
        server,
        events,
        log,
        agree,
    }
}

#[test]
fn test_highlight_numbers_across_frames() {
    let page = page();
    let matches = page.highlight("a, input[type=\"text\"]");

    assert_eq!(matches.snapshot, Some(1));
    assert_eq!(
        matches.labels(),
        vec![
            "1: Home (https://example.org)".to_string(),
            "2: Docs guide (https://docs.rs)".to_string(),
            "3: q".to_string(),
        ]
    );
    assert_eq!(page.overlays(), 1);
}

#[test]
fn test_highlight_replaces_previous_overlay() {
    let page = page();
    page.highlight("a");
    let second = page.highlight("input");

    assert_eq!(second.snapshot, Some(2));
    assert_eq!(page.overlays(), 1);

    page.run(PageCommand::RemoveOverlay);
    page.run(PageCommand::RemoveOverlay);
    assert_eq!(page.overlays(), 0);
}

#[test]
fn test_click_link_focuses_without_insert_mode() {
    let mut page = page();
    page.highlight("a");
    page.run(PageCommand::Click {
        click_id: 1,
        new_window: false,
        snapshot: Some(1),
    });

    assert_eq!(page.overlays(), 0);
    assert!(page.events().is_empty());
    assert_eq!(page.server.with_page(|p| p.snapshot_generation()).unwrap(), None);
}

#[test]
fn test_click_input_requests_insert_mode() {
    let mut page = page();
    page.highlight("input");
    page.run(PageCommand::Click {
        click_id: 1,
        new_window: false,
        snapshot: None,
    });

    assert!(page.element(page.agree).checked);
    assert_eq!(page.events(), vec![ChromeRequest::InsertMode]);
}

#[test]
fn test_click_new_window_opens_link() {
    let mut page = page();
    page.highlight("a");
    page.run(PageCommand::Click {
        click_id: 2,
        new_window: true,
        snapshot: Some(1),
    });

    assert_eq!(
        page.events(),
        vec![ChromeRequest::OpenWindow {
            uri: "https://docs.rs".into()
        }]
    );
}

#[test]
fn test_stale_click_is_a_miss() {
    let mut page = page();
    page.highlight("input");
    page.highlight("input");

    let result = page.run(PageCommand::Click {
        click_id: 1,
        new_window: false,
        snapshot: Some(1),
    });

    assert!(result.is_empty());
    assert!(!page.element(page.agree).checked);
    assert!(page.events().is_empty());
    assert_eq!(page.overlays(), 0);
    // the current snapshot survives a stale reference
    assert_eq!(page.server.with_page(|p| p.snapshot_generation()).unwrap(), Some(2));
}

#[test]
fn test_out_of_range_click_is_a_miss() {
    let mut page = page();
    page.highlight("a");
    let result = page.run(PageCommand::Click {
        click_id: 9,
        new_window: true,
        snapshot: Some(1),
    });

    assert!(result.is_empty());
    assert!(page.events().is_empty());
    assert_eq!(page.overlays(), 0);
}

#[test]
fn test_click_without_highlight_is_a_miss() {
    let mut page = page();
    page.run(PageCommand::Click {
        click_id: 1,
        new_window: false,
        snapshot: None,
    });
    assert!(page.events().is_empty());
}

#[test]
fn test_yank_links_sets_clipboard() {
    let mut page = page();
    page.highlight("a");
    page.run(PageCommand::YankLinks {
        yank_id: 1,
        snapshot: Some(1),
    });

    assert_eq!(
        page.events(),
        vec![ChromeRequest::SetClipboard {
            text: "https://example.org".into()
        }]
    );
    assert_eq!(page.overlays(), 0);
}

#[test]
fn test_yank_on_element_without_href_does_nothing() {
    let mut page = page();
    page.highlight("input");
    page.run(PageCommand::YankLinks {
        yank_id: 1,
        snapshot: None,
    });
    assert!(page.events().is_empty());
}

#[test]
fn test_get_source_serialises_main_document() {
    let page = page();
    let result = page.run(PageCommand::GetSource);
    let html = &result[HTML_KEY];

    assert!(html.starts_with("<html>"));
    assert!(html.contains("<a href=\"https://example.org\">Home</a>"));
    assert!(!html.contains("name=\"q\""));
}

#[test]
fn test_form_fill_respects_existing_values_and_checkboxes() {
    let mut dom = MemoryDom::new();
    let form = dom.append_to_frame(0, MemoryElement::new("form")).unwrap();
    let user = dom.append(form, MemoryElement::input("text", "user")).unwrap();
    let filled = dom
        .append(form, MemoryElement::input("text", "city").attr("value", "Oslo"))
        .unwrap();
    let agree = dom.append(form, MemoryElement::input("checkbox", "agree")).unwrap();

    let (tx, _events) = mpsc::unbounded_channel();
    let server = PageWorkerServer::new(
        5,
        Box::new(dom),
        ChromeLink::new(5, tx),
        Arc::new(RecordingLog::default()),
    );

    let fields = PayloadMap::from([
        ("input[name=\"user\"]".to_string(), "alice".to_string()),
        ("input[name=\"city\"]".to_string(), "Paris".to_string()),
        ("input[type=checkbox]".to_string(), "on".to_string()),
        ("input[name=".to_string(), "broken".to_string()),
    ]);
    let command = PageCommand::FormFill { fields };
    server.dispatch(&Request::new(1, command.name(), command.params()));

    let (user, filled, agree) = server
        .with_page(|page| {
            (
                page.dom().element(user).unwrap(),
                page.dom().element(filled).unwrap(),
                page.dom().element(agree).unwrap(),
            )
        })
        .unwrap();
    assert_eq!(user.value.as_deref(), Some("alice"));
    assert_eq!(filled.value.as_deref(), Some("Oslo"));
    assert!(agree.checked);
}

#[test]
fn test_serialise_form_keys_controls_by_selector() {
    let mut dom = MemoryDom::new();
    let form = dom
        .append_to_frame(0, MemoryElement::new("form").attr("name", "login"))
        .unwrap();
    dom.append(form, MemoryElement::input("text", "user").attr("value", "alice"))
        .unwrap();
    dom.append(form, MemoryElement::input("password", "pw").attr("value", "s3cret"))
        .unwrap();
    dom.append(form, MemoryElement::input("submit", "go").attr("value", "Log in"))
        .unwrap();
    dom.append(form, MemoryElement::input("hidden", "csrf").attr("value", "x"))
        .unwrap();
    dom.append(
        form,
        MemoryElement::new("select").attr("name", "country").attr("value", "nz"),
    )
    .unwrap();
    dom.append(form, MemoryElement::new("textarea").attr("name", "bio").text("hi"))
        .unwrap();

    let (tx, _events) = mpsc::unbounded_channel();
    let server = PageWorkerServer::new(
        5,
        Box::new(dom),
        ChromeLink::new(5, tx),
        Arc::new(RecordingLog::default()),
    );

    let highlight = PageCommand::Highlight {
        selector: "form".into(),
    };
    let matches = HighlightMatches::from_payload(
        &server.dispatch(&Request::new(1, highlight.name(), highlight.params())),
    );
    assert_eq!(matches.labels(), vec!["1: login".to_string()]);

    let serialise = PageCommand::SerialiseForm {
        form_id: 1,
        snapshot: matches.snapshot,
    };
    let fields = server.dispatch(&Request::new(2, serialise.name(), serialise.params()));

    let expected = PayloadMap::from([
        ("input[type=\"text\"]".to_string(), "alice".to_string()),
        ("input[type=\"password\"]".to_string(), "s3cret".to_string()),
        ("select[name=\"country\"]".to_string(), "nz".to_string()),
        ("textarea[name=\"bio\"]".to_string(), "hi".to_string()),
    ]);
    assert_eq!(fields, expected);

    // serialising does not consume the snapshot
    assert_eq!(server.with_page(|p| p.snapshot_generation()).unwrap(), Some(1));
}

#[test]
fn test_serialise_non_form_is_empty() {
    let page = page();
    page.highlight("a");
    assert!(page
        .run(PageCommand::SerialiseForm {
            form_id: 1,
            snapshot: None,
        })
        .is_empty());
}

#[test]
fn test_set_log_level() {
    let page = page();
    page.run(PageCommand::SetLogLevel {
        log_level: "debug".into(),
    });
    let failed = page.run(PageCommand::SetLogLevel {
        log_level: "bogus".into(),
    });

    assert!(failed.is_empty());
    assert_eq!(*page.log.levels.lock().unwrap(), vec!["debug".to_string()]);
}

#[test]
fn test_unknown_command_gets_empty_result() {
    let page = page();
    let result = page
        .server
        .dispatch(&Request::new(3, "frobnicate", PayloadMap::new()));
    assert!(result.is_empty());
}

#[test]
fn test_highlight_not_excludes_hidden_inputs() {
    let mut dom = MemoryDom::new();
    let form = dom.append_to_frame(0, MemoryElement::new("form")).unwrap();
    dom.append(form, MemoryElement::input("hidden", "csrf")).unwrap();
    dom.append(form, MemoryElement::input("text", "user")).unwrap();
    dom.append(form, MemoryElement::new("button").attr("value", "Go")).unwrap();

    let matches: Vec<NodeRef> = dom
        .query_selector_all(0, "input:not([type=hidden]), button")
        .unwrap();
    assert_eq!(matches.len(), 2);
    assert_eq!(dom.attr(matches[0], "name"), Some("user"));
    assert_eq!(dom.query_selector_all(0, "input:not(#x)").unwrap().len(), 2);

    for bad in ["input:hover", "input:not(", "input:not()"] {
        assert_eq!(
            dom.query_selector_all(0, bad).unwrap_err().code,
            "INVALID_SELECTOR",
            "{bad}"
        );
    }
}

#[test]
fn test_invalid_selector_gets_empty_result() {
    let page = page();
    let matches = page.highlight("a[href");
    assert!(matches.is_empty());
    assert_eq!(page.overlays(), 0);
}

#[tokio::test]
async fn test_served_page_survives_bad_connections() {
    let transport = Arc::new(MemoryTransport::new());
    let (tx, _events) = mpsc::unbounded_channel();
    let host = WorkerHost::new(
        transport.clone(),
        "test",
        tx,
        Arc::new(RecordingLog::default()),
    );

    let mut dom = MemoryDom::new();
    dom.append_to_frame(0, MemoryElement::new("p").text("hello"))
        .unwrap();
    let (_server, _handle) = host.on_page_created(8, Box::new(dom)).await.unwrap();

    let endpoint = Endpoint::new("test", 8);

    // not a request tuple: the connection is closed without a reply
    let mut junk = Vec::new();
    rmpv::encode::write_value(&mut junk, &rmpv::Value::from("junk")).unwrap();
    let mut stream = transport.connect(&endpoint).await.unwrap();
    stream.write_all(&junk).await.unwrap();
    stream.shutdown().await.unwrap();
    let mut reply = Vec::new();
    stream.read_to_end(&mut reply).await.unwrap();
    assert!(reply.is_empty());

    let mut channel: PageChannel<Vec<Result<PayloadMap>>> =
        PageChannel::new(endpoint, transport, Arc::new(RequestIds::new()));
    channel.send(
        &PageCommand::GetSource,
        Some(Box::new(|log: &mut Vec<Result<PayloadMap>>, result| log.push(result))),
    );

    let mut log = Vec::new();
    channel.next_reply().await.unwrap().deliver(&mut log);
    assert_eq!(log.len(), 1);
    let html = &log[0].as_ref().unwrap()[HTML_KEY];
    assert_eq!(html, "<html><p>hello</p></html>");
}
