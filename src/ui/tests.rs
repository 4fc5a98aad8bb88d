use super::*;

fn key(name: &str) -> KeyEvent {
    name.parse().unwrap()
}

fn typed(entry: &mut LineEntry, text: &str) {
    for c in text.chars() {
        let name = if c == ' ' { "space".to_string() } else { c.to_string() };
        assert!(entry.feed_key(&key(&name)));
    }
}

#[test]
fn test_typing_and_backspace() {
    let mut entry = LineEntry::new();
    typed(&mut entry, "open x");
    assert_eq!(entry.text(), "open x");

    assert!(entry.feed_key(&key("BackSpace")));
    assert_eq!(entry.text(), "open ");
    assert_eq!(entry.cursor(), 5);
}

#[test]
fn test_cursor_movement_and_insert() {
    let mut entry = LineEntry::new();
    entry.set_text("helo");
    entry.feed_key(&key("Left"));
    typed(&mut entry, "l");
    assert_eq!(entry.text(), "hello");

    entry.feed_key(&key("Home"));
    entry.feed_key(&key("Delete"));
    assert_eq!(entry.text(), "ello");
}

#[test]
fn test_control_editing() {
    let mut entry = LineEntry::new();
    entry.set_text("search rust  traits");
    assert!(entry.feed_key(&key("C-w")));
    assert_eq!(entry.text(), "search rust  ");
    assert!(entry.feed_key(&key("C-u")));
    assert_eq!(entry.text(), "");
}

#[test]
fn test_non_editing_keys_are_refused() {
    let mut entry = LineEntry::new();
    assert!(!entry.feed_key(&key("C-x")));
    assert!(!entry.feed_key(&key("F5")));
    assert!(!entry.feed_key(&key("Up")));
}

#[test]
fn test_masked_display() {
    let mut entry = LineEntry::new();
    entry.set_masked(true);
    entry.set_text("hunter2");
    assert_eq!(entry.display_text(), "*******");
    assert_eq!(entry.text(), "hunter2");
}

#[test]
fn test_hide_clears_suggestions_and_focus() {
    let mut entry = LineEntry::new();
    entry.show();
    entry.set_focus(true);
    entry.set_suggestions(&["a".to_string()]);
    entry.hide();
    assert!(!entry.is_visible());
    assert!(!entry.is_focused());
    assert!(entry.suggestions().is_empty());
}

#[test]
fn test_status_line() {
    let mut status = StatusLine::default();
    status.set_mode("COMMAND");
    status.set_buffered_command("g");
    assert_eq!(status.mode(), "COMMAND");
    assert_eq!(status.buffered_command(), "g");
}

mod terminal_draw {
    use super::super::terminal::{draw, fit, Frame, PromptLine};
    use crate::test_utils::MockTerminal;

    #[test]
    fn test_fit_counts_columns() {
        assert_eq!(fit("hello", 3), "hel");
        assert_eq!(fit("日本語", 4), "日本");
        assert_eq!(fit("ab", 10), "ab");
    }

    #[test]
    fn test_draw_status_and_message() {
        let mut term = MockTerminal::new(6, 40);
        let body = vec!["first".to_string(), "second".to_string()];
        let frame = Frame {
            title: "https://example.com/",
            body: &body,
            mode: "COMMAND",
            buffered: "g",
            message: Some("Set clipboard to 'x'"),
            prompt: None,
        };
        draw(&mut term, &frame).unwrap();

        assert_eq!(term.line(0), Some(("https://example.com/", true)));
        assert_eq!(term.line(1), Some(("first", false)));
        assert_eq!(term.line(2), Some(("second", false)));
        assert_eq!(term.line(4), Some(("-- COMMAND -- g", true)));
        assert_eq!(term.line(5), Some(("Set clipboard to 'x'", false)));
        assert_eq!(term.cursor, None);
        assert_eq!(term.flushes, 1);
    }

    #[test]
    fn test_draw_prompt_with_suggestions() {
        let mut term = MockTerminal::new(8, 40);
        let suggestions = vec!["open".to_string(), "open_tab".to_string()];
        let frame = Frame {
            title: "",
            body: &[],
            mode: "PROMPT",
            buffered: "",
            message: None,
            prompt: Some(PromptLine {
                label: "command",
                text: "op".to_string(),
                cursor: 2,
                suggestions: &suggestions,
            }),
        };
        draw(&mut term, &frame).unwrap();

        assert_eq!(term.line(4), Some(("open", false)));
        assert_eq!(term.line(5), Some(("open_tab", false)));
        assert_eq!(term.line(6), Some(("-- PROMPT --", true)));
        assert_eq!(term.line(7), Some(("command: op", false)));
        assert_eq!(term.cursor, Some((7, 11)));
    }

    #[test]
    fn test_tiny_terminal_draws_nothing() {
        let mut term = MockTerminal::new(2, 40);
        draw(&mut term, &Frame::default()).unwrap();
        assert_eq!(term.line(0), None);
    }
}
