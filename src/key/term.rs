//! Terminal input boundary: crossterm key events to [`KeyEvent`]

use crossterm::event::{
    KeyCode, KeyEvent as TermKeyEvent, KeyEventKind, KeyModifiers, ModifierKeyCode,
};

use super::{KeyEvent, Modifiers, BACKSPACE, ESCAPE, INSERT, LEFT_TAB, RETURN, SPACE, TAB};

/// Translate a crossterm key event. Releases and keys with no browser
/// meaning yield `None`.
pub fn translate_key_event(event: TermKeyEvent) -> Option<KeyEvent> {
    if event.kind == KeyEventKind::Release {
        return None;
    }

    let modifiers = Modifiers {
        control: event.modifiers.contains(KeyModifiers::CONTROL),
        shift: event.modifiers.contains(KeyModifiers::SHIFT),
        super_key: event.modifiers.contains(KeyModifiers::SUPER),
        alt: event.modifiers.contains(KeyModifiers::ALT),
    };

    let name = match event.code {
        KeyCode::Char(' ') => SPACE.to_string(),
        KeyCode::Char(ch) => ch.to_string(),
        KeyCode::Enter => RETURN.to_string(),
        KeyCode::Esc => ESCAPE.to_string(),
        KeyCode::Tab => TAB.to_string(),
        KeyCode::BackTab => LEFT_TAB.to_string(),
        KeyCode::Backspace => BACKSPACE.to_string(),
        KeyCode::Insert => INSERT.to_string(),
        KeyCode::Delete => "Delete".to_string(),
        KeyCode::Up => "Up".to_string(),
        KeyCode::Down => "Down".to_string(),
        KeyCode::Left => "Left".to_string(),
        KeyCode::Right => "Right".to_string(),
        KeyCode::Home => "Home".to_string(),
        KeyCode::End => "End".to_string(),
        KeyCode::PageUp => "Page_Up".to_string(),
        KeyCode::PageDown => "Page_Down".to_string(),
        KeyCode::F(n) => format!("F{n}"),
        KeyCode::Modifier(ModifierKeyCode::LeftShift) => "Shift_L".to_string(),
        KeyCode::Modifier(ModifierKeyCode::RightShift) => "Shift_R".to_string(),
        _ => return None,
    };

    Some(KeyEvent::from_parts(&name, modifiers))
}
