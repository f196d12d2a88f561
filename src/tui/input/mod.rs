mod navigate;
mod picker;
mod search;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use super::app::{App, Mode};

use navigate::handle_navigate;
use picker::handle_picker;
use search::handle_search;

/// Handle a key event in the current mode
pub fn handle_key(app: &mut App, key: KeyEvent) {
    // Ignore bare modifier key presses (Shift, Ctrl, Alt, etc.)
    if matches!(key.code, KeyCode::Modifier(_)) {
        return;
    }
    let key = normalize_key(key);

    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        app.should_quit = true;
        return;
    }

    // Overlays intercept all input
    if app.show_help {
        if matches!(key.code, KeyCode::Char('?') | KeyCode::Esc | KeyCode::Char('q')) {
            app.show_help = false;
        }
        return;
    }
    if app.show_leaderboard {
        if matches!(key.code, KeyCode::Char('L') | KeyCode::Esc | KeyCode::Char('q')) {
            app.toggle_leaderboard();
        }
        return;
    }

    match app.mode {
        Mode::Navigate => handle_navigate(app, key),
        Mode::Search => handle_search(app, key),
        Mode::Picker => handle_picker(app, key),
    }
}

/// Shift+letter arrives as lowercase with SHIFT on some terminals.
fn normalize_key(mut key: KeyEvent) -> KeyEvent {
    if let KeyCode::Char(c) = key.code
        && key.modifiers.contains(KeyModifiers::SHIFT)
        && c.is_ascii_lowercase()
    {
        key.code = KeyCode::Char(c.to_ascii_uppercase());
    }
    key
}

/// Remove the last grapheme of a text input
fn pop_grapheme(text: &mut String) {
    if let Some(start) = crate::util::unicode::prev_grapheme_boundary(text, text.len()) {
        text.truncate(start);
    }
}
