use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::tui::app::{App, Mode};

use super::pop_grapheme;

/// Search edits the live filter; each keystroke schedules a debounced
/// recompute so typing never waits on the query.
pub(super) fn handle_search(app: &mut App, key: KeyEvent) {
    match (key.modifiers, key.code) {
        // Clear and leave
        (_, KeyCode::Esc) => {
            app.mode = Mode::Navigate;
            if !app.filters.search.is_empty() {
                app.filters.search.clear();
                app.query_changed(false);
            }
        }

        // Keep the query and leave
        (_, KeyCode::Enter) => {
            app.mode = Mode::Navigate;
            if app.scheduler.is_pending() {
                app.recompute();
            }
        }

        (_, KeyCode::Backspace) => {
            if app.filters.search.is_empty() {
                app.mode = Mode::Navigate;
                return;
            }
            pop_grapheme(&mut app.filters.search);
            app.query_changed(true);
        }

        (m, KeyCode::Char('u')) if m.contains(KeyModifiers::CONTROL) => {
            app.filters.search.clear();
            app.query_changed(true);
        }

        (m, KeyCode::Char(c)) if !m.contains(KeyModifiers::CONTROL) => {
            app.filters.search.push(c);
            app.query_changed(true);
        }

        _ => {}
    }
}
