use crossterm::event::{KeyCode, KeyEvent};

use crate::model::{Difficulty, SortField};
use crate::tui::app::{App, Mode, PickerKind};

pub(super) fn handle_navigate(app: &mut App, key: KeyEvent) {
    app.status = None;
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('?') => app.show_help = true,

        // Cursor
        KeyCode::Char('j') | KeyCode::Down => app.move_cursor(1),
        KeyCode::Char('k') | KeyCode::Up => app.move_cursor(-1),
        KeyCode::PageDown => app.page(1),
        KeyCode::PageUp => app.page(-1),
        KeyCode::Char('g') | KeyCode::Home => app.jump_top(),
        KeyCode::Char('G') | KeyCode::End => app.jump_bottom(),
        KeyCode::Char('m') => app.load_more(),
        KeyCode::Char('A') => app.show_everything(),

        // Filters
        KeyCode::Char('/') => app.mode = Mode::Search,
        KeyCode::Char('1') => toggle_difficulty(app, Difficulty::Easy),
        KeyCode::Char('2') => toggle_difficulty(app, Difficulty::Medium),
        KeyCode::Char('3') => toggle_difficulty(app, Difficulty::Hard),
        KeyCode::Char('x') => {
            if app.filters.is_active() {
                app.filters.clear();
                app.query_changed(false);
            }
        }
        KeyCode::Char('o') => sort_by(app, SortField::Title),
        KeyCode::Char('d') => sort_by(app, SortField::Difficulty),

        // Selection
        KeyCode::Char('c') => app.open_picker(PickerKind::Company),
        KeyCode::Char('t') => app.open_picker(PickerKind::Timeframe),
        KeyCode::Char('T') => app.open_picker(PickerKind::Topic),
        KeyCode::Char('a') => app.toggle_all_companies(),

        // Tracking
        KeyCode::Char(' ') | KeyCode::Enter => app.toggle_selected(),
        KeyCode::Char('L') => app.toggle_leaderboard(),
        KeyCode::Char('s') => app.sign_in(),
        KeyCode::Char('S') => app.sign_out(),
        _ => {}
    }
}

fn toggle_difficulty(app: &mut App, difficulty: Difficulty) {
    app.filters.toggle_difficulty(difficulty);
    app.query_changed(false);
}

fn sort_by(app: &mut App, field: SortField) {
    app.sort = app.sort.select(field);
    app.query_changed(false);
}
