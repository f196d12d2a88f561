use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::tui::app::{App, PickerKind};

use super::pop_grapheme;

pub(super) fn handle_picker(app: &mut App, key: KeyEvent) {
    let Some(picker) = app.picker.as_mut() else {
        app.close_picker();
        return;
    };
    match (key.modifiers, key.code) {
        (_, KeyCode::Esc) => app.close_picker(),
        (_, KeyCode::Down) => picker.move_by(1),
        (_, KeyCode::Up) => picker.move_by(-1),
        (m, KeyCode::Char('n')) if m.contains(KeyModifiers::CONTROL) => picker.move_by(1),
        (m, KeyCode::Char('p')) if m.contains(KeyModifiers::CONTROL) => picker.move_by(-1),
        (_, KeyCode::Backspace) => {
            let mut filter = picker.filter.clone();
            pop_grapheme(&mut filter);
            picker.set_filter(filter);
        }
        (_, KeyCode::Enter) => {
            let kind = picker.kind;
            let Some(choice) = picker.selected().cloned() else {
                return;
            };
            choose(app, kind, choice);
        }
        (m, KeyCode::Char(c)) if !m.contains(KeyModifiers::CONTROL) => {
            let filter = format!("{}{}", picker.filter, c);
            picker.set_filter(filter);
        }
        _ => {}
    }
}

fn choose(app: &mut App, kind: PickerKind, choice: String) {
    match kind {
        PickerKind::Company => {
            app.close_picker();
            app.choose_company(choice);
        }
        PickerKind::Timeframe => {
            app.close_picker();
            app.choose_timeframe(choice);
        }
        // Topics are multi-select; the picker stays open
        PickerKind::Topic => {
            app.filters.toggle_topic(&choice);
            app.query_changed(false);
        }
    }
}
