pub mod header;
pub mod help_overlay;
mod helpers;
pub mod leaderboard_overlay;
pub mod picker_overlay;
pub mod problem_list;
pub mod stats_panel;
pub mod status_row;
#[cfg(test)]
pub mod test_helpers;

use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::Style;
use ratatui::widgets::Block;

use super::app::App;

/// Terminal width from which the dashboard column is shown
pub const STATS_MIN_WIDTH: u16 = 100;

/// Main render function, dispatches to sub-renderers
pub fn render(frame: &mut Frame, app: &mut App) {
    let area = frame.area();

    let bg_style = Style::default().bg(app.theme.bg);
    frame.render_widget(Block::default().style(bg_style), area);

    // Layout: header (2 rows) | content | status row (1 row)
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(area);

    header::render_header(frame, app, chunks[0]);

    if chunks[1].width >= STATS_MIN_WIDTH {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Min(1),
                Constraint::Length(stats_panel::PANEL_WIDTH),
            ])
            .split(chunks[1]);
        problem_list::render_problem_list(frame, app, columns[0]);
        stats_panel::render_stats_panel(frame, app, columns[1]);
    } else {
        problem_list::render_problem_list(frame, app, chunks[1]);
    }

    if app.picker.is_some() {
        picker_overlay::render_picker_overlay(frame, app, chunks[1]);
    }
    if app.show_leaderboard {
        leaderboard_overlay::render_leaderboard_overlay(frame, app, frame.area());
    }
    if app.show_help {
        help_overlay::render_help_overlay(frame, app, frame.area());
    }

    status_row::render_status_row(frame, app, chunks[2]);
}
