use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use crate::io::remote::LeaderboardState;
use crate::tui::app::App;
use crate::util::unicode;

use super::helpers::centered_rect;

/// Render the live leaderboard (toggled with L)
pub fn render_leaderboard_overlay(frame: &mut Frame, app: &App, area: Rect) {
    let overlay_area = centered_rect(60, 60, area);
    frame.render_widget(Clear, overlay_area);

    let theme = &app.theme;
    let bg = theme.bg;
    let dim = Style::default().fg(theme.muted).bg(bg);
    let text = Style::default().fg(theme.fg).bg(bg);
    let inner_width = overlay_area.width.saturating_sub(2) as usize;

    let mut lines: Vec<Line> = vec![
        Line::from(Span::styled(
            " Leaderboard",
            Style::default()
                .fg(theme.fg_strong)
                .bg(bg)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];

    match app.leaderboard.state() {
        LeaderboardState::Loading => {
            lines.push(Line::from(Span::styled(" Loading\u{2026}", dim)));
        }
        LeaderboardState::Failed(error) => {
            lines.push(Line::from(Span::styled(
                format!(" Leaderboard unavailable: {error}"),
                Style::default().fg(theme.error).bg(bg),
            )));
        }
        LeaderboardState::Ready(_) => {
            let entries = app.leaderboard.visible_entries();
            if entries.is_empty() {
                lines.push(Line::from(Span::styled(" No progress shared yet", dim)));
            }
            let me = app.user.as_ref().map(|u| u.id.as_str());
            let name_width = inner_width.saturating_sub(12);
            for (rank, entry) in entries.iter().enumerate() {
                let style = if Some(entry.user_id.as_str()) == me {
                    text.fg(theme.accent).add_modifier(Modifier::BOLD)
                } else {
                    text
                };
                lines.push(Line::from(vec![
                    Span::styled(format!(" {:>2}. ", rank + 1), dim),
                    Span::styled(unicode::fit_to_width(&entry.display_name, name_width), style),
                    Span::styled(format!("{:>5}", entry.tracked_count), style),
                ]));
            }
        }
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(dim)
        .style(Style::default().bg(bg));
    frame.render_widget(
        Paragraph::new(lines).block(block).style(Style::default().bg(bg)),
        overlay_area,
    );
}
