use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

use crate::tui::app::{App, Mode};
use crate::util::unicode;

use super::helpers::spans_width;

/// Push `hint` right-aligned if it fits after `spans`.
fn push_hint<'a>(spans: &mut Vec<Span<'a>>, hint: String, width: usize, style: Style, bg: Style) {
    let content_width = spans_width(spans);
    let hint_width = unicode::display_width(&hint);
    if content_width + hint_width < width {
        let padding = width - content_width - hint_width;
        spans.push(Span::styled(" ".repeat(padding), bg));
        spans.push(Span::styled(hint, style));
    }
}

/// Render the status row (bottom of screen)
pub fn render_status_row(frame: &mut Frame, app: &App, area: Rect) {
    let bg = app.theme.bg;
    let width = area.width as usize;
    let bg_style = Style::default().bg(bg);
    let dim = Style::default().fg(app.theme.muted).bg(bg);

    let line = match app.mode {
        Mode::Navigate => {
            let mut spans = Vec::new();
            if let Some(status) = &app.status {
                spans.push(Span::styled(
                    status.clone(),
                    Style::default().fg(app.theme.fg_strong).bg(bg),
                ));
            } else if !app.filters.search.is_empty() {
                spans.push(Span::styled(format!("/{}", app.filters.search), dim));
            }
            let hint = if app.back_to_top {
                "g back to top  ? help".to_string()
            } else if app.result.truncated {
                "m more  A all  ? help".to_string()
            } else {
                "? help".to_string()
            };
            push_hint(&mut spans, hint, width, dim, bg_style);
            Line::from(spans)
        }
        Mode::Search => {
            let mut spans = vec![
                Span::styled(
                    format!("/{}", app.filters.search),
                    Style::default().fg(app.theme.fg_strong).bg(bg),
                ),
                Span::styled("\u{258C}", Style::default().fg(app.theme.accent).bg(bg)), // ▌ cursor
            ];
            push_hint(&mut spans, "Enter keep  Esc clear".into(), width, dim, bg_style);
            Line::from(spans)
        }
        Mode::Picker => {
            let mut spans = Vec::new();
            push_hint(
                &mut spans,
                "type to filter  Enter choose  Esc close".into(),
                width,
                dim,
                bg_style,
            );
            Line::from(spans)
        }
    };

    frame.render_widget(Paragraph::new(line).style(bg_style), area);
}
