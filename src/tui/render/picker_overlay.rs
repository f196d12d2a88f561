use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use crate::tui::app::{App, PickerKind};
use crate::util::unicode;

use super::helpers::centered_rect;

/// Render the company/timeframe/topic chooser
pub fn render_picker_overlay(frame: &mut Frame, app: &App, area: Rect) {
    let Some(picker) = &app.picker else {
        return;
    };
    let overlay_area = centered_rect(50, 70, area);
    frame.render_widget(Clear, overlay_area);

    let theme = &app.theme;
    let bg = theme.bg;
    let text = Style::default().fg(theme.fg).bg(bg);
    let dim = Style::default().fg(theme.muted).bg(bg);
    let inner_width = overlay_area.width.saturating_sub(2) as usize;
    let inner_height = overlay_area.height.saturating_sub(2) as usize;

    let title = match picker.kind {
        PickerKind::Company => " Company ",
        PickerKind::Timeframe => " Timeframe ",
        PickerKind::Topic => " Topics ",
    };

    let mut lines = vec![Line::from(vec![
        Span::styled(format!(" > {}", picker.filter), Style::default().fg(theme.fg_strong).bg(bg)),
        Span::styled("\u{258C}", Style::default().fg(theme.accent).bg(bg)),
    ])];

    let visible = picker.visible();
    if visible.is_empty() {
        lines.push(Line::from(Span::styled(" no matches", dim)));
    }
    let rows = inner_height.saturating_sub(1).max(1);
    let start = picker.cursor.saturating_sub(rows - 1);
    for (index, item) in visible.iter().enumerate().skip(start).take(rows) {
        let selected = index == picker.cursor;
        let marker = match picker.kind {
            PickerKind::Topic if app.filters.topics.contains(item.as_str()) => "[x] ",
            PickerKind::Topic => "[ ] ",
            _ => "",
        };
        let style = if selected {
            text.bg(theme.cursor_bg)
                .fg(theme.fg_strong)
                .add_modifier(Modifier::BOLD)
        } else {
            text
        };
        lines.push(Line::from(Span::styled(
            unicode::fit_to_width(&format!(" {marker}{item}"), inner_width),
            style,
        )));
    }

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(dim)
        .style(Style::default().bg(bg));
    frame.render_widget(
        Paragraph::new(lines).block(block).style(Style::default().bg(bg)),
        overlay_area,
    );
}
