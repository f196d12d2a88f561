use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use crate::tui::app::App;

use super::helpers::centered_rect;

/// Width of the key column
const KEY_COLUMN: usize = 12;

const SECTIONS: &[(&str, &[(&str, &str)])] = &[
    (
        "Navigation",
        &[
            ("\u{2191}\u{2193} j k", "Move cursor"),
            ("PgUp PgDn", "Page up / down"),
            ("g G", "Jump to top / bottom"),
            ("m A", "Load more / show all"),
        ],
    ),
    (
        "Filters",
        &[
            ("/", "Search titles and topics"),
            ("1 2 3", "Toggle Easy / Medium / Hard"),
            ("T", "Pick topics"),
            ("o d", "Sort by title / difficulty"),
            ("x", "Clear filters"),
        ],
    ),
    (
        "Catalog",
        &[
            ("c t", "Pick company / timeframe"),
            ("a", "Toggle all companies"),
        ],
    ),
    (
        "Progress",
        &[
            ("Space", "Track / untrack problem"),
            ("L", "Leaderboard"),
            ("s S", "Sign in / sign out"),
        ],
    ),
    ("", &[("?", "Toggle this help"), ("q", "Quit")]),
];

/// Render the key binding reference (toggled with ?)
pub fn render_help_overlay(frame: &mut Frame, app: &App, area: Rect) {
    let overlay_area = centered_rect(60, 90, area);
    frame.render_widget(Clear, overlay_area);

    let theme = &app.theme;
    let base = Style::default().bg(theme.bg);
    let key_style = base.fg(theme.accent).add_modifier(Modifier::BOLD);
    let desc_style = base.fg(theme.fg);
    let title_style = base.fg(theme.fg_strong).add_modifier(Modifier::BOLD);

    let mut lines: Vec<Line> = Vec::new();
    for (i, (title, bindings)) in SECTIONS.iter().enumerate() {
        if i > 0 {
            lines.push(Line::default());
        }
        if !title.is_empty() {
            lines.push(Line::styled(format!(" {title}"), title_style));
        }
        lines.extend(bindings.iter().map(|(key, desc)| {
            Line::from(vec![
                Span::styled(format!(" {key:<KEY_COLUMN$}"), key_style),
                Span::styled(*desc, desc_style),
            ])
        }));
    }

    let block = Block::default()
        .title(" Key Bindings ")
        .borders(Borders::ALL)
        .border_style(base.fg(theme.muted))
        .style(base);
    frame.render_widget(Paragraph::new(lines).block(block).style(base), overlay_area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tui::render::test_helpers::*;
    use insta::assert_snapshot;

    #[test]
    fn help_overlay() {
        let app = app_with_records(numbered_records(1), 50);
        let output = render_to_string(TERM_W, 40, |frame, area| {
            render_help_overlay(frame, &app, area);
        });
        assert_snapshot!(output);
    }

    #[test]
    fn lists_bindings() {
        let app = app_with_records(numbered_records(1), 50);
        let output = render_to_string(TERM_W, 40, |frame, area| {
            render_help_overlay(frame, &app, area);
        });
        assert!(output.contains("Key Bindings"));
        assert!(output.contains("Track / untrack problem"));
        assert!(output.contains("Leaderboard"));
    }
}
