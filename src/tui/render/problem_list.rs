use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

use crate::tui::app::App;
use crate::util::unicode;

/// Width of the difficulty/frequency/acceptance columns
const META_WIDTH: usize = 21;
/// Indent of wrapped topic lines
const TOPIC_INDENT: usize = 6;

/// Lines of one result row: the title line, then its topics wrapped to the
/// list width. The row height is the number of lines.
fn row_lines(app: &App, index: usize, width: usize) -> Vec<Line<'static>> {
    let Some(record) = app.result.results.get(index) else {
        return Vec::new();
    };
    let theme = &app.theme;
    let selected = index == app.cursor;
    let bg = if selected {
        theme.cursor_bg
    } else {
        theme.bg
    };
    let base = Style::default().fg(theme.fg).bg(bg);

    let mut spans = vec![
        Span::styled(
            if selected { "\u{258C}" } else { " " },
            Style::default().fg(theme.cursor_border).bg(bg),
        ),
        if app.is_tracked(record) {
            Span::styled("[\u{2713}] ", Style::default().fg(theme.tracked).bg(bg))
        } else {
            Span::styled("[ ] ", Style::default().fg(theme.muted).bg(bg))
        },
    ];
    let prefix = 5;
    let show_meta = width >= prefix + META_WIDTH + 10;
    let title_width = width.saturating_sub(prefix + if show_meta { META_WIDTH } else { 0 });
    let title_style = if selected {
        base.fg(theme.fg_strong).add_modifier(Modifier::BOLD)
    } else {
        base
    };
    spans.push(Span::styled(
        unicode::fit_to_width(&record.title, title_width),
        title_style,
    ));
    if show_meta {
        spans.push(Span::styled(
            format!(" {:<6}", record.difficulty.to_string()),
            Style::default()
                .fg(theme.difficulty_color(record.difficulty))
                .bg(bg),
        ));
        spans.push(Span::styled(
            format!(" {:>5.1} {:>6.1}%", record.frequency, record.acceptance_rate),
            Style::default().fg(theme.muted).bg(bg),
        ));
    }

    let mut lines = vec![Line::from(spans)];
    if !record.topics.is_empty() {
        let topic_width = width.saturating_sub(TOPIC_INDENT);
        for text in unicode::wrap_items(&record.topics, ", ", topic_width) {
            lines.push(Line::from(vec![
                Span::styled(" ".repeat(TOPIC_INDENT), Style::default().bg(bg)),
                Span::styled(
                    unicode::fit_to_width(&text, topic_width),
                    Style::default().fg(theme.muted).bg(bg),
                ),
            ]));
        }
    }
    lines
}

/// Measure the rows of the current window. Returns true if any height changed.
fn measure_window(app: &mut App, width: usize) -> bool {
    let window = app.list.window();
    let mut changed = false;
    for index in window.rows {
        let height = row_lines(app, index, width).len();
        if let Some(key) = app.list.key(index).map(str::to_string) {
            changed |= app.list.measure(&key, height);
        }
    }
    changed
}

fn empty_message(app: &App) -> Option<String> {
    if let Some(error) = &app.load_error {
        return Some(format!("Could not load problems: {error}"));
    }
    if app.loading && app.partition.is_none() {
        return Some("Loading problems\u{2026}".into());
    }
    if app.result.results.is_empty() {
        return Some(if app.filters.is_active() {
            "No problems match the current filters".into()
        } else {
            "No problems in this selection".into()
        });
    }
    None
}

/// Render the visible window of the result list
pub fn render_problem_list(frame: &mut Frame, app: &mut App, area: Rect) {
    let bg = app.theme.bg;
    app.list.set_viewport(area.height as usize);

    if let Some(message) = empty_message(app) {
        let line = Line::from(Span::styled(
            format!(" {message}"),
            Style::default().fg(app.theme.muted).bg(bg),
        ));
        frame.render_widget(Paragraph::new(line).style(Style::default().bg(bg)), area);
        return;
    }

    let width = area.width as usize;
    app.list.ensure_visible(app.cursor);
    // Newly measured rows shift the layout; settle before drawing.
    for _ in 0..3 {
        if !measure_window(app, width) {
            break;
        }
        app.list.ensure_visible(app.cursor);
    }

    let window = app.list.window();
    let skip = window.offset.saturating_sub(window.first_row_top);
    let lines: Vec<Line> = window
        .rows
        .flat_map(|index| row_lines(app, index, width))
        .skip(skip)
        .take(area.height as usize)
        .collect();
    frame.render_widget(Paragraph::new(lines).style(Style::default().bg(bg)), area);

    if let Some(offset) = app.list.observer().take() {
        app.on_scroll(offset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Difficulty, ProblemRecord};
    use crate::tui::render::test_helpers::*;
    use insta::assert_snapshot;

    const LIST_W: u16 = 60;
    const LIST_H: u16 = 8;

    /// Twelve two-line rows in an eight-line viewport
    fn twelve_rows() -> App {
        let mut app = app_with_records(padded_records(12), 50);
        app.list.set_viewport(LIST_H as usize);
        app
    }

    #[test]
    fn window_at_top() {
        let mut app = twelve_rows();
        app.move_cursor(1);
        app.toggle_selected();
        app.jump_top();
        let output = render_to_string(LIST_W, LIST_H, |frame, area| {
            render_problem_list(frame, &mut app, area);
        });
        assert_snapshot!(output);
    }

    #[test]
    fn window_scrolled_mid_list() {
        let mut app = twelve_rows();
        app.move_cursor(5);
        assert_eq!(app.list.offset(), 4);
        let output = render_to_string(LIST_W, LIST_H, |frame, area| {
            render_problem_list(frame, &mut app, area);
        });
        assert_snapshot!(output);
    }

    #[test]
    fn window_at_bottom() {
        let mut app = twelve_rows();
        app.jump_bottom();
        let output = render_to_string(LIST_W, LIST_H, |frame, area| {
            render_problem_list(frame, &mut app, area);
        });
        assert_eq!(app.list.offset(), 16);
        assert_snapshot!(output);
    }

    #[test]
    fn renders_titles_and_topics() {
        let mut app = app_with_records(numbered_records(3), 50);
        let output = render_to_string(TERM_W, 10, |frame, area| {
            render_problem_list(frame, &mut app, area);
        });
        assert!(output.contains("[ ] Problem 1"));
        assert!(output.contains("Graph, Array"));
        assert!(output.contains("Medium"));
    }

    #[test]
    fn tracked_rows_show_check() {
        let mut app = app_with_records(numbered_records(3), 50);
        app.toggle_selected();
        let output = render_to_string(TERM_W, 10, |frame, area| {
            render_problem_list(frame, &mut app, area);
        });
        assert!(output.contains("[\u{2713}] Problem 1"));
    }

    #[test]
    fn only_the_window_is_drawn() {
        let mut app = app_with_records(numbered_records(200), 0);
        app.list.set_viewport(10);
        app.jump_bottom();
        let output = render_to_string(TERM_W, 10, |frame, area| {
            render_problem_list(frame, &mut app, area);
        });
        // Titles sort as text, so "Problem 99" is last.
        assert!(output.contains("Problem 99"));
        assert!(!output.contains("Problem 100"));
        assert!(app.back_to_top);
    }

    #[test]
    fn empty_filter_message() {
        let mut app = app_with_records(numbered_records(3), 50);
        app.filters.search = "nothing like this".into();
        app.query_changed(false);
        let output = render_to_string(TERM_W, 5, |frame, area| {
            render_problem_list(frame, &mut app, area);
        });
        assert!(output.contains("No problems match the current filters"));
    }

    #[test]
    fn long_topic_lists_wrap() {
        let record = ProblemRecord::new("Acme", "All", "Wide", Difficulty::Easy).with_topics(&[
            "Dynamic Programming",
            "Breadth-First Search",
            "Depth-First Search",
            "Union Find",
        ]);
        let mut app = app_with_records(vec![record], 50);
        let output = render_to_string(40, 10, |frame, area| {
            render_problem_list(frame, &mut app, area);
        });
        assert!(output.lines().count() >= 3);
        assert_eq!(app.list.row_height(0), output.lines().count());
    }
}
