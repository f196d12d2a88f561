use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

use crate::io::ledger::PersistenceMode;
use crate::model::{SortDirection, SortField};
use crate::tui::app::App;

use super::helpers::spans_width;

fn selection_label(app: &App) -> String {
    if app.show_all {
        return "All companies".into();
    }
    match (&app.company, &app.timeframe) {
        (Some(company), Some(timeframe)) => format!("{company} \u{00b7} {timeframe}"),
        (Some(company), None) => company.clone(),
        _ => "No data".into(),
    }
}

fn sort_label(app: &App) -> String {
    let field = match app.sort.field {
        SortField::Title => "title",
        SortField::Difficulty => "difficulty",
    };
    let arrow = match app.sort.direction {
        SortDirection::Asc => "\u{2191}",
        SortDirection::Desc => "\u{2193}",
    };
    format!("sort {field} {arrow}")
}

/// Render the two header lines: selection and account on top, active
/// filters and result counts below.
pub fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let theme = &app.theme;
    let bg = theme.bg;
    let width = area.width as usize;
    let dim = Style::default().fg(theme.muted).bg(bg);

    let mut top = vec![
        Span::styled(
            " prepdeck ",
            Style::default()
                .fg(theme.accent)
                .bg(bg)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            selection_label(app),
            Style::default().fg(theme.fg_strong).bg(bg),
        ),
    ];
    if app.loading {
        top.push(Span::styled("  loading\u{2026}", Style::default().fg(theme.warning).bg(bg)));
    }
    let account = match &app.user {
        Some(user) => {
            let mode = match app.persistence_mode() {
                PersistenceMode::Remote => "synced",
                PersistenceMode::Local => "local",
            };
            format!("{} ({mode}) ", user.normalized_name())
        }
        None => "signed out ".to_string(),
    };
    let used = spans_width(&top) + crate::util::unicode::display_width(&account);
    if used < width {
        top.push(Span::styled(" ".repeat(width - used), Style::default().bg(bg)));
        top.push(Span::styled(account, dim));
    }

    let mut filters = Vec::new();
    if !app.filters.search.trim().is_empty() {
        filters.push(format!("\"{}\"", app.filters.search.trim()));
    }
    if !app.filters.difficulties.is_empty() {
        let names: Vec<String> = app.filters.difficulties.iter().map(|d| d.to_string()).collect();
        filters.push(names.join("+"));
    }
    if !app.filters.topics.is_empty() {
        let topics: Vec<&str> = app.filters.topics.iter().map(String::as_str).collect();
        filters.push(format!("#{}", topics.join(" #")));
    }
    let shown = app.result.results.len();
    let mut bottom = vec![Span::styled(
        format!(" {shown} of {} \u{00b7} {}", app.result.total_matches, sort_label(app)),
        dim,
    )];
    if !filters.is_empty() {
        bottom.push(Span::styled(
            format!(" \u{00b7} {}", filters.join("  ")),
            Style::default().fg(theme.info).bg(bg),
        ));
    }

    let lines = vec![Line::from(top), Line::from(bottom)];
    frame.render_widget(Paragraph::new(lines).style(Style::default().bg(bg)), area);
}
