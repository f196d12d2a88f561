use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};

use crate::model::Difficulty;
use crate::ops::stats::ITEMS_PER_STAGE;
use crate::tui::app::App;
use crate::util::unicode;

use super::helpers::bar;

/// Width of the dashboard column beside the list
pub const PANEL_WIDTH: u16 = 36;

/// Render dashboard metrics for the materialized rows plus overall progress
pub fn render_stats_panel(frame: &mut Frame, app: &App, area: Rect) {
    let theme = &app.theme;
    let bg = theme.bg;
    let metrics = &app.metrics;
    let inner_width = area.width.saturating_sub(2) as usize;

    let header = Style::default()
        .fg(theme.fg_strong)
        .bg(bg)
        .add_modifier(Modifier::BOLD);
    let label = Style::default().fg(theme.muted).bg(bg);
    let value = Style::default().fg(theme.fg).bg(bg);

    let row = |name: &str, text: String| {
        Line::from(vec![
            Span::styled(unicode::fit_to_width(name, 16), label),
            Span::styled(text, value),
        ])
    };

    let mut lines = vec![
        Line::from(Span::styled("Overview", header)),
        row("Problems", metrics.total.to_string()),
        row("Avg frequency", format!("{:.1}", metrics.average_frequency)),
        row("Avg acceptance", format!("{:.1}%", metrics.average_acceptance)),
        row("Topics", metrics.topic_count.to_string()),
    ];

    let mut split = Vec::new();
    for difficulty in Difficulty::ALL {
        split.push(Span::styled(
            format!("{} {}  ", difficulty, metrics.difficulty.get(difficulty)),
            Style::default()
                .fg(theme.difficulty_color(difficulty))
                .bg(bg),
        ));
    }
    lines.push(Line::from(split));
    lines.push(Line::from(""));

    lines.push(Line::from(Span::styled("Frequency", header)));
    let max_bucket = metrics
        .frequency_buckets
        .iter()
        .map(|b| b.count)
        .max()
        .unwrap_or(0);
    let bar_width = inner_width.saturating_sub(14);
    for bucket in &metrics.frequency_buckets {
        lines.push(Line::from(vec![
            Span::styled(format!("{:<7}", bucket.label), label),
            Span::styled(
                bar(bucket.count, max_bucket, bar_width),
                Style::default().fg(theme.info).bg(bg),
            ),
            Span::styled(format!(" {}", bucket.count), value),
        ]));
    }
    lines.push(Line::from(""));

    if !metrics.top_topics.is_empty() {
        lines.push(Line::from(Span::styled("Top topics", header)));
        let name_width = inner_width.saturating_sub(6);
        for topic in &metrics.top_topics {
            lines.push(Line::from(vec![
                Span::styled(unicode::fit_to_width(&topic.topic, name_width), value),
                Span::styled(format!("{:>5}", topic.count), label),
            ]));
        }
        lines.push(Line::from(""));
    }

    let stage = &app.stage;
    lines.push(Line::from(Span::styled("Progress", header)));
    lines.push(row(
        "Tracked here",
        format!(
            "{}/{} ({:.0}%)",
            metrics.tracking.tracked, metrics.tracking.total, metrics.tracking.percent
        ),
    ));
    lines.push(row("Stage", stage.stage.to_string()));
    lines.push(Line::from(vec![
        Span::styled(
            bar(
                stage.total_tracked % ITEMS_PER_STAGE,
                ITEMS_PER_STAGE,
                bar_width,
            ),
            Style::default().fg(theme.success).bg(bg),
        ),
        Span::styled(format!(" {:.0}%", stage.progress), value),
    ]));
    lines.push(Line::from(Span::styled(
        format!("{} to stage {}", stage.remaining_in_stage, stage.stage + 1),
        label,
    )));

    let block = Block::default()
        .borders(Borders::LEFT)
        .border_style(Style::default().fg(theme.muted).bg(bg))
        .style(Style::default().bg(bg));
    frame.render_widget(
        Paragraph::new(lines).block(block).style(Style::default().bg(bg)),
        area,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tui::render::test_helpers::*;

    #[test]
    fn shows_overview_and_progress() {
        let mut app = app_with_records(numbered_records(12), 50);
        app.toggle_selected();
        let output = render_to_string(PANEL_WIDTH, 40, |frame, area| {
            render_stats_panel(frame, &app, area);
        });
        assert!(output.contains("Problems        12"));
        assert!(output.contains("Easy 4"));
        assert!(output.contains("Array"));
        assert!(output.contains("Tracked here    1/12 (8%)"));
        assert!(output.contains("9 to stage 2"));
    }
}
