use ratatui::layout::{Constraint, Flex, Layout, Rect};
use ratatui::text::Span;

/// Rectangle covering `percent_x` by `percent_y` of `area`, centered in it
pub(super) fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let [row] = Layout::vertical([Constraint::Percentage(percent_y)])
        .flex(Flex::Center)
        .areas(area);
    let [cell] = Layout::horizontal([Constraint::Percentage(percent_x)])
        .flex(Flex::Center)
        .areas(row);
    cell
}

/// Display width of a run of spans
pub(super) fn spans_width(spans: &[Span]) -> usize {
    spans.iter().map(Span::width).sum()
}

/// A bar of `count` scaled against `max` into at most `width` cells
pub(super) fn bar(count: usize, max: usize, width: usize) -> String {
    if max == 0 || count == 0 {
        return String::new();
    }
    let cells = (count * width).div_ceil(max).min(width);
    "\u{2588}".repeat(cells)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bar_scales_to_width() {
        assert_eq!(bar(0, 10, 8), "");
        assert_eq!(bar(10, 10, 8).chars().count(), 8);
        assert_eq!(bar(1, 10, 8).chars().count(), 1);
        assert_eq!(bar(5, 0, 8), "");
    }

    #[test]
    fn centered_rect_is_inside_parent() {
        let area = Rect::new(0, 0, 100, 50);
        let inner = centered_rect(50, 50, area);
        assert_eq!(inner.width, 50);
        assert_eq!(inner.x, 25);
    }
}
