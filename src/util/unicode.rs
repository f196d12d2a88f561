use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

/// Display width in terminal cells.
pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

const ELLIPSIS: char = '\u{2026}';

/// Shorten `s` to at most `max_cells` cells, ending in `…` when anything was
/// cut. Graphemes are never split.
pub fn truncate_to_width(s: &str, max_cells: usize) -> String {
    if display_width(s) <= max_cells {
        return s.to_string();
    }
    let Some(budget) = max_cells.checked_sub(1) else {
        return String::new();
    };
    let mut used = 0;
    let mut kept: String = s
        .graphemes(true)
        .take_while(|g| {
            used += display_width(g);
            used <= budget
        })
        .collect();
    kept.push(ELLIPSIS);
    kept
}

/// Pad with spaces (or truncate) to exactly `cells` display cells.
pub fn fit_to_width(s: &str, cells: usize) -> String {
    let truncated = truncate_to_width(s, cells);
    let pad = cells.saturating_sub(display_width(&truncated));
    format!("{}{}", truncated, " ".repeat(pad))
}

/// Byte offset of the grapheme that ends at `byte_offset`, or None at the start.
pub fn prev_grapheme_boundary(s: &str, byte_offset: usize) -> Option<usize> {
    let head = s.get(..byte_offset.min(s.len()))?;
    head.grapheme_indices(true).next_back().map(|(i, _)| i)
}

/// Byte offset just past the grapheme starting at `byte_offset`, or None at the end.
pub fn next_grapheme_boundary(s: &str, byte_offset: usize) -> Option<usize> {
    let tail = s.get(byte_offset..).filter(|t| !t.is_empty())?;
    tail.graphemes(true).next().map(|g| byte_offset + g.len())
}

/// Greedy word wrap of `items` joined by `sep` into lines of at most `width`
/// cells. A single item wider than `width` is truncated on its own line.
/// Always returns at least one line.
pub fn wrap_items(items: &[String], sep: &str, width: usize) -> Vec<String> {
    let mut lines = vec![String::new()];
    if width == 0 {
        return lines;
    }
    let sep_width = display_width(sep);
    for item in items {
        let item_width = display_width(item);
        let current = lines.last_mut().map(|l| (display_width(l), l));
        match current {
            Some((0, line)) => line.push_str(&truncate_to_width(item, width)),
            Some((used, line)) if used + sep_width + item_width <= width => {
                line.push_str(sep);
                line.push_str(item);
            }
            _ => lines.push(truncate_to_width(item, width)),
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_width_ascii() {
        assert_eq!(display_width("hello"), 5);
    }

    #[test]
    fn display_width_cjk() {
        assert_eq!(display_width("日本"), 4);
    }

    #[test]
    fn truncate_no_truncation_needed() {
        assert_eq!(truncate_to_width("abc", 5), "abc");
    }

    #[test]
    fn truncate_ascii() {
        assert_eq!(truncate_to_width("abcdef", 4), "abc\u{2026}");
    }

    #[test]
    fn truncate_cjk_boundary() {
        // "日本語" is 6 cells; budget 4 leaves room for one wide char + ellipsis
        assert_eq!(truncate_to_width("日本語", 4), "日\u{2026}");
    }

    #[test]
    fn truncate_zero_and_one() {
        assert_eq!(truncate_to_width("abc", 0), "");
        assert_eq!(truncate_to_width("abc", 1), "\u{2026}");
    }

    #[test]
    fn fit_pads_short_strings() {
        assert_eq!(fit_to_width("ab", 4), "ab  ");
        assert_eq!(fit_to_width("abcdef", 4), "abc\u{2026}");
    }

    #[test]
    fn grapheme_boundaries() {
        let s = "ae\u{301}b"; // e + combining acute is one grapheme
        assert_eq!(next_grapheme_boundary(s, 0), Some(1));
        assert_eq!(next_grapheme_boundary(s, 1), Some(4));
        assert_eq!(prev_grapheme_boundary(s, 4), Some(1));
        assert_eq!(prev_grapheme_boundary(s, 0), None);
        assert_eq!(next_grapheme_boundary(s, s.len()), None);
    }

    #[test]
    fn wrap_items_breaks_between_items() {
        let items: Vec<String> = ["Array", "Hash Table", "Graph"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(wrap_items(&items, ", ", 80), vec!["Array, Hash Table, Graph"]);
        assert_eq!(
            wrap_items(&items, ", ", 18),
            vec!["Array, Hash Table", "Graph"]
        );
    }

    #[test]
    fn wrap_items_empty_is_one_line() {
        assert_eq!(wrap_items(&[], ", ", 10), vec![String::new()]);
    }
}
