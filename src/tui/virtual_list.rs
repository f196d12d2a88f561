//! Windowed layout for the problem list.
//!
//! Rows have variable heights (topics wrap), so the list keeps a prefix sum
//! of row heights and maps the scroll offset (in lines) to the minimal range
//! of rows that intersects the viewport, widened by an overscan margin.
//! Heights are remembered per identity key, so a measured row keeps its
//! height when the list is re-sorted or re-filtered.

use std::collections::{HashMap, HashSet};
use std::ops::Range;

/// Rows to materialize for the current viewport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    /// Row indices to render (overscan included)
    pub rows: Range<usize>,
    /// First line of `rows.start`, relative to the top of the list
    pub first_row_top: usize,
    /// Scroll offset in lines at the time the window was computed
    pub offset: usize,
}

/// Coalesces scroll changes to at most one notification per frame.
#[derive(Debug, Default)]
pub struct ScrollObserver {
    pending: Option<usize>,
}

impl ScrollObserver {
    fn record(&mut self, offset: usize) {
        self.pending = Some(offset);
    }

    /// The latest offset since the previous frame, if it changed.
    pub fn take(&mut self) -> Option<usize> {
        self.pending.take()
    }
}

#[derive(Debug)]
pub struct VirtualList {
    keys: Vec<String>,
    signature: Option<u64>,
    measured: HashMap<String, usize>,
    estimated_height: usize,
    overscan: usize,
    viewport: usize,
    offset: usize,
    /// prefix[i] is the top line of row i; prefix[len] is the total height
    prefix: Vec<usize>,
    dirty: bool,
    observer: ScrollObserver,
}

impl VirtualList {
    pub fn new(estimated_height: usize, overscan: usize) -> Self {
        VirtualList {
            keys: Vec::new(),
            signature: None,
            measured: HashMap::new(),
            estimated_height: estimated_height.max(1),
            overscan,
            viewport: 0,
            offset: 0,
            prefix: vec![0],
            dirty: false,
            observer: ScrollObserver::default(),
        }
    }

    /// Replace the rows. A new `signature` means a different query, so the
    /// scroll position resets to the top and heights of rows no longer listed
    /// are forgotten; the same signature (e.g. a grown limit) keeps both.
    pub fn set_items(&mut self, keys: Vec<String>, signature: u64) {
        let changed_query = self.signature != Some(signature);
        self.keys = keys;
        self.signature = Some(signature);
        self.dirty = true;
        if changed_query {
            let live: HashSet<&str> = self.keys.iter().map(String::as_str).collect();
            self.measured.retain(|key, _| live.contains(key.as_str()));
            self.set_offset(0);
        } else {
            self.clamp_offset();
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn key(&self, index: usize) -> Option<&str> {
        self.keys.get(index).map(String::as_str)
    }

    pub fn set_viewport(&mut self, lines: usize) {
        self.viewport = lines;
        self.clamp_offset();
    }

    pub fn viewport(&self) -> usize {
        self.viewport
    }

    /// Record the rendered height of a row. Returns true if it changed.
    pub fn measure(&mut self, key: &str, height: usize) -> bool {
        let height = height.max(1);
        if self.measured.get(key) == Some(&height) {
            return false;
        }
        self.measured.insert(key.to_string(), height);
        self.dirty = true;
        true
    }

    pub fn row_height(&self, index: usize) -> usize {
        self.keys
            .get(index)
            .and_then(|k| self.measured.get(k))
            .copied()
            .unwrap_or(self.estimated_height)
    }

    fn refresh(&mut self) {
        if !self.dirty {
            return;
        }
        let mut prefix = Vec::with_capacity(self.keys.len() + 1);
        let mut top = 0;
        prefix.push(0);
        for index in 0..self.keys.len() {
            top += self.row_height(index);
            prefix.push(top);
        }
        self.prefix = prefix;
        self.dirty = false;
    }

    pub fn total_height(&mut self) -> usize {
        self.refresh();
        self.prefix.last().copied().unwrap_or(0)
    }

    /// Top line of row `index`
    pub fn row_top(&mut self, index: usize) -> usize {
        self.refresh();
        self.prefix[index.min(self.keys.len())]
    }

    /// Row containing `line`
    fn row_at(&mut self, line: usize) -> usize {
        self.refresh();
        // Last row whose top is <= line.
        self.prefix[..self.keys.len()]
            .partition_point(|&top| top <= line)
            .saturating_sub(1)
    }

    fn max_offset(&mut self) -> usize {
        self.total_height().saturating_sub(self.viewport)
    }

    fn set_offset(&mut self, offset: usize) {
        if offset != self.offset {
            self.offset = offset;
            self.observer.record(offset);
        }
    }

    fn clamp_offset(&mut self) {
        let max = self.max_offset();
        if self.offset > max {
            self.set_offset(max);
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn scroll_to(&mut self, offset: usize) {
        let max = self.max_offset();
        self.set_offset(offset.min(max));
    }

    pub fn scroll_by(&mut self, delta: isize) {
        let target = self.offset.saturating_add_signed(delta);
        self.scroll_to(target);
    }

    pub fn scroll_to_top(&mut self) {
        self.set_offset(0);
    }

    /// Scroll the minimum amount that brings row `index` fully into view.
    pub fn ensure_visible(&mut self, index: usize) {
        if index >= self.keys.len() {
            return;
        }
        let top = self.row_top(index);
        let bottom = top + self.row_height(index);
        if top < self.offset {
            self.set_offset(top);
        } else if bottom > self.offset + self.viewport {
            let target = bottom.saturating_sub(self.viewport).min(top);
            self.scroll_to(target);
        }
    }

    /// Rows intersecting the viewport plus `overscan` rows on each side.
    pub fn window(&mut self) -> Window {
        if self.keys.is_empty() {
            return Window {
                rows: 0..0,
                first_row_top: 0,
                offset: self.offset,
            };
        }
        let first = self.row_at(self.offset);
        let last_line = self.offset + self.viewport.max(1) - 1;
        let last = self.row_at(last_line);
        let start = first.saturating_sub(self.overscan);
        let end = (last + 1 + self.overscan).min(self.keys.len());
        Window {
            rows: start..end,
            first_row_top: self.row_top(start),
            offset: self.offset,
        }
    }

    /// Whether the bottom of the list is inside the viewport
    pub fn at_end(&mut self) -> bool {
        self.offset + self.viewport >= self.total_height()
    }

    pub fn observer(&mut self) -> &mut ScrollObserver {
        &mut self.observer
    }
}
