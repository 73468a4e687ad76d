//! Bounded per-view memory of scroll offsets, most recent first.

use crate::types::scroll::ScrollEntry;

pub const DEFAULT_CAPACITY: usize = 50;

/// Maps page url to its last known scroll offset.
///
/// Entries are unique by url and ordered most-recently-recorded first; once
/// `capacity` is exceeded the oldest entries are dropped.
#[derive(Debug, Clone)]
pub struct ScrollHistoryCache {
    entries: Vec<ScrollEntry>,
    capacity: usize,
}

impl ScrollHistoryCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Records `scroll_top` for `url`. Returns `false` when the stored value
    /// was already identical and nothing changed.
    pub fn record(&mut self, url: &str, scroll_top: f64) -> bool {
        if self.get(url) == Some(scroll_top) {
            return false;
        }

        self.entries.retain(|e| e.url != url);
        self.entries.insert(
            0,
            ScrollEntry {
                url: url.to_string(),
                scroll_top,
            },
        );
        self.entries.truncate(self.capacity);
        true
    }

    pub fn get(&self, url: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|e| e.url == url)
            .map(|e| e.scroll_top)
    }

    pub fn entries(&self) -> &[ScrollEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for ScrollHistoryCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
