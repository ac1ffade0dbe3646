//! Pagination math and per-category page state
//!
//! `PageState` follows
//! `Start → CountKnown → PagesKnown → {Listing(k) → Advancing(k+1) → Listing(k+1)}* → Done`.
//! Any phase can jump to `Done`; records gathered before that are kept by the caller.

use serde::Serialize;

/// Pages needed for `total_items` at `page_size` per page, never below 1
pub fn estimate_pages(total_items: u32, page_size: u32) -> u32 {
    if page_size == 0 {
        return 1;
    }
    total_items.div_ceil(page_size).max(1)
}

/// Highest numeric label among pagination link texts; non-numeric labels are ignored
pub fn max_page_label<I, S>(labels: I) -> Option<u32>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    labels
        .into_iter()
        .filter_map(|label| label.as_ref().trim().parse::<u32>().ok())
        .filter(|n| *n > 0)
        .max()
}

/// Clamp the computed page total to an optional cap; never increases it
pub fn apply_cap(total_pages: u32, cap: Option<u32>) -> u32 {
    match cap {
        Some(cap) => total_pages.min(cap),
        None => total_pages,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", content = "page", rename_all = "snake_case")]
pub enum CrawlPhase {
    Start,
    CountKnown,
    PagesKnown,
    Listing(u32),
    Advancing(u32),
    Done,
}

/// Where a category crawl currently is
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageState {
    pub category: String,
    /// 1-based
    pub current_page: u32,
    pub total_pages: u32,
    pub total_items: u32,
    pub items_seen: usize,
    phase: CrawlPhase,
}

impl PageState {
    pub fn new(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            current_page: 1,
            total_pages: 0,
            total_items: 0,
            items_seen: 0,
            phase: CrawlPhase::Start,
        }
    }

    pub const fn phase(&self) -> CrawlPhase {
        self.phase
    }

    pub fn count_known(&mut self, total_items: u32) {
        self.total_items = total_items;
        self.phase = CrawlPhase::CountKnown;
    }

    pub fn pages_known(&mut self, total_pages: u32) {
        self.total_pages = total_pages;
        self.phase = CrawlPhase::PagesKnown;
    }

    /// Enter listing for the current page; `false` once past the last page
    pub fn begin_listing(&mut self) -> bool {
        if self.phase == CrawlPhase::Done || self.current_page > self.total_pages {
            self.phase = CrawlPhase::Done;
            return false;
        }
        self.phase = CrawlPhase::Listing(self.current_page);
        true
    }

    pub fn record_items(&mut self, count: usize) {
        self.items_seen += count;
    }

    pub const fn has_next_page(&self) -> bool {
        self.current_page < self.total_pages
    }

    /// Enter advancing and return the target page
    pub fn begin_advance(&mut self) -> u32 {
        let target = self.current_page + 1;
        self.phase = CrawlPhase::Advancing(target);
        target
    }

    /// The advance to the target page succeeded
    pub fn advanced(&mut self) {
        if let CrawlPhase::Advancing(target) = self.phase {
            self.current_page = target;
        }
    }

    pub fn finish(&mut self) {
        self.phase = CrawlPhase::Done;
    }

    pub fn is_done(&self) -> bool {
        self.phase == CrawlPhase::Done
    }
}
