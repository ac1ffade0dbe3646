//! Category crawl loop
//!
//! Runs one category from its first listing page to its last (or until a
//! page-level stop), building a record per item. A stop only ends the
//! remaining pages; everything gathered before it is kept.

#![allow(clippy::uninlined_format_args)]

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::application::page_navigator::PageNavigator;
use crate::domain::category::CategoryDescriptor;
use crate::domain::pagination::PageState;
use crate::domain::product::ProductRecord;
use crate::infrastructure::config::CrawlPolicy;
use crate::infrastructure::dom::{DomError, DomPort, ElementHandle, Scope};
use crate::infrastructure::parsing::ProductRecordBuilder;
use crate::infrastructure::sites::{ListingProfile, SiteError, SiteProfile};

/// Why a category ended before its last page
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CrawlStop {
    #[error("Could not open {url}: {reason}")]
    OpenFailed { url: String, reason: String },

    #[error("Listing did not appear on page {page}: {reason}")]
    PageWaitTimeout { page: u32, reason: String },

    #[error("Every navigation strategy failed to reach page {page}")]
    NavigationExhausted { page: u32 },

    #[error("Listing on page {page} could not be read: {reason}")]
    ListingFailed { page: u32, reason: String },
}

impl CrawlStop {
    /// Page the stop happened on; `None` before the first page was loaded
    pub const fn page(&self) -> Option<u32> {
        match self {
            Self::OpenFailed { .. } => None,
            Self::PageWaitTimeout { page, .. }
            | Self::NavigationExhausted { page }
            | Self::ListingFailed { page, .. } => Some(*page),
        }
    }

    fn from_listing_wait(page: u32, error: DomError) -> Self {
        match error {
            DomError::WaitTimeout { .. } => Self::PageWaitTimeout {
                page,
                reason: error.to_string(),
            },
            other => Self::ListingFailed {
                page,
                reason: other.to_string(),
            },
        }
    }
}

/// Counters of one category crawl
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategoryStats {
    pub category: String,
    pub url: String,
    pub total_items: u32,
    pub pages_total: u32,
    pub pages_crawled: u32,
    /// Item scopes found on the listing pages
    pub items_found: usize,
    /// Items whose extraction failed
    pub items_skipped: usize,
    /// Items built without a name or URL
    pub items_discarded: usize,
    /// Records left after the per-category dedup
    pub records_kept: usize,
    pub stop: Option<CrawlStop>,
}

impl CategoryStats {
    pub fn is_partial(&self) -> bool {
        self.stop.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct CategoryOutcome {
    pub records: Vec<ProductRecord>,
    pub stats: CategoryStats,
}

impl CategoryOutcome {
    fn new(category: &CategoryDescriptor) -> Self {
        Self {
            records: Vec::new(),
            stats: CategoryStats {
                category: category.full_name(),
                url: category.url.clone(),
                ..CategoryStats::default()
            },
        }
    }

    pub fn is_partial(&self) -> bool {
        self.stats.is_partial()
    }
}

pub struct CategoryCrawler {
    navigator: PageNavigator,
    builder: ProductRecordBuilder,
    listing: ListingProfile,
    policy: CrawlPolicy,
}

impl CategoryCrawler {
    pub fn new(site: &SiteProfile, policy: CrawlPolicy) -> Result<Self, SiteError> {
        let builder = ProductRecordBuilder::new(site.plan.clone()).map_err(|source| SiteError::Plan {
            site: site.name.clone(),
            source,
        })?;
        Ok(Self {
            navigator: PageNavigator::new(site, policy)?,
            builder,
            listing: site.listing.clone(),
            policy,
        })
    }

    pub fn navigator(&self) -> &PageNavigator {
        &self.navigator
    }

    /// Crawl every page of `category`; never fails, stops are reported in the outcome
    pub async fn crawl<D: DomPort + ?Sized>(&self, dom: &mut D, category: &CategoryDescriptor) -> CategoryOutcome {
        let name = category.full_name();
        let mut outcome = CategoryOutcome::new(category);
        let mut state = PageState::new(name.clone());

        if let Err(stop) = self.navigator.open(dom, category).await {
            warn!("❌ [{}] {}", name, stop);
            state.finish();
            outcome.stats.stop = Some(stop);
            return outcome;
        }

        self.navigator.discover(dom, &mut state).await;
        outcome.stats.total_items = state.total_items;
        outcome.stats.pages_total = state.total_pages;

        while state.begin_listing() {
            let page = state.current_page;
            match self.collect_page(dom, page, category, &mut outcome).await {
                Ok(found) => {
                    state.record_items(found);
                    outcome.stats.pages_crawled += 1;
                    info!(
                        "📄 [{}] page {}/{}: {} items, {} records so far",
                        name,
                        page,
                        state.total_pages,
                        found,
                        outcome.records.len()
                    );
                }
                Err(stop) => {
                    warn!("⚠️ [{}] {}; keeping {} records", name, stop, outcome.records.len());
                    outcome.stats.stop = Some(stop);
                    state.finish();
                    break;
                }
            }

            if !state.has_next_page() {
                state.finish();
                break;
            }
            if let Err(stop) = self.navigator.advance(dom, &mut state).await {
                warn!("⚠️ [{}] {}; keeping {} records", name, stop, outcome.records.len());
                outcome.stats.stop = Some(stop);
                break;
            }
            let delay = self.policy.inter_page_delay.wait().await;
            debug!("[{}] waited {:?} before page {}", name, delay, state.current_page);
        }

        info!(
            "✅ [{}] {} records from {}/{} pages ({} skipped, {} discarded)",
            name,
            outcome.records.len(),
            outcome.stats.pages_crawled,
            outcome.stats.pages_total,
            outcome.stats.items_skipped,
            outcome.stats.items_discarded
        );
        outcome
    }

    /// Item scopes of the loaded page from the first item selector that matches
    async fn find_items<D: DomPort + ?Sized>(&self, dom: &mut D) -> Result<Vec<ElementHandle>, DomError> {
        let mut last_error = None;
        for selector in &self.listing.item_selectors {
            match dom.query(Scope::Page, selector).await {
                Ok(items) if !items.is_empty() => {
                    debug!("Item selector '{}' matched {} items", selector, items.len());
                    return Ok(items);
                }
                Ok(_) => {}
                Err(e) if e.is_recoverable() => last_error = Some(e),
                Err(e) => return Err(e),
            }
        }
        match last_error {
            Some(e) => Err(e),
            None => Ok(Vec::new()),
        }
    }

    /// Wait for the listing, then build every item; returns the item count
    async fn collect_page<D: DomPort + ?Sized>(
        &self,
        dom: &mut D,
        page: u32,
        category: &CategoryDescriptor,
        outcome: &mut CategoryOutcome,
    ) -> Result<usize, CrawlStop> {
        dom.wait_for(&self.listing.wait_selector, self.policy.page_wait_timeout)
            .await
            .map_err(|e| CrawlStop::from_listing_wait(page, e))?;

        let items = self.find_items(dom).await.map_err(|e| CrawlStop::ListingFailed {
            page,
            reason: e.to_string(),
        })?;
        outcome.stats.items_found += items.len();

        let tag = category.tag();
        for (index, item) in items.iter().enumerate() {
            match self.builder.build(dom, *item).await {
                Ok(mut record) => {
                    if !record.has_identity() {
                        outcome.stats.items_discarded += 1;
                        debug!("[{}] item {} on page {} has no name or URL", tag.full, index + 1, page);
                        continue;
                    }
                    record.tag_category(tag.clone());
                    outcome.records.push(record);
                }
                Err(e) => {
                    outcome.stats.items_skipped += 1;
                    debug!("[{}] item {} on page {} skipped: {}", tag.full, index + 1, page, e);
                }
            }
        }
        Ok(items.len())
    }
}
