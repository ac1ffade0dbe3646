//! Page Navigator
//!
//! Discovers how many items and pages a category listing has and moves from
//! page N to N+1 through the site's ordered strategy chain. The first
//! strategy that works ends the chain.

#![allow(clippy::uninlined_format_args)]

use regex::Regex;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::application::category_crawler::CrawlStop;
use crate::domain::category::CategoryDescriptor;
use crate::domain::pagination::{PageState, apply_cap, estimate_pages, max_page_label};
use crate::infrastructure::config::CrawlPolicy;
use crate::infrastructure::dom::{DomError, DomPort, Scope};
use crate::infrastructure::sites::{AdvanceStrategy, NavigationProfile, SiteError, SiteProfile};

/// Why a single advance strategy did not work
#[derive(Error, Debug)]
enum AdvanceFailure {
    #[error("no control labelled '{0}'")]
    NoControl(String),

    #[error("site has no next control")]
    NotConfigured,

    #[error("no page is loaded")]
    NoCurrentUrl,

    #[error("current URL cannot be rewritten: {0}")]
    BadUrl(#[from] url::ParseError),

    #[error(transparent)]
    Dom(#[from] DomError),
}

/// `current` with its `param` query value set to `page`; other pairs keep their order
pub fn page_url(current: &str, param: &str, page: u32) -> Result<String, url::ParseError> {
    let mut url = Url::parse(current)?;
    let mut replaced = false;
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            if k == param {
                replaced = true;
                (k.into_owned(), page.to_string())
            } else {
                (k.into_owned(), v.into_owned())
            }
        })
        .collect();
    {
        let mut query = url.query_pairs_mut();
        query.clear();
        query.extend_pairs(&pairs);
        if !replaced {
            query.append_pair(param, &page.to_string());
        }
    }
    Ok(url.into())
}

/// Item count from indicator text; anything unreadable counts as 0
pub fn parse_total_count(text: &str, pattern: Option<&Regex>) -> u32 {
    let raw = match pattern {
        Some(regex) => regex
            .captures(text)
            .and_then(|caps| caps.get(1).or_else(|| caps.get(0)))
            .map(|m| m.as_str()),
        None => Some(text),
    };
    raw.map(|s| s.trim().replace(',', ""))
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}

pub struct PageNavigator {
    navigation: NavigationProfile,
    total_pattern: Option<Regex>,
    policy: CrawlPolicy,
}

impl PageNavigator {
    pub fn new(site: &SiteProfile, policy: CrawlPolicy) -> Result<Self, SiteError> {
        let total_pattern = site
            .navigation
            .total_count
            .pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|e| SiteError::Invalid {
                site: site.name.clone(),
                message: format!("total count pattern: {}", e),
            })?;
        Ok(Self {
            navigation: site.navigation.clone(),
            total_pattern,
            policy,
        })
    }

    /// Load the first listing page of `category`
    pub async fn open<D: DomPort + ?Sized>(&self, dom: &mut D, category: &CategoryDescriptor) -> Result<(), CrawlStop> {
        dom.navigate(&category.url).await.map_err(|e| CrawlStop::OpenFailed {
            url: category.url.clone(),
            reason: e.to_string(),
        })?;
        self.policy.page_settle_delay.wait().await;
        Ok(())
    }

    /// Total item count, 0 when the indicator is missing or unreadable
    pub async fn discover_total_items<D: DomPort + ?Sized>(&self, dom: &mut D) -> u32 {
        let rule = &self.navigation.total_count;
        let element = match dom.wait_for(&rule.selector, self.policy.count_wait_timeout).await {
            Ok(element) => element,
            Err(e) => {
                debug!("Total count indicator unavailable: {}", e);
                return 0;
            }
        };
        match dom.text(element).await {
            Ok(text) => parse_total_count(&text, self.total_pattern.as_ref()),
            Err(e) => {
                debug!("Total count indicator unreadable: {}", e);
                0
            }
        }
    }

    /// Largest numeric pagination label, else the estimate from `total_items`; capped
    pub async fn discover_total_pages<D: DomPort + ?Sized>(&self, dom: &mut D, total_items: u32) -> u32 {
        let mut labels = Vec::new();
        match dom.query(Scope::Page, &self.navigation.pagination_links).await {
            Ok(links) => {
                for link in links {
                    if let Ok(text) = dom.text(link).await {
                        labels.push(text);
                    }
                }
            }
            Err(e) => debug!("Pagination links unavailable: {}", e),
        }

        let computed = match max_page_label(&labels) {
            Some(max) => {
                debug!("📄 Pagination links report {} pages", max);
                max
            }
            None => {
                let estimate = estimate_pages(total_items, self.policy.page_size);
                debug!(
                    "📄 No usable pagination links, estimating {} pages from {} items",
                    estimate, total_items
                );
                estimate
            }
        };
        apply_cap(computed, self.policy.max_pages)
    }

    /// Fill in total items and total pages
    pub async fn discover<D: DomPort + ?Sized>(&self, dom: &mut D, state: &mut PageState) {
        let total_items = self.discover_total_items(dom).await;
        state.count_known(total_items);
        let total_pages = self.discover_total_pages(dom, total_items).await;
        state.pages_known(total_pages);
        info!(
            "📊 [{}] {} items over {} pages",
            state.category, total_items, total_pages
        );
    }

    /// Move to the next page, trying each strategy in order
    pub async fn advance<D: DomPort + ?Sized>(
        &self,
        dom: &mut D,
        state: &mut PageState,
    ) -> Result<AdvanceStrategy, CrawlStop> {
        let target = state.begin_advance();
        for &strategy in &self.navigation.advance_order {
            match self.try_strategy(dom, strategy, target).await {
                Ok(()) => {
                    self.policy.page_settle_delay.wait().await;
                    state.advanced();
                    debug!("➡️ [{}] page {} via {}", state.category, target, strategy);
                    return Ok(strategy);
                }
                Err(e) => debug!("[{}] {} to page {} failed: {}", state.category, strategy, target, e),
            }
        }
        warn!("🛑 [{}] every navigation strategy failed for page {}", state.category, target);
        state.finish();
        Err(CrawlStop::NavigationExhausted { page: target })
    }

    async fn try_strategy<D: DomPort + ?Sized>(
        &self,
        dom: &mut D,
        strategy: AdvanceStrategy,
        target: u32,
    ) -> Result<(), AdvanceFailure> {
        match strategy {
            AdvanceStrategy::ClickPageNumber => {
                let label = target.to_string();
                self.click_labelled(dom, &self.navigation.pagination_links, &[label]).await
            }
            AdvanceStrategy::RewriteUrl => {
                let current = dom.current_url().ok_or(AdvanceFailure::NoCurrentUrl)?;
                let next = page_url(&current, &self.navigation.page_param, target)?;
                dom.navigate(&next).await?;
                Ok(())
            }
            AdvanceStrategy::ClickNext => {
                let next = self.navigation.next_control.as_ref().ok_or(AdvanceFailure::NotConfigured)?;
                self.click_labelled(dom, &next.selector, &next.labels).await
            }
        }
    }

    /// Click the first element under `selector` whose text matches one of `labels`
    async fn click_labelled<D: DomPort + ?Sized>(
        &self,
        dom: &mut D,
        selector: &str,
        labels: &[String],
    ) -> Result<(), AdvanceFailure> {
        let wanted: Vec<String> = labels.iter().map(|l| l.trim().to_lowercase()).collect();
        for element in dom.query(Scope::Page, selector).await? {
            let Ok(text) = dom.text(element).await else {
                continue;
            };
            if wanted.contains(&text.trim().to_lowercase()) {
                dom.click(element).await?;
                return Ok(());
            }
        }
        Err(AdvanceFailure::NoControl(labels.join("|")))
    }
}
