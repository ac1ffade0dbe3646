//! # Crawl Orchestrator
//!
//! Owns the DOM session for one run: acquires it, walks every category
//! through the [`CategoryCrawler`], persists per-category and merged
//! results, and closes the session on every path out of the crawl.

#![allow(clippy::uninlined_format_args)]

use std::path::PathBuf;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::application::aggregator::Aggregator;
use crate::application::category_crawler::{CategoryCrawler, CategoryStats};
use crate::domain::category::{CategoryDescriptor, CategoryError};
use crate::infrastructure::config::{AppConfig, ConfigError, CrawlPolicy, OutputSettings};
use crate::infrastructure::dom::{DomError, DomPort, SessionProvider};
use crate::infrastructure::export::{ExportError, Exporter};
use crate::infrastructure::sites::{SiteError, SiteProfile};

/// Failures that end a run
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Site setup failed: {0}")]
    Site(#[from] SiteError),

    #[error("Invalid category: {0}")]
    Category(#[from] CategoryError),

    #[error("No categories to crawl")]
    NoCategories,

    #[error("Failed to acquire a DOM session: {0}")]
    Session(#[source] DomError),

    #[error("Failed to persist merged results: {0}")]
    Persist(#[from] ExportError),
}

/// Summary of one run, logged at the end and optionally written as JSON
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub site: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub policy: CrawlPolicy,
    pub categories: Vec<CategoryStats>,
    /// Records after per-category dedup, summed
    pub records_gathered: usize,
    /// Records after the run-wide dedup
    pub records_merged: usize,
    pub files: Vec<PathBuf>,
}

impl RunReport {
    fn new(site: &str, policy: CrawlPolicy) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            site: site.to_string(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            elapsed_ms: 0,
            policy,
            categories: Vec::new(),
            records_gathered: 0,
            records_merged: 0,
            files: Vec::new(),
        }
    }

    pub fn partial_categories(&self) -> usize {
        self.categories.iter().filter(|c| c.is_partial()).count()
    }

    pub fn log_summary(&self) {
        info!("📋 Run {} ({}) finished in {}ms", self.run_id, self.site, self.elapsed_ms);
        for stats in &self.categories {
            match &stats.stop {
                None => info!(
                    "  ✅ {}: {} records, {}/{} pages",
                    stats.category, stats.records_kept, stats.pages_crawled, stats.pages_total
                ),
                Some(stop) => warn!(
                    "  ⚠️ {}: {} records, {}/{} pages ({})",
                    stats.category, stats.records_kept, stats.pages_crawled, stats.pages_total, stop
                ),
            }
        }
        info!(
            "📦 {} records gathered, {} after dedup, {} partial categories",
            self.records_gathered,
            self.records_merged,
            self.partial_categories()
        );
    }
}

/// Which optional files a run writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistOptions {
    pub partial: bool,
    pub categories: bool,
    pub report: bool,
}

impl Default for PersistOptions {
    fn default() -> Self {
        Self {
            partial: true,
            categories: true,
            report: true,
        }
    }
}

impl From<&OutputSettings> for PersistOptions {
    fn from(settings: &OutputSettings) -> Self {
        Self {
            partial: settings.persist_partial,
            categories: settings.write_categories,
            report: settings.run_report,
        }
    }
}

/// Holds the run's session; dropping it unclosed (a panic inside the
/// crawl) still releases the session
struct SessionScope<S: DomPort> {
    session: S,
    closed: bool,
}

impl<S: DomPort> SessionScope<S> {
    fn new(session: S) -> Self {
        Self { session, closed: false }
    }

    async fn close(&mut self) {
        if let Err(e) = self.session.close().await {
            warn!("⚠️ Failed to close DOM session: {}", e);
        }
        self.closed = true;
    }
}

impl<S: DomPort> Drop for SessionScope<S> {
    fn drop(&mut self) {
        if !self.closed {
            warn!("⚠️ DOM session dropped without close; releasing");
            self.session.release();
        }
    }
}

pub struct CrawlOrchestrator<P: SessionProvider> {
    provider: P,
    site: SiteProfile,
    policy: CrawlPolicy,
    exporter: Exporter,
    options: PersistOptions,
}

impl<P: SessionProvider> CrawlOrchestrator<P> {
    pub fn new(provider: P, site: SiteProfile, policy: CrawlPolicy, exporter: Exporter) -> Self {
        Self {
            provider,
            site,
            policy,
            exporter,
            options: PersistOptions::default(),
        }
    }

    /// Site, policy and output layout from a loaded configuration
    pub fn from_config(provider: P, config: &AppConfig) -> Result<Self, RunError> {
        let site = config.resolve_site()?;
        let policy = config.policy_for(&site);
        let exporter = Exporter::from_settings(&config.output, &site);
        Ok(Self::new(provider, site, policy, exporter).with_options(PersistOptions::from(&config.output)))
    }

    #[must_use]
    pub fn with_options(mut self, options: PersistOptions) -> Self {
        self.options = options;
        self
    }

    pub fn site(&self) -> &SiteProfile {
        &self.site
    }

    pub fn policy(&self) -> &CrawlPolicy {
        &self.policy
    }

    /// Crawl `categories` in order and persist the results
    pub async fn run(&self, categories: &[CategoryDescriptor]) -> Result<RunReport, RunError> {
        if categories.is_empty() {
            return Err(RunError::NoCategories);
        }
        for category in categories {
            category.validate()?;
        }
        let crawler = CategoryCrawler::new(&self.site, self.policy)?;
        let started = Instant::now();
        let mut report = RunReport::new(&self.site.name, self.policy);

        info!(
            "🚀 Starting {} run {}: {} categories, dedup by {}",
            self.site.name,
            report.run_id,
            categories.len(),
            self.policy.dedup_key
        );

        if self.options.categories {
            match self.exporter.write_categories(categories) {
                Ok(path) => report.files.push(path),
                Err(e) => warn!("⚠️ Could not write category list: {}", e),
            }
        }

        let mut scope = SessionScope::new(self.provider.acquire().await.map_err(RunError::Session)?);
        let aggregator = self.crawl_all(&mut scope.session, &crawler, categories, &mut report).await;
        scope.close().await;
        drop(scope);

        let merged = aggregator.merged();
        report.records_gathered = aggregator.gathered().len();
        report.records_merged = merged.len();

        if merged.is_empty() {
            warn!("⚠️ No records collected; merged files not written");
        } else {
            let written = self.exporter.write_merged(&merged).map_err(|e| {
                error!("❌ Failed to save merged results: {}", e);
                RunError::Persist(e)
            })?;
            report.files.extend(written);
        }

        report.finished_at = Utc::now();
        report.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        if self.options.report {
            match self.exporter.write_report(&report) {
                Ok(path) => report.files.push(path),
                Err(e) => warn!("⚠️ Could not write run report: {}", e),
            }
        }
        report.log_summary();
        Ok(report)
    }

    /// Category loop; per-category problems never escape it
    async fn crawl_all(
        &self,
        session: &mut P::Session,
        crawler: &CategoryCrawler,
        categories: &[CategoryDescriptor],
        report: &mut RunReport,
    ) -> Aggregator {
        let mut aggregator = Aggregator::new(self.policy.dedup_key);

        for (index, category) in categories.iter().enumerate() {
            if index > 0 {
                let delay = self.policy.inter_category_delay.wait().await;
                info!("⏳ Waited {:?} before the next category", delay);
            }
            info!(
                "📂 [{}/{}] {} ({})",
                index + 1,
                categories.len(),
                category.full_name(),
                category.url
            );

            let outcome = crawler.crawl(session, category).await;
            let mut stats = outcome.stats;
            let kept = aggregator.add(outcome.records);
            stats.records_kept = kept.len();

            match self.exporter.write_category(category, kept) {
                Ok(paths) => report.files.extend(paths),
                Err(e) => warn!("⚠️ [{}] Could not save category files: {}", category.full_name(), e),
            }

            if self.options.partial {
                match self.exporter.write_partial(aggregator.gathered()) {
                    Ok(Some(path)) => {
                        if !report.files.contains(&path) {
                            report.files.push(path);
                        }
                    }
                    Ok(None) => {}
                    Err(e) => warn!("⚠️ Could not save partial results: {}", e),
                }
            }
            report.categories.push(stats);
        }
        aggregator
    }
}
