//! Application layer
//!
//! The crawl engine: page navigation, the per-category loop, aggregation
//! across categories and the run orchestrator that owns the DOM session.

pub mod aggregator;
pub mod category_crawler;
pub mod crawl_orchestrator;
pub mod page_navigator;

pub use aggregator::Aggregator;
pub use category_crawler::{CategoryCrawler, CategoryOutcome, CategoryStats, CrawlStop};
pub use crawl_orchestrator::{CrawlOrchestrator, PersistOptions, RunError, RunReport};
pub use page_navigator::PageNavigator;
