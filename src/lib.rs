//! shop-crawler - config-driven category crawler for shopping-mall listings
//!
//! One engine walks every page of every configured category, extracts a
//! per-site set of product fields with ordered fallback lookups, deduplicates
//! the result and writes CSV / XLSX files.
//!
//! Layers:
//! - [`domain`]: categories, typed product records, dedup, pagination math
//! - [`infrastructure`]: DOM port and its adapters, extraction plans, site
//!   presets, configuration, logging, export
//! - [`application`]: navigator, category crawl loop, aggregator, run orchestration

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::crawl_orchestrator::{CrawlOrchestrator, RunError, RunReport};
pub use domain::category::CategoryDescriptor;
pub use domain::dedup::{DedupKey, dedup};
pub use domain::product::{Field, ProductRecord};
pub use infrastructure::config::AppConfig;
pub use infrastructure::sites::SiteProfile;
