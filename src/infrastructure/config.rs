//! Configuration infrastructure
//!
//! Layered the usual way: built-in defaults, then an optional config file
//! (TOML / JSON / YAML by extension), then `SHOP_CRAWLER__*` environment
//! variables (`SHOP_CRAWLER__CRAWL__MAX_PAGES_PER_CATEGORY=2`).
//!
//! Per-site values (page size, delays, dedup key) come from the site profile
//! and may be overridden in `[crawl]`.

#![allow(clippy::uninlined_format_args)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::category::CategoryDescriptor;
use crate::domain::dedup::DedupKey;
use crate::domain::delay::DelayRange;
use crate::infrastructure::http_client::HttpClientConfig;
use crate::infrastructure::sites::{SiteError, SiteProfile};

/// Environment variable prefix
pub const ENV_PREFIX: &str = "SHOP_CRAWLER";

pub mod defaults {
    /// Bound on waiting for the listing container
    pub const PAGE_WAIT_TIMEOUT_MS: u64 = 10_000;

    /// Bound on waiting for the total item count indicator
    pub const COUNT_WAIT_TIMEOUT_MS: u64 = 10_000;

    /// Delay between categories (seconds)
    pub const INTER_CATEGORY_DELAY_MIN_SECS: u64 = 5;
    pub const INTER_CATEGORY_DELAY_MAX_SECS: u64 = 10;

    pub const OUTPUT_DIR: &str = "output";
    pub const CATEGORY_DIR: &str = "category_data";

    pub const SITE: &str = "joamom";
    pub const LOG_LEVEL: &str = "info";
    pub const LOG_FILE_NAME: &str = "shop-crawler.log";
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config: {source}")]
    FileLoad {
        #[from]
        source: config::ConfigError,
    },

    #[error("Configuration validation failed: {message}")]
    Validation { message: String },

    #[error(transparent)]
    Site(#[from] SiteError),
}

impl ConfigError {
    fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Built-in site preset name
    pub site: String,

    /// Full custom site profile; replaces the preset when present
    pub site_profile: Option<SiteProfile>,

    /// Categories to crawl, in order
    pub categories: Vec<CategoryDescriptor>,

    pub crawl: CrawlSettings,

    pub output: OutputSettings,

    pub http: HttpClientConfig,

    pub logging: LoggingConfig,
}

/// Crawl behaviour; `None` means "use the site profile's value"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlSettings {
    /// Upper bound on pages per category (>= 1)
    pub max_pages_per_category: Option<u32>,

    /// Items per page for page estimation
    pub assumed_page_size: Option<u32>,

    pub page_settle_delay: Option<DelayRange>,

    pub inter_page_delay: Option<DelayRange>,

    pub inter_category_delay: DelayRange,

    pub dedup_key: Option<DedupKey>,

    pub page_wait_timeout_ms: u64,

    pub count_wait_timeout_ms: u64,
}

/// Where and what to write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub dir: PathBuf,

    /// Sub-directory of `dir` for per-category files
    pub category_dir: String,

    /// Also write .xlsx next to every .csv
    pub spreadsheet: bool,

    /// Rewrite the partial merged file after every category
    pub persist_partial: bool,

    /// Write the category list before crawling
    pub write_categories: bool,

    /// Use the site's header labels instead of field keys
    pub use_site_labels: bool,

    /// Write a JSON run report at the end
    pub run_report: bool,
}

/// Logging configuration settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Enable JSON formatted file logs
    pub json_format: bool,

    pub console_output: bool,

    pub file_output: bool,

    /// Log directory; next to the executable when unset
    pub log_dir: Option<PathBuf>,

    pub file_name: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            site: defaults::SITE.to_string(),
            site_profile: None,
            categories: Vec::new(),
            crawl: CrawlSettings::default(),
            output: OutputSettings::default(),
            http: HttpClientConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            max_pages_per_category: None,
            assumed_page_size: None,
            page_settle_delay: None,
            inter_page_delay: None,
            inter_category_delay: DelayRange::from_secs(
                defaults::INTER_CATEGORY_DELAY_MIN_SECS,
                defaults::INTER_CATEGORY_DELAY_MAX_SECS,
            ),
            dedup_key: None,
            page_wait_timeout_ms: defaults::PAGE_WAIT_TIMEOUT_MS,
            count_wait_timeout_ms: defaults::COUNT_WAIT_TIMEOUT_MS,
        }
    }
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(defaults::OUTPUT_DIR),
            category_dir: defaults::CATEGORY_DIR.to_string(),
            spreadsheet: true,
            persist_partial: true,
            write_categories: true,
            use_site_labels: true,
            run_report: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: false,
            console_output: true,
            file_output: false,
            log_dir: None,
            file_name: defaults::LOG_FILE_NAME.to_string(),
        }
    }
}

impl AppConfig {
    /// Defaults, then `path` (if any), then environment; validated
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder().add_source(config::Config::try_from(&Self::default())?);
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a config document directly (no environment layer)
    pub fn from_document(contents: &str, format: config::FileFormat) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&Self::default())?)
            .add_source(config::File::from_str(contents, format))
            .build()?;
        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let crawl = &self.crawl;
        if crawl.max_pages_per_category == Some(0) {
            return Err(ConfigError::validation("max_pages_per_category must be at least 1"));
        }
        if crawl.assumed_page_size == Some(0) {
            return Err(ConfigError::validation("assumed_page_size must be at least 1"));
        }
        let ranges = [
            ("page_settle_delay", crawl.page_settle_delay),
            ("inter_page_delay", crawl.inter_page_delay),
            ("inter_category_delay", Some(crawl.inter_category_delay)),
        ];
        for (name, range) in ranges {
            if let Some(range) = range {
                if !range.is_valid() {
                    return Err(ConfigError::validation(format!(
                        "{} min_ms ({}) cannot be greater than max_ms ({})",
                        name, range.min_ms, range.max_ms
                    )));
                }
            }
        }
        if crawl.page_wait_timeout_ms == 0 {
            return Err(ConfigError::validation("page_wait_timeout_ms must be greater than 0"));
        }
        for (index, category) in self.categories.iter().enumerate() {
            category
                .validate()
                .map_err(|e| ConfigError::validation(format!("categories[{}]: {}", index, e)))?;
        }
        if self.output.category_dir.trim().is_empty() {
            return Err(ConfigError::validation("output.category_dir must not be empty"));
        }
        self.resolve_site()?;
        Ok(())
    }

    /// The site profile this run uses, validated
    pub fn resolve_site(&self) -> Result<SiteProfile, ConfigError> {
        let site = match &self.site_profile {
            Some(profile) => profile.clone(),
            None => SiteProfile::preset(&self.site)?,
        };
        site.validate()?;
        Ok(site)
    }

    /// Effective crawl policy for `site`
    pub fn policy_for(&self, site: &SiteProfile) -> CrawlPolicy {
        let crawl = &self.crawl;
        CrawlPolicy {
            max_pages: crawl.max_pages_per_category.or(site.max_pages),
            page_size: crawl.assumed_page_size.unwrap_or(site.page_size),
            page_settle_delay: crawl.page_settle_delay.unwrap_or(site.page_settle_delay),
            inter_page_delay: crawl.inter_page_delay.unwrap_or(site.inter_page_delay),
            inter_category_delay: crawl.inter_category_delay,
            dedup_key: crawl.dedup_key.unwrap_or(site.dedup_key),
            page_wait_timeout: Duration::from_millis(crawl.page_wait_timeout_ms),
            count_wait_timeout: Duration::from_millis(crawl.count_wait_timeout_ms),
        }
    }
}

/// Resolved per-run crawl policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CrawlPolicy {
    pub max_pages: Option<u32>,
    pub page_size: u32,
    pub page_settle_delay: DelayRange,
    pub inter_page_delay: DelayRange,
    pub inter_category_delay: DelayRange,
    pub dedup_key: DedupKey,
    pub page_wait_timeout: Duration,
    pub count_wait_timeout: Duration,
}

impl CrawlPolicy {
    /// Policy of `site` with default crawl settings
    pub fn for_site(site: &SiteProfile) -> Self {
        AppConfig::default().policy_for(site)
    }

    /// Same policy with every delay set to zero (replaying saved pages)
    #[must_use]
    pub fn without_delays(mut self) -> Self {
        self.page_settle_delay = DelayRange::ZERO;
        self.inter_page_delay = DelayRange::ZERO;
        self.inter_category_delay = DelayRange::ZERO;
        self
    }
}
