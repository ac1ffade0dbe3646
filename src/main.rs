//! shop-crawler command line
//!
//! ```bash
//! shop-crawler --config crawl.toml --site closhoew --max-pages 2
//! shop-crawler --site joamom --category "OUTER > 코트=https://joamom.test/product/list.html?cate_no=24"
//! ```

#![allow(clippy::uninlined_format_args)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::{error, info};

use shop_crawler_lib::domain::category::{CategoryDescriptor, PATH_SEPARATOR};
use shop_crawler_lib::infrastructure::logging::init_logging_with_config;
use shop_crawler_lib::infrastructure::sites::PRESET_NAMES;
use shop_crawler_lib::infrastructure::{HtmlSessionProvider, HttpClient};
use shop_crawler_lib::{AppConfig, CrawlOrchestrator};

#[derive(Parser, Debug)]
#[command(name = "shop-crawler")]
#[command(about = "Crawl shopping-mall category listings into CSV / XLSX files")]
#[command(version)]
struct Cli {
    /// Config file (TOML, JSON or YAML)
    #[arg(short, long, env = "SHOP_CRAWLER_CONFIG")]
    config: Option<PathBuf>,

    /// Site preset to crawl
    #[arg(short, long)]
    site: Option<String>,

    /// Stop each category after this many pages
    #[arg(long)]
    max_pages: Option<u32>,

    /// Directory for output files
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Extra category as "MAIN > SUB=URL"; repeatable
    #[arg(long = "category", value_parser = parse_category)]
    categories: Vec<CategoryDescriptor>,

    /// Skip .xlsx output
    #[arg(long)]
    no_spreadsheet: bool,

    /// Print the built-in site presets and exit
    #[arg(long)]
    list_sites: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// "OUTER > 코트=https://..." → descriptor; the URL keeps any later '='
fn parse_category(arg: &str) -> Result<CategoryDescriptor, String> {
    let (path, url) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected \"PATH=URL\", got '{}'", arg))?;
    let segments: Vec<&str> = path.split(PATH_SEPARATOR.trim()).map(str::trim).collect();
    CategoryDescriptor::new(segments, url.trim()).map_err(|e| e.to_string())
}

impl Cli {
    fn apply(self, config: &mut AppConfig) {
        if let Some(site) = self.site {
            config.site = site;
            config.site_profile = None;
        }
        if let Some(max_pages) = self.max_pages {
            config.crawl.max_pages_per_category = Some(max_pages);
        }
        if let Some(dir) = self.output_dir {
            config.output.dir = dir;
        }
        if self.no_spreadsheet {
            config.output.spreadsheet = false;
        }
        if self.verbose {
            config.logging.level = "debug".to_string();
        }
        config.categories.extend(self.categories);
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.list_sites {
        for name in PRESET_NAMES {
            println!("{}", name);
        }
        return Ok(());
    }

    let mut config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    cli.apply(&mut config);
    config.validate().context("Invalid configuration")?;
    init_logging_with_config(&config.logging)?;

    if config.categories.is_empty() {
        bail!("No categories configured; add [[categories]] to the config file or pass --category");
    }
    info!(
        "🛒 shop-crawler v{} | site: {} | {} categories",
        env!("CARGO_PKG_VERSION"),
        config.site,
        config.categories.len()
    );

    let client = HttpClient::new(config.http.clone()).context("Failed to build HTTP client")?;
    let provider = HtmlSessionProvider::new(Arc::new(client));
    let orchestrator = CrawlOrchestrator::from_config(provider, &config)?;

    match orchestrator.run(&config.categories).await {
        Ok(report) => {
            info!(
                "🎉 Done: {} records written to {}",
                report.records_merged,
                config.output.dir.display()
            );
            Ok(())
        }
        Err(e) => {
            error!("❌ Crawl failed: {}", e);
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_category() {
        let category = parse_category("OUTER > 코트=https://s.test/list?cate=1&sort=new").unwrap();
        assert_eq!(category.path, vec!["OUTER", "코트"]);
        assert_eq!(category.url, "https://s.test/list?cate=1&sort=new");
        assert!(parse_category("OUTER").is_err());
        assert!(parse_category("OUTER=not a url").is_err());
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::parse_from([
            "shop-crawler",
            "--site",
            "closhoew",
            "--max-pages",
            "2",
            "--no-spreadsheet",
            "--category",
            "SHOES=https://s.test/shoes",
        ]);
        let mut config = AppConfig::default();
        cli.apply(&mut config);
        assert_eq!(config.site, "closhoew");
        assert_eq!(config.crawl.max_pages_per_category, Some(2));
        assert!(!config.output.spreadsheet);
        assert_eq!(config.categories.len(), 1);
        assert!(config.validate().is_ok());
    }
}
