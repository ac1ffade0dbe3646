//! Logging system configuration and initialization
//!
//! - Console output and/or a log file (optionally JSON)
//! - `RUST_LOG` overrides the configured level
//! - KST (Korea Standard Time) timestamps
//! - Log directory next to the executable unless configured

#![allow(clippy::uninlined_format_args)]

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use anyhow::{Result, anyhow};
use chrono::{FixedOffset, Utc};
use lazy_static::lazy_static;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

pub use crate::infrastructure::config::LoggingConfig;

// Keeps the non-blocking file writer alive for the whole process
lazy_static! {
    static ref LOG_GUARDS: Mutex<Vec<tracing_appender::non_blocking::WorkerGuard>> = Mutex::new(Vec::new());
}

const KST_OFFSET_SECS: i32 = 9 * 3600;

/// Time formatter for KST (UTC+9)
struct KstTimeFormatter;

impl FormatTime for KstTimeFormatter {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        let now = Utc::now();
        match FixedOffset::east_opt(KST_OFFSET_SECS) {
            Some(kst) => write!(w, "{}", now.with_timezone(&kst).format("%Y-%m-%d %H:%M:%S%.3f %:z")),
            None => write!(w, "{}", now.format("%Y-%m-%d %H:%M:%S%.3f UTC")),
        }
    }
}

/// `logs/` next to the executable, falling back to the working directory
pub fn get_log_directory() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_default()
        .join("logs")
}

/// Filter directives for `config`; dependency chatter is kept quiet unless tracing
pub fn build_filter_directives(config: &LoggingConfig) -> String {
    let level = config.level.trim().to_lowercase();
    let mut directives = vec![level.clone()];
    if !level.contains("trace") {
        directives.extend(
            [
                "reqwest=warn",
                "hyper=warn",
                "hyper_util=warn",
                "h2=warn",
                "rustls=warn",
                "html5ever=warn",
                "selectors=warn",
                "tokio=info",
            ]
            .map(str::to_string),
        );
    }
    directives.push(format!("shop_crawler_lib={}", level));
    directives.push(format!("shop_crawler={}", level));
    directives.join(",")
}

/// Initialize logging with default configuration
pub fn init_logging() -> Result<()> {
    init_logging_with_config(&LoggingConfig::default())
}

/// Initialize logging from `config`
///
/// `RUST_LOG` wins over the configured level:
/// ```bash
/// RUST_LOG="debug,reqwest=debug" shop-crawler --site joamom
/// ```
pub fn init_logging_with_config(config: &LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(build_filter_directives(config)))
        .map_err(|e| anyhow!("Invalid log filter: {}", e))?;

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    if config.file_output {
        let log_dir = config.log_dir.clone().unwrap_or_else(get_log_directory);
        std::fs::create_dir_all(&log_dir)
            .map_err(|e| anyhow!("Failed to create log directory {:?}: {}", log_dir, e))?;

        let (file_writer, guard) = non_blocking(rolling::never(&log_dir, &config.file_name));
        LOG_GUARDS
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(guard);

        let file_layer = fmt::Layer::new()
            .with_writer(file_writer)
            .with_timer(KstTimeFormatter)
            .with_ansi(false);
        if config.json_format {
            layers.push(
                file_layer
                    .json()
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .boxed(),
            );
        } else {
            layers.push(file_layer.with_target(false).boxed());
        }
    }

    if config.console_output || !config.file_output {
        layers.push(
            fmt::Layer::new()
                .with_writer(std::io::stdout)
                .with_timer(KstTimeFormatter)
                .with_target(false)
                .boxed(),
        );
    }

    Registry::default()
        .with(layers)
        .with(env_filter)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;

    tracing::info!("📝 Logging initialized (level: {})", config.level);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directives_quiet_dependencies() {
        let directives = build_filter_directives(&LoggingConfig::default());
        assert!(directives.starts_with("info,"));
        assert!(directives.contains("reqwest=warn"));
        assert!(directives.contains("shop_crawler_lib=info"));
        assert!(EnvFilter::try_new(&directives).is_ok());
    }

    #[test]
    fn test_trace_keeps_dependencies() {
        let config = LoggingConfig {
            level: "TRACE".into(),
            ..LoggingConfig::default()
        };
        let directives = build_filter_directives(&config);
        assert!(!directives.contains("reqwest=warn"));
        assert!(directives.contains("shop_crawler_lib=trace"));
    }

    #[test]
    fn test_log_directory_is_named_logs() {
        assert!(get_log_directory().ends_with("logs"));
    }
}
