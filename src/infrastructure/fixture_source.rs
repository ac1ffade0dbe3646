//! In-memory page source
//!
//! Serves canned HTML by URL, with optional injected failures, and records
//! every fetch. Used to replay saved listing pages and in tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use url::Url;

use super::html_session::PageSource;

/// Parse-and-print so `https://a.b` and `https://a.b/` are the same key
fn normalize(url: &str) -> String {
    Url::parse(url.trim()).map_or_else(|_| url.trim().to_string(), |u| u.to_string())
}

#[derive(Default)]
pub struct FixturePageSource {
    pages: HashMap<String, String>,
    failing: HashSet<String>,
    fetches: Mutex<Vec<String>>,
}

impl FixturePageSource {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_page(mut self, url: &str, html: impl Into<String>) -> Self {
        self.pages.insert(normalize(url), html.into());
        self
    }

    /// Fetching `url` fails even if a page is registered for it
    #[must_use]
    pub fn with_failure(mut self, url: &str) -> Self {
        self.failing.insert(normalize(url));
        self
    }

    /// Every URL fetched so far, in order
    pub fn fetch_log(&self) -> Vec<String> {
        self.fetches.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl PageSource for FixturePageSource {
    async fn fetch(&self, url: &str) -> anyhow::Result<String> {
        let key = normalize(url);
        self.fetches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(key.clone());

        if self.failing.contains(&key) {
            anyhow::bail!("injected failure for {key}");
        }
        self.pages
            .get(&key)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("HTTP request failed with status 404 Not Found: {key}"))
    }
}
