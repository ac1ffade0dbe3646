//! Record deduplication
//!
//! Single pass: a record is kept iff its trimmed key is non-empty and has not
//! been seen before. First-seen order is preserved, so applying it twice is
//! the same as applying it once.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::product::ProductRecord;

/// Which identity field records are deduplicated by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DedupKey {
    /// `product_url`, trimmed
    #[default]
    Url,
    /// `product_name`, trimmed, case-sensitive
    Name,
}

impl std::fmt::Display for DedupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Url => write!(f, "url"),
            Self::Name => write!(f, "name"),
        }
    }
}

/// Deduplicate product records by `key`
pub fn dedup(records: Vec<ProductRecord>, key: DedupKey) -> Vec<ProductRecord> {
    dedup_by(records, |record| record.key(key))
}

/// Generic form of [`dedup`]; `key_of` is trimmed before comparison
pub fn dedup_by<T, F>(items: Vec<T>, key_of: F) -> Vec<T>
where
    F: Fn(&T) -> &str,
{
    let mut seen: HashSet<String> = HashSet::with_capacity(items.len());
    let mut kept = Vec::with_capacity(items.len());

    for item in items {
        let key = key_of(&item).trim();
        if key.is_empty() {
            continue;
        }
        if seen.insert(key.to_string()) {
            kept.push(item);
        }
    }

    kept
}
