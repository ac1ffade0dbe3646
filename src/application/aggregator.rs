//! Multi-category aggregation
//!
//! Category record sets are deduplicated locally, appended in processing
//! order, and deduplicated once more over the whole run.

use crate::domain::dedup::{DedupKey, dedup};
use crate::domain::product::ProductRecord;

#[derive(Debug, Clone)]
pub struct Aggregator {
    key: DedupKey,
    records: Vec<ProductRecord>,
    categories: usize,
}

impl Aggregator {
    pub fn new(key: DedupKey) -> Self {
        Self {
            key,
            records: Vec::new(),
            categories: 0,
        }
    }

    pub const fn key(&self) -> DedupKey {
        self.key
    }

    /// Dedup one category's records, append them, and return the appended slice
    pub fn add(&mut self, records: Vec<ProductRecord>) -> &[ProductRecord] {
        let start = self.records.len();
        self.records.extend(dedup(records, self.key));
        self.categories += 1;
        &self.records[start..]
    }

    /// Everything appended so far, before the global dedup
    pub fn gathered(&self) -> &[ProductRecord] {
        &self.records
    }

    pub const fn categories(&self) -> usize {
        self.categories
    }

    /// Run-wide record set, deduplicated across categories
    pub fn merged(&self) -> Vec<ProductRecord> {
        dedup(self.records.clone(), self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::product::{Field, FieldValue};

    fn record(name: &str, url: &str) -> ProductRecord {
        let mut r = ProductRecord::with_fields([Field::ProductName, Field::ProductUrl]);
        r.set(Field::ProductName, FieldValue::Text(name.into()));
        r.set(Field::ProductUrl, FieldValue::Text(url.into()));
        r
    }

    #[test]
    fn test_local_then_global_dedup() {
        let mut agg = Aggregator::new(DedupKey::Url);

        let first = agg.add(vec![record("a", "u1"), record("a again", "u1"), record("b", "u2")]);
        assert_eq!(first.len(), 2);

        let second = agg.add(vec![record("b elsewhere", "u2"), record("c", "u3")]);
        assert_eq!(second.len(), 2);

        assert_eq!(agg.gathered().len(), 4);
        assert_eq!(agg.categories(), 2);

        let merged = agg.merged();
        let names: Vec<&str> = merged.iter().map(|r| r.product_name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_name_key() {
        let mut agg = Aggregator::new(DedupKey::Name);
        agg.add(vec![record("코트", "u1")]);
        agg.add(vec![record(" 코트 ", "u2"), record("", "u3")]);
        let merged = agg.merged();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].product_url, "u1");
    }

    #[test]
    fn test_empty_category() {
        let mut agg = Aggregator::new(DedupKey::Url);
        assert!(agg.add(Vec::new()).is_empty());
        assert!(agg.merged().is_empty());
    }
}
