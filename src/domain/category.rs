//! Category descriptors
//!
//! A category is a 1-3 segment name path (main > sub > third) plus the
//! absolute URL of its first listing page.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Separator used when a category path is rendered as one string
pub const PATH_SEPARATOR: &str = " > ";

/// Characters that cannot appear in a category file name
const FORBIDDEN_FILE_CHARS: &[char] = &['\\', '/', '*', '?', ':', '"', '<', '>', '|'];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CategoryError {
    #[error("Category path must have 1 to 3 segments, got {count}")]
    InvalidDepth { count: usize },

    #[error("Category path segment {index} is empty")]
    EmptySegment { index: usize },

    #[error("Category URL is not absolute: {url} - {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// One category to crawl
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDescriptor {
    /// Name segments, outermost first
    pub path: Vec<String>,
    /// Absolute URL of the first listing page
    pub url: String,
}

impl CategoryDescriptor {
    /// Create a validated descriptor
    pub fn new<I, S>(path: I, url: impl Into<String>) -> Result<Self, CategoryError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let descriptor = Self {
            path: path.into_iter().map(|s| s.into().trim().to_string()).collect(),
            url: url.into().trim().to_string(),
        };
        descriptor.validate()?;
        Ok(descriptor)
    }

    pub fn validate(&self) -> Result<(), CategoryError> {
        if self.path.is_empty() || self.path.len() > 3 {
            return Err(CategoryError::InvalidDepth {
                count: self.path.len(),
            });
        }
        if let Some(index) = self.path.iter().position(|s| s.trim().is_empty()) {
            return Err(CategoryError::EmptySegment { index });
        }
        match Url::parse(&self.url) {
            Ok(url) if url.has_host() => Ok(()),
            Ok(_) => Err(CategoryError::InvalidUrl {
                url: self.url.clone(),
                reason: "missing host".to_string(),
            }),
            Err(e) => Err(CategoryError::InvalidUrl {
                url: self.url.clone(),
                reason: e.to_string(),
            }),
        }
    }

    /// "main > sub > third"
    pub fn full_name(&self) -> String {
        self.path.join(PATH_SEPARATOR)
    }

    pub fn main(&self) -> &str {
        self.path.first().map_or("", String::as_str)
    }

    /// Everything below the main segment, joined; empty for depth 1
    pub fn sub(&self) -> String {
        self.path.iter().skip(1).cloned().collect::<Vec<_>>().join(PATH_SEPARATOR)
    }

    pub fn depth(&self) -> usize {
        self.path.len()
    }

    /// Full name with characters that are illegal in file names removed
    pub fn file_stem(&self) -> String {
        let stem: String = self
            .full_name()
            .chars()
            .filter(|c| !FORBIDDEN_FILE_CHARS.contains(c))
            .collect();
        let stem = stem.trim().to_string();
        if stem.is_empty() { "category".to_string() } else { stem }
    }

    pub fn tag(&self) -> CategoryTag {
        CategoryTag {
            main: self.main().to_string(),
            sub: self.sub(),
            full: self.full_name(),
        }
    }
}

/// Category columns attached to every record by the crawl loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTag {
    pub main: String,
    pub sub: String,
    pub full: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_name_and_components() {
        let c = CategoryDescriptor::new(["OUTER", "Coat", "Long"], "https://shop.example/list?cate_no=1")
            .unwrap();
        assert_eq!(c.full_name(), "OUTER > Coat > Long");
        assert_eq!(c.main(), "OUTER");
        assert_eq!(c.sub(), "Coat > Long");
        assert_eq!(c.depth(), 3);
    }

    #[test]
    fn test_single_segment_has_empty_sub() {
        let c = CategoryDescriptor::new(["BEST"], "https://shop.example/best").unwrap();
        assert_eq!(c.sub(), "");
        assert_eq!(c.tag().full, "BEST");
    }

    #[test]
    fn test_depth_is_validated() {
        let err = CategoryDescriptor::new(Vec::<String>::new(), "https://shop.example").unwrap_err();
        assert_eq!(err, CategoryError::InvalidDepth { count: 0 });

        let err = CategoryDescriptor::new(["a", "b", "c", "d"], "https://shop.example").unwrap_err();
        assert_eq!(err, CategoryError::InvalidDepth { count: 4 });
    }

    #[test]
    fn test_relative_url_rejected() {
        let err = CategoryDescriptor::new(["TOP"], "/product/list.html").unwrap_err();
        assert!(matches!(err, CategoryError::InvalidUrl { .. }));
    }

    #[test]
    fn test_file_stem_strips_forbidden_characters() {
        let c = CategoryDescriptor::new(["T/shirts", "Sale?*"], "https://shop.example/x").unwrap();
        // 구분자 '>' 도 파일명에서 제거됨
        assert_eq!(c.file_stem(), "Tshirts  Sale");
    }
}
