//! Extraction error types
//!
//! Individual lookup misses are not errors at all (they are `None`). Only two
//! things surface: an item that cannot be scoped, and a plan that does not
//! compile.

use thiserror::Error;

use crate::infrastructure::dom::DomError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("Required scope '{selector}' not found in item")]
    RequiredScopeMissing { selector: String },

    #[error("Item element unavailable: {source}")]
    ItemUnavailable {
        #[from]
        source: DomError,
    },
}

impl ExtractionError {
    pub fn required_scope_missing(selector: &str) -> Self {
        Self::RequiredScopeMissing {
            selector: selector.to_string(),
        }
    }
}

pub type ExtractionResult<T> = Result<T, ExtractionError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("Extraction plan declares no fields")]
    Empty,

    #[error("Field '{field}' has no candidate lookups")]
    NoCandidates { field: String },

    #[error("Invalid CSS selector for '{field}': {selector} - {reason}")]
    InvalidSelector {
        field: String,
        selector: String,
        reason: String,
    },

    #[error("Invalid pattern for '{field}': {pattern} - {reason}")]
    InvalidPattern {
        field: String,
        pattern: String,
        reason: String,
    },
}

impl PlanError {
    pub fn invalid_selector(field: &str, selector: &str, reason: impl ToString) -> Self {
        Self::InvalidSelector {
            field: field.to_string(),
            selector: selector.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_pattern(field: &str, pattern: &str, reason: impl ToString) -> Self {
        Self::InvalidPattern {
            field: field.to_string(),
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        }
    }
}
