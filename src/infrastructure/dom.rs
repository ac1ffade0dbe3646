//! DOM access port
//!
//! The crawl engine never touches a document directly. It asks a `DomPort`
//! for elements by CSS selector within a scope, reads their text and
//! attributes, navigates, clicks and waits. A browser driver or the
//! scraper-backed [`crate::infrastructure::HtmlDomSession`] sits behind it.
//!
//! Element handles are only valid for the page they were issued on;
//! navigating invalidates every outstanding handle.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Opaque element reference issued by a `DomPort`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementHandle {
    /// Page load counter at issue time
    epoch: u64,
    /// Adapter-defined slot
    slot: usize,
}

impl ElementHandle {
    pub const fn new(epoch: u64, slot: usize) -> Self {
        Self { epoch, slot }
    }

    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    pub const fn slot(&self) -> usize {
        self.slot
    }
}

/// Where a query looks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Whole current page
    Page,
    /// Descendants of an element
    Within(ElementHandle),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomError {
    #[error("Invalid CSS selector: {selector} - {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Stale element handle (page changed since it was issued)")]
    StaleElement,

    #[error("No page loaded")]
    NoPage,

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Element cannot be activated: {reason}")]
    NotClickable { reason: String },

    #[error("Timed out after {timeout_ms}ms waiting for '{selector}'")]
    WaitTimeout { selector: String, timeout_ms: u64 },

    #[error("DOM session already closed")]
    SessionClosed,
}

impl DomError {
    pub fn invalid_selector(selector: &str, reason: impl ToString) -> Self {
        Self::InvalidSelector {
            selector: selector.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn navigation(url: &str, reason: impl ToString) -> Self {
        Self::Navigation {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn wait_timeout(selector: &str, timeout: Duration) -> Self {
        Self::WaitTimeout {
            selector: selector.to_string(),
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Whether the session is still usable after this error
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::SessionClosed)
    }
}

pub type DomResult<T> = Result<T, DomError>;

/// Capability the crawl engine drives
#[async_trait(?Send)]
pub trait DomPort {
    /// Load `url`; invalidates every handle issued before
    async fn navigate(&mut self, url: &str) -> DomResult<()>;

    /// URL of the loaded page, if any
    fn current_url(&self) -> Option<String>;

    /// All elements matching `selector` in `scope`, in document order
    async fn query(&mut self, scope: Scope, selector: &str) -> DomResult<Vec<ElementHandle>>;

    /// Rendered text, whitespace collapsed
    async fn text(&self, element: ElementHandle) -> DomResult<String>;

    /// Attribute value; link-like attributes are absolute
    async fn attribute(&self, element: ElementHandle, name: &str) -> DomResult<Option<String>>;

    /// Activate the element (follow it, for links)
    async fn click(&mut self, element: ElementHandle) -> DomResult<()>;

    /// First element matching `selector` on the page, waiting at most `timeout`
    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> DomResult<ElementHandle>;

    /// Release the session; further calls fail with `SessionClosed`
    async fn close(&mut self) -> DomResult<()>;

    /// Synchronous release for scopes that end without reaching `close`
    /// (e.g. while unwinding). Must not block.
    fn release(&mut self) {}
}

/// Opens DOM sessions for a crawl run
#[async_trait(?Send)]
pub trait SessionProvider {
    type Session: DomPort;

    async fn acquire(&self) -> DomResult<Self::Session>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_timeout_message() {
        let err = DomError::wait_timeout(".prdList", Duration::from_secs(10));
        assert_eq!(err.to_string(), "Timed out after 10000ms waiting for '.prdList'");
    }

    #[test]
    fn test_recoverability() {
        assert!(DomError::StaleElement.is_recoverable());
        assert!(!DomError::SessionClosed.is_recoverable());
    }
}
