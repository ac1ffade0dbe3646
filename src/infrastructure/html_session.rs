//! scraper-backed DOM session
//!
//! Implements [`DomPort`] over server-rendered HTML fetched from a
//! [`PageSource`]. "Clicking" follows the element's resolved `href`; waits
//! check the loaded document once, since a fetched document never changes.

#![allow(clippy::uninlined_format_args)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ego_tree::NodeId;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, trace};
use url::Url;

use super::dom::{DomError, DomPort, DomResult, ElementHandle, Scope, SessionProvider};

/// Where page HTML comes from
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self, url: &str) -> anyhow::Result<String>;
}

/// Attributes whose values are URLs and get resolved against the page URL
fn is_link_attribute(name: &str) -> bool {
    name == "href" || name == "src" || name.ends_with("-src")
}

struct LoadedPage {
    url: Url,
    document: Html,
    /// Node ids handed out for this page, indexed by handle slot
    handles: Vec<NodeId>,
}

impl LoadedPage {
    fn resolve(&self, epoch: u64, handle: ElementHandle) -> DomResult<ElementRef<'_>> {
        if handle.epoch() != epoch {
            return Err(DomError::StaleElement);
        }
        let id = self.handles.get(handle.slot()).copied().ok_or(DomError::StaleElement)?;
        let node = self.document.tree.get(id).ok_or(DomError::StaleElement)?;
        ElementRef::wrap(node).ok_or(DomError::StaleElement)
    }

    fn issue(&mut self, epoch: u64, id: NodeId) -> ElementHandle {
        self.handles.push(id);
        ElementHandle::new(epoch, self.handles.len() - 1)
    }
}

/// DOM session over fetched HTML documents
pub struct HtmlDomSession<S: PageSource> {
    source: Arc<S>,
    page: Option<LoadedPage>,
    /// Bumped on every successful navigation
    epoch: u64,
    closed: bool,
    selectors: HashMap<String, Selector>,
}

impl<S: PageSource> HtmlDomSession<S> {
    pub fn new(source: Arc<S>) -> Self {
        Self {
            source,
            page: None,
            epoch: 0,
            closed: false,
            selectors: HashMap::new(),
        }
    }

    fn ensure_open(&self) -> DomResult<()> {
        if self.closed { Err(DomError::SessionClosed) } else { Ok(()) }
    }

    fn compile(&mut self, selector: &str) -> DomResult<()> {
        if !self.selectors.contains_key(selector) {
            let compiled =
                Selector::parse(selector).map_err(|e| DomError::invalid_selector(selector, e))?;
            self.selectors.insert(selector.to_string(), compiled);
        }
        Ok(())
    }

    fn page(&self) -> DomResult<&LoadedPage> {
        self.ensure_open()?;
        self.page.as_ref().ok_or(DomError::NoPage)
    }
}

#[async_trait(?Send)]
impl<S: PageSource> DomPort for HtmlDomSession<S> {
    async fn navigate(&mut self, url: &str) -> DomResult<()> {
        self.ensure_open()?;
        let target = Url::parse(url).map_err(|e| DomError::navigation(url, e))?;

        let html = self
            .source
            .fetch(target.as_str())
            .await
            .map_err(|e| DomError::navigation(url, format!("{:#}", e)))?;

        self.epoch += 1;
        self.page = Some(LoadedPage {
            url: target,
            document: Html::parse_document(&html),
            handles: Vec::new(),
        });
        debug!("📄 Loaded {} ({} bytes)", url, html.len());
        Ok(())
    }

    fn current_url(&self) -> Option<String> {
        self.page.as_ref().map(|p| p.url.to_string())
    }

    async fn query(&mut self, scope: Scope, selector: &str) -> DomResult<Vec<ElementHandle>> {
        self.ensure_open()?;
        self.compile(selector)?;
        let compiled = self
            .selectors
            .get(selector)
            .ok_or_else(|| DomError::invalid_selector(selector, "not compiled"))?;
        let epoch = self.epoch;
        let page = self.page.as_mut().ok_or(DomError::NoPage)?;

        let ids: Vec<NodeId> = match scope {
            Scope::Page => page.document.select(compiled).map(|e| e.id()).collect(),
            Scope::Within(handle) => {
                let root = page.resolve(epoch, handle)?;
                root.select(compiled).map(|e| e.id()).collect()
            }
        };
        trace!("query '{}' -> {} match(es)", selector, ids.len());

        Ok(ids.into_iter().map(|id| page.issue(epoch, id)).collect())
    }

    async fn text(&self, element: ElementHandle) -> DomResult<String> {
        let page = self.page()?;
        let el = page.resolve(self.epoch, element)?;
        let raw: String = el.text().collect();
        Ok(raw.split_whitespace().collect::<Vec<_>>().join(" "))
    }

    async fn attribute(&self, element: ElementHandle, name: &str) -> DomResult<Option<String>> {
        let page = self.page()?;
        let el = page.resolve(self.epoch, element)?;
        let Some(raw) = el.value().attr(name) else {
            return Ok(None);
        };
        if is_link_attribute(name) && !raw.trim().is_empty() {
            if let Ok(resolved) = page.url.join(raw.trim()) {
                return Ok(Some(resolved.to_string()));
            }
        }
        Ok(Some(raw.to_string()))
    }

    async fn click(&mut self, element: ElementHandle) -> DomResult<()> {
        let href = self.attribute(element, "href").await?;
        match href {
            Some(target) if !target.starts_with("javascript:") => self.navigate(&target).await,
            Some(target) => Err(DomError::NotClickable {
                reason: format!("script link '{}'", target),
            }),
            None => Err(DomError::NotClickable {
                reason: "element has no href".to_string(),
            }),
        }
    }

    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> DomResult<ElementHandle> {
        let found = self.query(Scope::Page, selector).await?;
        found
            .into_iter()
            .next()
            .ok_or_else(|| DomError::wait_timeout(selector, timeout))
    }

    async fn close(&mut self) -> DomResult<()> {
        self.release();
        Ok(())
    }

    fn release(&mut self) {
        self.closed = true;
        self.page = None;
        self.selectors.clear();
    }
}

/// Hands out [`HtmlDomSession`]s sharing one page source
pub struct HtmlSessionProvider<S: PageSource> {
    source: Arc<S>,
}

impl<S: PageSource> HtmlSessionProvider<S> {
    pub fn new(source: Arc<S>) -> Self {
        Self { source }
    }
}

#[async_trait(?Send)]
impl<S: PageSource> SessionProvider for HtmlSessionProvider<S> {
    type Session = HtmlDomSession<S>;

    async fn acquire(&self) -> DomResult<Self::Session> {
        Ok(HtmlDomSession::new(Arc::clone(&self.source)))
    }
}
