//! Infrastructure layer
//!
//! DOM access (port + adapters), extraction plans, site presets,
//! configuration, logging and file export.

pub mod config;
pub mod dom;
pub mod export;
pub mod fixture_source;
pub mod html_session;
pub mod http_client;
pub mod logging;
pub mod parsing;
pub mod sites;

pub use dom::{DomError, DomPort, DomResult, ElementHandle, Scope, SessionProvider};
pub use fixture_source::FixturePageSource;
pub use html_session::{HtmlDomSession, HtmlSessionProvider, PageSource};
pub use http_client::{HttpClient, HttpClientConfig};
