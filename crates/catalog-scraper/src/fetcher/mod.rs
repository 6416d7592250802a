//! Page loading capability.
//!
//! The extractor, walker and orchestrator only ever see [`PageFetcher`] and
//! [`PageHandle`], so the automation backend can change without touching them.
//! Two backends ship: [`ChromeFetcher`] drives headless Chrome over CDP and
//! [`HttpFetcher`] fetches static HTML.

mod chrome;
mod http;

use std::future::Future;
use std::time::Duration;

use catalog_core::{AppConfig, ScraperBackend};

use crate::error::ScraperError;

pub use chrome::{ChromeFetcher, ChromePage};
pub use http::{HtmlPage, HttpFetcher};

/// Browser identity and navigation limits shared by both backends.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub user_agent: String,
    pub accept_language: String,
    /// Upper bound for a navigation to reach network idle.
    pub navigation_timeout: Duration,
    pub headless: bool,
    /// Retries after the first attempt for transient HTTP failures.
    pub max_retries: u32,
    pub retry_backoff_base_secs: u64,
}

impl FetchOptions {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            user_agent: config.scraper_user_agent.clone(),
            accept_language: config.scraper_accept_language.clone(),
            navigation_timeout: Duration::from_secs(config.scraper_navigation_timeout_secs),
            headless: config.scraper_headless,
            max_retries: config.scraper_max_retries,
            retry_backoff_base_secs: config.scraper_retry_backoff_base_secs,
        }
    }
}

/// A loaded page that can be queried by CSS selector.
///
/// Every query waits up to `wait` for the selector to match at least one
/// element. An absent element is `Ok(None)` (or an empty list), never an error.
pub trait PageHandle: Send + Sync {
    /// URL the page ended up at after redirects.
    fn url(&self) -> &str;

    /// Text content of the first element matching `selector`.
    fn query_text(
        &self,
        selector: &str,
        wait: Duration,
    ) -> impl Future<Output = Result<Option<String>, ScraperError>> + Send;

    /// Value of `attribute` on the first element matching `selector`.
    fn query_attr(
        &self,
        selector: &str,
        attribute: &str,
        wait: Duration,
    ) -> impl Future<Output = Result<Option<String>, ScraperError>> + Send;

    /// Text content of every element matching `selector`, in document order.
    fn query_all_text(
        &self,
        selector: &str,
        wait: Duration,
    ) -> impl Future<Output = Result<Vec<String>, ScraperError>> + Send;

    /// `attribute` of every matching element that carries it, in document order.
    fn query_all_attr(
        &self,
        selector: &str,
        attribute: &str,
        wait: Duration,
    ) -> impl Future<Output = Result<Vec<String>, ScraperError>> + Send;

    /// Releases the page. Consumes the handle so it cannot be closed twice.
    fn close(self) -> impl Future<Output = ()> + Send;
}

/// Loads URLs into [`PageHandle`]s.
pub trait PageFetcher: Send + Sync {
    type Page: PageHandle;

    /// Navigates to `url` and waits for the page to settle.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::NavigationTimeout`] if the page does not settle
    /// in time, or a backend error if it cannot be loaded at all.
    fn load(&self, url: &str) -> impl Future<Output = Result<Self::Page, ScraperError>> + Send;
}

/// Runtime-selected backend, so callers holding one concrete type can honor
/// [`ScraperBackend`] from configuration.
pub enum BackendFetcher {
    Chrome(ChromeFetcher),
    Http(HttpFetcher),
}

impl BackendFetcher {
    /// Builds the backend named in `backend`. Chrome is launched lazily on the
    /// first load, so launch failures surface from [`PageFetcher::load`].
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the HTTP client cannot be constructed.
    pub fn new(backend: ScraperBackend, options: FetchOptions) -> Result<Self, ScraperError> {
        Ok(match backend {
            ScraperBackend::Chrome => Self::Chrome(ChromeFetcher::new(options)),
            ScraperBackend::Http => Self::Http(HttpFetcher::new(options)?),
        })
    }

    /// Shuts down the browser process, if one was launched.
    pub async fn shutdown(&self) {
        if let Self::Chrome(chrome) = self {
            chrome.shutdown().await;
        }
    }
}

pub enum BackendPage {
    Chrome(ChromePage),
    Http(HtmlPage),
}

impl PageFetcher for BackendFetcher {
    type Page = BackendPage;

    async fn load(&self, url: &str) -> Result<BackendPage, ScraperError> {
        match self {
            Self::Chrome(f) => f.load(url).await.map(BackendPage::Chrome),
            Self::Http(f) => f.load(url).await.map(BackendPage::Http),
        }
    }
}

impl PageHandle for BackendPage {
    fn url(&self) -> &str {
        match self {
            Self::Chrome(p) => p.url(),
            Self::Http(p) => p.url(),
        }
    }

    async fn query_text(
        &self,
        selector: &str,
        wait: Duration,
    ) -> Result<Option<String>, ScraperError> {
        match self {
            Self::Chrome(p) => p.query_text(selector, wait).await,
            Self::Http(p) => p.query_text(selector, wait).await,
        }
    }

    async fn query_attr(
        &self,
        selector: &str,
        attribute: &str,
        wait: Duration,
    ) -> Result<Option<String>, ScraperError> {
        match self {
            Self::Chrome(p) => p.query_attr(selector, attribute, wait).await,
            Self::Http(p) => p.query_attr(selector, attribute, wait).await,
        }
    }

    async fn query_all_text(
        &self,
        selector: &str,
        wait: Duration,
    ) -> Result<Vec<String>, ScraperError> {
        match self {
            Self::Chrome(p) => p.query_all_text(selector, wait).await,
            Self::Http(p) => p.query_all_text(selector, wait).await,
        }
    }

    async fn query_all_attr(
        &self,
        selector: &str,
        attribute: &str,
        wait: Duration,
    ) -> Result<Vec<String>, ScraperError> {
        match self {
            Self::Chrome(p) => p.query_all_attr(selector, attribute, wait).await,
            Self::Http(p) => p.query_all_attr(selector, attribute, wait).await,
        }
    }

    async fn close(self) {
        match self {
            Self::Chrome(p) => p.close().await,
            Self::Http(p) => p.close().await,
        }
    }
}
