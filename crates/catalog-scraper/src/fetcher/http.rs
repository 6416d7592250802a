//! Static HTML backend: one GET per page, DOM queries against the parsed body.
//!
//! No scripts run, so selector waits are ignored; whatever the server
//! rendered is all there is.

use std::time::Duration;

use reqwest::Client;
use scraper::{ElementRef, Html, Selector};

use super::{FetchOptions, PageFetcher, PageHandle};
use crate::error::ScraperError;
use crate::retry::retry_with_backoff;
use crate::urls::extract_domain;

pub struct HttpFetcher {
    client: Client,
    options: FetchOptions,
}

impl HttpFetcher {
    /// Creates an `HttpFetcher` with the configured timeout, `User-Agent`,
    /// and `Accept-Language`.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(options: FetchOptions) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(options.navigation_timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(options.user_agent.as_str())
            .build()?;
        Ok(Self { client, options })
    }

    async fn fetch_once(&self, url: &str) -> Result<HtmlPage, ScraperError> {
        let response = self
            .client
            .get(url)
            .header(
                reqwest::header::ACCEPT,
                "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8",
            )
            .header(
                reqwest::header::ACCEPT_LANGUAGE,
                self.options.accept_language.as_str(),
            )
            .send()
            .await?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(ScraperError::RateLimited {
                domain: extract_domain(url),
                retry_after_secs,
            });
        }

        if !status.is_success() {
            return Err(ScraperError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_owned(),
            });
        }

        let final_url = response.url().to_string();
        let body = response.text().await?;
        Ok(HtmlPage {
            url: final_url,
            body,
        })
    }
}

impl PageFetcher for HttpFetcher {
    type Page = HtmlPage;

    async fn load(&self, url: &str) -> Result<HtmlPage, ScraperError> {
        let result = retry_with_backoff(
            self.options.max_retries,
            self.options.retry_backoff_base_secs,
            || self.fetch_once(url),
        )
        .await;

        match result {
            Err(ScraperError::Http(e)) if e.is_timeout() => Err(ScraperError::NavigationTimeout {
                url: url.to_owned(),
                timeout_secs: self.options.navigation_timeout.as_secs(),
            }),
            other => other,
        }
    }
}

/// A fetched document. Holds the raw body and parses on each query, since
/// the parsed tree is not `Send`.
#[derive(Debug, Clone)]
pub struct HtmlPage {
    url: String,
    body: String,
}

impl HtmlPage {
    /// Wraps an already-fetched document.
    #[must_use]
    pub fn new(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            body: body.into(),
        }
    }

    fn select_map<T>(
        &self,
        selector: &str,
        read: impl FnMut(ElementRef<'_>) -> Option<T>,
    ) -> Result<Vec<T>, ScraperError> {
        let parsed = parse_selector(selector)?;
        let document = Html::parse_document(&self.body);
        Ok(document.select(&parsed).filter_map(read).collect())
    }

    fn select_first<T>(
        &self,
        selector: &str,
        read: impl FnOnce(ElementRef<'_>) -> Option<T>,
    ) -> Result<Option<T>, ScraperError> {
        let parsed = parse_selector(selector)?;
        let document = Html::parse_document(&self.body);
        Ok(document.select(&parsed).next().and_then(read))
    }
}

fn parse_selector(selector: &str) -> Result<Selector, ScraperError> {
    Selector::parse(selector).map_err(|e| ScraperError::InvalidSelector {
        selector: selector.to_owned(),
        reason: format!("{e:?}"),
    })
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>()
}

impl PageHandle for HtmlPage {
    fn url(&self) -> &str {
        &self.url
    }

    async fn query_text(
        &self,
        selector: &str,
        _wait: Duration,
    ) -> Result<Option<String>, ScraperError> {
        self.select_first(selector, |el| Some(element_text(el)))
    }

    async fn query_attr(
        &self,
        selector: &str,
        attribute: &str,
        _wait: Duration,
    ) -> Result<Option<String>, ScraperError> {
        self.select_first(selector, |el| el.value().attr(attribute).map(str::to_owned))
    }

    async fn query_all_text(
        &self,
        selector: &str,
        _wait: Duration,
    ) -> Result<Vec<String>, ScraperError> {
        self.select_map(selector, |el| Some(element_text(el)))
    }

    async fn query_all_attr(
        &self,
        selector: &str,
        attribute: &str,
        _wait: Duration,
    ) -> Result<Vec<String>, ScraperError> {
        self.select_map(selector, |el| el.value().attr(attribute).map(str::to_owned))
    }

    async fn close(self) {}
}
