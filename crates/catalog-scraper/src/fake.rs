//! In-memory page backend for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::ScraperError;
use crate::fetcher::{PageFetcher, PageHandle};

/// A page described as selector -> values tables.
#[derive(Debug, Clone, Default)]
pub(crate) struct FakePage {
    url: String,
    texts: HashMap<String, Vec<String>>,
    attrs: HashMap<(String, String), Vec<String>>,
    /// Selectors that only match after this much waiting.
    late: HashMap<String, Duration>,
    /// Selectors whose queries fail as if the tab had crashed.
    failing: HashSet<String>,
    closes: Arc<AtomicUsize>,
}

impl FakePage {
    pub(crate) fn new(url: &str) -> Self {
        Self {
            url: url.to_owned(),
            ..Self::default()
        }
    }

    pub(crate) fn text(mut self, selector: &str, value: &str) -> Self {
        self.texts
            .entry(selector.to_owned())
            .or_default()
            .push(value.to_owned());
        self
    }

    pub(crate) fn attr(mut self, selector: &str, attribute: &str, value: &str) -> Self {
        self.attrs
            .entry((selector.to_owned(), attribute.to_owned()))
            .or_default()
            .push(value.to_owned());
        self
    }

    pub(crate) fn late(mut self, selector: &str, after: Duration) -> Self {
        self.late.insert(selector.to_owned(), after);
        self
    }

    pub(crate) fn failing(mut self, selector: &str) -> Self {
        self.failing.insert(selector.to_owned());
        self
    }

    fn check(&self, selector: &str) -> Result<(), ScraperError> {
        if self.failing.contains(selector) {
            return Err(ScraperError::browser(
                "evaluating a selector",
                "target closed",
            ));
        }
        Ok(())
    }

    fn visible(&self, selector: &str, wait: Duration) -> bool {
        self.late.get(selector).is_none_or(|after| *after <= wait)
    }

    fn texts_for(&self, selector: &str, wait: Duration) -> Vec<String> {
        if !self.visible(selector, wait) {
            return Vec::new();
        }
        self.texts.get(selector).cloned().unwrap_or_default()
    }

    fn attrs_for(&self, selector: &str, attribute: &str, wait: Duration) -> Vec<String> {
        if !self.visible(selector, wait) {
            return Vec::new();
        }
        self.attrs
            .get(&(selector.to_owned(), attribute.to_owned()))
            .cloned()
            .unwrap_or_default()
    }
}

impl PageHandle for FakePage {
    fn url(&self) -> &str {
        &self.url
    }

    async fn query_text(
        &self,
        selector: &str,
        wait: Duration,
    ) -> Result<Option<String>, ScraperError> {
        self.check(selector)?;
        Ok(self.texts_for(selector, wait).into_iter().next())
    }

    async fn query_attr(
        &self,
        selector: &str,
        attribute: &str,
        wait: Duration,
    ) -> Result<Option<String>, ScraperError> {
        self.check(selector)?;
        Ok(self.attrs_for(selector, attribute, wait).into_iter().next())
    }

    async fn query_all_text(
        &self,
        selector: &str,
        wait: Duration,
    ) -> Result<Vec<String>, ScraperError> {
        self.check(selector)?;
        Ok(self.texts_for(selector, wait))
    }

    async fn query_all_attr(
        &self,
        selector: &str,
        attribute: &str,
        wait: Duration,
    ) -> Result<Vec<String>, ScraperError> {
        self.check(selector)?;
        Ok(self.attrs_for(selector, attribute, wait))
    }

    async fn close(self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Serves [`FakePage`]s by URL and records every load and close.
#[derive(Debug, Default)]
pub(crate) struct FakeFetcher {
    pages: HashMap<String, FakePage>,
    timeouts: HashSet<String>,
    loads: Mutex<Vec<String>>,
    closes: Arc<AtomicUsize>,
}

impl FakeFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn page(mut self, mut page: FakePage) -> Self {
        page.closes = Arc::clone(&self.closes);
        self.pages.insert(page.url.clone(), page);
        self
    }

    /// Loading `url` fails with a navigation timeout.
    pub(crate) fn timeout(mut self, url: &str) -> Self {
        self.timeouts.insert(url.to_owned());
        self
    }

    pub(crate) fn loads(&self) -> Vec<String> {
        self.loads.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub(crate) fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl PageFetcher for FakeFetcher {
    type Page = FakePage;

    async fn load(&self, url: &str) -> Result<FakePage, ScraperError> {
        if let Ok(mut loads) = self.loads.lock() {
            loads.push(url.to_owned());
        }
        if self.timeouts.contains(url) {
            return Err(ScraperError::NavigationTimeout {
                url: url.to_owned(),
                timeout_secs: 60,
            });
        }
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| ScraperError::UnexpectedStatus {
                status: 404,
                url: url.to_owned(),
            })
    }
}
