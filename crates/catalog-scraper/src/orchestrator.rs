//! Crawl orchestration: one product page at a time, outcomes tallied.
//!
//! Per item: load → name → price → brand gate → color, sizes, image →
//! validate → sink insert → release the page. Any error is caught at the
//! item boundary, logged with its URL, and counted; the batch continues.
//! A fixed delay separates consecutive items whatever their outcome.

use std::time::Duration;

use catalog_core::{AppConfig, ProductRecord, RecordSink, SinkId, UNKNOWN};
use serde::Serialize;

use crate::brand_filter::BrandFilter;
use crate::cancel::CancelFlag;
use crate::error::ScraperError;
use crate::extract::{extract, extract_image, extract_sizes, parse_price, Mode};
use crate::fetcher::{PageFetcher, PageHandle};
use crate::pagination::{collect_urls, WalkOptions};
use crate::selectors::{SelectorSet, BRAND_META_ATTRIBUTE};
use crate::urls::parse_absolute;

#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Per-candidate wait for a selector to appear.
    pub selector_wait: Duration,
    /// Pause after each item and between listing pages.
    pub inter_request_delay: Duration,
}

impl CrawlOptions {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            selector_wait: Duration::from_millis(config.scraper_selector_wait_ms),
            inter_request_delay: Duration::from_millis(config.scraper_inter_request_delay_ms),
        }
    }
}

/// Run-level counters returned by [`Orchestrator::run_batch`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub success_count: usize,
    pub skipped_count: usize,
    pub failure_count: usize,
    /// Set when the run stopped early; the counters cover only processed items.
    pub cancelled: bool,
}

impl BatchSummary {
    #[must_use]
    pub fn processed(&self) -> usize {
        self.success_count + self.skipped_count + self.failure_count
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    BrandNotAllowed,
}

impl SkipReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BrandNotAllowed => "brand-not-allowed",
        }
    }
}

/// Result of processing one crawl target.
#[derive(Debug)]
pub enum CrawlOutcome {
    Success { record: ProductRecord, id: SinkId },
    Skipped { reason: SkipReason, brand: String },
    Failed(ScraperError),
}

enum Scraped {
    Stored { record: ProductRecord, id: SinkId },
    BrandRejected { brand: String },
}

pub struct Orchestrator<F, S> {
    fetcher: F,
    sink: S,
    selectors: &'static SelectorSet,
    filter: BrandFilter,
    options: CrawlOptions,
    cancel: CancelFlag,
}

impl<F: PageFetcher, S: RecordSink> Orchestrator<F, S> {
    #[must_use]
    pub fn new(
        fetcher: F,
        sink: S,
        selectors: &'static SelectorSet,
        filter: BrandFilter,
        options: CrawlOptions,
    ) -> Self {
        Self {
            fetcher,
            sink,
            selectors,
            filter,
            options,
            cancel: CancelFlag::new(),
        }
    }

    /// Replaces the cancel flag, e.g. with one wired to Ctrl-C.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Walks the category at `base_url`, then scrapes every product found.
    ///
    /// # Errors
    ///
    /// Returns the walker's error if discovery fails; per-item failures are
    /// only counted.
    pub async fn crawl(&self, base_url: &str) -> Result<BatchSummary, ScraperError> {
        let walk = WalkOptions {
            selector_wait: self.options.selector_wait,
            inter_page_delay: self.options.inter_request_delay,
        };
        let urls = collect_urls(
            &self.fetcher,
            base_url,
            self.selectors.product_links,
            self.selectors.pagination_next,
            &walk,
            &self.cancel,
        )
        .await?;
        tracing::info!(base_url, targets = urls.len(), "discovery finished");
        Ok(self.run_batch(&urls).await)
    }

    /// Scrapes `urls` strictly in order and returns the tri-counter.
    pub async fn run_batch(&self, urls: &[String]) -> BatchSummary {
        let total = urls.len();
        let mut summary = BatchSummary::default();
        tracing::info!(total, "batch started");

        for (index, url) in urls.iter().enumerate() {
            if self.cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }
            tracing::info!(index = index + 1, total, url = %url, "scraping");

            match self.scrape_one(url).await {
                CrawlOutcome::Success { .. } => summary.success_count += 1,
                CrawlOutcome::Skipped { reason, brand } => {
                    tracing::warn!(url = %url, brand = %brand, reason = reason.as_str(), "product skipped");
                    summary.skipped_count += 1;
                }
                CrawlOutcome::Failed(ScraperError::Cancelled) => {
                    summary.cancelled = true;
                    break;
                }
                CrawlOutcome::Failed(error) => {
                    tracing::warn!(url = %url, error = %error, "product failed");
                    summary.failure_count += 1;
                }
            }

            if index + 1 < total {
                tokio::time::sleep(self.options.inter_request_delay).await;
            }
        }

        tracing::info!(
            success = summary.success_count,
            skipped = summary.skipped_count,
            failed = summary.failure_count,
            cancelled = summary.cancelled,
            "batch finished"
        );
        summary
    }

    /// Scrapes one product page. Never fails; errors become
    /// [`CrawlOutcome::Failed`].
    pub async fn scrape_one(&self, url: &str) -> CrawlOutcome {
        match self.try_scrape(url).await {
            Ok(Scraped::Stored { record, id }) => CrawlOutcome::Success { record, id },
            Ok(Scraped::BrandRejected { brand }) => CrawlOutcome::Skipped {
                reason: SkipReason::BrandNotAllowed,
                brand,
            },
            Err(error) => CrawlOutcome::Failed(error),
        }
    }

    async fn try_scrape(&self, url: &str) -> Result<Scraped, ScraperError> {
        parse_absolute(url)?;
        if self.cancel.is_cancelled() {
            return Err(ScraperError::Cancelled);
        }
        let page = self.fetcher.load(url).await?;
        let result = self.extract_and_store(&page, url).await;
        page.close().await;
        result
    }

    async fn extract_and_store<P: PageHandle>(
        &self,
        page: &P,
        url: &str,
    ) -> Result<Scraped, ScraperError> {
        let wait = self.options.selector_wait;
        let set = self.selectors;

        let name = extract(page, set.title, Mode::Text, wait)
            .await?
            .ok_or_else(|| unresolved("name", url))?;
        let price = extract(page, set.price, Mode::Text, wait)
            .await?
            .as_deref()
            .and_then(parse_price)
            .ok_or_else(|| unresolved("price", url))?;

        let brand = self.resolve_brand(page, wait).await?;
        if !self.filter.is_allowed(&brand) {
            return Ok(Scraped::BrandRejected { brand });
        }

        let color = extract(page, set.color, Mode::Text, wait)
            .await?
            .unwrap_or_else(|| UNKNOWN.to_owned());
        let available_sizes = extract_sizes(page, set.sizes, wait).await?;
        let image_url = extract_image(page, set.image, wait).await?;

        let record = ProductRecord {
            name,
            price,
            brand,
            color,
            image_url,
            available_sizes,
            source_url: url.to_owned(),
        };
        record.validate()?;

        let id = self.sink.insert(&record).await?;
        tracing::info!(id, url, name = %record.name, price = record.price, "product stored");
        Ok(Scraped::Stored { record, id })
    }

    /// Visible brand text first, then the brand meta tag, else `"Unknown"`.
    async fn resolve_brand<P: PageHandle>(
        &self,
        page: &P,
        wait: Duration,
    ) -> Result<String, ScraperError> {
        if let Some(brand) = extract(page, self.selectors.brand, Mode::Text, wait).await? {
            return Ok(brand);
        }
        let meta = extract(
            page,
            self.selectors.brand_meta,
            Mode::Attribute(BRAND_META_ATTRIBUTE),
            wait,
        )
        .await?;
        Ok(meta.unwrap_or_else(|| UNKNOWN.to_owned()))
    }
}

fn unresolved(field: &'static str, url: &str) -> ScraperError {
    ScraperError::RequiredFieldUnresolved {
        field,
        url: url.to_owned(),
    }
}

#[cfg(test)]
#[path = "orchestrator_test.rs"]
mod tests;
