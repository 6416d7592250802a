pub mod brand_filter;
pub mod cancel;
pub mod error;
pub mod extract;
pub mod fetcher;
pub mod orchestrator;
pub mod pagination;
pub mod selectors;
pub mod urls;

mod retry;

#[cfg(test)]
mod fake;

pub use brand_filter::BrandFilter;
pub use cancel::CancelFlag;
pub use error::ScraperError;
pub use extract::{extract, parse_price, tokenize_sizes, Mode};
pub use fetcher::{
    BackendFetcher, BackendPage, ChromeFetcher, FetchOptions, HtmlPage, HttpFetcher, PageFetcher,
    PageHandle,
};
pub use orchestrator::{BatchSummary, CrawlOptions, CrawlOutcome, Orchestrator, SkipReason};
pub use pagination::{collect_urls, WalkOptions, WalkState};
pub use selectors::{selector_set, SelectorSet};
