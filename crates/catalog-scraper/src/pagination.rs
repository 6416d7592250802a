//! Category pagination walker.
//!
//! Starting at a category root, loads listing pages one after another,
//! collecting product-detail links, and follows the "next" control until a
//! page has none.
//!
//! ```text
//! FetchingPage(1) --next found--> HasNext --> FetchingPage(2) --> ... --no next--> Done
//! ```
//!
//! The result is fully materialized before any product is scraped. A fetch
//! failure on any page aborts the whole walk: a partial catalog cannot be
//! told apart from a broken site structure.

use std::collections::HashSet;
use std::time::Duration;

use crate::cancel::CancelFlag;
use crate::error::ScraperError;
use crate::extract::{extract, Mode};
use crate::fetcher::{PageFetcher, PageHandle};
use crate::selectors::HREF_ATTRIBUTE;
use crate::urls::{absolutize_url, parse_absolute};

#[derive(Debug, Clone)]
pub struct WalkOptions {
    /// Per-candidate wait for link and "next" selectors.
    pub selector_wait: Duration,
    /// Pause before loading each page after the first.
    pub inter_page_delay: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkState {
    FetchingPage { url: String, page: usize },
    HasNext { url: String, page: usize },
    Done,
}

/// Collects every product-detail URL reachable from `base_url`, in page order.
///
/// Links are taken from the first `link_selectors` candidate that matches
/// any anchor with an `href`; duplicates are kept. A "next" link pointing at
/// an already visited page ends the walk.
///
/// # Errors
///
/// - [`ScraperError::InvalidUrl`] if `base_url` is not an absolute http(s) URL.
/// - [`ScraperError::PaginationFetch`] if any listing page fails to load or query.
/// - [`ScraperError::Cancelled`] if `cancel` is set before a page load.
pub async fn collect_urls<F: PageFetcher>(
    fetcher: &F,
    base_url: &str,
    link_selectors: &[&str],
    next_selectors: &[&str],
    options: &WalkOptions,
    cancel: &CancelFlag,
) -> Result<Vec<String>, ScraperError> {
    let start = parse_absolute(base_url)?.to_string();
    let mut urls = Vec::new();
    let mut visited = HashSet::new();
    let mut state = WalkState::FetchingPage {
        url: start,
        page: 1,
    };

    loop {
        state = match state {
            WalkState::FetchingPage { url, page } => {
                if cancel.is_cancelled() {
                    return Err(ScraperError::Cancelled);
                }
                visited.insert(url.clone());

                let (links, next) =
                    fetch_listing(fetcher, &url, link_selectors, next_selectors, options)
                        .await
                        .map_err(|source| ScraperError::PaginationFetch {
                            url: url.clone(),
                            page,
                            source: Box::new(source),
                        })?;

                urls.extend(links.iter().cloned());
                tracing::info!(
                    page,
                    url = %url,
                    links = links.len(),
                    total = urls.len(),
                    "listing page walked"
                );

                match next {
                    Some(next_url) => WalkState::HasNext {
                        url: next_url,
                        page,
                    },
                    None => WalkState::Done,
                }
            }
            WalkState::HasNext { url, page } => {
                if visited.contains(&url) {
                    tracing::warn!(page, url = %url, "next page already visited; stopping walk");
                    WalkState::Done
                } else {
                    tokio::time::sleep(options.inter_page_delay).await;
                    WalkState::FetchingPage {
                        url,
                        page: page + 1,
                    }
                }
            }
            WalkState::Done => return Ok(urls),
        };
    }
}

/// Loads one listing page and returns its product links and the resolved
/// "next" URL. The page is released on every path.
async fn fetch_listing<F: PageFetcher>(
    fetcher: &F,
    url: &str,
    link_selectors: &[&str],
    next_selectors: &[&str],
    options: &WalkOptions,
) -> Result<(Vec<String>, Option<String>), ScraperError> {
    let page = fetcher.load(url).await?;
    let result = read_listing(&page, link_selectors, next_selectors, options.selector_wait).await;
    page.close().await;
    result
}

async fn read_listing<P: PageHandle>(
    page: &P,
    link_selectors: &[&str],
    next_selectors: &[&str],
    wait: Duration,
) -> Result<(Vec<String>, Option<String>), ScraperError> {
    let base = page.url().to_owned();

    let mut links = Vec::new();
    for candidate in link_selectors {
        let hrefs = page.query_all_attr(candidate, HREF_ATTRIBUTE, wait).await?;
        links = hrefs
            .iter()
            .filter_map(|href| absolutize_url(&base, href))
            .collect();
        if !links.is_empty() {
            break;
        }
    }

    let next = extract(page, next_selectors, Mode::Attribute(HREF_ATTRIBUTE), wait)
        .await?
        .and_then(|href| absolutize_url(&base, &href));

    Ok((links, next))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{FakeFetcher, FakePage};

    const LINK: &str = ".card a";
    const NEXT: &str = "a.next";

    fn options() -> WalkOptions {
        WalkOptions {
            selector_wait: Duration::ZERO,
            inter_page_delay: Duration::ZERO,
        }
    }

    fn listing(url: &str, products: &[&str], next: Option<&str>) -> FakePage {
        let mut page = FakePage::new(url);
        for product in products {
            page = page.attr(LINK, "href", product);
        }
        if let Some(next) = next {
            page = page.attr(NEXT, "href", next);
        }
        page
    }

    #[tokio::test]
    async fn walks_until_no_next_control() {
        let fetcher = FakeFetcher::new()
            .page(listing(
                "https://shop.example.com/c/shoes",
                &["/p/1", "/p/2"],
                Some("/c/shoes?page=2"),
            ))
            .page(listing(
                "https://shop.example.com/c/shoes?page=2",
                &["/p/3"],
                Some("https://shop.example.com/c/shoes?page=3"),
            ))
            .page(listing(
                "https://shop.example.com/c/shoes?page=3",
                &["/p/4", "/p/2"],
                None,
            ));

        let urls = collect_urls(
            &fetcher,
            "https://shop.example.com/c/shoes",
            &[LINK],
            &[NEXT],
            &options(),
            &CancelFlag::new(),
        )
        .await
        .unwrap();

        assert_eq!(
            urls,
            vec![
                "https://shop.example.com/p/1",
                "https://shop.example.com/p/2",
                "https://shop.example.com/p/3",
                "https://shop.example.com/p/4",
                "https://shop.example.com/p/2",
            ]
        );
        assert_eq!(fetcher.loads().len(), 3, "must not request a fourth page");
        assert_eq!(fetcher.closes(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn pauses_between_listing_pages_only() {
        let delay = Duration::from_millis(400);
        let fetcher = FakeFetcher::new()
            .page(listing("https://shop.example.com/c", &["/p/1"], Some("/c?page=2")))
            .page(listing("https://shop.example.com/c?page=2", &["/p/2"], Some("/c?page=3")))
            .page(listing("https://shop.example.com/c?page=3", &["/p/3"], None));
        let walk = WalkOptions {
            selector_wait: Duration::ZERO,
            inter_page_delay: delay,
        };

        let started = tokio::time::Instant::now();
        let urls = collect_urls(
            &fetcher,
            "https://shop.example.com/c",
            &[LINK],
            &[NEXT],
            &walk,
            &CancelFlag::new(),
        )
        .await
        .unwrap();
        assert_eq!(urls.len(), 3);
        let elapsed = started.elapsed();
        assert!(elapsed >= delay * 2 && elapsed < delay * 3, "took {elapsed:?}");
    }

    #[tokio::test]
    async fn link_selector_fallback_uses_first_matching_candidate() {
        let page = FakePage::new("https://shop.example.com/c")
            .attr(".legacy a", "href", "/p/old")
            .attr(".grid a", "href", "/p/new");
        let fetcher = FakeFetcher::new().page(page);
        let urls = collect_urls(
            &fetcher,
            "https://shop.example.com/c",
            &[".missing a", ".grid a", ".legacy a"],
            &[NEXT],
            &options(),
            &CancelFlag::new(),
        )
        .await
        .unwrap();
        assert_eq!(urls, vec!["https://shop.example.com/p/new"]);
    }

    #[tokio::test]
    async fn failure_on_any_page_aborts_walk() {
        let fetcher = FakeFetcher::new()
            .page(listing(
                "https://shop.example.com/c",
                &["/p/1"],
                Some("/c?page=2"),
            ))
            .timeout("https://shop.example.com/c?page=2");

        let err = collect_urls(
            &fetcher,
            "https://shop.example.com/c",
            &[LINK],
            &[NEXT],
            &options(),
            &CancelFlag::new(),
        )
        .await
        .unwrap_err();

        match err {
            ScraperError::PaginationFetch { page, url, source } => {
                assert_eq!(page, 2);
                assert_eq!(url, "https://shop.example.com/c?page=2");
                assert!(matches!(*source, ScraperError::NavigationTimeout { .. }));
            }
            other => panic!("expected PaginationFetch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn next_pointing_back_ends_walk() {
        let fetcher = FakeFetcher::new()
            .page(listing(
                "https://shop.example.com/c",
                &["/p/1"],
                Some("/c?page=2"),
            ))
            .page(listing(
                "https://shop.example.com/c?page=2",
                &["/p/2"],
                Some("/c"),
            ));

        let urls = collect_urls(
            &fetcher,
            "https://shop.example.com/c",
            &[LINK],
            &[NEXT],
            &options(),
            &CancelFlag::new(),
        )
        .await
        .unwrap();
        assert_eq!(urls.len(), 2);
        assert_eq!(fetcher.loads().len(), 2);
    }

    #[tokio::test]
    async fn cancelled_before_first_page() {
        let fetcher = FakeFetcher::new();
        let cancel = CancelFlag::new();
        cancel.cancel();
        let err = collect_urls(
            &fetcher,
            "https://shop.example.com/c",
            &[LINK],
            &[NEXT],
            &options(),
            &cancel,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ScraperError::Cancelled));
        assert!(fetcher.loads().is_empty());
    }

    #[tokio::test]
    async fn relative_base_url_is_rejected() {
        let err = collect_urls(
            &FakeFetcher::new(),
            "/c/shoes",
            &[LINK],
            &[NEXT],
            &options(),
            &CancelFlag::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ScraperError::InvalidUrl { .. }));
    }
}
