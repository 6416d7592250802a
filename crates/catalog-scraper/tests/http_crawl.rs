//! End-to-end crawls against a local `wiremock` storefront using the static
//! HTTP backend and the storefront selector table.

use std::sync::Arc;
use std::time::Duration;

use catalog_core::{MemorySink, SiteLayout};
use catalog_scraper::{
    selector_set, BrandFilter, CrawlOptions, CrawlOutcome, FetchOptions, HttpFetcher,
    Orchestrator, ScraperError,
};
use wiremock::matchers::{header, headers, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LISTING_PAGE_1: &str = r#"
<html><body>
  <div class="product-grid">
    <div class="product-card" data-testid="product-card"><a class="product-link" href="/p/air-max-90">Air Max 90</a></div>
    <div class="product-card" data-testid="product-card"><a class="product-link" href="/p/acme-runner">Acme Runner</a></div>
  </div>
  <nav class="pagination"><a data-testid="pagination-next" href="/c/sneakers/page/2">Next</a></nav>
</body></html>
"#;

const LISTING_PAGE_2: &str = r#"
<html><body>
  <div class="product-grid">
    <div class="product-card" data-testid="product-card"><a class="product-link" href="/p/no-price">No Price</a></div>
  </div>
</body></html>
"#;

const AIR_MAX: &str = r#"
<html><body>
  <h1 data-testid="product-title">Air Max 90</h1>
  <div data-testid="product-price"><span class="price-current">$129.99</span></div>
  <a data-testid="product-brand">Nike Sportswear</a>
  <div data-testid="product-color"><span class="value">Infrared</span></div>
  <div data-testid="size-selector">
    <button>40</button><button disabled>41</button><button>42 1/2</button>
  </div>
  <div data-testid="product-image"><img src="/img/thumb.jpg" data-zoom-image="/img/full.jpg"></div>
</body></html>
"#;

const ACME_RUNNER: &str = r#"
<html><body>
  <h1 class="product-title">Acme Runner</h1>
  <div class="product-price">49.00</div>
  <div class="product-brand">Acme Shoes</div>
</body></html>
"#;

const NO_PRICE: &str = r#"
<html><body>
  <h1>Sold Out Sneaker</h1>
  <div class="product-brand">Nike</div>
</body></html>
"#;

fn fetch_options(max_retries: u32) -> FetchOptions {
    FetchOptions {
        user_agent: "catalog-test/0.1".to_owned(),
        accept_language: "en-US,en;q=0.9".to_owned(),
        navigation_timeout: Duration::from_secs(5),
        headless: true,
        max_retries,
        retry_backoff_base_secs: 0,
    }
}

fn orchestrator(max_retries: u32, sink: Arc<MemorySink>) -> Orchestrator<HttpFetcher, Arc<MemorySink>> {
    let fetcher = HttpFetcher::new(fetch_options(max_retries)).expect("failed to build test fetcher");
    Orchestrator::new(
        fetcher,
        sink,
        selector_set(SiteLayout::Storefront),
        BrandFilter::new(["Nike", "Adidas"]),
        CrawlOptions {
            selector_wait: Duration::ZERO,
            inter_request_delay: Duration::ZERO,
        },
    )
}

async fn mount_html(server: &MockServer, at: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html; charset=utf-8"))
        .mount(server)
        .await;
}

#[tokio::test]
async fn crawl_tallies_success_skip_and_failure() {
    let server = MockServer::start().await;
    mount_html(&server, "/c/sneakers", LISTING_PAGE_1).await;
    mount_html(&server, "/c/sneakers/page/2", LISTING_PAGE_2).await;
    mount_html(&server, "/p/air-max-90", AIR_MAX).await;
    mount_html(&server, "/p/acme-runner", ACME_RUNNER).await;
    mount_html(&server, "/p/no-price", NO_PRICE).await;

    let sink = Arc::new(MemorySink::new());
    let orch = orchestrator(0, Arc::clone(&sink));
    let summary = orch
        .crawl(&format!("{}/c/sneakers", server.uri()))
        .await
        .expect("discovery should succeed");

    assert_eq!(summary.success_count, 1);
    assert_eq!(summary.skipped_count, 1);
    assert_eq!(summary.failure_count, 1);
    assert!(!summary.cancelled);

    let records = sink.records();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.name, "Air Max 90");
    assert!((record.price - 129.99).abs() < f64::EPSILON);
    assert_eq!(record.brand, "Nike Sportswear");
    assert_eq!(record.color, "Infrared");
    assert_eq!(record.available_sizes, vec!["40", "42 1/2"]);
    assert_eq!(record.image_url, format!("{}/img/full.jpg", server.uri()));
    assert_eq!(record.source_url, format!("{}/p/air-max-90", server.uri()));
}

#[tokio::test]
async fn listing_failure_aborts_discovery() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/c/sneakers"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let sink = Arc::new(MemorySink::new());
    let err = orchestrator(0, Arc::clone(&sink))
        .crawl(&format!("{}/c/sneakers", server.uri()))
        .await
        .unwrap_err();

    match err {
        ScraperError::PaginationFetch { page, source, .. } => {
            assert_eq!(page, 1);
            assert!(matches!(
                *source,
                ScraperError::UnexpectedStatus { status: 500, .. }
            ));
        }
        other => panic!("expected PaginationFetch, got {other:?}"),
    }
    assert!(sink.is_empty());
}

#[tokio::test]
async fn rate_limited_page_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/p/air-max-90"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_html(&server, "/p/air-max-90", AIR_MAX).await;

    let sink = Arc::new(MemorySink::new());
    let outcome = orchestrator(1, Arc::clone(&sink))
        .scrape_one(&format!("{}/p/air-max-90", server.uri()))
        .await;

    assert!(
        matches!(outcome, CrawlOutcome::Success { .. }),
        "expected success after retry, got {outcome:?}"
    );
    assert_eq!(sink.len(), 1);
}

#[tokio::test]
async fn missing_product_page_is_a_failure_not_an_abort() {
    let server = MockServer::start().await;
    mount_html(&server, "/p/air-max-90", AIR_MAX).await;

    let sink = Arc::new(MemorySink::new());
    let urls = vec![
        format!("{}/p/gone", server.uri()),
        format!("{}/p/air-max-90", server.uri()),
    ];
    let summary = orchestrator(0, Arc::clone(&sink)).run_batch(&urls).await;

    assert_eq!(summary.failure_count, 1);
    assert_eq!(summary.success_count, 1);
    assert_eq!(summary.processed(), 2);
}

#[tokio::test]
async fn identity_headers_are_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/p/air-max-90"))
        .and(headers("accept-language", vec!["en-US", "en;q=0.9"]))
        .and(header("user-agent", "catalog-test/0.1"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(AIR_MAX, "text/html"))
        .expect(1)
        .mount(&server)
        .await;

    let sink = Arc::new(MemorySink::new());
    let outcome = orchestrator(0, Arc::clone(&sink))
        .scrape_one(&format!("{}/p/air-max-90", server.uri()))
        .await;
    assert!(matches!(outcome, CrawlOutcome::Success { .. }));
}

#[tokio::test]
async fn repeated_scrape_stores_duplicates() {
    let server = MockServer::start().await;
    mount_html(&server, "/p/air-max-90", AIR_MAX).await;

    let sink = Arc::new(MemorySink::new());
    let url = format!("{}/p/air-max-90", server.uri());
    let summary = orchestrator(0, Arc::clone(&sink))
        .run_batch(&[url.clone(), url])
        .await;

    assert_eq!(summary.success_count, 2);
    let records = sink.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0], records[1]);
}
