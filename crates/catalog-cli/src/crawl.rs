//! Scrape and crawl command handlers.
//!
//! Both build the same orchestrator the server uses. `--dry-run` swaps the
//! Postgres sink for an in-memory one and prints what would have been stored.

use catalog_core::{AppConfig, MemorySink, ProductRecord, RecordSink, SinkError, SinkId, SiteLayout};
use catalog_db::PgRecordSink;
use catalog_scraper::{
    selector_set, BackendFetcher, BatchSummary, BrandFilter, CancelFlag, CrawlOptions,
    CrawlOutcome, FetchOptions, Orchestrator,
};

/// Sink chosen at runtime by `--dry-run`.
enum CliSink {
    Db(PgRecordSink),
    Memory(MemorySink),
}

impl CliSink {
    async fn connect(config: &AppConfig, dry_run: bool) -> anyhow::Result<Self> {
        if dry_run {
            return Ok(Self::Memory(MemorySink::new()));
        }
        let pool = catalog_db::connect_pool_from_config(config).await?;
        Ok(Self::Db(PgRecordSink::new(pool)))
    }

    fn dry_run_records(&self) -> Option<Vec<ProductRecord>> {
        match self {
            Self::Memory(sink) => Some(sink.records()),
            Self::Db(_) => None,
        }
    }
}

impl RecordSink for CliSink {
    async fn insert(&self, record: &ProductRecord) -> Result<SinkId, SinkError> {
        match self {
            Self::Db(sink) => sink.insert(record).await,
            Self::Memory(sink) => sink.insert(record).await,
        }
    }
}

async fn build_orchestrator(
    config: &AppConfig,
    layout: SiteLayout,
    dry_run: bool,
) -> anyhow::Result<Orchestrator<BackendFetcher, CliSink>> {
    let fetcher = BackendFetcher::new(
        config.scraper_backend,
        FetchOptions::from_app_config(config),
    )?;
    let sink = CliSink::connect(config, dry_run).await?;
    let orchestrator = Orchestrator::new(
        fetcher,
        sink,
        selector_set(layout),
        BrandFilter::new(&config.brand_allow_list),
        CrawlOptions::from_app_config(config),
    )
    .with_cancel(cancel_on_ctrl_c());
    Ok(orchestrator)
}

/// Returns a flag that flips on the first Ctrl-C. The running item finishes;
/// the next one is not started.
fn cancel_on_ctrl_c() -> CancelFlag {
    let cancel = CancelFlag::new();
    let flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("interrupt received; stopping after the current item");
            flag.cancel();
        }
    });
    cancel
}

/// Scrapes one product page.
///
/// # Errors
///
/// Returns an error if the sink cannot be opened or the item fails; a brand
/// skip is not an error.
pub(crate) async fn run_scrape(config: &AppConfig, url: &str, dry_run: bool) -> anyhow::Result<()> {
    let orchestrator = build_orchestrator(config, config.site_layout, dry_run).await?;
    let outcome = orchestrator.scrape_one(url).await;
    orchestrator.fetcher().shutdown().await;

    match outcome {
        CrawlOutcome::Success { record, id } => {
            if dry_run {
                println!("dry-run: would store {}", serde_json::to_string_pretty(&record)?);
            } else {
                println!("stored product {id}: {} ({})", record.name, record.brand);
            }
            Ok(())
        }
        CrawlOutcome::Skipped { reason, brand } => {
            println!("skipped {url}: {} (brand: {brand})", reason.as_str());
            Ok(())
        }
        CrawlOutcome::Failed(error) => Err(anyhow::anyhow!("scrape of {url} failed: {error}")),
    }
}

/// Walks the category and scrapes every product found, then prints the
/// tri-counter.
///
/// # Errors
///
/// Returns an error if no base URL is configured, the sink cannot be opened,
/// or discovery fails. Per-item failures are only counted.
pub(crate) async fn run_crawl(
    config: &AppConfig,
    base_url: Option<&str>,
    layout: Option<SiteLayout>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let base_url = resolve_base_url(base_url, config)?;
    let layout = layout.unwrap_or(config.site_layout);
    tracing::info!(base_url = %base_url, layout = %layout, dry_run, "crawl started");

    let orchestrator = build_orchestrator(config, layout, dry_run).await?;
    let result = orchestrator.crawl(&base_url).await;
    orchestrator.fetcher().shutdown().await;
    let summary = result?;

    if let Some(records) = orchestrator.sink().dry_run_records() {
        for record in &records {
            println!("{}", serde_json::to_string(record)?);
        }
    }
    println!("{}", format_summary(&summary));
    Ok(())
}

pub(crate) fn resolve_base_url(arg: Option<&str>, config: &AppConfig) -> anyhow::Result<String> {
    arg.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .or_else(|| config.target_base_url.clone())
        .ok_or_else(|| {
            anyhow::anyhow!("no category URL: pass --base-url or set CATALOG_TARGET_BASE_URL")
        })
}

pub(crate) fn format_summary(summary: &BatchSummary) -> String {
    let mut line = format!(
        "crawl complete: {} stored, {} skipped, {} failed",
        summary.success_count, summary.skipped_count, summary.failure_count
    );
    if summary.cancelled {
        line.push_str(" (cancelled before the last item)");
    }
    line
}
