mod api;
mod middleware;

use std::sync::Arc;

use catalog_scraper::{
    selector_set, BackendFetcher, BrandFilter, CancelFlag, CrawlOptions, FetchOptions,
    Orchestrator,
};
use tracing_subscriber::EnvFilter;

use crate::api::{build_app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = catalog_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = catalog_db::PoolConfig::from_app_config(&config);
    let pool = catalog_db::connect_pool(&config.database_url, pool_config).await?;
    let applied = catalog_db::run_migrations(&pool).await?;
    tracing::info!(applied, "migrations up to date");

    let fetcher = BackendFetcher::new(
        config.scraper_backend,
        FetchOptions::from_app_config(&config),
    )?;
    let cancel = CancelFlag::new();
    let orchestrator = Arc::new(
        Orchestrator::new(
            fetcher,
            catalog_db::PgRecordSink::new(pool.clone()),
            selector_set(config.site_layout),
            BrandFilter::new(&config.brand_allow_list),
            CrawlOptions::from_app_config(&config),
        )
        .with_cancel(cancel.clone()),
    );

    let app = build_app(AppState::new(
        pool,
        Arc::clone(&orchestrator),
        config.target_base_url.clone(),
    ));

    tracing::info!(
        bind_addr = %config.bind_addr,
        env = %config.env,
        backend = %config.scraper_backend,
        layout = %config.site_layout,
        "catalog server listening"
    );
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel))
        .await?;

    orchestrator.fetcher().shutdown().await;
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM and stops any running crawl at its next
/// item boundary.
async fn shutdown_signal(cancel: CancelFlag) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
    cancel.cancel();
}
