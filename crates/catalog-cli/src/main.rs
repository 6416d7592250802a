mod crawl;

use catalog_core::SiteLayout;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "catalog-cli")]
#[command(about = "Product catalog scraper command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Scrape a single product-detail page.
    Scrape {
        url: String,
        /// Extract and print the record without writing to the database.
        #[arg(long)]
        dry_run: bool,
    },
    /// Walk a category and scrape every product it lists.
    Crawl {
        /// Category root; defaults to `CATALOG_TARGET_BASE_URL`.
        #[arg(long)]
        base_url: Option<String>,
        /// Selector table; defaults to `CATALOG_SITE_LAYOUT`.
        #[arg(long, value_enum)]
        layout: Option<LayoutArg>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Apply pending database migrations.
    Migrate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LayoutArg {
    Storefront,
    Classic,
}

impl From<LayoutArg> for SiteLayout {
    fn from(arg: LayoutArg) -> Self {
        match arg {
            LayoutArg::Storefront => Self::Storefront,
            LayoutArg::Classic => Self::Classic,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("catalog-cli ready; run with --help for commands");
        return Ok(());
    };

    let config = catalog_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match command {
        Commands::Scrape { url, dry_run } => crawl::run_scrape(&config, &url, dry_run).await,
        Commands::Crawl {
            base_url,
            layout,
            dry_run,
        } => {
            crawl::run_crawl(
                &config,
                base_url.as_deref(),
                layout.map(SiteLayout::from),
                dry_run,
            )
            .await
        }
        Commands::Migrate => {
            let pool = catalog_db::connect_pool_from_config(&config).await?;
            let applied = catalog_db::run_migrations(&pool).await?;
            println!("migrations applied: {applied}");
            Ok(())
        }
    }
}
