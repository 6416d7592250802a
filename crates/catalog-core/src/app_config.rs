use std::net::SocketAddr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Which page-loading backend the crawler drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScraperBackend {
    /// Headless Chrome over CDP; runs page scripts.
    Chrome,
    /// Plain HTTP GET plus static HTML parsing.
    Http,
}

impl std::fmt::Display for ScraperBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScraperBackend::Chrome => write!(f, "chrome"),
            ScraperBackend::Http => write!(f, "http"),
        }
    }
}

/// Storefront markup generation the selector tables are written against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteLayout {
    Storefront,
    Classic,
}

impl std::fmt::Display for SiteLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SiteLayout::Storefront => write!(f, "storefront"),
            SiteLayout::Classic => write!(f, "classic"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    /// Default category root for batch crawls.
    pub target_base_url: Option<String>,
    pub site_layout: SiteLayout,
    pub brand_allow_list: Vec<String>,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub scraper_backend: ScraperBackend,
    pub scraper_headless: bool,
    pub scraper_user_agent: String,
    pub scraper_accept_language: String,
    pub scraper_navigation_timeout_secs: u64,
    pub scraper_selector_wait_ms: u64,
    pub scraper_inter_request_delay_ms: u64,
    pub scraper_max_retries: u32,
    pub scraper_retry_backoff_base_secs: u64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("target_base_url", &self.target_base_url)
            .field("site_layout", &self.site_layout)
            .field("brand_allow_list", &self.brand_allow_list)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("scraper_backend", &self.scraper_backend)
            .field("scraper_headless", &self.scraper_headless)
            .field("scraper_user_agent", &self.scraper_user_agent)
            .field("scraper_accept_language", &self.scraper_accept_language)
            .field(
                "scraper_navigation_timeout_secs",
                &self.scraper_navigation_timeout_secs,
            )
            .field("scraper_selector_wait_ms", &self.scraper_selector_wait_ms)
            .field(
                "scraper_inter_request_delay_ms",
                &self.scraper_inter_request_delay_ms,
            )
            .field("scraper_max_retries", &self.scraper_max_retries)
            .field(
                "scraper_retry_backoff_base_secs",
                &self.scraper_retry_backoff_base_secs,
            )
            .finish()
    }
}
