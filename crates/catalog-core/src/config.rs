use std::path::Path;

use crate::app_config::{AppConfig, Environment, ScraperBackend, SiteLayout};
use crate::brands::{default_allow_list, load_allow_list_file};
use crate::ConfigError;

/// Desktop Chrome user agent presented to the target site by default.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files; useful for testing
/// or when the caller manages env setup.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// This is the core parsing/validation logic, decoupled from the actual environment
/// so it can be tested with a pure `HashMap` lookup; no `set_var`/`remove_var` needed.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        or_default(var, default)
            .parse::<SocketAddr>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_bool = |var: &str, default: &str| -> Result<bool, ConfigError> {
        match or_default(var, default).to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(invalid(var, format!("expected a boolean, got '{other}'"))),
        }
    };

    let database_url = require("DATABASE_URL")?;

    let env = parse_environment(&or_default("CATALOG_ENV", "development"))?;

    let bind_addr = parse_addr("CATALOG_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("CATALOG_LOG_LEVEL", "info");
    let target_base_url = lookup("CATALOG_TARGET_BASE_URL")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    let site_layout = parse_site_layout(&or_default("CATALOG_SITE_LAYOUT", "storefront"))?;
    let brand_allow_list = resolve_allow_list(
        lookup("CATALOG_BRAND_ALLOW_LIST").ok().as_deref(),
        lookup("CATALOG_BRANDS_PATH").ok().as_deref(),
    )?;

    let db_max_connections = parse_u32("CATALOG_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("CATALOG_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("CATALOG_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let scraper_backend = parse_backend(&or_default("CATALOG_SCRAPER_BACKEND", "chrome"))?;
    let scraper_headless = parse_bool("CATALOG_SCRAPER_HEADLESS", "true")?;
    let scraper_user_agent = or_default("CATALOG_SCRAPER_USER_AGENT", DEFAULT_USER_AGENT);
    let scraper_accept_language =
        or_default("CATALOG_SCRAPER_ACCEPT_LANGUAGE", "en-US,en;q=0.9");
    let scraper_navigation_timeout_secs =
        parse_u64("CATALOG_SCRAPER_NAVIGATION_TIMEOUT_SECS", "60")?;
    let scraper_selector_wait_ms = parse_u64("CATALOG_SCRAPER_SELECTOR_WAIT_MS", "3000")?;
    let scraper_inter_request_delay_ms =
        parse_u64("CATALOG_SCRAPER_INTER_REQUEST_DELAY_MS", "1000")?;
    let scraper_max_retries = parse_u32("CATALOG_SCRAPER_MAX_RETRIES", "2")?;
    let scraper_retry_backoff_base_secs =
        parse_u64("CATALOG_SCRAPER_RETRY_BACKOFF_BASE_SECS", "1")?;

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        target_base_url,
        site_layout,
        brand_allow_list,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        scraper_backend,
        scraper_headless,
        scraper_user_agent,
        scraper_accept_language,
        scraper_navigation_timeout_secs,
        scraper_selector_wait_ms,
        scraper_inter_request_delay_ms,
        scraper_max_retries,
        scraper_retry_backoff_base_secs,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "CATALOG_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

fn parse_site_layout(s: &str) -> Result<SiteLayout, ConfigError> {
    match s.to_ascii_lowercase().as_str() {
        "storefront" => Ok(SiteLayout::Storefront),
        "classic" => Ok(SiteLayout::Classic),
        other => Err(ConfigError::InvalidEnvVar {
            var: "CATALOG_SITE_LAYOUT".to_string(),
            reason: format!("unknown site layout '{other}'"),
        }),
    }
}

fn parse_backend(s: &str) -> Result<ScraperBackend, ConfigError> {
    match s.to_ascii_lowercase().as_str() {
        "chrome" => Ok(ScraperBackend::Chrome),
        "http" => Ok(ScraperBackend::Http),
        other => Err(ConfigError::InvalidEnvVar {
            var: "CATALOG_SCRAPER_BACKEND".to_string(),
            reason: format!("unknown backend '{other}'"),
        }),
    }
}

/// Picks the allow-list: inline list, then YAML file, then the built-in default.
fn resolve_allow_list(
    inline: Option<&str>,
    path: Option<&str>,
) -> Result<Vec<String>, ConfigError> {
    if let Some(raw) = inline {
        let names: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToOwned::to_owned)
            .collect();
        if names.is_empty() {
            return Err(ConfigError::InvalidEnvVar {
                var: "CATALOG_BRAND_ALLOW_LIST".to_string(),
                reason: "allow-list is empty".to_string(),
            });
        }
        return Ok(names);
    }

    if let Some(path) = path.map(str::trim).filter(|p| !p.is_empty()) {
        return Ok(load_allow_list_file(Path::new(path))?.into_names());
    }

    Ok(default_allow_list())
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
