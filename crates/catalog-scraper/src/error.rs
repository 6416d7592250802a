use catalog_core::{SinkError, ValidationError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("navigation to {url} did not settle within {timeout_secs}s")]
    NavigationTimeout { url: String, timeout_secs: u64 },

    #[error("required field `{field}` could not be resolved on {url}")]
    RequiredFieldUnresolved { field: &'static str, url: String },

    #[error("failed to fetch listing page {page} ({url}): {source}")]
    PaginationFetch {
        url: String,
        page: usize,
        #[source]
        source: Box<ScraperError>,
    },

    #[error("record sink write failed: {0}")]
    SinkWrite(#[from] SinkError),

    #[error("browser launch failed: {0}")]
    BrowserLaunch(String),

    #[error("browser error while {context}: {reason}")]
    Browser { context: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("rate limited by {domain} (retry after {retry_after_secs}s)")]
    RateLimited {
        domain: String,
        retry_after_secs: u64,
    },

    #[error("invalid URL \"{url}\": {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid selector \"{selector}\": {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("scraped record failed validation: {0}")]
    InvalidRecord(#[from] ValidationError),

    #[error("crawl cancelled")]
    Cancelled,
}

impl ScraperError {
    pub(crate) fn browser(context: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Browser {
            context: context.into(),
            reason: reason.to_string(),
        }
    }

    /// `true` when the failure means no page can be loaded at all, as opposed
    /// to a problem with one particular target.
    #[must_use]
    pub fn is_backend_unavailable(&self) -> bool {
        match self {
            Self::BrowserLaunch(_) => true,
            Self::PaginationFetch { source, .. } => source.is_backend_unavailable(),
            _ => false,
        }
    }
}
