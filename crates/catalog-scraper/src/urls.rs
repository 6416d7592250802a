//! URL helpers shared by the extractor, walker and HTTP backend.

use crate::error::ScraperError;

/// Parses `url` as an absolute URL.
///
/// # Errors
///
/// Returns [`ScraperError::InvalidUrl`] if `url` is not absolute or does not parse.
pub fn parse_absolute(url: &str) -> Result<reqwest::Url, ScraperError> {
    let parsed = reqwest::Url::parse(url.trim()).map_err(|e| ScraperError::InvalidUrl {
        url: url.to_owned(),
        reason: e.to_string(),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ScraperError::InvalidUrl {
            url: url.to_owned(),
            reason: format!("unsupported scheme '{}'", parsed.scheme()),
        });
    }
    Ok(parsed)
}

/// Extracts the scheme+host origin, e.g. `"https://shop.example.com"` from
/// `"https://shop.example.com/c/sneakers?page=2"`.
#[must_use]
pub fn extract_origin(url: &str) -> Option<String> {
    reqwest::Url::parse(url)
        .ok()
        .map(|u| u.origin().ascii_serialization())
        .filter(|origin| origin != "null")
}

/// Extracts the hostname for use in error messages.
///
/// Falls back to the full URL string if parsing fails.
pub(crate) fn extract_domain(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_owned))
        .unwrap_or_else(|| url.to_owned())
}

/// Resolves `candidate` against `base`. Absolute candidates pass through,
/// protocol-relative and root-relative ones take the base's scheme and host.
/// HTML-escaped ampersands left in attribute values are unescaped first.
#[must_use]
pub fn absolutize_url(base: &str, candidate: &str) -> Option<String> {
    let candidate = candidate.trim().replace("&amp;", "&");
    if candidate.is_empty() || candidate.starts_with('#') {
        return None;
    }
    let base = reqwest::Url::parse(base).ok()?;
    let joined = base.join(&candidate).ok()?;
    matches!(joined.scheme(), "http" | "https").then(|| joined.to_string())
}
