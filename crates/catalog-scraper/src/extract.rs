//! Field extraction with ordered selector fallback.
//!
//! Candidates are tried in declared order and the first non-empty value wins.
//! An absent candidate is the normal path, not an error: the extractor moves
//! on to the next one. Only backend failures (a dead browser, an invalid
//! selector) propagate as errors.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use crate::error::ScraperError;
use crate::fetcher::PageHandle;
use crate::selectors::IMAGE_ATTRIBUTES;
use crate::urls::{absolutize_url, extract_origin};

/// What to read from a matched element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode<'a> {
    /// Text content, whitespace-collapsed.
    Text,
    /// The named attribute, trimmed.
    Attribute(&'a str),
}

/// Resolves one field. `Ok(None)` means no candidate produced a value.
///
/// # Errors
///
/// Propagates backend errors from the page handle.
pub async fn extract<P: PageHandle>(
    page: &P,
    candidates: &[&str],
    mode: Mode<'_>,
    wait: Duration,
) -> Result<Option<String>, ScraperError> {
    for candidate in candidates {
        let raw = match mode {
            Mode::Text => page.query_text(candidate, wait).await?,
            Mode::Attribute(name) => page.query_attr(candidate, name, wait).await?,
        };
        let value = raw.map(|v| match mode {
            Mode::Text => collapse_whitespace(&v),
            Mode::Attribute(_) => v.trim().to_owned(),
        });
        match value {
            Some(v) if !v.is_empty() => return Ok(Some(v)),
            _ => tracing::debug!(url = page.url(), candidate, "selector candidate unresolved"),
        }
    }
    Ok(None)
}

/// Resolves the size list. Each candidate's matches are joined and
/// tokenized; the first candidate yielding at least one token wins.
///
/// # Errors
///
/// Propagates backend errors from the page handle.
pub async fn extract_sizes<P: PageHandle>(
    page: &P,
    candidates: &[&str],
    wait: Duration,
) -> Result<Vec<String>, ScraperError> {
    for candidate in candidates {
        let texts = page.query_all_text(candidate, wait).await?;
        let sizes = tokenize_sizes(&texts.join(","));
        if !sizes.is_empty() {
            return Ok(sizes);
        }
        tracing::debug!(url = page.url(), candidate, "size candidate unresolved");
    }
    Ok(Vec::new())
}

/// Resolves the product image as an absolute URL, or an empty string.
///
/// For each candidate element the attributes in [`IMAGE_ATTRIBUTES`] are
/// read in priority order; only the first read waits for the element.
/// Relative paths are resolved against the page's origin.
///
/// # Errors
///
/// Propagates backend errors from the page handle.
pub async fn extract_image<P: PageHandle>(
    page: &P,
    candidates: &[&str],
    wait: Duration,
) -> Result<String, ScraperError> {
    let base = extract_origin(page.url()).unwrap_or_else(|| page.url().to_owned());
    for candidate in candidates {
        for (i, attribute) in IMAGE_ATTRIBUTES.iter().enumerate() {
            let wait = if i == 0 { wait } else { Duration::ZERO };
            let Some(raw) = page.query_attr(candidate, attribute, wait).await? else {
                continue;
            };
            if let Some(url) = absolutize_url(&base, &raw) {
                return Ok(url);
            }
        }
    }
    Ok(String::new())
}

/// Splits a delimited size string into labels.
///
/// Delimiters are `,` `;` `|`, any whitespace, and `/` unless it sits between
/// two digits. Two joins undo whitespace splits that belong to one label: a
/// fraction such as `1/3` attaches to a preceding label ending in a digit
/// (`39 1/3`), and a purely alphabetic word directly followed by a numeric
/// word is a size-system prefix (`US 8`, `EU 42`). Empty and `n/a` tokens are
/// dropped.
#[must_use]
pub fn tokenize_sizes(raw: &str) -> Vec<String> {
    let words = raw
        .split([',', ';', '|'])
        .flat_map(str::split_whitespace)
        .filter(|word| !is_not_applicable(word))
        .flat_map(split_on_slashes)
        .filter(|word| !word.is_empty());

    let mut labels: Vec<String> = Vec::new();
    let mut prefix: Option<&str> = None;
    for word in words {
        if let Some(system) = prefix.take() {
            if is_numeric_size(word) {
                labels.push(format!("{system} {word}"));
                continue;
            }
            labels.push(system.to_owned());
        }
        if is_fraction(word) {
            if let Some(last) = labels
                .last_mut()
                .filter(|label| label.ends_with(|c: char| c.is_ascii_digit()))
            {
                last.push(' ');
                last.push_str(word);
                continue;
            }
        }
        if word.chars().all(|c| c.is_alphabetic()) {
            prefix = Some(word);
        } else {
            labels.push(word.to_owned());
        }
    }
    if let Some(system) = prefix {
        labels.push(system.to_owned());
    }
    labels
}

fn is_fraction(word: &str) -> bool {
    word.split_once('/').is_some_and(|(num, den)| {
        !num.is_empty()
            && !den.is_empty()
            && num.bytes().all(|b| b.is_ascii_digit())
            && den.bytes().all(|b| b.is_ascii_digit())
    })
}

/// `8`, `8.5` or `1/2`.
fn is_numeric_size(word: &str) -> bool {
    word.starts_with(|c: char| c.is_ascii_digit())
        && word.bytes().all(|b| b.is_ascii_digit() || b == b'.' || b == b'/')
}

fn is_not_applicable(token: &str) -> bool {
    token.trim().eq_ignore_ascii_case("n/a")
}

/// Splits on `/` except inside fractions like `1/3`.
fn split_on_slashes(piece: &str) -> Vec<&str> {
    let bytes = piece.as_bytes();
    let mut parts = Vec::new();
    let mut start = 0;
    for (i, &b) in bytes.iter().enumerate() {
        if b != b'/' {
            continue;
        }
        let fraction = i > 0
            && bytes[i - 1].is_ascii_digit()
            && bytes.get(i + 1).is_some_and(u8::is_ascii_digit);
        if !fraction {
            parts.push(&piece[start..i]);
            start = i + 1;
        }
    }
    parts.push(&piece[start..]);
    parts
}

static PRICE_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\d{1,3}(?:[.,' \u{00a0}\u{202f}]\d{3})+(?:[.,]\d{1,2})?|\d+(?:[.,]\d{1,2})?",
    )
    .expect("valid price regex")
});

/// Parses display price text into a positive amount.
///
/// Only the first number is read: either groups of exactly three digits
/// joined by `.`, `,`, an apostrophe or a space, or a plain run of digits,
/// each with an optional one or two digit decimal part. A second price later
/// in the text is never merged into the first. Returns `None` for text
/// without a number or a non-positive result.
///
/// ```
/// use catalog_scraper::extract::parse_price;
/// assert_eq!(parse_price("$1,299.99"), Some(1299.99));
/// assert_eq!(parse_price("129,95 €"), Some(129.95));
/// assert_eq!(parse_price("EUR 1.299"), Some(1299.0));
/// ```
#[must_use]
pub fn parse_price(text: &str) -> Option<f64> {
    let matched = PRICE_NUMBER.find(text)?.as_str();
    let digits_and_separators: String = matched
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    let trimmed = digits_and_separators.as_str();

    let decimal_at = trimmed.rfind(['.', ',']).filter(|&pos| {
        let decimals = trimmed.len() - pos - 1;
        (1..=2).contains(&decimals)
    });

    let normalized = match decimal_at {
        Some(pos) => {
            let integer: String = trimmed[..pos].chars().filter(char::is_ascii_digit).collect();
            format!("{integer}.{}", &trimmed[pos + 1..])
        }
        None => trimmed.chars().filter(char::is_ascii_digit).collect(),
    };

    normalized
        .parse::<f64>()
        .ok()
        .filter(|price| price.is_finite() && *price > 0.0)
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakePage;

    const WAIT: Duration = Duration::from_millis(3000);

    #[tokio::test]
    async fn first_resolving_candidate_wins() {
        let page = FakePage::new("https://shop.example.com/p/1")
            .text(".b", "Second")
            .text(".c", "Third");
        let got = extract(&page, &[".a", ".b", ".c"], Mode::Text, WAIT)
            .await
            .unwrap();
        assert_eq!(got.as_deref(), Some("Second"));
    }

    #[tokio::test]
    async fn candidate_appearing_after_wait_bound_is_skipped() {
        let page = FakePage::new("https://shop.example.com/p/1")
            .text(".slow", "Eventually")
            .late(".slow", Duration::from_secs(10))
            .text(".fast", "Now");
        let got = extract(&page, &[".slow", ".fast"], Mode::Text, WAIT)
            .await
            .unwrap();
        assert_eq!(got.as_deref(), Some("Now"));
    }

    #[tokio::test]
    async fn whitespace_only_match_falls_through() {
        let page = FakePage::new("https://shop.example.com/p/1")
            .text("h1", "   \n ")
            .text(".title", "  Gel-Kayano\n  14 ");
        let got = extract(&page, &["h1", ".title"], Mode::Text, WAIT)
            .await
            .unwrap();
        assert_eq!(got.as_deref(), Some("Gel-Kayano 14"));
    }

    #[tokio::test]
    async fn no_candidate_resolves_to_none() {
        let page = FakePage::new("https://shop.example.com/p/1");
        let got = extract(&page, &[".a", ".b"], Mode::Text, WAIT)
            .await
            .unwrap();
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn attribute_mode_reads_attribute() {
        let page = FakePage::new("https://shop.example.com/p/1").attr(
            "meta[itemprop='brand']",
            "content",
            " Puma ",
        );
        let got = extract(
            &page,
            &["meta[itemprop='brand']"],
            Mode::Attribute("content"),
            WAIT,
        )
        .await
        .unwrap();
        assert_eq!(got.as_deref(), Some("Puma"));
    }

    #[tokio::test]
    async fn sizes_from_multiple_elements() {
        let page = FakePage::new("https://shop.example.com/p/1")
            .text(".size", "40")
            .text(".size", " 41 ")
            .text(".size", "N/A");
        let got = extract_sizes(&page, &[".size"], WAIT).await.unwrap();
        assert_eq!(got, vec!["40", "41"]);
    }

    #[tokio::test]
    async fn sizes_fall_back_to_delimited_string() {
        let page = FakePage::new("https://shop.example.com/p/1")
            .text(".sizes", "38, 39 1/3; 40/ ");
        let got = extract_sizes(&page, &[".size", ".sizes"], WAIT)
            .await
            .unwrap();
        assert_eq!(got, vec!["38", "39 1/3", "40"]);
    }

    #[tokio::test]
    async fn sizes_unresolved_is_empty() {
        let page = FakePage::new("https://shop.example.com/p/1").text(".sizes", " n/a ");
        let got = extract_sizes(&page, &[".sizes"], WAIT).await.unwrap();
        assert!(got.is_empty());
    }

    #[tokio::test]
    async fn image_prefers_full_resolution_attribute() {
        let page = FakePage::new("https://shop.example.com/p/1")
            .attr("img.hero", "src", "/img/thumb.jpg")
            .attr("img.hero", "data-src", "/img/lazy.jpg")
            .attr("img.hero", "data-zoom-image", "/img/full.jpg");
        let got = extract_image(&page, &["img.hero"], WAIT).await.unwrap();
        assert_eq!(got, "https://shop.example.com/img/full.jpg");
    }

    #[tokio::test]
    async fn image_prefers_lazy_over_plain_src() {
        let page = FakePage::new("https://shop.example.com/p/1")
            .attr("img.hero", "src", "data:image/gif;base64,R0lGOD")
            .attr("img.hero", "data-src", "//cdn.example.com/lazy.jpg");
        let got = extract_image(&page, &["img.hero"], WAIT).await.unwrap();
        assert_eq!(got, "https://cdn.example.com/lazy.jpg");
    }

    #[tokio::test]
    async fn image_relative_path_uses_site_origin() {
        let page = FakePage::new("https://shop.example.com/c/sneakers/p/1")
            .attr("img", "src", "media/a.jpg");
        let got = extract_image(&page, &["img"], WAIT).await.unwrap();
        assert_eq!(got, "https://shop.example.com/media/a.jpg");
    }

    #[tokio::test]
    async fn image_unresolved_is_empty_string() {
        let page = FakePage::new("https://shop.example.com/p/1");
        let got = extract_image(&page, &["img"], WAIT).await.unwrap();
        assert_eq!(got, "");
    }

    #[test]
    fn tokenize_mixed_delimiters() {
        assert_eq!(
            tokenize_sizes("38, 39 1/3; 40/ "),
            vec!["38", "39 1/3", "40"]
        );
    }

    #[test]
    fn tokenize_drops_na_case_insensitively() {
        assert_eq!(tokenize_sizes("S|M|n/A|L"), vec!["S", "M", "L"]);
    }

    #[test]
    fn tokenize_splits_on_line_breaks_and_tabs() {
        assert_eq!(tokenize_sizes("US 8\n  US  9\tUS 10"), vec!["US 8", "US 9", "US 10"]);
    }

    #[test]
    fn tokenize_slash_between_letters_is_a_delimiter() {
        assert_eq!(tokenize_sizes("S/M/L"), vec!["S", "M", "L"]);
    }

    #[test]
    fn tokenize_splits_on_plain_spaces() {
        assert_eq!(tokenize_sizes("38 39 40"), vec!["38", "39", "40"]);
        assert_eq!(tokenize_sizes("S M L XL"), vec!["S", "M", "L", "XL"]);
    }

    #[test]
    fn tokenize_keeps_system_prefix_and_fraction_with_their_number() {
        assert_eq!(
            tokenize_sizes("EU 42 EU 42 2/3 US 8.5"),
            vec!["EU 42", "EU 42 2/3", "US 8.5"]
        );
        assert_eq!(tokenize_sizes("XL 2XL"), vec!["XL", "2XL"]);
    }

    #[test]
    fn tokenize_empty_input() {
        assert!(tokenize_sizes("").is_empty());
        assert!(tokenize_sizes(" ,; ,").is_empty());
    }

    #[test]
    fn parse_price_formats() {
        assert_eq!(parse_price("$1,299.99"), Some(1299.99));
        assert_eq!(parse_price("129,95 €"), Some(129.95));
        assert_eq!(parse_price("EUR 89"), Some(89.0));
        assert_eq!(parse_price("1.299,5"), Some(1299.5));
        assert_eq!(parse_price("CHF 1'299.00"), Some(1299.0));
        assert_eq!(parse_price("Now $80 - $120"), Some(80.0));
    }

    #[test]
    fn parse_price_stops_at_the_first_amount() {
        assert_eq!(parse_price("129.99 99.99"), Some(129.99));
        assert_eq!(parse_price("1,299.99 1,099.99"), Some(1299.99));
        assert_eq!(parse_price("1 299,00 € 999,00 €"), Some(1299.0));
    }

    #[test]
    fn parse_price_three_trailing_digits_are_thousands() {
        assert_eq!(parse_price("1,299"), Some(1299.0));
        assert_eq!(parse_price("2.500"), Some(2500.0));
    }

    #[test]
    fn parse_price_rejects_missing_or_zero() {
        assert_eq!(parse_price("Sold out"), None);
        assert_eq!(parse_price(""), None);
        assert_eq!(parse_price("$0.00"), None);
    }
}
