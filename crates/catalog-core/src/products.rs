use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Placeholder stored for optional text fields that no selector resolved.
pub const UNKNOWN: &str = "Unknown";

/// A product scraped from a product-detail page, ready to be written to a
/// [`crate::RecordSink`].
///
/// Only `name` and `price` are mandatory. Every other field degrades to a
/// placeholder (`"Unknown"`) or an empty value instead of failing the scrape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub name: String,
    /// Parsed display price; always finite and strictly positive.
    pub price: f64,
    /// Brand as shown on the page, or `"Unknown"`.
    pub brand: String,
    /// Color label, or `"Unknown"`.
    pub color: String,
    /// Absolute image URL, or an empty string when no image resolved.
    pub image_url: String,
    /// Size labels in page order, e.g. `["38", "39 1/3", "40"]`.
    pub available_sizes: Vec<String>,
    /// Product-detail URL the record was scraped from.
    pub source_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("product name must be non-empty")]
    EmptyName,

    #[error("product price must be finite and greater than zero (got {0})")]
    InvalidPrice(String),
}

impl ProductRecord {
    /// Checks the record invariants: non-empty `name`, finite positive `price`.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] encountered.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if !self.price.is_finite() || self.price <= 0.0 {
            return Err(ValidationError::InvalidPrice(self.price.to_string()));
        }
        Ok(())
    }
}
