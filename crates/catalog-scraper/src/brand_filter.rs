//! Brand allow-list gate.

/// Keeps products whose brand matches the allow-list.
///
/// Matching is case-insensitive two-way containment: `"Nike Inc."` matches
/// `Nike` because it contains it, and `"Balance"` matches `New Balance`
/// because it is contained in it.
#[derive(Debug, Clone)]
pub struct BrandFilter {
    allowed: Vec<String>,
}

impl BrandFilter {
    /// Builds a filter from display names. Blank names are ignored.
    #[must_use]
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed: allowed
                .into_iter()
                .map(|name| normalize(name.as_ref()))
                .filter(|name| !name.is_empty())
                .collect(),
        }
    }

    /// Returns `true` if `raw_brand` matches any allow-listed brand.
    /// Blank input never matches.
    #[must_use]
    pub fn is_allowed(&self, raw_brand: &str) -> bool {
        let brand = normalize(raw_brand);
        if brand.is_empty() {
            return false;
        }
        self.allowed
            .iter()
            .any(|allowed| brand.contains(allowed.as_str()) || allowed.contains(brand.as_str()))
    }
}

fn normalize(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
