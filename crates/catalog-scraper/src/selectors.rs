//! Versioned selector tables.
//!
//! Each field maps to an ordered list of CSS selectors, most specific first.
//! The extractor stops at the first candidate that yields non-empty content,
//! so a generic catch-all belongs at the end of a list, never the start.

use catalog_core::SiteLayout;

/// Attribute read from brand `<meta>` candidates.
pub const BRAND_META_ATTRIBUTE: &str = "content";

/// Image attributes in priority order: full resolution, then lazy-load, then
/// the plain source.
pub const IMAGE_ATTRIBUTES: &[&str] = &[
    "data-zoom-image",
    "data-full-src",
    "data-large-image",
    "data-src",
    "data-lazy-src",
    "src",
];

/// Attribute holding the target of product links and the "next" control.
pub const HREF_ATTRIBUTE: &str = "href";

/// Field name to ordered selector candidates for one site layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectorSet {
    pub title: &'static [&'static str],
    pub price: &'static [&'static str],
    pub brand: &'static [&'static str],
    pub brand_meta: &'static [&'static str],
    pub color: &'static [&'static str],
    pub sizes: &'static [&'static str],
    pub image: &'static [&'static str],
    pub product_links: &'static [&'static str],
    pub pagination_next: &'static [&'static str],
}

/// Current storefront theme.
pub const STOREFRONT: SelectorSet = SelectorSet {
    title: &[
        "[data-testid='product-title']",
        "h1.product-title",
        ".product-detail h1",
        "h1",
    ],
    price: &[
        "[data-testid='product-price'] .price-current",
        "[data-testid='product-price']",
        ".product-price .price-sale",
        ".product-price",
        "[itemprop='price']",
    ],
    brand: &[
        "[data-testid='product-brand']",
        ".product-brand a",
        ".product-brand",
    ],
    brand_meta: &[
        "meta[itemprop='brand']",
        "meta[property='product:brand']",
    ],
    color: &[
        "[data-testid='product-color'] .value",
        "[data-testid='product-color']",
        ".product-color .selected",
        ".product-color",
    ],
    sizes: &[
        "[data-testid='size-selector'] button:not([disabled])",
        ".size-selector .size-option:not(.unavailable)",
        ".product-sizes",
    ],
    image: &[
        "[data-testid='product-image'] img",
        ".product-gallery img.primary",
        ".product-gallery img",
    ],
    product_links: &[
        "[data-testid='product-card'] a.product-link",
        ".product-grid .product-card a[href]",
    ],
    pagination_next: &[
        "[data-testid='pagination-next']",
        "a[rel='next']",
        ".pagination .next a",
    ],
};

/// Legacy theme still served on some category pages.
pub const CLASSIC: SelectorSet = SelectorSet {
    title: &["#productTitle", ".product-name h1", "h1"],
    price: &["#productPrice .sale", "#productPrice", ".price-box .price"],
    brand: &["#productBrand", ".brand-name"],
    brand_meta: &["meta[itemprop='brand']"],
    color: &["#productColor", ".color-name"],
    sizes: &["#sizeList li.in-stock", "#sizeList", ".sizes"],
    image: &["#mainImage", ".product-image img"],
    product_links: &["ul.product-list li a.product-name", ".product-list a.product-name"],
    pagination_next: &["a.next-page", "li.next a", "a[rel='next']"],
};

/// Returns the selector table for `layout`.
#[must_use]
pub fn selector_set(layout: SiteLayout) -> &'static SelectorSet {
    match layout {
        SiteLayout::Storefront => &STOREFRONT,
        SiteLayout::Classic => &CLASSIC,
    }
}
