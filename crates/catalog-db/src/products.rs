//! Database operations for the `products` table, and the Postgres
//! [`RecordSink`].

use catalog_core::{ProductRecord, RecordSink, SinkError, SinkId};
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

const PRODUCT_COLUMNS: &str =
    "id, name, price, brand, color, image_url, available_sizes, source_url, created_at";

// ---------------------------------------------------------------------------
// Row type
// ---------------------------------------------------------------------------

/// A row from the `products` table.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ProductRow {
    pub id: i64,
    pub name: String,
    pub price: f64,
    pub brand: String,
    pub color: String,
    /// Empty when no image resolved at scrape time.
    pub image_url: String,
    pub available_sizes: Vec<String>,
    pub source_url: String,
    pub created_at: DateTime<Utc>,
}

impl From<ProductRow> for ProductRecord {
    fn from(row: ProductRow) -> Self {
        Self {
            name: row.name,
            price: row.price,
            brand: row.brand,
            color: row.color,
            image_url: row.image_url,
            available_sizes: row.available_sizes,
            source_url: row.source_url,
        }
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Inserts one product record and returns its generated `id`.
///
/// Always a plain insert: scraping the same URL twice stores two rows.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_product(pool: &PgPool, record: &ProductRecord) -> Result<i64, DbError> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO products \
             (name, price, brand, color, image_url, available_sizes, source_url) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         RETURNING id",
    )
    .bind(&record.name)
    .bind(record.price)
    .bind(&record.brand)
    .bind(&record.color)
    .bind(&record.image_url)
    .bind(&record.available_sizes)
    .bind(&record.source_url)
    .fetch_one(pool)
    .await?;

    tracing::debug!(id, source_url = %record.source_url, "product row inserted");
    Ok(id)
}

/// Fetches one product by `id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row has that id, or [`DbError::Sqlx`]
/// if the query fails.
pub async fn get_product(pool: &PgPool, id: i64) -> Result<ProductRow, DbError> {
    sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Returns the most recently stored products, newest first, optionally
/// restricted to one brand (case-insensitive exact match).
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_recent_products(
    pool: &PgPool,
    brand: Option<&str>,
    limit: i64,
) -> Result<Vec<ProductRow>, DbError> {
    let rows = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products \
         WHERE ($1::text IS NULL OR lower(brand) = lower($1)) \
         ORDER BY created_at DESC, id DESC \
         LIMIT $2"
    ))
    .bind(brand)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

// ---------------------------------------------------------------------------
// Record sink
// ---------------------------------------------------------------------------

/// [`RecordSink`] backed by the `products` table.
#[derive(Debug, Clone)]
pub struct PgRecordSink {
    pool: PgPool,
}

impl PgRecordSink {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl RecordSink for PgRecordSink {
    async fn insert(&self, record: &ProductRecord) -> Result<SinkId, SinkError> {
        insert_product(&self.pool, record)
            .await
            .map_err(|e| SinkError::Write {
                reason: e.to_string(),
            })
    }
}
