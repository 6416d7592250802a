use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use catalog_core::ProductRecord;
use catalog_scraper::{BatchSummary, CrawlOutcome, ScraperError, SkipReason};
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct ScrapeRequest {
    pub url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct BatchRequest {
    pub base_url: Option<String>,
}

/// Per-item result. A failed item is still a completed request.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub(super) enum ScrapeResult {
    Success { id: i64, record: ProductRecord },
    Skipped { reason: SkipReason, brand: String },
    Failed { url: String, error: String },
}

#[derive(Debug, Serialize)]
pub(super) struct BatchResult {
    base_url: String,
    #[serde(flatten)]
    summary: BatchSummary,
}

pub(super) async fn scrape_single(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    body: Result<Json<ScrapeRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<ScrapeResult>>, ApiError> {
    let Json(body) = body.map_err(|e| bad_request(&req_id, e.body_text()))?;
    let url = non_blank(body.url).ok_or_else(|| bad_request(&req_id, "url is required"))?;

    let _crawl = state.crawl_lock.lock().await;
    let data = match state.orchestrator.scrape_one(&url).await {
        CrawlOutcome::Success { record, id } => ScrapeResult::Success { id, record },
        CrawlOutcome::Skipped { reason, brand } => ScrapeResult::Skipped { reason, brand },
        CrawlOutcome::Failed(error) if error.is_backend_unavailable() => {
            return Err(map_scraper_error(req_id.0, &error));
        }
        CrawlOutcome::Failed(error) => {
            tracing::warn!(url = %url, error = %error, "single scrape failed");
            ScrapeResult::Failed {
                url,
                error: error.to_string(),
            }
        }
    };

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn scrape_batch(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    body: Result<Json<BatchRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<BatchResult>>, ApiError> {
    let body = match body {
        Ok(Json(body)) => body,
        Err(JsonRejection::MissingJsonContentType(_)) => BatchRequest::default(),
        Err(e) => return Err(bad_request(&req_id, e.body_text())),
    };
    let base_url = non_blank(body.base_url)
        .or_else(|| state.default_base_url.clone())
        .ok_or_else(|| {
            bad_request(
                &req_id,
                "base_url is required when CATALOG_TARGET_BASE_URL is not set",
            )
        })?;

    let _crawl = state.crawl_lock.lock().await;
    tracing::info!(base_url = %base_url, "batch crawl started");
    let summary = state
        .orchestrator
        .crawl(&base_url)
        .await
        .map_err(|e| map_scraper_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: BatchResult { base_url, summary },
        meta: ResponseMeta::new(req_id.0),
    }))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn bad_request(req_id: &RequestId, message: impl Into<String>) -> ApiError {
    ApiError::new(req_id.0.clone(), "bad_request", message)
}

fn map_scraper_error(request_id: String, error: &ScraperError) -> ApiError {
    tracing::error!(error = %error, "scrape pipeline failed");
    if error.is_backend_unavailable() {
        ApiError::new(request_id, "browser_unavailable", error.to_string())
    } else {
        ApiError::new(request_id, "internal_error", error.to_string())
    }
}
