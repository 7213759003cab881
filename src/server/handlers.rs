//! HTTP request handlers for the Manual Renderer API.
//!
//! # Endpoints
//!
//! - `GET /get?name={id}` - Page count of a document
//! - `GET /get?name={id}&page={n}` - One rendered page as PNG
//! - `GET /purge` - Drop every cached document
//! - `GET /debug` - Plain-text dump of the cache
//! - `GET /health` - Health check endpoint

use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::cache::RenderCache;
use crate::config::DEFAULT_CACHE_MAX_AGE;
use crate::error::CacheError;
use crate::fetch::DocumentFetcher;
use crate::render::PageRasterizer;

/// Response header telling whether a page came from the cache.
pub const PAGE_CACHE_HIT_HEADER: HeaderName = HeaderName::from_static("x-page-cache-hit");

// =============================================================================
// Application State
// =============================================================================

/// Shared application state containing the render cache.
///
/// This is passed to all handlers via Axum's State extractor.
pub struct AppState<F, R>
where
    F: DocumentFetcher,
    R: PageRasterizer,
{
    /// The cache every request goes through
    pub cache: Arc<RenderCache<F, R>>,

    /// Cache-Control max-age for page images, in seconds
    pub cache_max_age: u32,
}

impl<F, R> AppState<F, R>
where
    F: DocumentFetcher,
    R: PageRasterizer,
{
    pub fn new(cache: Arc<RenderCache<F, R>>) -> Self {
        Self::with_cache_max_age(cache, DEFAULT_CACHE_MAX_AGE)
    }

    pub fn with_cache_max_age(cache: Arc<RenderCache<F, R>>, cache_max_age: u32) -> Self {
        Self {
            cache,
            cache_max_age,
        }
    }
}

impl<F, R> Clone for AppState<F, R>
where
    F: DocumentFetcher,
    R: PageRasterizer,
{
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            cache_max_age: self.cache_max_age,
        }
    }
}

// =============================================================================
// Request Parameters
// =============================================================================

/// Query parameters for `/get`.
#[derive(Debug, Default, Deserialize)]
pub struct GetQueryParams {
    /// Document identifier
    #[serde(default, alias = "id")]
    pub name: Option<String>,

    /// Zero-based page index. Anything that is not an integer means "no
    /// page", which turns the request into a page count query.
    #[serde(default)]
    pub page: Option<String>,
}

impl GetQueryParams {
    /// The document id, if present and non-empty.
    pub fn document_id(&self) -> Option<&str> {
        self.name.as_deref().filter(|name| !name.is_empty())
    }

    /// The requested page, if it parses as an integer.
    pub fn page_index(&self) -> Option<i64> {
        self.page.as_deref().and_then(|p| p.trim().parse().ok())
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "not_found", "page_out_of_range")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,

    /// Number of documents currently cached
    pub documents: usize,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Anything a handler can fail with.
#[derive(Debug)]
pub enum ApiError {
    /// A required query parameter is absent or empty
    MissingParameter(&'static str),

    /// The query string could not be parsed, e.g. `name` given twice
    InvalidQuery(String),

    /// The route exists but not for this method
    MethodNotAllowed,

    /// The cache operation failed
    Cache(CacheError),
}

impl From<CacheError> for ApiError {
    fn from(err: CacheError) -> Self {
        ApiError::Cache(err)
    }
}

/// Logs by severity: 404 at DEBUG, other 4xx at WARN, 5xx at ERROR.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            ApiError::MissingParameter(name) => (
                StatusCode::BAD_REQUEST,
                "missing_parameter",
                format!("Missing required query parameter: {}", name),
            ),
            ApiError::InvalidQuery(reason) => (
                StatusCode::BAD_REQUEST,
                "invalid_query",
                format!("Invalid query string: {}", reason),
            ),
            ApiError::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                "method_not_allowed",
                "Only GET requests are supported".to_string(),
            ),
            ApiError::Cache(err) => {
                let (status, error_type) = match err {
                    CacheError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
                    CacheError::OutOfRange { .. } => (StatusCode::BAD_REQUEST, "page_out_of_range"),
                    CacheError::FetchFailed { .. } => (StatusCode::BAD_GATEWAY, "fetch_failed"),
                    CacheError::DecodeFailed { .. } => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "decode_failed")
                    }
                    CacheError::RenderFailed { .. } => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "render_failed")
                    }
                };
                (status, error_type, err.to_string())
            }
        };

        if status == StatusCode::NOT_FOUND {
            debug!(status = status.as_u16(), error = error_type, "{}", message);
        } else if status.is_client_error() {
            warn!(status = status.as_u16(), error = error_type, "{}", message);
        } else {
            error!(status = status.as_u16(), error = error_type, "{}", message);
        }

        let body = ErrorResponse::with_status(error_type, message, status);
        (status, Json(body)).into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle document requests.
///
/// # Endpoint
///
/// `GET /get?name={id}[&page={n}]` (`id` is accepted in place of `name`)
///
/// # Response
///
/// Without a usable `page`: `200 OK`, the page count as plain text.
///
/// With `page`: `200 OK`, the page as PNG with headers
/// - `Content-Type: image/png`
/// - `Cache-Control: public, max-age={cache_max_age}`
/// - `X-Page-Cache-Hit: true|false`
///
/// # Errors
///
/// - `400 Bad Request`: missing or repeated `name`, or page out of range
/// - `404 Not Found`: the remote source has no such document
/// - `502 Bad Gateway`: the document could not be downloaded
/// - `500 Internal Server Error`: decode or render failure
pub async fn get_handler<F, R>(
    State(state): State<AppState<F, R>>,
    query: Result<Query<GetQueryParams>, QueryRejection>,
) -> Result<Response, ApiError>
where
    F: DocumentFetcher + 'static,
    R: PageRasterizer,
{
    let Query(query) = query.map_err(|e| ApiError::InvalidQuery(e.body_text()))?;
    let id = query.document_id().ok_or(ApiError::MissingParameter("name"))?;

    let Some(page) = query.page_index() else {
        let count = state.cache.resolve_page_count(id).await?;
        return Ok(count.to_string().into_response());
    };

    let image = state.cache.resolve_page(id, page).await?;

    let headers = [
        (header::CONTENT_TYPE, image.content_type.to_string()),
        (
            header::CACHE_CONTROL,
            format!("public, max-age={}", state.cache_max_age),
        ),
        (PAGE_CACHE_HIT_HEADER, image.cache_hit.to_string()),
    ];

    Ok((headers, image.data).into_response())
}

/// Handle cache purge requests.
///
/// `GET /purge` always answers `200 OK` with `Done.`
pub async fn purge_handler<F, R>(State(state): State<AppState<F, R>>) -> &'static str
where
    F: DocumentFetcher + 'static,
    R: PageRasterizer,
{
    state.cache.purge_all().await;
    "Done."
}

/// Handle debug dump requests.
///
/// `GET /debug` answers with one line per cached document:
///
/// ```text
/// "Wires" = (PDF, [48211, _, _], 2024-05-01T12:00:00Z)
/// ```
pub async fn debug_handler<F, R>(State(state): State<AppState<F, R>>) -> String
where
    F: DocumentFetcher + 'static,
    R: PageRasterizer,
{
    state.cache.dump_debug_state().await.to_string()
}

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "documents": 3
/// }
/// ```
pub async fn health_handler<F, R>(State(state): State<AppState<F, R>>) -> Json<HealthResponse>
where
    F: DocumentFetcher + 'static,
    R: PageRasterizer,
{
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        documents: state.cache.entry_count().await,
    })
}

/// Fallback for any non-GET method on a known route.
pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

// =============================================================================
// Tests
// =============================================================================
