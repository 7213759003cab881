use thiserror::Error;

/// Errors raised while retrieving a document's raw bytes from the remote source
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// The URL template cannot produce fetch targets
    #[error("Invalid URL template {template:?}: {reason}")]
    InvalidTemplate { template: String, reason: String },

    /// The remote source answered 404
    #[error("Document not found at {url}")]
    NotFound { url: String },

    /// The remote source answered with a non-success status
    #[error("Remote returned HTTP {status} for {url}")]
    Status { status: u16, url: String },

    /// Network, TLS, or timeout failure
    #[error("Request to {url} failed: {message}")]
    Request { url: String, message: String },
}

/// Errors raised by the page rasterizer or the image encoder
#[derive(Debug, Clone, Error)]
pub enum RasterError {
    /// The bytes could not be parsed as a document
    #[error("Failed to decode document: {0}")]
    Decode(String),

    /// A single page could not be rasterized
    #[error("Failed to render page {page}: {message}")]
    Render { page: usize, message: String },

    /// The rendered bitmap could not be encoded
    #[error("Failed to encode page image: {0}")]
    Encode(String),
}

/// Errors surfaced by the render cache.
///
/// Every variant names the document it concerns. None of them leave a
/// partially written entry behind.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// The remote source has no document under this id
    #[error("Document not found: {id}")]
    NotFound { id: String },

    /// The document bytes could not be retrieved
    #[error("Failed to fetch document {id}: {message}")]
    FetchFailed { id: String, message: String },

    /// The document bytes were retrieved but are not a valid document
    #[error("Failed to decode document {id}: {message}")]
    DecodeFailed { id: String, message: String },

    /// Requested page lies outside `[0, page_count)`
    #[error("Page {page} out of range for document {id} ({page_count} pages)")]
    OutOfRange {
        id: String,
        page: i64,
        page_count: usize,
    },

    /// Rasterization or encoding of a page failed
    #[error("Failed to render page {page} of document {id}: {message}")]
    RenderFailed {
        id: String,
        page: usize,
        message: String,
    },
}

impl CacheError {
    /// Map a fetcher failure onto the cache error for `id`.
    pub fn from_fetch(id: &str, err: FetchError) -> Self {
        match err {
            FetchError::NotFound { .. } => CacheError::NotFound { id: id.to_string() },
            other => CacheError::FetchFailed {
                id: id.to_string(),
                message: other.to_string(),
            },
        }
    }

    /// Map a decode failure onto the cache error for `id`.
    pub fn from_decode(id: &str, err: RasterError) -> Self {
        CacheError::DecodeFailed {
            id: id.to_string(),
            message: err.to_string(),
        }
    }

    /// Map a render or encode failure onto the cache error for `id`/`page`.
    pub fn from_render(id: &str, page: usize, err: RasterError) -> Self {
        let message = match err {
            RasterError::Render { message, .. } => message,
            other => other.to_string(),
        };
        CacheError::RenderFailed {
            id: id.to_string(),
            page,
            message,
        }
    }

    /// Whether the failure was caused by the caller rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            CacheError::NotFound { .. } | CacheError::OutOfRange { .. }
        )
    }
}
