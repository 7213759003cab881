//! Remote document retrieval.
//!
//! The render cache never talks to the network directly. It asks a
//! [`DocumentFetcher`] for the raw bytes of a document the first time an
//! identifier is referenced, and only then.
//!
//! - [`DocumentFetcher`]: the capability the cache depends on
//! - [`UrlTemplate`]: turns a document id into a fetch URL
//! - [`HttpDocumentFetcher`]: reqwest-backed implementation

mod http;
mod template;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::FetchError;

pub use http::{HttpDocumentFetcher, DEFAULT_FETCH_TIMEOUT};
pub use template::{UrlTemplate, DEFAULT_URL_TEMPLATE, PLACEHOLDER};

/// Retrieves the raw byte stream of a document by identifier.
///
/// Implementations must be cheap to share; the cache holds one behind an
/// `Arc` and calls it from many tasks at once.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    /// Fetch the complete document named by `id`.
    async fn fetch(&self, id: &str) -> Result<Bytes, FetchError>;
}
