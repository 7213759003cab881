//! # Manual Renderer
//!
//! An HTTP service that renders remotely hosted PDF manuals page by page.
//!
//! Documents are downloaded the first time they are referenced, each page
//! is rendered to PNG the first time it is requested, and both are kept in
//! memory. The decoded PDF is dropped as soon as every one of its pages has
//! been rendered; documents nobody asked for in 24 hours are evicted the
//! next time a new document is loaded.
//!
//! ## Architecture
//!
//! - [`fetch`] - Document retrieval by id through a URL template
//! - [`render`] - Page rasterization (MuPDF behind the `mupdf` feature) and PNG encoding
//! - [`cache`] - The render cache
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use manual_renderer::{
//!     create_router, HttpDocumentFetcher, MupdfRasterizer, RenderCache, RenderCacheConfig,
//!     RouterConfig, UrlTemplate,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let template = UrlTemplate::parse("https://ktane.timwi.de/PDF/{}.pdf")?;
//!     let fetcher = HttpDocumentFetcher::new(template)?;
//!     let cache = RenderCache::new(fetcher, MupdfRasterizer::new(), RenderCacheConfig::default());
//!
//!     let router = create_router(Arc::new(cache), RouterConfig::new());
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, router).await?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod render;
pub mod server;

// Re-export commonly used types
pub use cache::{
    CacheStats, Clock, DebugSnapshot, EntrySnapshot, ManualClock, PageImage, RenderCache,
    RenderCacheConfig, SystemClock,
};
pub use config::Config;
pub use error::{CacheError, FetchError, RasterError};
pub use fetch::{DocumentFetcher, HttpDocumentFetcher, UrlTemplate};
#[cfg(feature = "mupdf")]
pub use render::MupdfRasterizer;
pub use render::{PageRasterizer, PngCompression, PngPageEncoder, RenderSize};
pub use server::{create_router, AppState, ErrorResponse, HealthResponse, RouterConfig};
