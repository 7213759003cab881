//! Router configuration for Manual Renderer.
//!
//! # Route Structure
//!
//! ```text
//! /get?name={id}[&page={n}]   - Page count or rendered page
//! /purge                      - Clear the cache
//! /debug                      - Cache dump
//! /health                     - Health check
//! ```
//!
//! Every route answers GET (and HEAD); other methods get a 405 JSON error.
//!
//! # Example
//!
//! ```ignore
//! use manual_renderer::server::{create_router, RouterConfig};
//!
//! let config = RouterConfig::new()
//!     .with_cors_origins(vec!["https://example.com".to_string()]);
//!
//! let router = create_router(cache, config);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Router};
use http::header::CONTENT_TYPE;
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    debug_handler, get_handler, health_handler, method_not_allowed, purge_handler, AppState,
};
use crate::cache::RenderCache;
use crate::config::DEFAULT_CACHE_MAX_AGE;
use crate::fetch::DocumentFetcher;
use crate::render::PageRasterizer;

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Cache-Control max-age for page images, in seconds
    pub cache_max_age: u32,

    /// Whether to enable request tracing
    pub enable_tracing: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterConfig {
    /// Create a router configuration.
    ///
    /// By default:
    /// - CORS allows any origin
    /// - Cache max-age is 1 hour (3600 seconds)
    /// - Tracing is enabled
    pub fn new() -> Self {
        Self {
            cors_origins: None,
            cache_max_age: DEFAULT_CACHE_MAX_AGE,
            enable_tracing: true,
        }
    }

    /// Set specific allowed CORS origins.
    ///
    /// Pass an empty vec to disallow all cross-origin requests.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Allow any CORS origin.
    pub fn with_cors_any_origin(mut self) -> Self {
        self.cors_origins = None;
        self
    }

    /// Set the Cache-Control max-age in seconds.
    pub fn with_cache_max_age(mut self, seconds: u32) -> Self {
        self.cache_max_age = seconds;
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the application router around a shared render cache.
pub fn create_router<F, R>(cache: Arc<RenderCache<F, R>>, config: RouterConfig) -> Router
where
    F: DocumentFetcher + 'static,
    R: PageRasterizer,
{
    let app_state = AppState::with_cache_max_age(cache, config.cache_max_age);
    let cors = build_cors_layer(&config);

    let router = Router::new()
        .route(
            "/get",
            get(get_handler::<F, R>).fallback(method_not_allowed),
        )
        .route(
            "/purge",
            get(purge_handler::<F, R>).fallback(method_not_allowed),
        )
        .route(
            "/debug",
            get(debug_handler::<F, R>).fallback(method_not_allowed),
        )
        .route(
            "/health",
            get(health_handler::<F, R>).fallback(method_not_allowed),
        )
        .with_state(app_state)
        .layer(cors);

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(86400));

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
