//! HTTP server layer for Manual Renderer.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │        GET /get  GET /purge  GET /debug  GET /health            │
//! │                                                                 │
//! │  ┌──────────────────────────┐  ┌─────────────────────────────┐  │
//! │  │        handlers          │  │          routes             │  │
//! │  │ (params, error mapping)  │  │ (router, CORS, tracing)     │  │
//! │  └──────────────────────────┘  └─────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod handlers;
pub mod routes;

pub use handlers::{
    debug_handler, get_handler, health_handler, method_not_allowed, purge_handler, ApiError,
    AppState, ErrorResponse, GetQueryParams, HealthResponse, PAGE_CACHE_HIT_HEADER,
};
pub use routes::{create_router, RouterConfig};
