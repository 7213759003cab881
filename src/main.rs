//! Manual Renderer - renders remotely hosted PDF manuals page by page.
//!
//! This binary starts the HTTP server and configures all components.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use manual_renderer::{
    config::Config,
    fetch::HttpDocumentFetcher,
    render::MupdfRasterizer,
    server::{create_router, RouterConfig},
    RenderCache,
};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let template = match config.parse_url_template() {
        Ok(template) => template,
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let fetcher = match HttpDocumentFetcher::with_timeout(template, config.fetch_timeout()) {
        Ok(fetcher) => fetcher,
        Err(e) => {
            error!("Failed to create document fetcher: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let cache_config = config.cache_config();

    info!("Manual Renderer v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Source: {}", fetcher.template());
    info!("  Page size: {}", cache_config.render_size);
    info!("  Stale after: {}h", config.stale_after_hours);
    info!(
        "  Timeouts: fetch {}s, render {}s",
        config.fetch_timeout, config.render_timeout
    );
    info!(
        "  PNG compression: {:?}, annotations: {}",
        cache_config.png_compression, !config.no_annotations
    );

    let rasterizer = MupdfRasterizer::new().with_annotations(!config.no_annotations);
    let cache = RenderCache::new(fetcher, rasterizer, cache_config);
    let router = create_router(Arc::new(cache), build_router_config(&config));

    let addr = config.bind_address();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    info!("Server listening on: http://{}", addr);
    info!("  curl 'http://{}/get?name=<id>'", addr);
    info!("  curl 'http://{}/get?name=<id>&page=0' -o page.png", addr);

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "manual_renderer=debug,tower_http=debug"
    } else {
        "manual_renderer=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the application Config.
fn build_router_config(config: &Config) -> RouterConfig {
    let mut router_config = RouterConfig::new()
        .with_cache_max_age(config.cache_max_age)
        .with_tracing(!config.no_tracing);

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config
}
