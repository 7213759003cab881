//! Configuration management for Manual Renderer.
//!
//! Every option can be given on the command line or through an environment
//! variable with the `MANUAL_` prefix. Everything has a default, so the
//! server starts with no configuration at all.
//!
//! # Example
//!
//! ```ignore
//! use clap::Parser;
//! use manual_renderer::config::Config;
//!
//! let config = Config::parse();
//! config.validate()?;
//!
//! println!("Listening on {}", config.bind_address());
//! println!("Fetching from {}", config.url_template);
//! ```
//!
//! # Environment Variables
//!
//! - `MANUAL_HOST` - Server bind address (default: 0.0.0.0)
//! - `MANUAL_PORT` - Server port (default: 3000)
//! - `MANUAL_URL_TEMPLATE` - Document URL with one `{}` placeholder
//! - `MANUAL_RENDER_WIDTH` - Rendered page width in pixels (default: 792)
//! - `MANUAL_RENDER_HEIGHT` - Rendered page height in pixels (default: 1024)
//! - `MANUAL_STALE_AFTER_HOURS` - Idle hours before a document is evicted (default: 24)
//! - `MANUAL_FETCH_TIMEOUT` - Document download timeout in seconds (default: 30)
//! - `MANUAL_RENDER_TIMEOUT` - Decode/render timeout in seconds (default: 30)
//! - `MANUAL_PNG_COMPRESSION` - `fast`, `default` or `best` (default: default)
//! - `MANUAL_NO_ANNOTATIONS` - Draw page content only, without annotations
//! - `MANUAL_CACHE_MAX_AGE` - HTTP cache max-age seconds (default: 3600)
//! - `MANUAL_CORS_ORIGINS` - Comma-separated allowed origins (default: any)

use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::cache::RenderCacheConfig;
use crate::fetch::{UrlTemplate, DEFAULT_URL_TEMPLATE};
use crate::render::{
    PngCompression, RenderSize, DEFAULT_RENDER_HEIGHT, DEFAULT_RENDER_WIDTH, MAX_RENDER_DIMENSION,
};

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default idle time before a cached document is evicted, in hours.
pub const DEFAULT_STALE_AFTER_HOURS: u64 = 24;

/// Default document download timeout in seconds.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Default decode/render timeout in seconds.
pub const DEFAULT_RENDER_TIMEOUT_SECS: u64 = 30;

/// Default HTTP cache max-age in seconds (1 hour).
pub const DEFAULT_CACHE_MAX_AGE: u32 = 3600;

// =============================================================================
// CLI Arguments
// =============================================================================

/// PNG compression level as given on the command line.
#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum PngCompressionArg {
    Fast,
    Default,
    Best,
}

impl PngCompressionArg {
    pub fn as_png_compression(self) -> PngCompression {
        match self {
            PngCompressionArg::Fast => PngCompression::Fast,
            PngCompressionArg::Default => PngCompression::Default,
            PngCompressionArg::Best => PngCompression::Best,
        }
    }
}

/// Manual Renderer - renders remotely hosted PDF manuals page by page.
///
/// Documents are downloaded on first use, pages are rendered to PNG on
/// first request, and both are kept in memory until they go stale.
#[derive(Parser, Debug, Clone)]
#[command(name = "manual-renderer")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "MANUAL_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "MANUAL_PORT")]
    pub port: u16,

    // =========================================================================
    // Source Configuration
    // =========================================================================
    /// URL of a document, with `{}` where the percent-encoded id goes.
    #[arg(long, default_value = DEFAULT_URL_TEMPLATE, env = "MANUAL_URL_TEMPLATE")]
    pub url_template: String,

    /// Timeout for downloading a document, in seconds.
    #[arg(long, default_value_t = DEFAULT_FETCH_TIMEOUT_SECS, env = "MANUAL_FETCH_TIMEOUT")]
    pub fetch_timeout: u64,

    // =========================================================================
    // Render Configuration
    // =========================================================================
    /// Width of every rendered page, in pixels.
    #[arg(long, default_value_t = DEFAULT_RENDER_WIDTH, env = "MANUAL_RENDER_WIDTH")]
    pub render_width: u32,

    /// Height of every rendered page, in pixels.
    #[arg(long, default_value_t = DEFAULT_RENDER_HEIGHT, env = "MANUAL_RENDER_HEIGHT")]
    pub render_height: u32,

    /// Timeout for decoding a document or rendering one page, in seconds.
    #[arg(long, default_value_t = DEFAULT_RENDER_TIMEOUT_SECS, env = "MANUAL_RENDER_TIMEOUT")]
    pub render_timeout: u64,

    /// PNG compression level for rendered pages.
    #[arg(
        long,
        value_enum,
        default_value_t = PngCompressionArg::Default,
        env = "MANUAL_PNG_COMPRESSION"
    )]
    pub png_compression: PngCompressionArg,

    /// Draw page content only, skipping annotations and form widgets.
    #[arg(long, default_value_t = false, env = "MANUAL_NO_ANNOTATIONS")]
    pub no_annotations: bool,

    // =========================================================================
    // Cache Configuration
    // =========================================================================
    /// Hours without access after which a document is evicted.
    #[arg(long, default_value_t = DEFAULT_STALE_AFTER_HOURS, env = "MANUAL_STALE_AFTER_HOURS")]
    pub stale_after_hours: u64,

    /// HTTP Cache-Control max-age for page images, in seconds.
    #[arg(long, default_value_t = DEFAULT_CACHE_MAX_AGE, env = "MANUAL_CACHE_MAX_AGE")]
    pub cache_max_age: u32,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "MANUAL_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        self.parse_url_template()?;

        if !self.render_size().is_valid() {
            return Err(format!(
                "render size must be between 1 and {} pixels per side, got {}",
                MAX_RENDER_DIMENSION,
                self.render_size()
            ));
        }

        if self.stale_after_hours == 0 {
            return Err("stale_after_hours must be greater than 0".to_string());
        }
        if self.fetch_timeout == 0 {
            return Err("fetch_timeout must be greater than 0".to_string());
        }
        if self.render_timeout == 0 {
            return Err("render_timeout must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Parse the document URL template.
    pub fn parse_url_template(&self) -> Result<UrlTemplate, String> {
        UrlTemplate::parse(&self.url_template).map_err(|e| e.to_string())
    }

    pub fn render_size(&self) -> RenderSize {
        RenderSize::new(self.render_width, self.render_height)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout)
    }

    /// Render cache settings derived from this configuration.
    pub fn cache_config(&self) -> RenderCacheConfig {
        RenderCacheConfig::default()
            .with_render_size(self.render_size())
            .with_stale_after(Duration::from_secs(
                self.stale_after_hours.saturating_mul(3600),
            ))
            .with_render_timeout(Duration::from_secs(self.render_timeout))
            .with_png_compression(self.png_compression.as_png_compression())
    }
}

// =============================================================================
// Tests
// =============================================================================
