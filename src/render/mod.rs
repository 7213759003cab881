//! Page rasterization and encoding.
//!
//! This module defines the capability the render cache uses to turn a
//! document into page bitmaps, and the encoder that turns those bitmaps
//! into the bytes the cache stores.
//!
//! ```text
//! ┌──────────────┐  decode   ┌─────────────────┐  render   ┌───────────────┐
//! │ PDF bytes    │ ────────▶ │ Document handle │ ────────▶ │ DynamicImage  │
//! └──────────────┘           └─────────────────┘           └───────┬───────┘
//!                                                                  │ encode
//!                                                                  ▼
//!                                                          ┌───────────────┐
//!                                                          │ PNG bytes     │
//!                                                          └───────────────┘
//! ```
//!
//! # Components
//!
//! - [`PageRasterizer`]: decodes documents and renders single pages
//! - [`RenderSize`]: the fixed output dimensions for every page
//! - [`PngPageEncoder`]: encodes a rendered page to PNG
//! - `MupdfRasterizer`: MuPDF implementation (feature `mupdf`)

mod encoder;
#[cfg(feature = "mupdf")]
mod mupdf;
mod rasterizer;

pub use encoder::{is_png, PngCompression, PngPageEncoder, PAGE_CONTENT_TYPE};
#[cfg(feature = "mupdf")]
pub use mupdf::{MupdfDocument, MupdfRasterizer};
pub use rasterizer::{
    PageRasterizer, RenderSize, DEFAULT_RENDER_HEIGHT, DEFAULT_RENDER_WIDTH, MAX_RENDER_DIMENSION,
};
