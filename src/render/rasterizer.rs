use bytes::Bytes;
use image::DynamicImage;

use crate::error::RasterError;

/// Default page width in pixels.
pub const DEFAULT_RENDER_WIDTH: u32 = 792;

/// Default page height in pixels.
pub const DEFAULT_RENDER_HEIGHT: u32 = 1024;

/// Largest accepted width or height.
pub const MAX_RENDER_DIMENSION: u32 = 8192;

/// Output dimensions of a rendered page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

impl RenderSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Whether both dimensions are within `1..=MAX_RENDER_DIMENSION`.
    pub fn is_valid(&self) -> bool {
        (1..=MAX_RENDER_DIMENSION).contains(&self.width)
            && (1..=MAX_RENDER_DIMENSION).contains(&self.height)
    }
}

impl Default for RenderSize {
    fn default() -> Self {
        Self::new(DEFAULT_RENDER_WIDTH, DEFAULT_RENDER_HEIGHT)
    }
}

impl std::fmt::Display for RenderSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Decodes documents and renders individual pages.
///
/// Both operations are blocking and potentially slow; callers run them on
/// the blocking thread pool. The decoded [`Document`](Self::Document) is
/// the expensive structure the cache releases once every page of it has
/// been rendered.
pub trait PageRasterizer: Send + Sync + 'static {
    /// Decoded, page-addressable document.
    type Document: Send + Sync + 'static;

    /// Parse raw document bytes.
    fn decode(&self, bytes: Bytes) -> Result<Self::Document, RasterError>;

    /// Number of pages in a decoded document.
    fn page_count(&self, document: &Self::Document) -> usize;

    /// Render `page` (zero-based) at exactly `size`.
    fn render(
        &self,
        document: &Self::Document,
        page: usize,
        size: RenderSize,
    ) -> Result<DynamicImage, RasterError>;
}
