//! MuPDF-backed page rasterizer.
//!
//! MuPDF documents are neither `Send` nor `Sync`. The handle therefore keeps
//! the raw PDF bytes and reopens the document for every render, with access
//! serialized per document. Dropping the handle frees the bytes.

use bytes::Bytes;
use image::{imageops::FilterType, DynamicImage, RgbImage};
use mupdf::{Colorspace, Document, Matrix, Pixmap};
use parking_lot::Mutex;

use super::{PageRasterizer, RenderSize};
use crate::error::RasterError;

const PDF_MAGIC: &str = "application/pdf";

/// A decoded PDF held for rendering.
pub struct MupdfDocument {
    bytes: Bytes,
    page_count: usize,
    lock: Mutex<()>,
}

impl MupdfDocument {
    /// Size of the retained PDF in bytes.
    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }
}

/// Rasterizer that renders PDF pages with MuPDF.
#[derive(Debug, Clone)]
pub struct MupdfRasterizer {
    annotations: bool,
}

impl MupdfRasterizer {
    /// Create a rasterizer that draws page annotations and widgets.
    pub fn new() -> Self {
        Self { annotations: true }
    }

    /// Choose whether annotations and widgets are drawn.
    pub fn with_annotations(mut self, annotations: bool) -> Self {
        self.annotations = annotations;
        self
    }

    pub fn draws_annotations(&self) -> bool {
        self.annotations
    }
}

impl Default for MupdfRasterizer {
    fn default() -> Self {
        Self::new()
    }
}

impl PageRasterizer for MupdfRasterizer {
    type Document = MupdfDocument;

    fn decode(&self, bytes: Bytes) -> Result<Self::Document, RasterError> {
        let doc = Document::from_bytes(&bytes, PDF_MAGIC)
            .map_err(|e| RasterError::Decode(e.to_string()))?;
        let page_count = doc
            .page_count()
            .map_err(|e| RasterError::Decode(e.to_string()))?;

        Ok(MupdfDocument {
            bytes,
            page_count: page_count.max(0) as usize,
            lock: Mutex::new(()),
        })
    }

    fn page_count(&self, document: &Self::Document) -> usize {
        document.page_count
    }

    fn render(
        &self,
        document: &Self::Document,
        page: usize,
        size: RenderSize,
    ) -> Result<DynamicImage, RasterError> {
        let render_err = |message: String| RasterError::Render { page, message };

        let _guard = document.lock.lock();

        let doc = Document::from_bytes(&document.bytes, PDF_MAGIC)
            .map_err(|e| render_err(e.to_string()))?;
        let mupdf_page = doc
            .load_page(page as i32)
            .map_err(|e| render_err(e.to_string()))?;

        let bounds = mupdf_page.bounds().map_err(|e| render_err(e.to_string()))?;
        let page_width = bounds.x1 - bounds.x0;
        let page_height = bounds.y1 - bounds.y0;
        if page_width <= 0.0 || page_height <= 0.0 {
            return Err(render_err(format!(
                "page has empty bounds ({} x {})",
                page_width, page_height
            )));
        }

        // Stretch to the exact target size, as the page bitmap is fixed-size
        let matrix = Matrix::new_scale(
            size.width as f32 / page_width,
            size.height as f32 / page_height,
        );
        let pixmap = mupdf_page
            .to_pixmap(&matrix, &Colorspace::device_rgb(), false, self.annotations)
            .map_err(|e| render_err(e.to_string()))?;

        let image = pixmap_to_image(&pixmap).ok_or_else(|| {
            render_err("pixmap does not match its reported dimensions".to_string())
        })?;

        if image.width() == size.width && image.height() == size.height {
            Ok(image)
        } else {
            // Rounding in MuPDF can leave the pixmap a pixel off
            Ok(image.resize_exact(size.width, size.height, FilterType::Triangle))
        }
    }
}

/// Copy an RGB(A) pixmap into an RGB image, dropping alpha if present.
fn pixmap_to_image(pixmap: &Pixmap) -> Option<DynamicImage> {
    let width = pixmap.width() as u32;
    let height = pixmap.height() as u32;
    let n = pixmap.n() as usize;
    let samples = pixmap.samples();

    if n < 3 || samples.len() < (width as usize) * (height as usize) * n {
        return None;
    }

    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    for pixel in samples.chunks_exact(n).take((width * height) as usize) {
        rgb.extend_from_slice(&pixel[..3]);
    }

    RgbImage::from_raw(width, height, rgb).map(DynamicImage::ImageRgb8)
}
