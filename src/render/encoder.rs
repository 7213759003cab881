//! PNG page encoder.
//!
//! Rendered pages are stored and served as PNG. Pages are line art and
//! text, which PNG keeps sharp at a size comparable to a good JPEG.

use std::io::Cursor;

use bytes::Bytes;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::DynamicImage;

use crate::error::RasterError;

/// Content type of every cached page.
pub const PAGE_CONTENT_TYPE: &str = "image/png";

/// PNG compression level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PngCompression {
    /// Favour encode speed over output size
    Fast,
    #[default]
    Default,
    /// Favour output size over encode speed
    Best,
}

/// Encodes rendered page bitmaps to PNG.
#[derive(Debug, Clone, Default)]
pub struct PngPageEncoder {
    compression: PngCompression,
}

impl PngPageEncoder {
    /// Create an encoder with default compression.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_compression(compression: PngCompression) -> Self {
        Self { compression }
    }

    pub fn compression(&self) -> PngCompression {
        self.compression
    }

    /// Encode a page bitmap.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::Encode`] if the image has an unsupported
    /// layout or the encoder fails.
    pub fn encode(&self, page: &DynamicImage) -> Result<Bytes, RasterError> {
        let compression = match self.compression {
            PngCompression::Fast => CompressionType::Fast,
            PngCompression::Default => CompressionType::Default,
            PngCompression::Best => CompressionType::Best,
        };

        let mut output = Vec::new();
        let encoder =
            PngEncoder::new_with_quality(Cursor::new(&mut output), compression, FilterType::Adaptive);

        page.write_with_encoder(encoder)
            .map_err(|e| RasterError::Encode(e.to_string()))?;

        Ok(Bytes::from(output))
    }
}

/// Check for the 8-byte PNG signature.
#[inline]
pub fn is_png(data: &[u8]) -> bool {
    data.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A])
}
