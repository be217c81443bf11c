//! Raster surfaces and the image formats they are decoded from.

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Raster image formats accepted for uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageFormat {
    /// PNG format.
    Png,
    /// JPEG format.
    Jpeg,
}

impl ImageFormat {
    /// Get MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
        }
    }

    /// Detect format from file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(ImageFormat::Png),
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            _ => None,
        }
    }

    /// The matching `image` crate format.
    pub fn to_image_format(self) -> image::ImageFormat {
        match self {
            ImageFormat::Png => image::ImageFormat::Png,
            ImageFormat::Jpeg => image::ImageFormat::Jpeg,
        }
    }
}

/// A decoded RGBA bitmap.
///
/// Cloning is cheap: the pixels are shared, so the page cache can hand out
/// the same surface to several callers.
#[derive(Clone)]
pub struct RasterSurface {
    pixels: Arc<RgbaImage>,
}

impl RasterSurface {
    /// Wrap an already decoded bitmap.
    pub fn from_rgba(image: RgbaImage) -> Self {
        Self {
            pixels: Arc::new(image),
        }
    }

    /// Create a surface filled with a single color.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        Self::from_rgba(RgbaImage::from_pixel(width, height, Rgba(rgba)))
    }

    /// Decode encoded bytes, trusting the claimed format over the magic bytes.
    pub fn decode(data: &[u8], format: ImageFormat) -> Result<Self, image::ImageError> {
        let decoded = image::load_from_memory_with_format(data, format.to_image_format())?;
        Ok(Self::from_rgba(decoded.into_rgba8()))
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Pixel dimensions as a kurbo size.
    pub fn size(&self) -> kurbo::Size {
        kurbo::Size::new(self.width() as f64, self.height() as f64)
    }

    /// Borrow the underlying bitmap.
    pub fn image(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Whether two handles point at the same pixel buffer.
    pub fn ptr_eq(&self, other: &RasterSurface) -> bool {
        Arc::ptr_eq(&self.pixels, &other.pixels)
    }
}

impl fmt::Debug for RasterSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RasterSurface")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}
