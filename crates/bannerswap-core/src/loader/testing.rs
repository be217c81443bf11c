//! Test doubles and fixtures for code that loads documents.

use super::pdf::{PageSize, PdfBackend, PdfDocument, PdfError};
use crate::layers::RasterSurface;
use image::{Rgba, RgbaImage};
use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Encode a solid-color PNG.
pub fn png_bytes(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    encode(width, height, rgba, image::ImageFormat::Png)
}

/// Encode a solid-color JPEG (alpha is dropped).
pub fn jpeg_bytes(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    encode(width, height, [rgb[0], rgb[1], rgb[2], 255], image::ImageFormat::Jpeg)
}

fn encode(width: u32, height: u32, rgba: [u8; 4], format: image::ImageFormat) -> Vec<u8> {
    let image = image::DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba(rgba)));
    let image = match format {
        image::ImageFormat::Jpeg => image::DynamicImage::ImageRgb8(image.to_rgb8()),
        _ => image,
    };
    let mut out = Vec::new();
    if let Err(e) = image.write_to(&mut Cursor::new(&mut out), format) {
        panic!("fixture encode failed: {e}");
    }
    out
}

/// Color a fake page is filled with, distinct per page.
pub fn page_color(page_number: u32) -> [u8; 4] {
    [(page_number * 40 % 256) as u8, 100, 200, 255]
}

/// In-memory PDF backend. Every page is a solid color; renders are counted.
#[derive(Clone)]
pub struct FakePdfBackend {
    pages: Vec<PageSize>,
    renders: Arc<AtomicUsize>,
    fail_open: bool,
    fail_render: bool,
}

impl FakePdfBackend {
    pub fn new(pages: Vec<PageSize>) -> Self {
        Self {
            pages,
            renders: Arc::new(AtomicUsize::new(0)),
            fail_open: false,
            fail_render: false,
        }
    }

    /// `count` US-letter pages.
    pub fn letter(count: u32) -> Self {
        Self::new(vec![PageSize { width: 612.0, height: 792.0 }; count as usize])
    }

    /// Reject every document as unparseable.
    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Open fine but fail every render.
    pub fn failing_render(mut self) -> Self {
        self.fail_render = true;
        self
    }

    /// Number of page renders performed so far.
    pub fn render_count(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }
}

impl PdfBackend for FakePdfBackend {
    fn open(&self, _bytes: Arc<[u8]>) -> Result<Box<dyn PdfDocument>, PdfError> {
        if self.fail_open {
            return Err(PdfError::Load("invalid PDF header".to_string()));
        }
        Ok(Box::new(self.clone()))
    }
}

impl PdfDocument for FakePdfBackend {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page_size(&self, page_number: u32) -> Result<PageSize, PdfError> {
        page_number
            .checked_sub(1)
            .and_then(|index| self.pages.get(index as usize))
            .copied()
            .ok_or(PdfError::InvalidPage(page_number))
    }

    fn render_page(&self, page_number: u32, scale: f32) -> Result<RasterSurface, PdfError> {
        if self.fail_render {
            return Err(PdfError::Render("renderer crashed".to_string()));
        }
        let (width, height) = self.page_size(page_number)?.viewport(scale);
        self.renders.fetch_add(1, Ordering::SeqCst);
        Ok(RasterSurface::filled(width, height, page_color(page_number)))
    }
}
