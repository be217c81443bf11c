//! Page-rasterization backend abstraction.
//!
//! The editor only needs three things from a PDF engine: the page count, a
//! page's size and a raster of a page at some scale. Anything that can do
//! that (pdfium, a test double) plugs in behind these traits.

use crate::layers::RasterSurface;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during PDF operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PdfError {
    #[error("Failed to initialize PDF backend: {0}")]
    Init(String),

    #[error("Failed to load PDF: {0}")]
    Load(String),

    #[error("Invalid page number: {0}")]
    InvalidPage(u32),

    #[error("Rendering failed: {0}")]
    Render(String),
}

/// Page size in PDF points (1/72 inch).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    /// Pixel size of the page viewport at `scale`.
    pub fn viewport(&self, scale: f32) -> (u32, u32) {
        (
            (self.width * scale).round().max(1.0) as u32,
            (self.height * scale).round().max(1.0) as u32,
        )
    }
}

/// Opens PDF documents.
pub trait PdfBackend: Send + Sync {
    /// Parse a document from its bytes.
    fn open(&self, bytes: Arc<[u8]>) -> Result<Box<dyn PdfDocument>, PdfError>;
}

/// An opened PDF document. Page numbers are 1-based.
pub trait PdfDocument: Send + Sync {
    /// Number of pages.
    fn page_count(&self) -> u32;

    /// Size of a page in points.
    fn page_size(&self, page_number: u32) -> Result<PageSize, PdfError>;

    /// Rasterize a page at `scale` (1.0 = one pixel per point).
    fn render_page(&self, page_number: u32, scale: f32) -> Result<RasterSurface, PdfError>;
}

impl fmt::Debug for dyn PdfDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PdfDocument")
            .field("page_count", &self.page_count())
            .finish()
    }
}
