//! PDF backend using pdfium-render.
//!
//! Note: pdfium-render's `Pdfium` is not Send+Sync, so a fresh binding is
//! made for each operation and only the document bytes are kept around.

use super::pdf::{PageSize, PdfBackend, PdfDocument, PdfError};
use crate::layers::RasterSurface;
use pdfium_render::prelude::{PdfPage, PdfRenderConfig, Pdfium};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Opens PDFs through a dynamically bound pdfium library.
#[derive(Debug, Clone, Default)]
pub struct PdfiumBackend {
    /// Directory containing the pdfium shared library. `None` uses the
    /// system library search path.
    library_dir: Option<PathBuf>,
}

impl PdfiumBackend {
    pub fn new(library_dir: Option<PathBuf>) -> Self {
        Self { library_dir }
    }

    fn bind(&self) -> Result<Pdfium, PdfError> {
        static LOGGED_BIND: AtomicBool = AtomicBool::new(false);

        let bindings = match &self.library_dir {
            Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir)),
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| PdfError::Init(e.to_string()))?;

        if !LOGGED_BIND.swap(true, Ordering::Relaxed) {
            match &self.library_dir {
                Some(dir) => log::info!("Bound pdfium from {}", dir.display()),
                None => log::info!("Bound system pdfium"),
            }
        }
        Ok(Pdfium::new(bindings))
    }
}

impl PdfBackend for PdfiumBackend {
    fn open(&self, bytes: Arc<[u8]>) -> Result<Box<dyn PdfDocument>, PdfError> {
        let pdfium = self.bind()?;
        let page_count = {
            let document = pdfium
                .load_pdf_from_byte_slice(&bytes, None)
                .map_err(|e| PdfError::Load(e.to_string()))?;
            document.pages().len() as u32
        };
        Ok(Box::new(PdfiumDocument {
            backend: self.clone(),
            bytes,
            page_count,
        }))
    }
}

/// A parsed document; re-opened from its bytes for every page operation.
struct PdfiumDocument {
    backend: PdfiumBackend,
    bytes: Arc<[u8]>,
    page_count: u32,
}

impl PdfiumDocument {
    fn with_page<T>(
        &self,
        page_number: u32,
        f: impl FnOnce(&PdfPage<'_>) -> Result<T, PdfError>,
    ) -> Result<T, PdfError> {
        if page_number == 0 || page_number > self.page_count {
            return Err(PdfError::InvalidPage(page_number));
        }
        let pdfium = self.backend.bind()?;
        let document = pdfium
            .load_pdf_from_byte_slice(&self.bytes, None)
            .map_err(|e| PdfError::Load(e.to_string()))?;
        let page = document
            .pages()
            .get((page_number - 1) as u16)
            .map_err(|_| PdfError::InvalidPage(page_number))?;
        f(&page)
    }
}

impl PdfDocument for PdfiumDocument {
    fn page_count(&self) -> u32 {
        self.page_count
    }

    fn page_size(&self, page_number: u32) -> Result<PageSize, PdfError> {
        self.with_page(page_number, |page| {
            Ok(PageSize {
                width: page.width().value,
                height: page.height().value,
            })
        })
    }

    fn render_page(&self, page_number: u32, scale: f32) -> Result<RasterSurface, PdfError> {
        self.with_page(page_number, |page| {
            let size = PageSize {
                width: page.width().value,
                height: page.height().value,
            };
            let (width, height) = size.viewport(scale);

            let config = PdfRenderConfig::new()
                .set_target_width(width as i32)
                .set_target_height(height as i32)
                .render_form_data(true)
                .render_annotations(true);

            let bitmap = page
                .render_with_config(&config)
                .map_err(|e| PdfError::Render(e.to_string()))?;

            Ok(RasterSurface::from_rgba(bitmap.as_image().into_rgba8()))
        })
    }
}
