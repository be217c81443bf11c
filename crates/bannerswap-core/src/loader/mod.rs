//! Document loading.
//!
//! Classifies uploads by extension and decodes them into either a raster
//! image or a paginated PDF handle. PDF pages are rendered on demand through
//! the [`PageRenderCache`].

mod pdf;
#[cfg(feature = "pdfium")]
mod pdfium;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use pdf::{PageSize, PdfBackend, PdfDocument, PdfError};
#[cfg(feature = "pdfium")]
pub use pdfium::PdfiumBackend;

use crate::cache::{PageCacheKey, PageRenderCache};
use crate::layers::{BannerSource, ImageFormat, RasterSurface};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Identifies one loaded document; page cache entries are scoped by it.
pub type DocumentId = Uuid;

/// Loading errors.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),
    #[error("Failed to decode {filename}: {reason}")]
    Decode { filename: String, reason: String },
    #[error("No PDF backend available")]
    NoPdfBackend,
    #[error(transparent)]
    Pdf(#[from] PdfError),
}

/// Result type for loading operations.
pub type LoadResult<T> = Result<T, LoadError>;

/// What kind of document a filename denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Image(ImageFormat),
    Pdf,
}

impl DocumentKind {
    /// Classify a filename by its extension (case-insensitive).
    pub fn from_filename(filename: &str) -> LoadResult<Self> {
        let ext = extension(filename);
        if ext.eq_ignore_ascii_case("pdf") {
            return Ok(DocumentKind::Pdf);
        }
        ImageFormat::from_extension(&ext)
            .map(DocumentKind::Image)
            .ok_or_else(|| LoadError::UnsupportedFormat(filename.to_string()))
    }
}

fn extension(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_string()
}

/// The uploaded file a document was loaded from.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub id: DocumentId,
    pub filename: String,
}

impl SourceFile {
    fn new(filename: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            filename: filename.to_string(),
        }
    }
}

/// A page of a loaded PDF.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageHandle {
    /// 1-based page number.
    pub number: u32,
    pub size: PageSize,
}

/// A parsed PDF.
#[derive(Debug)]
pub struct LoadedPdf {
    pub source: SourceFile,
    document: Box<dyn PdfDocument>,
}

impl LoadedPdf {
    pub fn page_count(&self) -> u32 {
        self.document.page_count()
    }

    /// Look up a page by its 1-based number.
    pub fn get_page(&self, page_number: u32) -> Result<PageHandle, PdfError> {
        if page_number == 0 || page_number > self.page_count() {
            return Err(PdfError::InvalidPage(page_number));
        }
        let size = self.document.page_size(page_number)?;
        Ok(PageHandle {
            number: page_number,
            size,
        })
    }

    /// Rasterize a page at `scale`, going through the cache.
    pub fn render(&self, page: &PageHandle, scale: f32, cache: &mut PageRenderCache) -> Result<RasterSurface, PdfError> {
        let key = PageCacheKey::new(self.source.id, page.number, scale);
        cache.get_or_render(key, || {
            log::info!("Rendering {} page {} at {}x", self.source.filename, page.number, scale);
            self.document.render_page(page.number, scale)
        })
    }
}

/// A successfully decoded upload.
#[derive(Debug)]
pub enum LoadedDocument {
    Image { source: SourceFile, surface: RasterSurface },
    Pdf(LoadedPdf),
}

impl LoadedDocument {
    pub fn source(&self) -> &SourceFile {
        match self {
            LoadedDocument::Image { source, .. } => source,
            LoadedDocument::Pdf(pdf) => &pdf.source,
        }
    }

    pub fn id(&self) -> DocumentId {
        self.source().id
    }

    pub fn filename(&self) -> &str {
        &self.source().filename
    }

    /// Number of pages; images count as one.
    pub fn page_count(&self) -> u32 {
        match self {
            LoadedDocument::Image { .. } => 1,
            LoadedDocument::Pdf(pdf) => pdf.page_count(),
        }
    }

    pub fn as_pdf(&self) -> Option<&LoadedPdf> {
        match self {
            LoadedDocument::Pdf(pdf) => Some(pdf),
            LoadedDocument::Image { .. } => None,
        }
    }
}

/// Decodes uploads into documents and banners.
#[derive(Clone, Default)]
pub struct DocumentLoader {
    pdf_backend: Option<Arc<dyn PdfBackend>>,
}

impl DocumentLoader {
    /// A loader that only understands raster images.
    pub fn images_only() -> Self {
        Self { pdf_backend: None }
    }

    /// A loader that opens PDFs with `backend`.
    pub fn with_pdf_backend(backend: Arc<dyn PdfBackend>) -> Self {
        Self {
            pdf_backend: Some(backend),
        }
    }

    pub fn supports_pdf(&self) -> bool {
        self.pdf_backend.is_some()
    }

    /// Decode a main document upload.
    pub fn load(&self, filename: &str, bytes: Vec<u8>) -> LoadResult<LoadedDocument> {
        match DocumentKind::from_filename(filename)? {
            DocumentKind::Image(format) => {
                let surface = decode_image(filename, &bytes, format)?;
                log::info!("Loaded image {} ({}x{})", filename, surface.width(), surface.height());
                Ok(LoadedDocument::Image {
                    source: SourceFile::new(filename),
                    surface,
                })
            }
            DocumentKind::Pdf => {
                let backend = self.pdf_backend.as_ref().ok_or(LoadError::NoPdfBackend)?;
                let document = backend.open(Arc::from(bytes)).map_err(|e| match e {
                    PdfError::Load(reason) => LoadError::Decode {
                        filename: filename.to_string(),
                        reason,
                    },
                    other => LoadError::Pdf(other),
                })?;
                if document.page_count() == 0 {
                    return Err(LoadError::Decode {
                        filename: filename.to_string(),
                        reason: "document has no pages".to_string(),
                    });
                }
                log::info!("Loaded PDF {} ({} pages)", filename, document.page_count());
                Ok(LoadedDocument::Pdf(LoadedPdf {
                    source: SourceFile::new(filename),
                    document,
                }))
            }
        }
    }

    /// Decode a banner upload. Banners must be JPEG or PNG.
    pub fn load_banner(&self, filename: &str, bytes: &[u8]) -> LoadResult<BannerSource> {
        let format = match DocumentKind::from_filename(filename)? {
            DocumentKind::Image(format) => format,
            DocumentKind::Pdf => return Err(LoadError::UnsupportedFormat(filename.to_string())),
        };
        let surface = decode_image(filename, bytes, format)?;
        log::info!("Loaded banner {} ({}x{})", filename, surface.width(), surface.height());
        Ok(BannerSource::new(filename, format, surface))
    }
}

fn decode_image(filename: &str, bytes: &[u8], format: ImageFormat) -> LoadResult<RasterSurface> {
    RasterSurface::decode(bytes, format).map_err(|e| LoadError::Decode {
        filename: filename.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::testing::{FakePdfBackend, jpeg_bytes, png_bytes};
    use super::*;

    fn pdf_loader(pages: u32) -> (DocumentLoader, FakePdfBackend) {
        let backend = FakePdfBackend::letter(pages);
        (DocumentLoader::with_pdf_backend(Arc::new(backend.clone())), backend)
    }

    #[test]
    fn test_classification() {
        assert_eq!(DocumentKind::from_filename("a.jpg").unwrap(), DocumentKind::Image(ImageFormat::Jpeg));
        assert_eq!(DocumentKind::from_filename("a.JPEG").unwrap(), DocumentKind::Image(ImageFormat::Jpeg));
        assert_eq!(DocumentKind::from_filename("photo.PNG").unwrap(), DocumentKind::Image(ImageFormat::Png));
        assert_eq!(DocumentKind::from_filename("listing.Pdf").unwrap(), DocumentKind::Pdf);
        assert!(matches!(
            DocumentKind::from_filename("notes.txt"),
            Err(LoadError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            DocumentKind::from_filename("no_extension"),
            Err(LoadError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_load_image_reports_natural_size() {
        let loader = DocumentLoader::images_only();
        let doc = loader.load("house.png", png_bytes(120, 80, [10, 20, 30, 255])).unwrap();
        match &doc {
            LoadedDocument::Image { surface, .. } => {
                assert_eq!((surface.width(), surface.height()), (120, 80));
            }
            LoadedDocument::Pdf(_) => panic!("expected image"),
        }
        assert_eq!(doc.filename(), "house.png");
        assert_eq!(doc.page_count(), 1);
    }

    #[test]
    fn test_load_unparseable_image() {
        let loader = DocumentLoader::images_only();
        let err = loader.load("house.jpg", b"garbage".to_vec()).unwrap_err();
        assert!(matches!(err, LoadError::Decode { .. }));
    }

    #[test]
    fn test_load_unsupported() {
        let loader = DocumentLoader::images_only();
        let err = loader.load("house.gif", vec![1, 2, 3]).unwrap_err();
        assert!(matches!(err, LoadError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_pdf_without_backend() {
        let loader = DocumentLoader::images_only();
        assert!(!loader.supports_pdf());
        let err = loader.load("listing.pdf", b"%PDF-1.7".to_vec()).unwrap_err();
        assert!(matches!(err, LoadError::NoPdfBackend));
    }

    #[test]
    fn test_load_pdf_pages() {
        let (loader, _) = pdf_loader(3);
        let doc = loader.load("listing.pdf", b"%PDF-1.7".to_vec()).unwrap();
        let pdf = doc.as_pdf().unwrap();
        assert_eq!(pdf.page_count(), 3);
        assert_eq!(pdf.get_page(2).unwrap().number, 2);
        assert_eq!(pdf.get_page(0), Err(PdfError::InvalidPage(0)));
        assert_eq!(pdf.get_page(4), Err(PdfError::InvalidPage(4)));
    }

    #[test]
    fn test_pdf_decode_failure() {
        let backend = FakePdfBackend::letter(1).failing_open();
        let loader = DocumentLoader::with_pdf_backend(Arc::new(backend));
        let err = loader.load("broken.pdf", b"nope".to_vec()).unwrap_err();
        assert!(matches!(err, LoadError::Decode { .. }));
    }

    #[test]
    fn test_empty_pdf_is_decode_error() {
        let (loader, _) = pdf_loader(0);
        let err = loader.load("empty.pdf", b"%PDF-1.7".to_vec()).unwrap_err();
        assert!(matches!(err, LoadError::Decode { .. }));
    }

    #[test]
    fn test_render_goes_through_cache() {
        let (loader, backend) = pdf_loader(2);
        let doc = loader.load("listing.pdf", b"%PDF-1.7".to_vec()).unwrap();
        let pdf = doc.as_pdf().unwrap();
        let mut cache = PageRenderCache::default();

        let page = pdf.get_page(1).unwrap();
        let a = pdf.render(&page, 1.5, &mut cache).unwrap();
        let b = pdf.render(&page, 1.5, &mut cache).unwrap();
        assert!(a.ptr_eq(&b));
        assert_eq!(backend.render_count(), 1);
        assert_eq!((a.width(), a.height()), (918, 1188));

        pdf.render(&page, 2.0, &mut cache).unwrap();
        assert_eq!(backend.render_count(), 2);
    }

    #[test]
    fn test_banner_rejects_pdf() {
        let (loader, _) = pdf_loader(1);
        let err = loader.load_banner("logo.pdf", b"%PDF").unwrap_err();
        assert!(matches!(err, LoadError::UnsupportedFormat(_)));

        let banner = loader.load_banner("logo.PNG", &png_bytes(90, 30, [0, 0, 0, 255])).unwrap();
        assert_eq!(banner.filename, "logo.PNG");
        assert_eq!(banner.format, ImageFormat::Png);
        assert_eq!(banner.surface.width(), 90);
    }

    #[test]
    fn test_load_jpeg_document() {
        let loader = DocumentLoader::images_only();
        let doc = loader.load("house.jpg", jpeg_bytes(64, 48, [180, 40, 40])).unwrap();
        match doc {
            LoadedDocument::Image { source, surface } => {
                assert_eq!(source.filename, "house.jpg");
                assert_eq!((surface.width(), surface.height()), (64, 48));
                assert_eq!(surface.image().get_pixel(0, 0).0[3], 255);
            }
            LoadedDocument::Pdf(_) => panic!("expected an image"),
        }
    }

    #[test]
    fn test_load_jpeg_banner() {
        let loader = DocumentLoader::images_only();
        let banner = loader.load_banner("logo.JPEG", &jpeg_bytes(30, 10, [0, 0, 200])).unwrap();
        assert_eq!(banner.format, ImageFormat::Jpeg);
        assert_eq!((banner.surface.width(), banner.surface.height()), (30, 10));
    }
}
