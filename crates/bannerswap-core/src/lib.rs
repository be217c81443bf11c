//! BannerSwap Core Library
//!
//! Platform-agnostic editing session, page render cache and document loading
//! for the BannerSwap banner-replacement editor.

pub mod cache;
pub mod canvas;
pub mod config;
pub mod layers;
pub mod loader;
pub mod selection;

pub use cache::{CacheStats, PageCacheKey, PageRenderCache};
pub use canvas::{CanvasDocument, EditingSession, SessionError, SessionResult, SessionState, ZDirection};
pub use config::{ConfigError, EditorConfig, Timeouts};
pub use layers::{
    Background, BackgroundContent, BannerSource, EntityId, ImageFormat, Layer, LayerKind, LayerTrait, Overlay,
    RasterSurface,
};
#[cfg(feature = "pdfium")]
pub use loader::PdfiumBackend;
pub use loader::{
    DocumentId, DocumentKind, DocumentLoader, LoadError, LoadResult, LoadedDocument, LoadedPdf, PageHandle, PageSize,
    PdfBackend, PdfDocument, PdfError, SourceFile,
};
pub use selection::{Corner, Handle, ManipulationState};
