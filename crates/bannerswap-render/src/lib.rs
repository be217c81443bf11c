//! BannerSwap Render Library
//!
//! Composites an editing session into a raster and encodes it for export.
//! The default renderer is a CPU compositor built on the `image` crate.

mod export;
mod raster_impl;
mod renderer;

pub use export::{
    ExportEncoder, ExportError, ExportFormat, ExportOutput, ExportResult, LopdfAuthoring, Orientation, PdfAuthoring,
    data_url, encode_jpeg, encode_png, export_filename,
};
pub use raster_impl::RasterRenderer;
pub use renderer::{RenderContext, RenderResult, Renderer, RendererError};
