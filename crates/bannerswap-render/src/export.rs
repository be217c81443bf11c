//! Export encoding.
//!
//! Exports always composite from the live session and never touch the
//! uploaded file again. A failed PDF export falls back to PNG and records
//! why in [`ExportOutput::fallback`].

use crate::raster_impl::RasterRenderer;
use crate::renderer::{RenderContext, Renderer, RendererError};
use bannerswap_core::{EditingSession, ImageFormat};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage, RgbaImage};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use std::path::Path;
use thiserror::Error;

/// JPEG quality used for exports (maximum).
const JPEG_QUALITY: u8 = 100;

/// Export errors.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Nothing to save")]
    EmptyCanvas,
    #[error("Image encoding failed: {0}")]
    Encoding(String),
    #[error("PDF encoding failed: {0}")]
    PdfEncoding(String),
    #[error(transparent)]
    Render(#[from] RendererError),
}

/// Result type for export operations.
pub type ExportResult<T> = Result<T, ExportError>;

/// Output file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Png,
    Jpeg,
    Pdf,
}

impl ExportFormat {
    /// File extension written for this format.
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Jpeg => "jpg",
            ExportFormat::Pdf => "pdf",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ExportFormat::Png => "image/png",
            ExportFormat::Jpeg => "image/jpeg",
            ExportFormat::Pdf => "application/pdf",
        }
    }

    /// Parse the answer to the image-export format prompt. Only "png" and
    /// "jpg" (any case, no surrounding whitespace) are accepted; anything
    /// else cancels.
    pub fn from_prompt(answer: &str) -> Option<Self> {
        if answer.eq_ignore_ascii_case("png") {
            Some(ExportFormat::Png)
        } else if answer.eq_ignore_ascii_case("jpg") {
            Some(ExportFormat::Jpeg)
        } else {
            None
        }
    }

    /// Parse a format name as given on the command line.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "png" => Some(ExportFormat::Png),
            "jpg" | "jpeg" => Some(ExportFormat::Jpeg),
            "pdf" => Some(ExportFormat::Pdf),
            _ => None,
        }
    }
}

impl From<ImageFormat> for ExportFormat {
    fn from(format: ImageFormat) -> Self {
        match format {
            ImageFormat::Png => ExportFormat::Png,
            ImageFormat::Jpeg => ExportFormat::Jpeg,
        }
    }
}

/// `<basename>_edited.<ext>`, where basename drops only the final extension.
pub fn export_filename(original: &str, format: ExportFormat) -> String {
    let path = Path::new(original);
    let base = match path.extension() {
        Some(_) => path.file_stem().and_then(|stem| stem.to_str()).unwrap_or(original),
        None => path.file_name().and_then(|name| name.to_str()).unwrap_or(original),
    };
    format!("{}_edited.{}", base, format.extension())
}

/// Encode RGBA pixel data to PNG bytes.
pub fn encode_png(image: &RgbaImage) -> ExportResult<Vec<u8>> {
    let mut png_data = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut png_data, image.width(), image.height());
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);

        let mut writer = encoder
            .write_header()
            .map_err(|e| ExportError::Encoding(format!("PNG header: {e}")))?;
        writer
            .write_image_data(image.as_raw())
            .map_err(|e| ExportError::Encoding(format!("PNG data: {e}")))?;
    }
    Ok(png_data)
}

/// Encode to JPEG at maximum quality. Transparency is flattened onto white.
pub fn encode_jpeg(image: &RgbaImage) -> ExportResult<Vec<u8>> {
    let rgb = flatten_onto_white(image);
    let mut jpeg_data = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg_data, JPEG_QUALITY)
        .encode_image(&rgb)
        .map_err(|e| ExportError::Encoding(format!("JPEG: {e}")))?;
    Ok(jpeg_data)
}

fn flatten_onto_white(image: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b, a] = image.get_pixel(x, y).0;
        let blend = |c: u8| ((c as u32 * a as u32 + 255 * (255 - a as u32)) / 255) as u8;
        Rgb([blend(r), blend(g), blend(b)])
    })
}

/// Render exported bytes as a `data:` URL.
pub fn data_url(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type, B64.encode(bytes))
}

/// Page orientation of an exported PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Portrait,
    Landscape,
}

impl Orientation {
    /// Landscape when strictly wider than tall.
    pub fn for_size(width: u32, height: u32) -> Self {
        if width > height {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        }
    }
}

/// Creates a one-page PDF showing a raster.
pub trait PdfAuthoring: Send + Sync {
    /// Build a PDF whose single page is exactly the image's pixel size.
    fn single_image_page(&self, image: &RgbaImage, orientation: Orientation) -> ExportResult<Vec<u8>>;
}

/// [`PdfAuthoring`] with lopdf. The image is an RGB XObject with an alpha
/// soft mask, drawn to fill a page of `width x height` units.
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfAuthoring;

impl PdfAuthoring for LopdfAuthoring {
    fn single_image_page(&self, image: &RgbaImage, orientation: Orientation) -> ExportResult<Vec<u8>> {
        let (width, height) = image.dimensions();
        let mut rgb = Vec::with_capacity((width * height * 3) as usize);
        let mut alpha = Vec::with_capacity((width * height) as usize);
        for pixel in image.pixels() {
            rgb.extend_from_slice(&pixel.0[..3]);
            alpha.push(pixel.0[3]);
        }

        let mut doc = Document::with_version("1.7");

        let smask_stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            alpha,
        );
        let smask_id = doc.add_object(smask_stream);

        let image_stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "SMask" => smask_id,
            },
            rgb,
        );
        let image_id = doc.add_object(image_stream);

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        (width as i64).into(),
                        0.into(),
                        0.into(),
                        (height as i64).into(),
                        0.into(),
                        0.into(),
                    ],
                ),
                Operation::new("Do", vec!["Im0".into()]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_bytes = content
            .encode()
            .map_err(|e| ExportError::PdfEncoding(format!("content stream: {e}")))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, content_bytes));

        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), (width as i64).into(), (height as i64).into()],
            "Resources" => dictionary! {
                "XObject" => dictionary! {
                    "Im0" => image_id,
                },
            },
            "Contents" => content_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        let orientation = match orientation {
            Orientation::Portrait => "portrait",
            Orientation::Landscape => "landscape",
        };
        let info_id = doc.add_object(dictionary! {
            "Producer" => Object::string_literal("BannerSwap"),
            "Subject" => Object::string_literal(orientation),
        });
        doc.trailer.set("Root", catalog_id);
        doc.trailer.set("Info", info_id);
        doc.compress();

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer)
            .map_err(|e| ExportError::PdfEncoding(format!("serialize: {e}")))?;
        Ok(buffer)
    }
}

/// An encoded export ready to be written or downloaded.
#[derive(Debug, Clone)]
pub struct ExportOutput {
    /// Suggested download name.
    pub filename: String,
    /// Format actually produced.
    pub format: ExportFormat,
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Set when the requested format failed and PNG was produced instead.
    pub fallback: Option<String>,
}

impl ExportOutput {
    pub fn data_url(&self) -> String {
        data_url(self.format.mime_type(), &self.bytes)
    }
}

/// Serializes an editing session to PNG, JPEG or PDF.
pub struct ExportEncoder {
    renderer: Box<dyn Renderer>,
    pdf: Box<dyn PdfAuthoring>,
}

impl Default for ExportEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ExportEncoder {
    /// An encoder using the software renderer and lopdf.
    pub fn new() -> Self {
        Self {
            renderer: Box::new(RasterRenderer::new()),
            pdf: Box::new(LopdfAuthoring),
        }
    }

    /// Replace the PDF authoring backend.
    pub fn with_pdf_authoring(mut self, pdf: Box<dyn PdfAuthoring>) -> Self {
        self.pdf = pdf;
        self
    }

    /// Export in any supported format.
    pub fn export(&mut self, session: &mut EditingSession, format: ExportFormat) -> ExportResult<ExportOutput> {
        match format {
            ExportFormat::Png => self.export_image(session, ImageFormat::Png),
            ExportFormat::Jpeg => self.export_image(session, ImageFormat::Jpeg),
            ExportFormat::Pdf => self.export_pdf(session),
        }
    }

    /// Deselect, composite at canvas size and encode as an image.
    pub fn export_image(&mut self, session: &mut EditingSession, format: ImageFormat) -> ExportResult<ExportOutput> {
        let (image, filename) = self.composite(session)?;
        let format = ExportFormat::from(format);
        let bytes = match format {
            ExportFormat::Jpeg => encode_jpeg(&image)?,
            _ => encode_png(&image)?,
        };
        Ok(self.finish(&filename, format, bytes, &image, None))
    }

    /// Deselect, composite at canvas size and wrap in a single-page PDF.
    /// Falls back to PNG when PDF authoring fails.
    pub fn export_pdf(&mut self, session: &mut EditingSession) -> ExportResult<ExportOutput> {
        let (image, filename) = self.composite(session)?;
        let orientation = Orientation::for_size(image.width(), image.height());
        match self.pdf.single_image_page(&image, orientation) {
            Ok(bytes) => Ok(self.finish(&filename, ExportFormat::Pdf, bytes, &image, None)),
            Err(e) => {
                log::warn!("PDF export failed, falling back to PNG: {}", e);
                let bytes = encode_png(&image)?;
                Ok(self.finish(&filename, ExportFormat::Png, bytes, &image, Some(e.to_string())))
            }
        }
    }

    fn composite(&mut self, session: &mut EditingSession) -> ExportResult<(RgbaImage, String)> {
        let filename = session
            .source()
            .map(|source| source.filename.clone())
            .ok_or(ExportError::EmptyCanvas)?;
        session.deselect();
        let image = self.renderer.render(&RenderContext::for_export(session))?;
        Ok((image, filename))
    }

    fn finish(
        &self,
        original: &str,
        format: ExportFormat,
        bytes: Vec<u8>,
        image: &RgbaImage,
        fallback: Option<String>,
    ) -> ExportOutput {
        log::info!(
            "Exported {}x{} {} ({} bytes)",
            image.width(),
            image.height(),
            format.extension(),
            bytes.len()
        );
        ExportOutput {
            filename: export_filename(original, format),
            format,
            bytes,
            width: image.width(),
            height: image.height(),
            fallback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bannerswap_core::loader::testing::png_bytes;
    use bannerswap_core::{BannerSource, DocumentLoader, EditorConfig, PageRenderCache, RasterSurface};

    struct BrokenPdf;

    impl PdfAuthoring for BrokenPdf {
        fn single_image_page(&self, _image: &RgbaImage, _orientation: Orientation) -> ExportResult<Vec<u8>> {
            Err(ExportError::PdfEncoding("out of memory".to_string()))
        }
    }

    fn session(filename: &str, width: u32, height: u32) -> EditingSession {
        let loader = DocumentLoader::images_only();
        let doc = loader.load(filename, png_bytes(width, height, [10, 120, 10, 255])).unwrap();
        let mut session = EditingSession::new(EditorConfig::default());
        session.load_document(&doc, &mut PageRenderCache::default()).unwrap();
        session
    }

    #[test]
    fn test_export_filename() {
        assert_eq!(export_filename("listing.pdf", ExportFormat::Jpeg), "listing_edited.jpg");
        assert_eq!(export_filename("photo.PNG", ExportFormat::Png), "photo_edited.png");
        assert_eq!(export_filename("my.house.v2.jpeg", ExportFormat::Pdf), "my.house.v2_edited.pdf");
        assert_eq!(export_filename("noext", ExportFormat::Png), "noext_edited.png");
    }

    #[test]
    fn test_prompt_parsing() {
        assert_eq!(ExportFormat::from_prompt("png"), Some(ExportFormat::Png));
        assert_eq!(ExportFormat::from_prompt("JPG"), Some(ExportFormat::Jpeg));
        assert_eq!(ExportFormat::from_prompt("jpeg"), None);
        assert_eq!(ExportFormat::from_prompt("pdf"), None);
        assert_eq!(ExportFormat::from_prompt(""), None);
        assert_eq!(ExportFormat::from_prompt(" png"), None);
        assert_eq!(ExportFormat::from_prompt("jpg\n"), None);
    }

    #[test]
    fn test_orientation() {
        assert_eq!(Orientation::for_size(1200, 800), Orientation::Landscape);
        assert_eq!(Orientation::for_size(800, 800), Orientation::Portrait);
        assert_eq!(Orientation::for_size(612, 792), Orientation::Portrait);
    }

    #[test]
    fn test_export_png_at_canvas_size() {
        let mut session = session("house.png", 120, 80);
        let banner = BannerSource::new("logo.png", ImageFormat::Png, RasterSurface::filled(10, 10, [0, 0, 0, 255]));
        session.add_overlay(banner).unwrap();
        assert!(session.selected().is_some());

        let mut encoder = ExportEncoder::new();
        let output = encoder.export_image(&mut session, ImageFormat::Png).unwrap();
        assert_eq!(session.selected(), None);
        assert_eq!(output.filename, "house_edited.png");
        assert_eq!((output.width, output.height), (120, 80));

        let decoded = image::load_from_memory(&output.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (120, 80));
    }

    #[test]
    fn test_export_jpeg() {
        let mut session = session("listing.png", 64, 48);
        let output = ExportEncoder::new().export(&mut session, ExportFormat::Jpeg).unwrap();
        assert_eq!(output.filename, "listing_edited.jpg");
        assert_eq!(&output.bytes[..2], &[0xFF, 0xD8]);
        assert!(output.data_url().starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn test_export_pdf() {
        let mut session = session("house.png", 90, 60);
        let output = ExportEncoder::new().export_pdf(&mut session).unwrap();
        assert_eq!(output.format, ExportFormat::Pdf);
        assert_eq!(output.filename, "house_edited.pdf");
        assert!(output.fallback.is_none());

        let doc = Document::load_mem(&output.bytes).unwrap();
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 1);
        let page_id = pages[&1];
        let media_box = doc
            .get_object(page_id)
            .unwrap()
            .as_dict()
            .unwrap()
            .get(b"MediaBox")
            .unwrap()
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_i64().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(media_box, vec![0, 0, 90, 60]);
        assert_eq!(pdf_subject(&doc), b"landscape");
    }

    fn pdf_subject(doc: &Document) -> Vec<u8> {
        let info_id = doc.trailer.get(b"Info").unwrap().as_reference().unwrap();
        doc.get_object(info_id)
            .unwrap()
            .as_dict()
            .unwrap()
            .get(b"Subject")
            .unwrap()
            .as_str()
            .unwrap()
            .to_vec()
    }

    #[test]
    fn test_export_pdf_portrait() {
        let mut session = session("flyer.png", 60, 90);
        let output = ExportEncoder::new().export_pdf(&mut session).unwrap();
        let doc = Document::load_mem(&output.bytes).unwrap();
        assert_eq!(pdf_subject(&doc), b"portrait");
    }

    #[test]
    fn test_export_after_oversized_scale() {
        let mut session = session("house.png", 1200, 800);
        let banner = BannerSource::new("logo.png", ImageFormat::Png, RasterSurface::filled(900, 300, [0, 0, 255, 255]));
        session.add_overlay(banner).unwrap();
        session.scale_selected(1000.0).unwrap();

        let output = ExportEncoder::new().export(&mut session, ExportFormat::Png).unwrap();
        assert_eq!((output.width, output.height), (1200, 800));
        let decoded = image::load_from_memory(&output.bytes).unwrap().to_rgba8();
        assert_eq!(decoded.get_pixel(600, 400).0, [0, 0, 255, 255]);
    }

    #[test]
    fn test_pdf_failure_falls_back_to_png() {
        let mut session = session("listing.png", 40, 30);
        let mut encoder = ExportEncoder::new().with_pdf_authoring(Box::new(BrokenPdf));
        let output = encoder.export_pdf(&mut session).unwrap();
        assert_eq!(output.format, ExportFormat::Png);
        assert_eq!(output.filename, "listing_edited.png");
        assert!(output.fallback.as_deref().unwrap().contains("out of memory"));
        assert_eq!(&output.bytes[1..4], b"PNG");
    }

    #[test]
    fn test_export_empty_session() {
        let mut session = EditingSession::new(EditorConfig::default());
        let err = ExportEncoder::new().export(&mut session, ExportFormat::Png).unwrap_err();
        assert!(matches!(err, ExportError::EmptyCanvas));
    }

    #[test]
    fn test_jpeg_flattens_transparency() {
        let image = RgbaImage::from_pixel(4, 4, image::Rgba([0, 0, 0, 0]));
        let flat = flatten_onto_white(&image);
        assert_eq!(flat.get_pixel(0, 0).0, [255, 255, 255]);
        assert!(encode_jpeg(&image).is_ok());
    }

    #[test]
    fn test_data_url() {
        assert_eq!(data_url("image/png", b"hi"), "data:image/png;base64,aGk=");
    }
}
