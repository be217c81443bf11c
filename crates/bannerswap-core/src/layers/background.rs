//! Background layer: the uploaded listing image or the current PDF page.

use super::{EntityId, LayerTrait, RasterSurface};
use kurbo::{Affine, Point, Rect};
use uuid::Uuid;

/// What the background raster was produced from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackgroundContent {
    /// A raster upload shown at natural size.
    Image { filename: String },
    /// One page of a PDF, rendered at the display scale.
    PdfPage { filename: String, page_number: u32 },
}

/// The background layer.
///
/// Installed at the origin and sized to the canvas. It only becomes movable
/// while selection mode is on.
#[derive(Debug, Clone)]
pub struct Background {
    pub(crate) id: EntityId,
    pub content: BackgroundContent,
    pub surface: RasterSurface,
    /// Top-left corner in canvas pixels.
    pub position: Point,
    /// Uniform display scale.
    pub scale: f64,
}

impl Background {
    pub fn new(content: BackgroundContent, surface: RasterSurface) -> Self {
        Self {
            id: Uuid::new_v4(),
            content,
            surface,
            position: Point::ZERO,
            scale: 1.0,
        }
    }

    /// The PDF page number, if this background is a page.
    pub fn page_number(&self) -> Option<u32> {
        match self.content {
            BackgroundContent::PdfPage { page_number, .. } => Some(page_number),
            BackgroundContent::Image { .. } => None,
        }
    }
}

impl LayerTrait for Background {
    fn id(&self) -> EntityId {
        self.id
    }

    fn bounds(&self) -> Rect {
        Rect::new(
            self.position.x,
            self.position.y,
            self.position.x + self.surface.width() as f64 * self.scale,
            self.position.y + self.surface.height() as f64 * self.scale,
        )
    }

    fn surface(&self) -> &RasterSurface {
        &self.surface
    }

    fn transform(&mut self, affine: Affine) {
        self.position = affine * self.position;
        self.scale *= affine.as_coeffs()[0].abs();
    }
}
