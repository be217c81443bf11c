//! Banner overlays placed on top of the background.

use super::{EntityId, ImageFormat, LayerTrait, RasterSurface};
use kurbo::{Affine, Point, Rect};
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Counter for gallery ids; unique per process.
static BANNER_COUNTER: AtomicU64 = AtomicU64::new(1);

/// A decoded banner image, as kept in the banner gallery.
#[derive(Debug, Clone)]
pub struct BannerSource {
    /// Gallery identifier (`banner-<n>`).
    pub id: String,
    /// Original upload filename.
    pub filename: String,
    /// Format the banner was decoded from.
    pub format: ImageFormat,
    /// Decoded pixels at natural size.
    pub surface: RasterSurface,
}

impl BannerSource {
    pub fn new(filename: impl Into<String>, format: ImageFormat, surface: RasterSurface) -> Self {
        let n = BANNER_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self {
            id: format!("banner-{n}"),
            filename: filename.into(),
            format,
            surface,
        }
    }
}

/// A banner placed on the canvas.
#[derive(Debug, Clone)]
pub struct Overlay {
    pub(crate) id: EntityId,
    /// The banner this overlay displays.
    pub source: BannerSource,
    /// Top-left corner in canvas pixels.
    pub position: Point,
    /// Uniform display scale relative to the natural size.
    pub scale: f64,
}

impl Overlay {
    /// Create an overlay at natural size.
    pub fn new(source: BannerSource, position: Point) -> Self {
        Self {
            id: Uuid::new_v4(),
            source,
            position,
            scale: 1.0,
        }
    }

    /// Natural width of the banner in pixels.
    pub fn natural_width(&self) -> f64 {
        self.source.surface.width() as f64
    }

    /// Natural height of the banner in pixels.
    pub fn natural_height(&self) -> f64 {
        self.source.surface.height() as f64
    }

    /// Displayed width.
    pub fn width(&self) -> f64 {
        self.natural_width() * self.scale
    }

    /// Displayed height.
    pub fn height(&self) -> f64 {
        self.natural_height() * self.scale
    }

    /// Shrink so the displayed width is at most `max_width`. Never enlarges.
    pub fn fit_to_width(mut self, max_width: f64) -> Self {
        let natural = self.natural_width();
        if natural > max_width && natural > 0.0 {
            self.scale = max_width / natural;
        }
        self
    }

    /// Get the bounding rectangle.
    pub fn as_rect(&self) -> Rect {
        Rect::new(
            self.position.x,
            self.position.y,
            self.position.x + self.width(),
            self.position.y + self.height(),
        )
    }
}

impl LayerTrait for Overlay {
    fn id(&self) -> EntityId {
        self.id
    }

    fn bounds(&self) -> Rect {
        self.as_rect()
    }

    fn surface(&self) -> &RasterSurface {
        &self.source.surface
    }

    fn transform(&mut self, affine: Affine) {
        self.position = affine * self.position;
        let coeffs = affine.as_coeffs();
        self.scale *= coeffs[0].abs();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(width: u32, height: u32) -> BannerSource {
        BannerSource::new("logo.png", ImageFormat::Png, RasterSurface::filled(width, height, [255; 4]))
    }

    #[test]
    fn test_gallery_ids_unique() {
        let a = source(1, 1);
        let b = source(1, 1);
        assert_ne!(a.id, b.id);
        assert!(a.id.starts_with("banner-"));
    }

    #[test]
    fn test_fit_to_width_shrinks_preserving_aspect() {
        let overlay = Overlay::new(source(900, 300), Point::new(50.0, 50.0)).fit_to_width(400.0);
        assert!((overlay.width() - 400.0).abs() < 1e-9);
        assert!((overlay.height() - 400.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_fit_to_width_never_enlarges() {
        let overlay = Overlay::new(source(100, 50), Point::ZERO).fit_to_width(400.0);
        assert_eq!(overlay.scale, 1.0);
        assert_eq!(overlay.width(), 100.0);
    }
}
