//! Layers composited on the editing canvas.
//!
//! Every entity on the canvas is either the background (the uploaded listing
//! image or the current PDF page) or an overlay (a placed banner). The kind is
//! carried explicitly so selectability and rendering rules are a `match` over
//! a closed set.

mod background;
mod overlay;
mod raster;

pub use background::{Background, BackgroundContent};
pub use overlay::{BannerSource, Overlay};
pub use raster::{ImageFormat, RasterSurface};

use kurbo::{Affine, Point, Rect};
use uuid::Uuid;

/// Unique identifier for canvas entities.
pub type EntityId = Uuid;

/// Discriminant of a [`Layer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    Background,
    Overlay,
}

/// Common behavior of canvas entities.
pub trait LayerTrait {
    /// Get the unique identifier.
    fn id(&self) -> EntityId;

    /// Get the bounding box in canvas pixels.
    fn bounds(&self) -> Rect;

    /// Check if a point hits this entity.
    fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        self.bounds().inflate(tolerance, tolerance).contains(point)
    }

    /// The raster drawn for this entity.
    fn surface(&self) -> &RasterSurface;

    /// Apply a translation/uniform-scale transform.
    fn transform(&mut self, affine: Affine);
}

/// A canvas entity.
#[derive(Debug, Clone)]
pub enum Layer {
    Background(Background),
    Overlay(Overlay),
}

impl Layer {
    /// Kind of this layer.
    pub fn kind(&self) -> LayerKind {
        match self {
            Layer::Background(_) => LayerKind::Background,
            Layer::Overlay(_) => LayerKind::Overlay,
        }
    }

    /// Whether the user may select and manipulate this layer.
    ///
    /// Overlays are always interactive; the background only while selection
    /// mode is on.
    pub fn is_selectable(&self, selection_mode: bool) -> bool {
        match self {
            Layer::Overlay(_) => true,
            Layer::Background(_) => selection_mode,
        }
    }

    pub fn as_overlay(&self) -> Option<&Overlay> {
        match self {
            Layer::Overlay(overlay) => Some(overlay),
            Layer::Background(_) => None,
        }
    }

    pub fn as_background(&self) -> Option<&Background> {
        match self {
            Layer::Background(background) => Some(background),
            Layer::Overlay(_) => None,
        }
    }

    fn inner(&self) -> &dyn LayerTrait {
        match self {
            Layer::Background(background) => background,
            Layer::Overlay(overlay) => overlay,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn LayerTrait {
        match self {
            Layer::Background(background) => background,
            Layer::Overlay(overlay) => overlay,
        }
    }
}

impl LayerTrait for Layer {
    fn id(&self) -> EntityId {
        self.inner().id()
    }

    fn bounds(&self) -> Rect {
        self.inner().bounds()
    }

    fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        self.inner().hit_test(point, tolerance)
    }

    fn surface(&self) -> &RasterSurface {
        self.inner().surface()
    }

    fn transform(&mut self, affine: Affine) {
        self.inner_mut().transform(affine);
    }
}
