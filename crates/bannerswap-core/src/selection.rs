//! Selection handles and drag manipulation.
//!
//! A selected entity shows four corner handles. Dragging a corner scales
//! the entity uniformly about its centre; dragging the body moves it.

use crate::layers::{EntityId, Layer, LayerTrait};
use kurbo::{Affine, Point, Rect, Vec2};

/// Handle size in canvas pixels.
pub const HANDLE_SIZE: f64 = 12.0;
/// Handle hit tolerance in canvas pixels.
pub const HANDLE_HIT_TOLERANCE: f64 = 10.0;
/// Smallest width or height a resize may produce.
pub const MIN_ENTITY_SIZE: f64 = 8.0;

/// Corner positions. Handles sit only on corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

/// A selection handle with its position and corner.
#[derive(Debug, Clone, Copy)]
pub struct Handle {
    /// Position in canvas coordinates.
    pub position: Point,
    pub corner: Corner,
}

impl Handle {
    pub fn new(position: Point, corner: Corner) -> Self {
        Self { position, corner }
    }

    /// Check if a point hits this handle.
    pub fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        let dx = point.x - self.position.x;
        let dy = point.y - self.position.y;
        dx * dx + dy * dy <= tolerance * tolerance
    }

    /// Square drawn for this handle.
    pub fn rect(&self) -> Rect {
        Rect::from_center_size(self.position, (HANDLE_SIZE, HANDLE_SIZE))
    }
}

/// Get the selection handles for an entity.
pub fn get_handles(layer: &Layer) -> Vec<Handle> {
    corner_handles(layer.bounds())
}

fn corner_handles(bounds: Rect) -> Vec<Handle> {
    vec![
        Handle::new(Point::new(bounds.x0, bounds.y0), Corner::TopLeft),
        Handle::new(Point::new(bounds.x1, bounds.y0), Corner::TopRight),
        Handle::new(Point::new(bounds.x0, bounds.y1), Corner::BottomLeft),
        Handle::new(Point::new(bounds.x1, bounds.y1), Corner::BottomRight),
    ]
}

/// Find which handle (if any) is hit at the given point.
pub fn hit_test_handles(layer: &Layer, point: Point, tolerance: f64) -> Option<Corner> {
    get_handles(layer)
        .into_iter()
        .find(|handle| handle.hit_test(point, tolerance))
        .map(|handle| handle.corner)
}

fn corner_position(bounds: Rect, corner: Corner) -> Point {
    match corner {
        Corner::TopLeft => Point::new(bounds.x0, bounds.y0),
        Corner::TopRight => Point::new(bounds.x1, bounds.y0),
        Corner::BottomLeft => Point::new(bounds.x0, bounds.y1),
        Corner::BottomRight => Point::new(bounds.x1, bounds.y1),
    }
}

/// State of an active drag on a single entity.
#[derive(Debug, Clone)]
pub struct ManipulationState {
    pub entity_id: EntityId,
    /// The corner being dragged (None = moving the whole entity).
    pub handle: Option<Corner>,
    pub start_point: Point,
    pub current_point: Point,
    /// Entity as it was when the drag started.
    pub original: Layer,
}

impl ManipulationState {
    pub fn new(original: Layer, handle: Option<Corner>, start_point: Point) -> Self {
        Self {
            entity_id: original.id(),
            handle,
            start_point,
            current_point: start_point,
            original,
        }
    }

    /// Get the drag delta.
    pub fn delta(&self) -> Vec2 {
        self.current_point - self.start_point
    }

    /// The entity with the current drag applied.
    pub fn preview(&self) -> Layer {
        apply_manipulation(&self.original, self.handle, self.delta())
    }
}

/// Apply a handle manipulation to an entity and return the result.
///
/// Corner drags scale uniformly about the centre by the ratio of the
/// pointer's distance from the centre to the corner's original distance.
pub fn apply_manipulation(layer: &Layer, handle: Option<Corner>, delta: Vec2) -> Layer {
    let mut layer = layer.clone();
    match handle {
        None => layer.transform(Affine::translate(delta)),
        Some(corner) => {
            let bounds = layer.bounds();
            let center = bounds.center();
            let start = corner_position(bounds, corner);
            let original_distance = (start - center).hypot();
            if original_distance <= f64::EPSILON {
                return layer;
            }
            let min_factor = (MIN_ENTITY_SIZE / bounds.width().max(f64::EPSILON))
                .max(MIN_ENTITY_SIZE / bounds.height().max(f64::EPSILON));
            let factor = ((start + delta - center).hypot() / original_distance).max(min_factor);
            layer.transform(
                Affine::translate(center.to_vec2()) * Affine::scale(factor) * Affine::translate(-center.to_vec2()),
            );
        }
    }
    layer
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::{BannerSource, ImageFormat, Overlay, RasterSurface};

    fn overlay_layer() -> Layer {
        let source = BannerSource::new("logo.png", ImageFormat::Png, RasterSurface::filled(100, 50, [0; 4]));
        Layer::Overlay(Overlay::new(source, Point::new(100.0, 100.0)))
    }

    #[test]
    fn test_corner_handles() {
        let layer = overlay_layer();
        let handles = get_handles(&layer);
        assert_eq!(handles.len(), 4);
        assert_eq!(handles[0].position, Point::new(100.0, 100.0));
        assert_eq!(handles[3].position, Point::new(200.0, 150.0));
    }

    #[test]
    fn test_hit_test_handles() {
        let layer = overlay_layer();
        assert_eq!(
            hit_test_handles(&layer, Point::new(203.0, 152.0), HANDLE_HIT_TOLERANCE),
            Some(Corner::BottomRight)
        );
        assert_eq!(hit_test_handles(&layer, Point::new(150.0, 125.0), HANDLE_HIT_TOLERANCE), None);
    }

    #[test]
    fn test_move() {
        let layer = overlay_layer();
        let moved = apply_manipulation(&layer, None, Vec2::new(15.0, -5.0));
        assert_eq!(moved.bounds(), Rect::new(115.0, 95.0, 215.0, 145.0));
    }

    #[test]
    fn test_corner_drag_scales_about_center() {
        let layer = overlay_layer();
        let center = layer.bounds().center();
        // Drag the bottom-right corner away from the centre to double its distance.
        let start = Point::new(200.0, 150.0);
        let delta = start - center;
        let resized = apply_manipulation(&layer, Some(Corner::BottomRight), delta);
        let bounds = resized.bounds();
        assert!((bounds.width() - 200.0).abs() < 1e-9);
        assert!((bounds.height() - 100.0).abs() < 1e-9);
        assert!((bounds.center().x - center.x).abs() < 1e-9);
        assert!((bounds.center().y - center.y).abs() < 1e-9);
    }

    #[test]
    fn test_resize_has_minimum() {
        let layer = overlay_layer();
        // Drag the corner onto the centre.
        let resized = apply_manipulation(&layer, Some(Corner::TopLeft), Vec2::new(50.0, 25.0));
        assert!(resized.bounds().height() >= MIN_ENTITY_SIZE - 1e-9);
    }

    #[test]
    fn test_manipulation_state_preview() {
        let layer = overlay_layer();
        let mut state = ManipulationState::new(layer.clone(), None, Point::new(120.0, 120.0));
        state.current_point = Point::new(130.0, 140.0);
        assert_eq!(state.delta(), Vec2::new(10.0, 20.0));
        assert_eq!(state.preview().bounds(), Rect::new(110.0, 120.0, 210.0, 170.0));
        // The original is not touched.
        assert_eq!(state.original.bounds(), layer.bounds());
    }
}
