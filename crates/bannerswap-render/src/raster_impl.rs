//! CPU renderer compositing layers with the `image` crate.

use crate::renderer::{RenderContext, RenderResult, Renderer, RendererError};
use bannerswap_core::selection::get_handles;
use bannerswap_core::{EntityId, Layer, LayerTrait, RasterSurface};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use kurbo::Rect;
use peniko::Color;
use std::collections::HashMap;

/// Selection outline width in pixels.
const OUTLINE_WIDTH: f64 = 2.0;

/// A layer's raster resampled to its displayed size.
struct ScaledImage {
    source: RasterSurface,
    pixels: RgbaImage,
}

impl ScaledImage {
    fn matches(&self, source: &RasterSurface, width: u32, height: u32) -> bool {
        self.source.ptr_eq(source) && self.pixels.dimensions() == (width, height)
    }
}

/// Software renderer.
///
/// Resampled layer rasters are cached per entity and reused until the
/// entity's size or source raster changes.
#[derive(Default)]
pub struct RasterRenderer {
    image_cache: HashMap<EntityId, ScaledImage>,
}

impl RasterRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of resampled rasters currently held.
    pub fn cached_images(&self) -> usize {
        self.image_cache.len()
    }

    fn render_layer(&mut self, target: &mut RgbaImage, layer: &Layer) {
        let bounds = layer.bounds();
        let width = bounds.width().round() as u32;
        let height = bounds.height().round() as u32;
        if width == 0 || height == 0 {
            return;
        }
        let x = bounds.x0.round() as i64;
        let y = bounds.y0.round() as i64;

        let surface = layer.surface();
        if (surface.width(), surface.height()) == (width, height) {
            imageops::overlay(target, surface.image(), x, y);
            return;
        }

        // Part of the layer that lands on the canvas, in layer pixels.
        let left = (-x).clamp(0, i64::from(width));
        let top = (-y).clamp(0, i64::from(height));
        let right = (i64::from(target.width()) - x).clamp(0, i64::from(width));
        let bottom = (i64::from(target.height()) - y).clamp(0, i64::from(height));
        if left >= right || top >= bottom {
            return;
        }
        if (left, top, right, bottom) != (0, 0, i64::from(width), i64::from(height)) {
            let visible = Rect::new(left as f64, top as f64, right as f64, bottom as f64);
            let pixels = resample_region(surface, width, height, visible);
            imageops::overlay(target, &pixels, x + left, y + top);
            return;
        }

        let id = layer.id();
        let fresh = self
            .image_cache
            .get(&id)
            .is_some_and(|cached| cached.matches(surface, width, height));
        if !fresh {
            log::debug!("Resampling {} to {}x{}", id, width, height);
            let pixels = imageops::resize(surface.image(), width, height, FilterType::Triangle);
            self.image_cache.insert(
                id,
                ScaledImage {
                    source: surface.clone(),
                    pixels,
                },
            );
        }
        if let Some(cached) = self.image_cache.get(&id) {
            imageops::overlay(target, &cached.pixels, x, y);
        }
    }

    fn render_selection_handles(target: &mut RgbaImage, layer: &Layer, color: Color) {
        let rgba = to_rgba(color);
        stroke_rect(target, layer.bounds(), OUTLINE_WIDTH, rgba);
        for handle in get_handles(layer) {
            let rect = handle.rect();
            fill_rect(target, rect, Rgba([255, 255, 255, 255]));
            stroke_rect(target, rect, 1.0, rgba);
        }
    }
}

impl Renderer for RasterRenderer {
    fn render(&mut self, ctx: &RenderContext) -> RenderResult<RgbaImage> {
        let document = ctx.session.document();
        let (width, height) = (document.width(), document.height());
        if width == 0 || height == 0 {
            return Err(RendererError::Surface(format!("canvas has zero size ({width}x{height})")));
        }

        let mut target = RgbaImage::from_pixel(width, height, to_rgba(self.background_color(ctx)));
        for layer in document.layers_ordered() {
            self.render_layer(&mut target, layer);
        }

        if ctx.show_selection {
            if let Some(layer) = ctx.session.selected_layer() {
                Self::render_selection_handles(&mut target, layer, ctx.selection_color);
            }
        }

        // Drop rasters of entities that no longer exist.
        self.image_cache.retain(|id, _| document.layers.contains_key(id));
        Ok(target)
    }
}

/// Resample only `visible` (layer pixels) of a layer displayed at
/// `width x height`. The matching source region is cropped first so the
/// output never exceeds the visible area.
fn resample_region(surface: &RasterSurface, width: u32, height: u32, visible: Rect) -> RgbaImage {
    let sx = f64::from(surface.width()) / f64::from(width);
    let sy = f64::from(surface.height()) / f64::from(height);
    let src_x0 = ((visible.x0 * sx).floor() as u32).min(surface.width() - 1);
    let src_y0 = ((visible.y0 * sy).floor() as u32).min(surface.height() - 1);
    let src_x1 = ((visible.x1 * sx).ceil() as u32).clamp(src_x0 + 1, surface.width());
    let src_y1 = ((visible.y1 * sy).ceil() as u32).clamp(src_y0 + 1, surface.height());
    let region = imageops::crop_imm(surface.image(), src_x0, src_y0, src_x1 - src_x0, src_y1 - src_y0).to_image();
    imageops::resize(
        &region,
        visible.width() as u32,
        visible.height() as u32,
        FilterType::Triangle,
    )
}

fn to_rgba(color: Color) -> Rgba<u8> {
    let c = color.to_rgba8();
    Rgba([c.r, c.g, c.b, c.a])
}

/// Fill `rect` (canvas pixels), clipped to the target.
fn fill_rect(target: &mut RgbaImage, rect: Rect, rgba: Rgba<u8>) {
    let x0 = rect.x0.round().max(0.0) as u32;
    let y0 = rect.y0.round().max(0.0) as u32;
    let x1 = (rect.x1.round().max(0.0) as u32).min(target.width());
    let y1 = (rect.y1.round().max(0.0) as u32).min(target.height());
    for y in y0..y1 {
        for x in x0..x1 {
            target.put_pixel(x, y, rgba);
        }
    }
}

fn stroke_rect(target: &mut RgbaImage, rect: Rect, width: f64, rgba: Rgba<u8>) {
    fill_rect(target, Rect::new(rect.x0, rect.y0, rect.x1, rect.y0 + width), rgba);
    fill_rect(target, Rect::new(rect.x0, rect.y1 - width, rect.x1, rect.y1), rgba);
    fill_rect(target, Rect::new(rect.x0, rect.y0, rect.x0 + width, rect.y1), rgba);
    fill_rect(target, Rect::new(rect.x1 - width, rect.y0, rect.x1, rect.y1), rgba);
}

#[cfg(test)]
mod tests {
    use super::*;
    use bannerswap_core::loader::testing::png_bytes;
    use bannerswap_core::{BannerSource, DocumentLoader, EditingSession, EditorConfig, ImageFormat, PageRenderCache};

    const GRAY: [u8; 4] = [200, 200, 200, 255];
    const BLUE: [u8; 4] = [0, 0, 255, 255];

    fn session_with_overlay(banner_width: u32) -> EditingSession {
        let loader = DocumentLoader::images_only();
        let doc = loader.load("house.png", png_bytes(300, 200, GRAY)).unwrap();
        let mut session = EditingSession::new(EditorConfig::default());
        session.load_document(&doc, &mut PageRenderCache::default()).unwrap();
        let banner = BannerSource::new("logo.png", ImageFormat::Png, RasterSurface::filled(banner_width, 20, BLUE));
        session.add_overlay(banner).unwrap();
        session
    }

    #[test]
    fn test_render_composites_in_z_order() {
        let session = session_with_overlay(40);
        let mut renderer = RasterRenderer::new();
        let image = renderer.render(&RenderContext::for_export(&session)).unwrap();
        assert_eq!(image.dimensions(), (300, 200));
        assert_eq!(image.get_pixel(10, 10).0, GRAY);
        // Overlay sits at (50, 50), 40x20.
        assert_eq!(image.get_pixel(70, 60).0, BLUE);
        assert_eq!(image.get_pixel(95, 60).0, GRAY);
    }

    #[test]
    fn test_selection_chrome_only_when_requested() {
        let session = session_with_overlay(40);
        let mut renderer = RasterRenderer::new();
        let plain = renderer.render(&RenderContext::for_export(&session)).unwrap();
        let chrome = renderer.render(&RenderContext::new(&session)).unwrap();
        // Top-left handle centre.
        assert_eq!(plain.get_pixel(50, 50).0, BLUE);
        assert_ne!(chrome.get_pixel(50, 50).0, BLUE);
    }

    #[test]
    fn test_scaled_overlay_is_cached() {
        // 300 px canvas: a 150 px banner is shrunk to 100 px.
        let session = session_with_overlay(150);
        let mut renderer = RasterRenderer::new();
        let ctx = RenderContext::for_export(&session);
        let image = renderer.render(&ctx).unwrap();
        assert_eq!(renderer.cached_images(), 1);
        assert_eq!(image.get_pixel(145, 55).0, BLUE);
        assert_eq!(image.get_pixel(155, 55).0, GRAY);

        renderer.render(&ctx).unwrap();
        assert_eq!(renderer.cached_images(), 1);
    }

    #[test]
    fn test_overlay_partly_off_canvas() {
        let mut session = session_with_overlay(40);
        // 320x160 about (70, 60): spans x -90..230 and y -20..140.
        session.scale_selected(8.0).unwrap();
        let mut renderer = RasterRenderer::new();
        let image = renderer.render(&RenderContext::for_export(&session)).unwrap();
        assert_eq!(image.dimensions(), (300, 200));
        assert_eq!(image.get_pixel(0, 0).0, BLUE);
        assert_eq!(image.get_pixel(220, 130).0, BLUE);
        assert_eq!(image.get_pixel(250, 10).0, GRAY);
        assert_eq!(image.get_pixel(10, 170).0, GRAY);
        // Clipped layers are resampled per frame, not cached.
        assert_eq!(renderer.cached_images(), 0);
    }

    #[test]
    fn test_cache_pruned_after_delete() {
        let mut session = session_with_overlay(150);
        let mut renderer = RasterRenderer::new();
        renderer.render(&RenderContext::for_export(&session)).unwrap();
        session.delete_selected().unwrap();
        renderer.render(&RenderContext::for_export(&session)).unwrap();
        assert_eq!(renderer.cached_images(), 0);
    }
}
