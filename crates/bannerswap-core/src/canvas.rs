//! Canvas document and editing session.

use crate::cache::PageRenderCache;
use crate::config::EditorConfig;
use crate::layers::{Background, BackgroundContent, BannerSource, EntityId, Layer, LayerTrait, Overlay, RasterSurface};
use crate::loader::{DocumentId, LoadedDocument, LoadedPdf, PdfError, SourceFile};
use crate::selection::{self, HANDLE_HIT_TOLERANCE, Handle, ManipulationState};
use kurbo::{Affine, Point, Size, Vec2};
use std::collections::HashMap;
use thiserror::Error;

/// Largest size an entity may be scaled to, in multiples of the canvas.
pub const MAX_EXTENT_FACTOR: f64 = 4.0;

/// Editing session errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error("No document loaded")]
    NoDocument,
    #[error("Please select an object first")]
    EmptySelection,
    #[error("Entity {0} is not selectable")]
    NotSelectable(EntityId),
    #[error("Unknown entity {0}")]
    UnknownEntity(EntityId),
    #[error("The loaded document has no pages")]
    NotPaginated,
    #[error("Page {page} out of range (document has {count} pages)")]
    PageOutOfRange { page: u32, count: u32 },
    #[error("Page belongs to a different document")]
    DocumentMismatch,
    #[error(transparent)]
    Render(#[from] PdfError),
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing loaded yet.
    Empty,
    /// A background is installed; only overlays are interactive.
    Loaded,
    /// Selection mode is on; the background is interactive too.
    Editing,
}

/// Target of a z-order change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZDirection {
    Front,
    Back,
}

/// The entities on the canvas and their stacking order.
#[derive(Debug, Clone)]
pub struct CanvasDocument {
    /// All entities, keyed by ID.
    pub layers: HashMap<EntityId, Layer>,
    /// Z-order of entities (back to front).
    pub z_order: Vec<EntityId>,
    size: Size,
}

impl CanvasDocument {
    /// Create an empty canvas of the given pixel size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            layers: HashMap::new(),
            z_order: Vec::new(),
            size: Size::new(width as f64, height as f64),
        }
    }

    /// Canvas size in pixels.
    pub fn size(&self) -> Size {
        self.size
    }

    pub fn width(&self) -> u32 {
        self.size.width as u32
    }

    pub fn height(&self) -> u32 {
        self.size.height as u32
    }

    fn resize_to(&mut self, surface: &RasterSurface) {
        self.size = surface.size();
    }

    /// Add an entity on top.
    pub fn add_layer(&mut self, layer: Layer) {
        let id = layer.id();
        self.z_order.push(id);
        self.layers.insert(id, layer);
    }

    /// Remove an entity.
    pub fn remove_layer(&mut self, id: EntityId) -> Option<Layer> {
        self.z_order.retain(|&layer_id| layer_id != id);
        self.layers.remove(&id)
    }

    /// Remove every entity.
    pub fn clear(&mut self) {
        self.layers.clear();
        self.z_order.clear();
    }

    pub fn get_layer(&self, id: EntityId) -> Option<&Layer> {
        self.layers.get(&id)
    }

    pub fn get_layer_mut(&mut self, id: EntityId) -> Option<&mut Layer> {
        self.layers.get_mut(&id)
    }

    /// Get entities in z-order (back to front).
    pub fn layers_ordered(&self) -> impl Iterator<Item = &Layer> {
        self.z_order.iter().filter_map(|id| self.layers.get(id))
    }

    /// Overlays in z-order (back to front).
    pub fn overlays(&self) -> impl Iterator<Item = &Overlay> {
        self.layers_ordered().filter_map(Layer::as_overlay)
    }

    pub fn overlay_count(&self) -> usize {
        self.overlays().count()
    }

    /// The background entity, if one is installed.
    pub fn background(&self) -> Option<&Background> {
        self.layers_ordered().find_map(Layer::as_background)
    }

    /// Bring an entity to the front (topmost).
    pub fn bring_to_front(&mut self, id: EntityId) {
        self.z_order.retain(|&layer_id| layer_id != id);
        self.z_order.push(id);
    }

    /// Send an entity to the back (bottommost).
    pub fn send_to_back(&mut self, id: EntityId) {
        self.z_order.retain(|&layer_id| layer_id != id);
        self.z_order.insert(0, id);
    }

    /// Swap in a new background, keeping the old one's ID and stacking slot.
    /// Returns the background's ID.
    fn replace_background(&mut self, mut background: Background) -> EntityId {
        let existing = self.background().map(|bg| bg.id);
        match existing {
            Some(id) => {
                background.id = id;
                self.layers.insert(id, Layer::Background(background));
                id
            }
            None => {
                let id = background.id;
                self.layers.insert(id, Layer::Background(background));
                self.z_order.insert(0, id);
                id
            }
        }
    }
}

/// The live editing state: one canvas, its selection, and what it shows.
#[derive(Debug)]
pub struct EditingSession {
    config: EditorConfig,
    document: CanvasDocument,
    source: Option<SourceFile>,
    selected: Option<EntityId>,
    selection_mode: bool,
    paginated: bool,
    current_page: u32,
    page_count: u32,
    manipulation: Option<ManipulationState>,
}

impl EditingSession {
    /// An empty session with the default canvas size.
    pub fn new(config: EditorConfig) -> Self {
        let (width, height) = config.default_canvas_size;
        Self {
            config,
            document: CanvasDocument::new(width, height),
            source: None,
            selected: None,
            selection_mode: false,
            paginated: false,
            current_page: 0,
            page_count: 0,
            manipulation: None,
        }
    }

    /// Drop everything and return to the empty default canvas.
    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn document(&self) -> &CanvasDocument {
        &self.document
    }

    pub fn state(&self) -> SessionState {
        match (&self.source, self.selection_mode) {
            (None, _) => SessionState::Empty,
            (Some(_), false) => SessionState::Loaded,
            (Some(_), true) => SessionState::Editing,
        }
    }

    /// The file the background came from.
    pub fn source(&self) -> Option<&SourceFile> {
        self.source.as_ref()
    }

    pub fn document_id(&self) -> Option<DocumentId> {
        self.source.as_ref().map(|source| source.id)
    }

    pub fn canvas_size(&self) -> Size {
        self.document.size()
    }

    pub fn selected(&self) -> Option<EntityId> {
        self.selected
    }

    pub fn selected_layer(&self) -> Option<&Layer> {
        self.selected.and_then(|id| self.document.get_layer(id))
    }

    pub fn selection_mode(&self) -> bool {
        self.selection_mode
    }

    /// Current 1-based page; 1 for images, 0 when empty.
    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// Whether the loaded document is a PDF.
    pub fn is_paginated(&self) -> bool {
        self.paginated
    }

    /// Install a new background. Clears overlays, selection and selection
    /// mode, and resizes the canvas to the background's pixel size.
    pub fn load_background(&mut self, source: SourceFile, background: Background, page_count: u32) {
        let (width, height) = (background.surface.width(), background.surface.height());
        self.paginated = background.page_number().is_some();
        self.current_page = background.page_number().unwrap_or(1);
        self.page_count = page_count.max(1);
        self.document.clear();
        self.document.resize_to(&background.surface);
        self.document.add_layer(Layer::Background(background));
        self.selected = None;
        self.selection_mode = false;
        self.manipulation = None;
        log::info!("Loaded background {} at {}x{}", source.filename, width, height);
        self.source = Some(source);
    }

    /// Install a freshly loaded document: the image itself, or page 1 of a
    /// PDF rendered at the display scale.
    pub fn load_document(&mut self, document: &LoadedDocument, cache: &mut PageRenderCache) -> SessionResult<()> {
        match document {
            LoadedDocument::Image { source, surface } => {
                let content = BackgroundContent::Image {
                    filename: source.filename.clone(),
                };
                self.load_background(source.clone(), Background::new(content, surface.clone()), 1);
            }
            LoadedDocument::Pdf(pdf) => {
                let surface = self.rasterize(pdf, 1, cache)?;
                let content = BackgroundContent::PdfPage {
                    filename: pdf.source.filename.clone(),
                    page_number: 1,
                };
                self.load_background(pdf.source.clone(), Background::new(content, surface), pdf.page_count());
            }
        }
        Ok(())
    }

    fn rasterize(&self, pdf: &LoadedPdf, page_number: u32, cache: &mut PageRenderCache) -> SessionResult<RasterSurface> {
        let page = pdf.get_page(page_number)?;
        Ok(pdf.render(&page, self.config.display_scale, cache)?)
    }

    /// Show another page of the loaded PDF. Only the background changes;
    /// overlays stay where they are.
    pub fn render_page(&mut self, page_number: u32, pdf: &LoadedPdf, cache: &mut PageRenderCache) -> SessionResult<()> {
        let source = self.source.as_ref().ok_or(SessionError::NoDocument)?;
        if !self.paginated {
            return Err(SessionError::NotPaginated);
        }
        if source.id != pdf.source.id {
            return Err(SessionError::DocumentMismatch);
        }
        if page_number == 0 || page_number > self.page_count {
            return Err(SessionError::PageOutOfRange {
                page: page_number,
                count: self.page_count,
            });
        }

        let surface = self.rasterize(pdf, page_number, cache)?;
        let content = BackgroundContent::PdfPage {
            filename: pdf.source.filename.clone(),
            page_number,
        };
        // A drag in progress holds a copy of the old page; keep what it has
        // applied so far and stop it.
        self.manipulation = None;
        self.document.resize_to(&surface);
        self.document.replace_background(Background::new(content, surface));
        self.current_page = page_number;
        log::debug!("Showing page {}/{}", page_number, self.page_count);
        Ok(())
    }

    /// Advance one page; stays put on the last page.
    pub fn next_page(&mut self, pdf: &LoadedPdf, cache: &mut PageRenderCache) -> SessionResult<u32> {
        if self.current_page < self.page_count {
            self.render_page(self.current_page + 1, pdf, cache)?;
        }
        Ok(self.current_page)
    }

    /// Go back one page; stays put on the first page.
    pub fn previous_page(&mut self, pdf: &LoadedPdf, cache: &mut PageRenderCache) -> SessionResult<u32> {
        if self.current_page > 1 {
            self.render_page(self.current_page - 1, pdf, cache)?;
        }
        Ok(self.current_page)
    }

    /// Place a banner at the default anchor, on top, and select it.
    pub fn add_overlay(&mut self, source: BannerSource) -> SessionResult<EntityId> {
        if self.source.is_none() {
            return Err(SessionError::NoDocument);
        }
        let (x, y) = self.config.overlay_anchor;
        let max_width = self.document.size().width * self.config.overlay_max_width_fraction;
        let overlay = Overlay::new(source, Point::new(x, y)).fit_to_width(max_width);
        let id = overlay.id;
        log::info!(
            "Added overlay {} ({:.0}x{:.0})",
            overlay.source.filename,
            overlay.width(),
            overlay.height()
        );
        self.document.add_layer(Layer::Overlay(overlay));
        self.selected = Some(id);
        Ok(id)
    }

    /// Toggle whether the background is interactive. Always drops the
    /// current selection.
    pub fn set_selection_mode(&mut self, enabled: bool) -> SessionResult<()> {
        if self.source.is_none() {
            return Err(SessionError::NoDocument);
        }
        self.selection_mode = enabled;
        self.deselect();
        log::debug!("Selection mode {}", if enabled { "on" } else { "off" });
        Ok(())
    }

    /// Select an entity by ID.
    pub fn select(&mut self, id: EntityId) -> SessionResult<()> {
        let layer = self.document.get_layer(id).ok_or(SessionError::UnknownEntity(id))?;
        if !layer.is_selectable(self.selection_mode) {
            return Err(SessionError::NotSelectable(id));
        }
        self.selected = Some(id);
        Ok(())
    }

    /// Select the topmost selectable entity under `point`, or clear the
    /// selection if there is none.
    pub fn select_at(&mut self, point: Point) -> Option<EntityId> {
        let hit = self.hit_test(point);
        self.selected = hit;
        hit
    }

    fn hit_test(&self, point: Point) -> Option<EntityId> {
        self.document
            .z_order
            .iter()
            .rev()
            .filter_map(|id| self.document.get_layer(*id))
            .find(|layer| layer.is_selectable(self.selection_mode) && layer.hit_test(point, 0.0))
            .map(|layer| layer.id())
    }

    pub fn deselect(&mut self) {
        self.selected = None;
        self.manipulation = None;
    }

    /// Remove the selected entity.
    pub fn delete_selected(&mut self) -> SessionResult<Layer> {
        let id = self.selected.ok_or(SessionError::EmptySelection)?;
        let layer = self.document.remove_layer(id).ok_or(SessionError::UnknownEntity(id))?;
        self.deselect();
        log::info!("Deleted {:?} {}", layer.kind(), id);
        Ok(layer)
    }

    /// Move the selected entity to the top or bottom. Returns false when
    /// nothing is selected.
    pub fn reorder(&mut self, direction: ZDirection) -> bool {
        let Some(id) = self.selected else {
            return false;
        };
        match direction {
            ZDirection::Front => self.document.bring_to_front(id),
            ZDirection::Back => self.document.send_to_back(id),
        }
        log::debug!("Reordered {} to {:?}", id, direction);
        true
    }

    /// Translate the selected entity.
    pub fn move_selected(&mut self, delta: Vec2) -> SessionResult<()> {
        self.transform_selected(Affine::translate(delta))
    }

    /// Scale the selected entity uniformly about its centre. Growth stops
    /// once the entity's longer side reaches [`MAX_EXTENT_FACTOR`] times the
    /// canvas's longer side.
    pub fn scale_selected(&mut self, factor: f64) -> SessionResult<()> {
        if !factor.is_finite() || factor <= 0.0 {
            return Ok(());
        }
        let bounds = self.selected_layer().ok_or(SessionError::EmptySelection)?.bounds();
        let limit = MAX_EXTENT_FACTOR * f64::from(self.document.width().max(self.document.height()));
        let longest = bounds.width().max(bounds.height());
        let factor = if longest > 0.0 {
            factor.min((limit / longest).max(1.0))
        } else {
            factor
        };
        let center = bounds.center().to_vec2();
        self.transform_selected(Affine::translate(center) * Affine::scale(factor) * Affine::translate(-center))
    }

    fn transform_selected(&mut self, affine: Affine) -> SessionResult<()> {
        let id = self.selected.ok_or(SessionError::EmptySelection)?;
        let layer = self.document.get_layer_mut(id).ok_or(SessionError::UnknownEntity(id))?;
        layer.transform(affine);
        Ok(())
    }

    /// Handles of the current selection.
    pub fn handles(&self) -> Vec<Handle> {
        self.selected_layer().map(selection::get_handles).unwrap_or_default()
    }

    /// Start a pointer drag. A press on a handle of the selection resizes it;
    /// otherwise the entity under the pointer is selected and moved.
    pub fn begin_drag(&mut self, point: Point) -> Option<EntityId> {
        let handle = self
            .selected_layer()
            .and_then(|layer| selection::hit_test_handles(layer, point, HANDLE_HIT_TOLERANCE));
        if handle.is_none() {
            self.select_at(point);
        }
        let layer = self.selected_layer()?.clone();
        let id = layer.id();
        self.manipulation = Some(ManipulationState::new(layer, handle, point));
        Some(id)
    }

    /// Update the active drag with the current pointer position.
    pub fn update_drag(&mut self, point: Point) {
        let Some(state) = self.manipulation.as_mut() else {
            return;
        };
        state.current_point = point;
        let preview = state.preview();
        let id = state.entity_id;
        if let Some(layer) = self.document.get_layer_mut(id) {
            *layer = preview;
        }
    }

    /// Finish the active drag, keeping its result.
    pub fn end_drag(&mut self) {
        self.manipulation = None;
    }

    /// Abandon the active drag and restore the entity.
    pub fn cancel_drag(&mut self) {
        let Some(state) = self.manipulation.take() else {
            return;
        };
        if let Some(layer) = self.document.get_layer_mut(state.entity_id) {
            *layer = state.original;
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.manipulation.is_some()
    }
}
