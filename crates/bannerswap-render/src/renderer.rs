//! Renderer trait abstraction.

use bannerswap_core::EditingSession;
use image::RgbaImage;
use peniko::Color;
use thiserror::Error;

/// Renderer errors.
#[derive(Debug, Error)]
pub enum RendererError {
    #[error("Render failed: {0}")]
    RenderFailed(String),
    #[error("Surface error: {0}")]
    Surface(String),
}

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RendererError>;

/// Context for a single render.
pub struct RenderContext<'a> {
    /// The session to render.
    pub session: &'a EditingSession,
    /// Color behind all layers.
    pub background_color: Color,
    /// Selection outline and handle color.
    pub selection_color: Color,
    /// Whether to draw the selection outline and handles.
    pub show_selection: bool,
}

impl<'a> RenderContext<'a> {
    /// Create a new render context for on-screen display.
    pub fn new(session: &'a EditingSession) -> Self {
        Self {
            session,
            background_color: Color::from_rgba8(255, 255, 255, 255),
            selection_color: Color::from_rgba8(59, 130, 246, 255), // Blue
            show_selection: true,
        }
    }

    /// A context for export: white behind everything, no selection chrome.
    pub fn for_export(session: &'a EditingSession) -> Self {
        Self::new(session).with_selection(false)
    }

    /// Toggle selection chrome.
    pub fn with_selection(mut self, show: bool) -> Self {
        self.show_selection = show;
        self
    }
}

/// Trait for rendering backends.
pub trait Renderer: Send + Sync {
    /// Composite the session at canvas pixel size.
    fn render(&mut self, ctx: &RenderContext) -> RenderResult<RgbaImage>;

    /// Get the background color (for clearing).
    fn background_color(&self, ctx: &RenderContext) -> Color {
        ctx.background_color
    }
}
