//! Editor configuration.
//!
//! All fields have defaults matching the editor's stock behavior, so a
//! partial JSON file only overrides what it names.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Result type for config operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Upper bounds on how long a loading indicator may stay visible.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub image_load_secs: u64,
    pub pdf_load_secs: u64,
    pub page_render_secs: u64,
    pub banner_load_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            image_load_secs: 10,
            pdf_load_secs: 15,
            page_render_secs: 10,
            banner_load_secs: 8,
        }
    }
}

impl Timeouts {
    pub fn image_load(&self) -> Duration {
        Duration::from_secs(self.image_load_secs)
    }

    pub fn pdf_load(&self) -> Duration {
        Duration::from_secs(self.pdf_load_secs)
    }

    pub fn page_render(&self) -> Duration {
        Duration::from_secs(self.page_render_secs)
    }

    pub fn banner_load(&self) -> Duration {
        Duration::from_secs(self.banner_load_secs)
    }
}

/// Editing session and cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Scale PDF pages are rendered at for display.
    pub display_scale: f32,
    /// Page cache time-to-live in seconds.
    pub cache_ttl_secs: u64,
    /// Where new overlays are placed (canvas pixels from the origin).
    pub overlay_anchor: (f64, f64),
    /// New overlays wider than this fraction of the canvas are shrunk to it.
    pub overlay_max_width_fraction: f64,
    /// Canvas size before any document is loaded.
    pub default_canvas_size: (u32, u32),
    pub timeouts: Timeouts,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            display_scale: 1.5,
            cache_ttl_secs: 30 * 60,
            overlay_anchor: (50.0, 50.0),
            overlay_max_width_fraction: 1.0 / 3.0,
            default_canvas_size: (800, 600),
            timeouts: Timeouts::default(),
        }
    }
}

impl EditorConfig {
    /// Page cache time-to-live.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Parse a config from JSON text.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Load a config file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Default location of the config file.
///
/// On Unix: `~/.config/bannerswap/config.json`
/// On Windows: `%APPDATA%\bannerswap\config.json`
#[cfg(not(target_arch = "wasm32"))]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir()
        .or_else(dirs::home_dir)
        .map(|base| base.join("bannerswap").join("config.json"))
}
