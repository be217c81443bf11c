//! Application configuration.

use bannerswap_core::config::default_config_path;
use bannerswap_core::{ConfigError, EditorConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings for the controller and CLI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub editor: EditorConfig,
    /// Where exports are written when no `--out` is given.
    pub output_dir: Option<PathBuf>,
    /// Directory holding the pdfium shared library.
    pub pdfium_library_path: Option<PathBuf>,
}

impl AppConfig {
    /// Read a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read `explicit` if given. Otherwise read the default location when
    /// a file exists there, or fall back to defaults.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match default_config_path() {
            Some(path) if path.exists() => {
                log::info!("Using config {}", path.display());
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }
}
