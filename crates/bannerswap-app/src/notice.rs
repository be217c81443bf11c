//! User-facing alerts.

use bannerswap_core::{LoadError, SessionError};
use bannerswap_render::ExportError;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    /// Alert for a failed main document upload.
    pub fn document_load_failed(error: &LoadError) -> Self {
        match error {
            LoadError::UnsupportedFormat(_) => {
                Self::error("Unsupported file format. Please upload a JPG, PNG or PDF file.")
            }
            LoadError::NoPdfBackend => Self::error("PDF support is not available."),
            LoadError::Decode { filename, .. } if filename.to_ascii_lowercase().ends_with(".pdf") => {
                Self::error("Failed to read the PDF. Please try another PDF.")
            }
            LoadError::Decode { .. } => Self::error("Failed to load the file. Please try again."),
            LoadError::Pdf(_) => Self::error("Failed to read the PDF. Please try another PDF."),
        }
    }

    /// Alert for a failed banner upload.
    pub fn banner_load_failed(error: &LoadError) -> Self {
        match error {
            LoadError::UnsupportedFormat(_) => Self::error("Banners must be JPG or PNG images."),
            _ => Self::error("Failed to load the banner image. Please try another image."),
        }
    }

    /// Alert for a failed editing operation.
    pub fn session_failed(error: &SessionError) -> Self {
        match error {
            SessionError::NoDocument => Self::error("Please upload a listing file first."),
            SessionError::EmptySelection => Self::error("Please select an object to delete."),
            SessionError::Render(_) => {
                Self::error("Failed to render the PDF page. Please try another PDF.")
            }
            other => Self::error(other.to_string()),
        }
    }

    /// Alert for a failed export.
    pub fn export_failed(error: &ExportError) -> Self {
        match error {
            ExportError::EmptyCanvas => Self::info("There is nothing to save."),
            other => Self::error(format!("Export failed: {other}")),
        }
    }

    /// Warning that a PDF export was saved as PNG instead.
    pub fn pdf_fallback() -> Self {
        Self::warning("An error occurred while creating the PDF. It was saved as a PNG image instead.")
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.level {
            NoticeLevel::Info => "info",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        };
        write!(f, "[{}] {}", tag, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pdf_decode_message() {
        let err = LoadError::Decode {
            filename: "Listing.PDF".into(),
            reason: "bad xref".into(),
        };
        assert!(Notice::document_load_failed(&err).message.contains("PDF"));
        let err = LoadError::Decode {
            filename: "house.png".into(),
            reason: "bad header".into(),
        };
        assert!(!Notice::document_load_failed(&err).message.contains("PDF"));
    }

    #[test]
    fn test_display() {
        assert_eq!(Notice::info("saved").to_string(), "[info] saved");
    }
}
