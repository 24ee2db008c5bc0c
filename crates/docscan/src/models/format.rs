//! Input format detection by file extension.

use std::path::Path;

/// Image extensions handled by OCR, lowercase.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tif", "tiff", "bmp", "gif"];

/// Kind of document dropped into the intake folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Image,
}

impl DocumentFormat {
    /// Detect the format from the lowercase file extension.
    ///
    /// Returns `None` for anything the pipeline cannot read.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        Self::from_extension(&ext)
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.').to_lowercase();
        if ext == "pdf" {
            Some(Self::Pdf)
        } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Image)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Image => "image",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_case_insensitively() {
        assert_eq!(
            DocumentFormat::from_path(Path::new("/in/Scan.PDF")),
            Some(DocumentFormat::Pdf)
        );
        assert_eq!(
            DocumentFormat::from_path(Path::new("beleg.JPeG")),
            Some(DocumentFormat::Image)
        );
        assert_eq!(
            DocumentFormat::from_path(Path::new("fax.tif")),
            Some(DocumentFormat::Image)
        );
    }

    #[test]
    fn test_rejects_unknown_and_missing_extensions() {
        assert_eq!(DocumentFormat::from_path(Path::new("notes.docx")), None);
        assert_eq!(DocumentFormat::from_path(Path::new("README")), None);
        assert_eq!(DocumentFormat::from_extension(".webp"), None);
    }
}
