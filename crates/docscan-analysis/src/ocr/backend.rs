//! OCR backend abstraction.

use std::path::Path;

use thiserror::Error;

use crate::tools::ToolError;

/// Errors from OCR backends.
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Backend not available: {0}")]
    BackendNotAvailable(String),

    #[error("OCR failed: {0}")]
    OcrFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ToolError> for OcrError {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::NotFound(hint) => Self::BackendNotAvailable(hint),
            ToolError::Failed(msg) => Self::OcrFailed(msg),
            ToolError::Io(e) => Self::Io(e),
        }
    }
}

/// An engine that turns an image file into text.
///
/// Implementations block; callers run them off the async runtime.
pub trait OcrBackend: Send + Sync {
    /// Name used in logs and `docscan check`.
    fn name(&self) -> &str;

    /// Whether dependencies are installed.
    fn is_available(&self) -> bool;

    /// What to install when [`is_available`](Self::is_available) is false.
    fn availability_hint(&self) -> String;

    /// Extract text from one image file.
    fn run_ocr(&self, image_path: &Path) -> Result<String, OcrError>;
}
