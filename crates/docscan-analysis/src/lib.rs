//! Text extraction for docscan.
//!
//! Reads PDF text layers with Poppler and falls back to Tesseract OCR for
//! scanned pages and image files. [`TextExtractor`] implements
//! [`docscan::pipeline::TextSource`] so the core pipeline can use it
//! without knowing about the external tools.

mod extractor;
pub mod ocr;
pub mod pdf;
mod tools;

pub use extractor::{ExtractionError, TextExtractor};
pub use tools::check_binary;
