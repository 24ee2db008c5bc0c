//! OCR engines.
//!
//! Tesseract is the only engine shipped; others plug in through
//! [`OcrBackend`].

mod backend;
mod tesseract;

pub use backend::{OcrBackend, OcrError};
pub use tesseract::TesseractBackend;
