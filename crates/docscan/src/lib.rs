//! docscan - hot-folder document scanner.
//!
//! Core library: configuration, data model, structured extraction,
//! filename building, report composition, remote archiving and the
//! per-file pipeline that ties them together. Text extraction (OCR and
//! PDF text layers) lives in the `docscan-analysis` crate and plugs in
//! through [`pipeline::TextSource`].

// Model types use `from_str` methods that return Option<Self>,
// not Result<Self, Error> as std::str::FromStr requires.
#![allow(clippy::should_implement_trait)]

pub mod config;
pub mod error;
pub mod extraction;
pub mod llm;
pub mod models;
pub mod naming;
pub mod pipeline;
pub mod remote;
pub mod report;
pub mod stability;
pub mod watcher;

pub use error::ProcessingError;
pub use models::{DocumentFormat, ExtractedData, PipelineState, ProcessingResult};
