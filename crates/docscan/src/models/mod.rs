//! Data model shared by the pipeline stages.

mod extracted;
mod format;
mod result;
mod state;

pub use extracted::{
    parse_lenient_date, ExtractedData, DEFAULT_CURRENCY, FALLBACK_DOCUMENT_TYPE, FALLBACK_ISSUER,
    MINIMAL_SUMMARY_CHARS,
};
pub use format::{DocumentFormat, IMAGE_EXTENSIONS};
pub use result::ProcessingResult;
pub use state::PipelineState;
