//! Pipeline error taxonomy.
//!
//! Every stage error funnels into [`ProcessingError`]; the orchestrator
//! turns any of them into a move of the source file to the failed folder,
//! except [`ProcessingError::UnstableFile`] which leaves the file in place.

use std::path::PathBuf;

use thiserror::Error;

use crate::extraction::{ExtractionError, SchemaError};
use crate::pipeline::TextSourceError;
use crate::remote::RemoteError;
use crate::report::ReportError;

/// Errors raised while processing a single document.
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("File did not stabilise within {timeout_secs}s: {}", path.display())]
    UnstableFile { path: PathBuf, timeout_secs: u64 },

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Text extraction failed: {0}")]
    ExtractionFailure(String),

    #[error("Structured data violates schema: {}", .0.join("; "))]
    SchemaViolation(Vec<String>),

    #[error("Report composition failed: {0}")]
    CompositionFailure(String),

    #[error("Remote service failed: {0}")]
    RemoteFailure(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProcessingError {
    /// Short machine-readable kind, used in log fields and summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnstableFile { .. } => "unstable_file",
            Self::UnsupportedFormat(_) => "unsupported_format",
            Self::ExtractionFailure(_) => "extraction_failure",
            Self::SchemaViolation(_) => "schema_violation",
            Self::CompositionFailure(_) => "composition_failure",
            Self::RemoteFailure(_) => "remote_failure",
            Self::Io(_) => "io",
        }
    }

    /// Whether the source file should be routed to the failed folder.
    pub fn routes_to_failed(&self) -> bool {
        !matches!(self, Self::UnstableFile { .. })
    }
}

impl From<TextSourceError> for ProcessingError {
    fn from(err: TextSourceError) -> Self {
        match err {
            TextSourceError::Unsupported(what) => Self::UnsupportedFormat(what),
            TextSourceError::Failed(msg) => Self::ExtractionFailure(msg),
        }
    }
}

impl From<SchemaError> for ProcessingError {
    fn from(err: SchemaError) -> Self {
        match err {
            SchemaError::Violations(violations) => Self::SchemaViolation(violations),
            other => Self::SchemaViolation(vec![other.to_string()]),
        }
    }
}

impl From<ExtractionError> for ProcessingError {
    fn from(err: ExtractionError) -> Self {
        match err {
            ExtractionError::Schema(schema) => schema.into(),
            ExtractionError::Service { .. } => Self::ExtractionFailure(err.to_string()),
        }
    }
}

impl From<ReportError> for ProcessingError {
    fn from(err: ReportError) -> Self {
        Self::CompositionFailure(err.to_string())
    }
}

impl From<RemoteError> for ProcessingError {
    fn from(err: RemoteError) -> Self {
        Self::RemoteFailure(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unstable_file_stays_in_place() {
        let err = ProcessingError::UnstableFile {
            path: PathBuf::from("/in/scan.pdf"),
            timeout_secs: 30,
        };
        assert!(!err.routes_to_failed());
        assert_eq!(err.kind(), "unstable_file");
        assert!(err.to_string().contains("/in/scan.pdf"));
    }

    #[test]
    fn test_schema_errors_keep_every_violation() {
        let err: ProcessingError = SchemaError::Violations(vec![
            "$.currency: does not match pattern".to_string(),
            "$: missing required property 'issuer'".to_string(),
        ])
        .into();
        match &err {
            ProcessingError::SchemaViolation(v) => assert_eq!(v.len(), 2),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(err.routes_to_failed());
    }

    #[test]
    fn test_text_source_errors_map_to_kinds() {
        let unsupported: ProcessingError = TextSourceError::Unsupported("docx".into()).into();
        assert_eq!(unsupported.kind(), "unsupported_format");

        let failed: ProcessingError = TextSourceError::Failed("tesseract crashed".into()).into();
        assert_eq!(failed.kind(), "extraction_failure");
    }
}
