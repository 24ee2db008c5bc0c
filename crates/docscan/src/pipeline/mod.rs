//! Per-file processing pipeline.
//!
//! ```text
//! Received -> Stabilizing -> TextExtracted -> StructuredExtracted -> Named
//!          -> Composed -> Written -> Uploaded -> Archived
//! ```
//!
//! Any stage may fail, in which case the source is moved to the failed
//! folder. A file that never stabilises is left where it is.

mod orchestrator;
mod routing;

use std::path::{Path, PathBuf};

use thiserror::Error;

pub use orchestrator::Orchestrator;
pub use routing::move_into;

use crate::error::ProcessingError;
use crate::models::{PipelineState, ProcessingResult};

/// Errors a [`TextSource`] may report.
#[derive(Debug, Error)]
pub enum TextSourceError {
    #[error("unsupported input: {0}")]
    Unsupported(String),

    #[error("{0}")]
    Failed(String),
}

/// Turns a document on disk into plain text.
///
/// Called on tokio's blocking pool; implementations may shell out and
/// block freely.
pub trait TextSource: Send + Sync {
    fn extract_text(&self, path: &Path) -> Result<String, TextSourceError>;
}

/// Final result of handling one file.
#[derive(Debug)]
pub enum ProcessOutcome {
    /// Report written and uploaded, source moved to the archive folder.
    Archived {
        result: ProcessingResult,
        archive_path: PathBuf,
    },
    /// A stage failed; source moved to the failed folder when possible.
    Failed {
        source_path: PathBuf,
        failed_path: Option<PathBuf>,
        /// Last state reached before the failure.
        state: PipelineState,
        error: ProcessingError,
    },
    /// File never stabilised; left in place for a later attempt.
    Deferred {
        source_path: PathBuf,
        reason: ProcessingError,
    },
}

impl ProcessOutcome {
    pub fn source_path(&self) -> &Path {
        match self {
            Self::Archived { result, .. } => &result.source_path,
            Self::Failed { source_path, .. } | Self::Deferred { source_path, .. } => source_path,
        }
    }

    pub fn state(&self) -> PipelineState {
        match self {
            Self::Archived { .. } => PipelineState::Archived,
            Self::Failed { .. } => PipelineState::Failed,
            Self::Deferred { .. } => PipelineState::Stabilizing,
        }
    }

    pub fn is_archived(&self) -> bool {
        matches!(self, Self::Archived { .. })
    }
}

/// Tally of outcomes over a batch or a service run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub archived: usize,
    pub failed: usize,
    pub deferred: usize,
}

impl RunStats {
    pub fn record(&mut self, outcome: &ProcessOutcome) {
        match outcome {
            ProcessOutcome::Archived { .. } => self.archived += 1,
            ProcessOutcome::Failed { .. } => self.failed += 1,
            ProcessOutcome::Deferred { .. } => self.deferred += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.archived + self.failed + self.deferred
    }
}
