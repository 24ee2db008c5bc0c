//! Outcome record of a successful pipeline run.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Produced once per successfully processed file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingResult {
    /// Original location in the intake folder.
    pub source_path: PathBuf,
    /// Composed report written under the processed folder.
    pub report_path: PathBuf,
    /// Final canonical filename of the report.
    pub new_filename: String,
    /// Link or path returned by the remote upload.
    pub remote_location: String,
    /// Calendar event id, when a payment event was created.
    pub remote_event_id: Option<String>,
}
