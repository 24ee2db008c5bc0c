//! Drives one file through every pipeline stage.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Local, NaiveTime};
use tracing::{debug, error, info, warn};

use super::routing::move_into;
use super::{ProcessOutcome, TextSource};
use crate::config::{Config, ConfigError, HotfolderConfig};
use crate::error::ProcessingError;
use crate::extraction::{ExtractionSchema, StructuredExtractor};
use crate::models::{DocumentFormat, PipelineState, ProcessingResult};
use crate::naming::{ensure_unique, FilenameBuilder};
use crate::remote::{payment_event, remote_relative_path, RemoteArchiveService};
use crate::report::ReportComposer;
use crate::stability::StableFileDetector;

/// Tracks and logs state transitions for one file.
struct Progress<'a> {
    path: &'a Path,
    state: PipelineState,
}

impl<'a> Progress<'a> {
    fn new(path: &'a Path) -> Self {
        Self {
            path,
            state: PipelineState::Received,
        }
    }

    fn advance(&mut self, next: PipelineState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        debug!("{}: {} -> {}", self.path.display(), self.state, next);
        self.state = next;
    }
}

/// Runs the pipeline for single files with injected capabilities.
pub struct Orchestrator {
    dirs: HotfolderConfig,
    stability: StableFileDetector,
    text_source: Arc<dyn TextSource>,
    extractor: StructuredExtractor,
    schema: Arc<ExtractionSchema>,
    naming: FilenameBuilder,
    composer: ReportComposer,
    remote: Arc<dyn RemoteArchiveService>,
    reminder_time: NaiveTime,
    time_zone: String,
}

impl Orchestrator {
    pub fn new(
        config: &Config,
        text_source: Arc<dyn TextSource>,
        extractor: StructuredExtractor,
        schema: ExtractionSchema,
        remote: Arc<dyn RemoteArchiveService>,
    ) -> Result<Self, ConfigError> {
        let reminder_time = config.calendar.parsed_time().ok_or_else(|| {
            ConfigError::Invalid(format!(
                "calendar.default_time '{}' is not HH:MM",
                config.calendar.default_time
            ))
        })?;

        Ok(Self {
            dirs: config.hotfolder.clone(),
            stability: StableFileDetector::from_config(&config.stability),
            text_source,
            extractor,
            schema: Arc::new(schema),
            naming: FilenameBuilder::default(),
            composer: ReportComposer::default(),
            remote,
            reminder_time,
            time_zone: config.timezone.clone(),
        })
    }

    pub fn dirs(&self) -> &HotfolderConfig {
        &self.dirs
    }

    /// Process one file to a terminal outcome. Never panics on file errors.
    pub async fn handle(&self, path: &Path) -> ProcessOutcome {
        let mut progress = Progress::new(path);
        info!("Processing {}", path.display());

        if DocumentFormat::from_path(path).is_none() {
            let ext = path
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_else(|| "<none>".to_string());
            let error = ProcessingError::UnsupportedFormat(format!(
                "{} (extension {})",
                path.display(),
                ext
            ));
            return self.fail(path, &mut progress, error).await;
        }

        progress.advance(PipelineState::Stabilizing);
        if !self.stability.is_stable(path).await {
            let reason = ProcessingError::UnstableFile {
                path: path.to_path_buf(),
                timeout_secs: self.stability.timeout().as_secs(),
            };
            warn!("{}; leaving it for a later attempt", reason);
            return ProcessOutcome::Deferred {
                source_path: path.to_path_buf(),
                reason,
            };
        }

        match self.run(path, &mut progress).await {
            Ok((result, archive_path)) => {
                info!(
                    "Archived {} as {} ({})",
                    path.display(),
                    result.new_filename,
                    result.remote_location
                );
                ProcessOutcome::Archived {
                    result,
                    archive_path,
                }
            }
            Err(error) => self.fail(path, &mut progress, error).await,
        }
    }

    async fn run(
        &self,
        path: &Path,
        progress: &mut Progress<'_>,
    ) -> Result<(ProcessingResult, PathBuf), ProcessingError> {
        let source = Arc::clone(&self.text_source);
        let owned_path = path.to_path_buf();
        let text = tokio::task::spawn_blocking(move || source.extract_text(&owned_path))
            .await
            .map_err(|e| ProcessingError::ExtractionFailure(format!("extraction task: {}", e)))??;
        if text.trim().is_empty() {
            warn!("No text recovered from {}", path.display());
        }
        progress.advance(PipelineState::TextExtracted);

        let record = self.extractor.extract(&text, &self.schema).await?;
        progress.advance(PipelineState::StructuredExtracted);

        tokio::fs::create_dir_all(&self.dirs.processed_dir).await?;
        let candidate = self.dirs.processed_dir.join(self.naming.build(&record, 1));
        let report_path = ensure_unique(&candidate);
        let new_filename = report_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        progress.advance(PipelineState::Named);

        let composer = self.composer;
        let compose_record = record.clone();
        let compose_path = path.to_path_buf();
        let bytes = tokio::task::spawn_blocking(move || {
            composer.compose(&compose_record, &compose_path)
        })
        .await
        .map_err(|e| ProcessingError::CompositionFailure(format!("composition task: {}", e)))??;
        progress.advance(PipelineState::Composed);

        tokio::fs::write(&report_path, &bytes).await?;
        info!("Wrote {}", report_path.display());
        progress.advance(PipelineState::Written);

        let relative = remote_relative_path(&record, &new_filename, Local::now().date_naive());
        let remote_location = self.remote.upload(&report_path, &relative).await?;
        let remote_event_id = match payment_event(
            &record,
            &remote_location,
            self.reminder_time,
            &self.time_zone,
        ) {
            Some(event) => {
                let id = self.remote.create_event(&event).await?;
                Some(id).filter(|id| !id.is_empty())
            }
            None => None,
        };
        progress.advance(PipelineState::Uploaded);

        let archive_path = move_into(path, &self.dirs.archive_dir).await?;
        progress.advance(PipelineState::Archived);

        Ok((
            ProcessingResult {
                source_path: path.to_path_buf(),
                report_path,
                new_filename,
                remote_location,
                remote_event_id,
            },
            archive_path,
        ))
    }

    async fn fail(
        &self,
        path: &Path,
        progress: &mut Progress<'_>,
        error: ProcessingError,
    ) -> ProcessOutcome {
        let state = progress.state;
        error!(
            kind = error.kind(),
            state = %state,
            "Failed to process {}: {}",
            path.display(),
            error
        );

        let failed_path = match move_into(path, &self.dirs.failed_dir).await {
            Ok(target) => Some(target),
            Err(e) => {
                error!("Could not move {} to failed folder: {}", path.display(), e);
                None
            }
        };
        progress.advance(PipelineState::Failed);

        ProcessOutcome::Failed {
            source_path: path.to_path_buf(),
            failed_path,
            state,
            error,
        }
    }
}
