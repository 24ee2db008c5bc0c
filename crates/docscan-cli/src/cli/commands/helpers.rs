//! Shared setup for CLI commands.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use console::style;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use docscan::config::Config;
use docscan::extraction::{ExtractionSchema, StructuredExtractor};
use docscan::llm::LlmClient;
use docscan::pipeline::{Orchestrator, ProcessOutcome, RunStats};
use docscan::remote::{GraphClient, LocalOnlyRemote, RemoteArchiveService};
use docscan_analysis::TextExtractor;

use crate::cli::icons::{dim_arrow, error, success, warn};

/// Load the config from `path`, or discover one.
pub async fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => Config::discover()?,
    };
    Config::load_from_path(&path)
        .await
        .with_context(|| format!("loading {}", path.display()))
}

/// RUST_LOG wins; otherwise `--verbose`, then the config's `log_level`.
pub fn init_logging(verbose: bool, log_level: &str) {
    let level = if verbose { "debug" } else { log_level };
    let default_filter = format!("docscan={0},docscan_analysis={0}", level);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Validate the config, create the folders and wire up every capability.
pub fn build_orchestrator(config: &Config) -> anyhow::Result<Orchestrator> {
    config.validate()?;
    config
        .ensure_directories()
        .context("creating hot-folder directories")?;

    let schema = ExtractionSchema::load(config.llm.schema_path.as_deref())
        .context("loading extraction schema")?;

    let extractor = if config.llm.enabled {
        StructuredExtractor::new(Arc::new(LlmClient::new(config.llm.clone())?))
    } else {
        StructuredExtractor::disabled()
    };

    let remote: Arc<dyn RemoteArchiveService> = if config.graph.enabled {
        Arc::new(GraphClient::new(
            &config.graph,
            &config.onedrive,
            &config.calendar,
        )?)
    } else {
        Arc::new(LocalOnlyRemote)
    };

    let text_source = Arc::new(TextExtractor::from_settings(&config.ocr));
    info!(
        "Extraction: {}, remote: {}, OCR language: {}",
        if extractor.is_enabled() { config.llm.model.as_str() } else { "disabled" },
        remote.name(),
        config.ocr.language
    );

    Ok(Orchestrator::new(
        config,
        text_source,
        extractor,
        schema,
        remote,
    )?)
}

pub fn print_outcome(outcome: &ProcessOutcome) {
    let name = outcome
        .source_path()
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    match outcome {
        ProcessOutcome::Archived { result, .. } => {
            eprintln!("{} {} {} {}", success(), name, dim_arrow(), result.new_filename);
            eprintln!("    {}", style(&result.remote_location).dim());
        }
        ProcessOutcome::Failed { error: e, state, .. } => {
            eprintln!("{} {} failed after {}: {}", error(), name, state, e);
        }
        ProcessOutcome::Deferred { reason, .. } => {
            eprintln!("{} {} deferred: {}", warn(), name, reason);
        }
    }
}

pub fn print_stats(stats: &RunStats) {
    eprintln!(
        "\n{} archived, {} failed, {} deferred",
        style(stats.archived).green(),
        style(stats.failed).red(),
        style(stats.deferred).yellow()
    );
}
