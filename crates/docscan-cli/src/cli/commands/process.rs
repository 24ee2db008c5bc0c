//! One-shot processing of explicit files.

use std::path::PathBuf;

use docscan::config::Config;
use docscan::pipeline::RunStats;

use super::helpers::{build_orchestrator, print_outcome, print_stats};

/// Run the pipeline once per file, in argument order.
pub async fn cmd_process(config: Config, files: &[PathBuf]) -> anyhow::Result<()> {
    let orchestrator = build_orchestrator(&config)?;
    let mut stats = RunStats::default();

    for file in files {
        if !file.is_file() {
            anyhow::bail!("Not a file: {}", file.display());
        }
        let outcome = orchestrator.handle(file).await;
        print_outcome(&outcome);
        stats.record(&outcome);
    }

    print_stats(&stats);
    if stats.failed > 0 {
        anyhow::bail!("{} of {} file(s) failed", stats.failed, stats.total());
    }
    Ok(())
}
