//! Hot-folder service.

use console::style;

use docscan::config::Config;
use docscan::watcher::{run_service, scan_existing, FolderWatcher};

use super::helpers::{build_orchestrator, print_stats};
use crate::cli::icons::dim_arrow;

pub async fn cmd_watch(config: Config, scan_existing_files: bool) -> anyhow::Result<()> {
    let orchestrator = build_orchestrator(&config)?;
    let input_dir = &config.hotfolder.input_dir;

    // Start watching before the scan so nothing dropped in between is missed.
    let watcher = FolderWatcher::new(input_dir)?;
    let initial = if scan_existing_files {
        scan_existing(watcher.dir())?
    } else {
        Vec::new()
    };

    eprintln!(
        "{} {} {}",
        style("Watching").bold(),
        watcher.dir().display(),
        style("(Ctrl-C to stop)").dim()
    );
    if !initial.is_empty() {
        eprintln!("  {} {} existing file(s) queued", dim_arrow(), initial.len());
    }

    let stats = run_service(&orchestrator, watcher, initial).await;
    print_stats(&stats);
    Ok(())
}
