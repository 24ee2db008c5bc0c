//! Hot-folder watcher and the single-consumer service loop.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::event::ModifyKind;
use notify::{EventKind, RecommendedWatcher, RecursiveMode};
use notify_debouncer_full::{new_debouncer, DebouncedEvent, Debouncer, RecommendedCache};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::pipeline::{Orchestrator, RunStats};

const DEBOUNCE: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("Failed to watch {path}: {source}")]
    Notify {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Watches one folder (non-recursively) and yields new files.
pub struct FolderWatcher {
    dir: PathBuf,
    rx: mpsc::UnboundedReceiver<PathBuf>,
    _debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
}

impl FolderWatcher {
    pub fn new(dir: &Path) -> Result<Self, WatchError> {
        let dir = dir.canonicalize()?;
        let (tx, rx) = mpsc::unbounded_channel();
        let watched = dir.clone();

        let mut debouncer = new_debouncer(
            DEBOUNCE,
            None,
            move |result: Result<Vec<DebouncedEvent>, Vec<notify::Error>>| match result {
                Ok(events) => {
                    for event in &events {
                        for path in intake_paths(event, &watched) {
                            debug!("Queued {}", path.display());
                            // Receiver gone means the service is shutting down.
                            let _ = tx.send(path);
                        }
                    }
                }
                Err(errors) => {
                    for e in errors {
                        warn!("Watcher error: {}", e);
                    }
                }
            },
        )
        .map_err(|source| WatchError::Notify {
            path: dir.clone(),
            source,
        })?;

        debouncer
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|source| WatchError::Notify {
                path: dir.clone(),
                source,
            })?;

        info!("Watching {}", dir.display());
        Ok(Self {
            dir,
            rx,
            _debouncer: debouncer,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Next queued path; `None` once the watcher has stopped.
    pub async fn next(&mut self) -> Option<PathBuf> {
        self.rx.recv().await
    }
}

/// Files to enqueue for one debounced event.
fn intake_paths(event: &DebouncedEvent, dir: &Path) -> Vec<PathBuf> {
    let wanted = match event.kind {
        EventKind::Create(_) => true,
        // Rename into the folder, e.g. a file moved back from failed_dir.
        EventKind::Modify(ModifyKind::Name(_)) => true,
        _ => false,
    };
    if !wanted {
        return Vec::new();
    }

    event
        .paths
        .iter()
        .filter(|p| p.parent() == Some(dir))
        .filter(|p| is_candidate(p))
        .cloned()
        .collect()
}

/// Regular, visible file.
fn is_candidate(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .map(|n| n.to_string_lossy().starts_with('.'))
        .unwrap_or(true);
    !hidden && path.is_file()
}

/// Files already in `dir`, sorted by name.
pub fn scan_existing(dir: &Path) -> Result<Vec<PathBuf>, WatchError> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| is_candidate(p))
        .collect();
    files.sort();
    Ok(files)
}

/// Run the hot-folder service until Ctrl-C.
///
/// Paths are handled one at a time in arrival order. `initial` is processed
/// first. A run in progress finishes before shutdown.
pub async fn run_service(
    orchestrator: &Orchestrator,
    watcher: FolderWatcher,
    initial: Vec<PathBuf>,
) -> RunStats {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };
    run_until(orchestrator, watcher, initial, ctrl_c).await
}

/// Like [`run_service`], stopping when `shutdown` resolves.
///
/// `shutdown` is polled before the first file, so a signal listener behind
/// it is installed before any work starts. It is checked again between
/// files and never interrupts a file mid-pipeline.
pub async fn run_until<F>(
    orchestrator: &Orchestrator,
    mut watcher: FolderWatcher,
    initial: Vec<PathBuf>,
    shutdown: F,
) -> RunStats
where
    F: Future<Output = ()>,
{
    let mut stats = RunStats::default();
    tokio::pin!(shutdown);

    let mut stopping = shutdown_requested(&mut shutdown).await;
    let mut backlog = initial.into_iter();
    while !stopping {
        let Some(path) = backlog.next() else { break };
        handle_queued(orchestrator, &path, &mut stats).await;
        stopping = shutdown_requested(&mut shutdown).await;
    }

    while !stopping {
        tokio::select! {
            next = watcher.next() => match next {
                Some(path) => handle_queued(orchestrator, &path, &mut stats).await,
                None => {
                    error!("Watcher on {} stopped", watcher.dir().display());
                    break;
                }
            },
            _ = &mut shutdown => stopping = true,
        }
    }
    if stopping {
        info!("Shutting down");
    }

    info!(
        "Processed {} file(s): {} archived, {} failed, {} deferred",
        stats.total(),
        stats.archived,
        stats.failed,
        stats.deferred
    );
    stats
}

/// Poll `shutdown` once without waiting.
async fn shutdown_requested<F: Future + Unpin>(shutdown: &mut F) -> bool {
    tokio::select! {
        biased;
        _ = shutdown => true,
        _ = std::future::ready(()) => false,
    }
}

async fn handle_queued(orchestrator: &Orchestrator, path: &Path, stats: &mut RunStats) {
    // Duplicate notifications for an already-routed file land here.
    if !path.exists() {
        debug!("Skipping {}, no longer present", path.display());
        return;
    }
    let outcome = orchestrator.handle(path).await;
    stats.record(&outcome);
}
