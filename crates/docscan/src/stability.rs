//! Detects when a file in the intake folder has finished being written.
//!
//! Scanners and network copies write incrementally; a file is considered
//! complete once two consecutive polls see the same non-zero size.

use std::path::Path;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::config::StabilityConfig;

/// Poll `path` until its size stops changing or `timeout` elapses.
///
/// A missing or empty file is "not yet ready" and resets the streak;
/// it never produces an error.
pub async fn is_stable(path: &Path, timeout: Duration, poll_interval: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    let mut last_size: Option<u64> = None;

    while Instant::now() < deadline {
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.len() > 0 => {
                let size = meta.len();
                if last_size == Some(size) {
                    debug!("{} stable at {} bytes", path.display(), size);
                    return true;
                }
                last_size = Some(size);
            }
            Ok(_) | Err(_) => last_size = None,
        }
        tokio::time::sleep(poll_interval).await;
    }

    false
}

/// Stability checker bound to configured timings.
#[derive(Debug, Clone)]
pub struct StableFileDetector {
    timeout: Duration,
    poll_interval: Duration,
}

impl StableFileDetector {
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
        }
    }

    pub fn from_config(config: &StabilityConfig) -> Self {
        Self::new(config.timeout(), config.poll_interval())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn is_stable(&self, path: &Path) -> bool {
        is_stable(path, self.timeout, self.poll_interval).await
    }
}
