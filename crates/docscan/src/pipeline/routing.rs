//! Terminal moves of source files.

use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::naming::ensure_unique;

/// Move `source` into `dir`, keeping its name.
///
/// Creates `dir` if needed. A name clash gets a `__v<n>` suffix instead of
/// overwriting. Falls back to copy + remove across filesystems.
pub async fn move_into(source: &Path, dir: &Path) -> io::Result<PathBuf> {
    let name = source.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} has no file name", source.display()),
        )
    })?;

    tokio::fs::create_dir_all(dir).await?;
    let target = ensure_unique(&dir.join(name));

    match tokio::fs::rename(source, &target).await {
        Ok(()) => {}
        Err(e) if is_cross_device(&e) => {
            debug!("Cross-device move of {}, copying", source.display());
            tokio::fs::copy(source, &target).await?;
            tokio::fs::remove_file(source).await?;
        }
        Err(e) => return Err(e),
    }

    debug!("Moved {} -> {}", source.display(), target.display());
    Ok(target)
}

fn is_cross_device(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::CrossesDevices
}
