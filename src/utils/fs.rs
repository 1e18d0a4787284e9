//! File system helpers for pipeline artifacts.
//!
//! Generated manifests and rewritten ConnectedApp files are written with
//! temp-and-rename so that an interrupted job never leaves a half-written
//! file for the deployment invoker to pick up.

use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;

/// Create a directory and its parents if missing.
///
/// # Errors
///
/// Returns an error if the path exists and is not a directory, or if the
/// directory cannot be created.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() || path.is_dir() {
        return Ok(());
    }
    if path.exists() {
        anyhow::bail!("Path exists but is not a directory: {}", path.display());
    }
    std::fs::create_dir_all(path)
        .with_context(|| format!("Failed to create directory: {}", path.display()))
}

/// Write bytes to `path` atomically.
///
/// The content goes to a temp file in the destination directory, is synced,
/// and is then renamed over `path`. Readers see either the old or the new
/// file, never a partial write.
///
/// ```rust,no_run
/// use sfpkg_cli::utils::fs::atomic_write;
/// use std::path::Path;
///
/// # fn example() -> anyhow::Result<()> {
/// atomic_write(Path::new("package.xml"), b"<Package/>")?;
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns an error if the parent directory cannot be created, or if the
/// temp file cannot be written or renamed.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    ensure_dir(parent)?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("Failed to create temp file in: {}", parent.display()))?;
    temp.write_all(content)
        .with_context(|| format!("Failed to write temp file for: {}", path.display()))?;
    temp.as_file().sync_all().with_context(|| "Failed to sync file to disk")?;

    temp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to rename temp file to: {}", path.display()))?;
    Ok(())
}

/// [`atomic_write`] for string content.
///
/// # Errors
///
/// See [`atomic_write`].
pub fn safe_write(path: &Path, content: &str) -> Result<()> {
    atomic_write(path, content.as_bytes())
}
