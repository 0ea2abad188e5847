//! Source tree enumeration
// (c) 2024 Ross Younger

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use tracing::debug;
use walkdir::WalkDir;

/// Lists every non-directory entry under `root`, recursively.
///
/// The listing is a single snapshot in sorted order; nothing re-checks it
/// against later filesystem changes.
pub fn enumerate_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walking {}", root.display()))?;
        if !entry.file_type().is_dir() {
            files.push(entry.into_path());
        }
    }
    debug!("found {} files under {}", files.len(), root.display());
    Ok(files)
}
