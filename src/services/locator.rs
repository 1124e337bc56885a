use crate::domain::errors::SeedError;
use std::path::{Path, PathBuf};

/// Matching files directly inside `root`, sorted by file name.
///
/// A missing directory is the common case (most applications have no seeds)
/// and yields an empty list. An unreadable one is logged and treated the same.
pub fn locate(root: &Path, pattern: &glob::Pattern) -> Vec<PathBuf> {
    match try_locate(root, pattern) {
        Ok(files) => files,
        Err(err) => {
            tracing::warn!(error = %err, "treating seed directory as empty");
            Vec::new()
        }
    }
}

pub fn try_locate(root: &Path, pattern: &glob::Pattern) -> Result<Vec<PathBuf>, SeedError> {
    let discovery = |source| SeedError::Discovery {
        path: root.to_path_buf(),
        source,
    };
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(discovery(err)),
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(discovery)?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !pattern.matches(name) {
            continue;
        }
        // follows symlinks, so a linked seed file still counts
        if entry.path().is_file() {
            files.push(entry.path());
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}
