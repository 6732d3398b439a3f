//! Archive discovery

use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

use crate::archive::ArchiveKind;

/// Collect the archives to process under `source`.
///
/// A file is returned as-is when its extension is `.zip` or `.rar` (any case).
/// A directory is walked recursively and every such file is returned, sorted
/// by path. The list is taken up front, so archives extracted during the run
/// are not picked up. Unreadable subdirectories are logged and skipped.
pub fn find_archives(source: &Path) -> io::Result<Vec<PathBuf>> {
    let metadata = std::fs::metadata(source)?;

    if metadata.is_file() {
        return Ok(ArchiveKind::from_path(source)
            .map(|_| vec![source.to_path_buf()])
            .unwrap_or_default());
    }

    let mut archives = Vec::new();
    for entry in WalkDir::new(source).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable path");
                continue;
            },
        };
        if entry.file_type().is_file() && ArchiveKind::from_path(entry.path()).is_some() {
            archives.push(entry.into_path());
        }
    }
    archives.sort();
    Ok(archives)
}
