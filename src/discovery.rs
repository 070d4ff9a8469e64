//! Plugin source discovery.
//!
//! Walks a directory for Java plugin sources, skipping hidden and build
//! directories. Results are sorted so batch scans visit files in a stable
//! order regardless of filesystem iteration order.

use std::path::{Path, PathBuf};

use tracing::{debug, trace};
use walkdir::WalkDir;

use crate::error::ScanError;

const SKIP_DIRS: &[&str] = &["build", "target", "out", "node_modules", ".gradle"];

fn skippable(entry: &walkdir::DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.') || SKIP_DIRS.contains(&name))
}

/// Collect plugin source files under `root`, sorted by path.
///
/// A `root` that is itself a file is returned as-is, whatever its extension,
/// so explicit CLI arguments are never silently dropped.
pub fn find_plugin_sources(root: &Path) -> Result<Vec<PathBuf>, ScanError> {
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }

    let mut sources = Vec::new();
    let walker = WalkDir::new(root).into_iter();
    // Depth 0 is the root itself, which the caller chose explicitly.
    for entry in walker.filter_entry(|e| e.depth() == 0 || !skippable(e)) {
        let entry = entry.map_err(|e| ScanError::Io {
            file: root.display().to_string(),
            source: e.into(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "java") {
            trace!(file = %path.display(), "found plugin source");
            sources.push(path.to_path_buf());
        }
    }

    sources.sort();
    debug!(root = %root.display(), count = sources.len(), "discovery complete");
    Ok(sources)
}
