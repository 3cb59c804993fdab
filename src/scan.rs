//! Source tree discovery.
//!
//! Walks a project directory and lists every file the build should consider,
//! as `/`-separated paths relative to the root. Hidden entries (names
//! starting with `.`) and any directory passed in `exclude` are skipped
//! without descending into them, so `node_modules` or the output directory
//! can be left out.

use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("source directory not found: {0}")]
    MissingRoot(PathBuf),
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

/// List files under `root`, sorted, relative and `/`-separated.
pub fn scan(root: &Path, exclude: &[PathBuf]) -> Result<Vec<String>, ScanError> {
    if !root.is_dir() {
        return Err(ScanError::MissingRoot(root.to_path_buf()));
    }
    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| {
            if e.depth() == 0 {
                return true;
            }
            let hidden = e.file_name().to_string_lossy().starts_with('.');
            !hidden && !exclude.iter().any(|x| e.path() == x.as_path())
        });
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        files.push(parts.join("/"));
    }
    files.sort();
    Ok(files)
}
