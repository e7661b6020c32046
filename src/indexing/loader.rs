//! Document discovery and parsing for the indexing pipeline.

use crate::flatten::{FileRecords, flatten_file};
use crate::indexing::IndexError;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Reasons a single file was skipped during an indexing run.
#[derive(Debug, Error)]
pub enum FileSkip {
    /// File could not be read as UTF-8 text.
    #[error("failed to read file: {0}")]
    Unreadable(#[from] std::io::Error),
    /// File contents were not valid JSON.
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    /// Top-level JSON value was neither an object nor an array.
    #[error(transparent)]
    UnsupportedShape(#[from] crate::flatten::FlattenError),
}

/// Discover indexable JSON files directly under `dir`, sorted by file name.
///
/// Lexicographic ordering keeps indexing runs reproducible regardless of
/// filesystem enumeration order.
pub fn discover_files(dir: &Path) -> Result<Vec<PathBuf>, IndexError> {
    if !dir.is_dir() {
        return Err(IndexError::DataDirMissing(dir.to_path_buf()));
    }

    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
        })
        .collect();

    files.sort_by_key(|path| path.file_name().map(std::ffi::OsStr::to_os_string));
    Ok(files)
}

/// Read, parse, and flatten one JSON file into records.
pub fn load_file(path: &Path) -> Result<FileRecords, FileSkip> {
    let contents = std::fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&contents)?;
    let source_file = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(flatten_file(&source_file, &value)?)
}
