/// Error types for the scan orchestration core.
///
/// Per-file problems during a scan (unreadable directories, engine failures on
/// a single file) are NOT errors at this level: they are reported as events
/// and counted. `CoreError` covers the failures a caller must handle.
use crate::progress::JobId;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Path does not exist: {0}")]
    PathNotFound(PathBuf),

    #[error("Scan request contains no targets")]
    EmptyRequest,

    #[error("No files selected (directories are not accepted here)")]
    NoFilesSelected,

    #[error("A scan is already running ({0}); stop it or rescan")]
    ScanInProgress(JobId),

    #[error("No previous scan request to repeat")]
    NothingToRescan,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Report export failed: {0}")]
    Export(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
