/// The scan engine contract — the only thing the orchestration core knows
/// about malware detection.
///
/// An engine takes an enumerated [`DirectoryTree`] and returns a lazy,
/// ordered sequence of per-file results. The job pulls from it one item at a
/// time on the worker thread and may stop pulling at any point (cancellation
/// or a dropped consumer); an engine must not rely on being drained.
///
/// The sequence length is unrelated to `DirectoryTree::file_count`. Engines
/// may report every file (clean and infected) or only infected ones.
pub mod denylist;

use crate::enumerate::DirectoryTree;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use denylist::DenylistEngine;

/// Detection status of one scanned file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FindingStatus {
    Clean,
    Infected,
}

impl FindingStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Clean => "Clean",
            Self::Infected => "Infected",
        }
    }
}

impl fmt::Display for FindingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One engine result for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub path: PathBuf,
    pub status: FindingStatus,
    /// Threat label; empty for clean files.
    pub threat: String,
}

impl Finding {
    pub fn infected(path: impl Into<PathBuf>, threat: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            status: FindingStatus::Infected,
            threat: threat.into(),
        }
    }

    pub fn clean(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            status: FindingStatus::Clean,
            threat: String::new(),
        }
    }

    pub fn is_infected(&self) -> bool {
        self.status == FindingStatus::Infected
    }

    /// File name only, for compact display. Falls back to the full path.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.to_string_lossy().into_owned())
    }
}

/// The engine could not scan one file. Never aborts the job.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}: {}", .path.display(), .message)]
pub struct EngineError {
    pub path: PathBuf,
    pub message: String,
}

impl EngineError {
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Lazy, ordered sequence of per-file engine results.
pub type Findings<'a> = Box<dyn Iterator<Item = Result<Finding, EngineError>> + 'a>;

/// A malware scanning engine.
///
/// `Send + Sync` because one engine instance is shared by the session and
/// every worker thread it spawns (including abandoned ones still finishing
/// an in-flight call).
pub trait ScanEngine: Send + Sync {
    /// Short identifier used in logs and reports.
    fn name(&self) -> &str;

    /// Produce the results for every file under `tree`.
    fn scan<'a>(&'a self, tree: &'a DirectoryTree) -> Findings<'a>;
}
