/// Scan targets and requests — what the caller asks to be scanned.
///
/// Targets are classified once, when the request is built, and never change
/// afterwards. A path that disappears between classification and enumeration
/// is handled by the enumerator (it becomes a skipped path), not here.
use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Whether a target was a file or a directory when it was accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetKind {
    File,
    Directory,
}

/// One filesystem path requested for scanning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanTarget {
    path: PathBuf,
    kind: TargetKind,
}

impl ScanTarget {
    /// Classify `path` as a file or directory target.
    ///
    /// Symlinks are resolved for classification only; the stored path is
    /// the one the caller supplied.
    pub fn classify(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let meta = std::fs::metadata(&path).map_err(|_| CoreError::PathNotFound(path.clone()))?;
        let kind = if meta.is_dir() {
            TargetKind::Directory
        } else {
            TargetKind::File
        };
        Ok(Self { path, kind })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> TargetKind {
        self.kind
    }

    pub fn is_dir(&self) -> bool {
        self.kind == TargetKind::Directory
    }
}

/// The kind of scan the user started. Only affects labelling and history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanType {
    /// Individually picked files.
    File,
    /// A user-chosen mix of files and folders.
    Custom,
    /// A whole drive or home directory.
    Full,
}

impl ScanType {
    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            Self::File => "File Scan",
            Self::Custom => "Custom Scan",
            Self::Full => "Full Scan",
        }
    }
}

impl fmt::Display for ScanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A scan type plus the ordered, non-empty list of targets to scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    scan_type: ScanType,
    targets: Vec<ScanTarget>,
}

impl ScanRequest {
    /// Build a request from already-classified targets.
    pub fn new(scan_type: ScanType, targets: Vec<ScanTarget>) -> Result<Self> {
        if targets.is_empty() {
            return Err(CoreError::EmptyRequest);
        }
        Ok(Self { scan_type, targets })
    }

    /// Classify every path and build a request. Fails on the first missing path.
    pub fn from_paths<I, P>(scan_type: ScanType, paths: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let targets = paths
            .into_iter()
            .map(ScanTarget::classify)
            .collect::<Result<Vec<_>>>()?;
        Self::new(scan_type, targets)
    }

    pub fn scan_type(&self) -> ScanType {
        self.scan_type
    }

    pub fn targets(&self) -> &[ScanTarget] {
        &self.targets
    }
}

/// Keep only existing, non-directory paths from a file-picker selection.
///
/// Mirrors the "select files only" rule of the file picker: folders and
/// vanished paths are dropped silently, and an empty result is an error so
/// the caller can warn the user instead of starting an empty scan.
pub fn filter_picked_files<I, P>(paths: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator<Item = P>,
    P: Into<PathBuf>,
{
    let files: Vec<PathBuf> = paths
        .into_iter()
        .map(Into::into)
        .filter(|p| p.is_file())
        .collect();

    if files.is_empty() {
        return Err(CoreError::NoFilesSelected);
    }
    Ok(files)
}
