/// Directory enumeration — builds the progress denominator for a scan.
///
/// Every accepted target becomes one [`DirectoryTree`]: a root plus the
/// approximate number of regular files beneath it. The count is taken once,
/// before any engine work starts, and is never recomputed. Files created
/// during the scan can push progress past the true ratio (it is clamped at
/// 100) but the denominator never shrinks.
///
/// # Error policy
///
/// Skip and continue. An unreadable subdirectory or an entry that vanishes
/// mid-walk is recorded as a [`SkippedPath`] and the walk carries on. The
/// skip list travels with the tree so the final report can show how much of
/// the target was not counted.
use crate::cancel::CancellationToken;
use crate::target::{ScanTarget, TargetKind};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Check the cancellation token every this many walked entries.
const CANCEL_CHECK_INTERVAL: u64 = 1_000;

/// A path the enumerator could not read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedPath {
    pub path: PathBuf,
    pub reason: String,
}

/// An enumerated scan root with its precomputed file count.
#[derive(Debug, Clone)]
pub struct DirectoryTree {
    root: PathBuf,
    kind: TargetKind,
    file_count: u64,
    skipped: Vec<SkippedPath>,
}

impl DirectoryTree {
    /// A tree built from already-known parts. Used by engines and tests that
    /// do not need a real walk.
    pub fn from_parts(root: impl Into<PathBuf>, kind: TargetKind, file_count: u64) -> Self {
        Self {
            root: root.into(),
            kind,
            file_count,
            skipped: Vec::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn kind(&self) -> TargetKind {
        self.kind
    }

    /// Approximate number of regular files under the root.
    pub fn file_count(&self) -> u64 {
        self.file_count
    }

    pub fn skipped(&self) -> &[SkippedPath] {
        &self.skipped
    }
}

/// Enumerate one scan target.
///
/// Directories are walked recursively. A plain file becomes a one-file tree
/// so it runs through the engine like any directory. A target that no
/// longer exists becomes an empty tree with a single skipped path.
pub fn enumerate(target: &ScanTarget, cancel: &CancellationToken) -> DirectoryTree {
    let root = target.path().to_path_buf();

    match std::fs::metadata(&root) {
        Err(err) => {
            warn!("Scan target vanished before enumeration: {}: {err}", root.display());
            DirectoryTree {
                skipped: vec![SkippedPath {
                    path: root.clone(),
                    reason: err.to_string(),
                }],
                root,
                kind: target.kind(),
                file_count: 0,
            }
        }
        Ok(meta) if !meta.is_dir() => DirectoryTree {
            root,
            kind: TargetKind::File,
            file_count: 1,
            skipped: Vec::new(),
        },
        Ok(_) => {
            let (file_count, skipped) = count_files(&root, cancel);
            debug!(
                "Enumerated {}: {} files, {} skipped",
                root.display(),
                file_count,
                skipped.len()
            );
            DirectoryTree {
                root,
                kind: TargetKind::Directory,
                file_count,
                skipped,
            }
        }
    }
}

/// Count regular files beneath `root`, collecting unreadable paths.
///
/// Symlinks are not followed and are not counted. Returns early (with a
/// partial count) once `cancel` is observed.
pub fn count_files(root: &Path, cancel: &CancellationToken) -> (u64, Vec<SkippedPath>) {
    let mut file_count: u64 = 0;
    let mut skipped = Vec::new();
    let mut visited: u64 = 0;

    let walker = jwalk::WalkDir::new(root)
        .skip_hidden(false)
        .follow_links(false);

    for entry_result in walker {
        visited += 1;
        if visited % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
            debug!("Enumeration of {} cancelled after {visited} entries", root.display());
            break;
        }

        match entry_result {
            Ok(entry) => {
                if entry.file_type().is_file() {
                    file_count += 1;
                }
            }
            Err(err) => {
                // jwalk errors are typically access-denied on directories.
                let path = err
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| root.to_path_buf());
                skipped.push(SkippedPath {
                    path,
                    reason: err.to_string(),
                });
            }
        }
    }

    (file_count, skipped)
}
