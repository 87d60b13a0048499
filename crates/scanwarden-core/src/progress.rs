/// Scan progress reporting — typed messages sent from the scan worker to
/// the session via a bounded crossbeam channel.
///
/// Every message carries the [`JobId`] of the job that produced it so a
/// consumer can drop anything that belongs to a superseded job.
use crate::engine::Finding;
use crate::report::ScanReport;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Identity token of one scan attempt. Strictly increasing per session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job #{}", self.0)
    }
}

/// Lifecycle state of a scan job.
///
/// `Idle → Running → {Completed, Cancelled, Failed}`. Terminal states never
/// go back to `Running`; a rescan creates a new job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum JobState {
    Idle = 0,
    Running = 1,
    Completed = 2,
    Cancelled = 3,
    /// The worker panicked. Still a terminal state with its own event.
    Failed = 4,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }

    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Running,
            2 => Self::Completed,
            3 => Self::Cancelled,
            4 => Self::Failed,
            _ => Self::Idle,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Running => "Running",
            Self::Completed => "Completed",
            Self::Cancelled => "Cancelled",
            Self::Failed => "Failed",
        }
    }
}

/// Events emitted by a scan worker.
///
/// Exactly one of `Completed`, `Cancelled` or `Failed` ends every job, and
/// nothing follows it.
#[derive(Debug, Clone)]
pub enum ScanEvent {
    /// Enumeration finished; the progress denominator is fixed from here on.
    Started { total_files: u64, skipped_paths: u64 },
    /// One engine result was recorded.
    Progress {
        percent: u8,
        files_scanned: u64,
        threats_found: u64,
        latest: Finding,
    },
    /// The engine failed on one file. The scan continues.
    EngineError { path: PathBuf, message: String },
    /// All targets were scanned without a stop request.
    Completed(Box<ScanReport>),
    /// The stop request was observed; partial counts only.
    Cancelled { files_scanned: u64, threats_found: u64 },
    /// The worker panicked.
    Failed { error: String },
}

impl ScanEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed(_) | Self::Cancelled { .. } | Self::Failed { .. }
        )
    }
}

/// A [`ScanEvent`] tagged with the job that produced it.
#[derive(Debug, Clone)]
pub struct ScanMessage {
    pub job: JobId,
    pub event: ScanEvent,
}

/// Integer completion percentage, clamped to 100.
///
/// `floor(processed / total * 100)`; 0 when the denominator is 0 (nothing
/// was enumerated, so no ratio exists until completion forces 100).
pub fn progress_percent(processed: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = (u128::from(processed) * 100 / u128::from(total)).min(100);
    pct as u8
}
