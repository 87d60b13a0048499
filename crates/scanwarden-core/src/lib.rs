/// ScanWarden Core — background scan orchestration and progress reporting.
///
/// This crate contains all scan lifecycle logic with zero UI dependencies.
/// Frontends (console, GUI, service) drive a [`session::ScanSession`] and
/// render the events it hands back.
///
/// # Modules
///
/// - [`target`] — Scan targets, requests, and file-picker filtering.
/// - [`enumerate`] — Directory enumeration (progress denominator).
/// - [`engine`] — The scan engine contract plus a denylist stand-in engine.
/// - [`job`] — One scan attempt on a dedicated, cancellable worker thread.
/// - [`progress`] — Typed worker → consumer messages and progress math.
/// - [`session`] — The controller: start, stop, rescan, snapshot, result.
/// - [`report`] / [`history`] — Final tallies and finished-scan history.
pub mod cancel;
pub mod config;
pub mod engine;
pub mod enumerate;
pub mod error;
pub mod history;
pub mod job;
pub mod progress;
pub mod report;
pub mod session;
pub mod target;

pub use cancel::CancellationToken;
pub use config::SessionConfig;
pub use engine::{EngineError, Finding, FindingStatus, Findings, ScanEngine};
pub use enumerate::{DirectoryTree, SkippedPath};
pub use error::{CoreError, Result};
pub use history::{HistoryEntry, ScanHistory};
pub use job::{Retired, ScanJob};
pub use progress::{JobId, JobState, ScanEvent, ScanMessage};
pub use report::ScanReport;
pub use session::{ProgressSnapshot, Restart, ScanSession};
pub use target::{ScanRequest, ScanTarget, ScanType, TargetKind};
