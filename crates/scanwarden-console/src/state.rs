/// Console state management.
///
/// Centralises everything the console renders. The scan worker talks to the
/// session over a channel; display state changes only in
/// `process_scan_messages()`, which runs once per frame.
use scanwarden_core::progress::{JobId, JobState, ScanEvent};
use scanwarden_core::session::{Restart, ScanSession};
use scanwarden_core::{
    CoreError, Finding, FindingStatus, Retired, ScanEngine, ScanRequest, ScanType, SessionConfig,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// The current phase of the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsolePhase {
    /// Idle — nothing started yet.
    Idle,
    /// Scanning — progress bar and live counters.
    Scanning,
    /// Scan finished (completed, cancelled or failed).
    Results,
}

/// How the result line should be coloured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Clean,
    Threat,
    Warning,
}

/// A row in the results table: one engine result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRow {
    pub file_name: String,
    pub path: PathBuf,
    pub status: FindingStatus,
    pub threat: String,
}

impl From<&Finding> for ResultRow {
    fn from(f: &Finding) -> Self {
        Self {
            file_name: f.file_name(),
            path: f.path.clone(),
            status: f.status,
            threat: f.threat.clone(),
        }
    }
}

impl ResultRow {
    pub fn is_highlighted(&self) -> bool {
        self.status == FindingStatus::Infected
    }
}

/// Maximum engine errors kept for display; the counter keeps counting.
pub const MAX_SCAN_ERRORS: usize = 1000;

/// Maximum rows kept in the results table.
///
/// A full-drive scan with a clean-reporting engine yields one row per file;
/// beyond this the table stops growing but the counters stay exact.
pub const MAX_RESULT_ROWS: usize = 100_000;

/// All console state.
pub struct ConsoleState {
    session: ScanSession,

    // ── Scan ───────────────────────────────────────────
    pub phase: ConsolePhase,
    pub scan_type: Option<ScanType>,
    pub scan_info: String,
    pub progress_percent: u8,
    pub files_scanned: u64,
    pub threats_found: u64,
    pub total_files: u64,
    pub skipped_paths: u64,
    pub elapsed: Duration,
    pub scan_was_cancelled: bool,
    /// File the worker is on right now, read from its live counters.
    pub current_file: Option<String>,

    // ── Results ────────────────────────────────────────
    pub results: Vec<ResultRow>,
    pub result_label: Option<(String, Severity)>,
    pub scan_errors: Vec<(String, String)>,
    pub scan_error_count: u64,
    /// The job replaced by the most recent rescan.
    pub last_retired: Option<Retired>,
}

impl ConsoleState {
    pub fn new(engine: Arc<dyn ScanEngine>) -> Self {
        Self::with_config(engine, SessionConfig::default())
    }

    pub fn with_config(engine: Arc<dyn ScanEngine>, config: SessionConfig) -> Self {
        Self {
            session: ScanSession::with_config(engine, config),
            phase: ConsolePhase::Idle,
            scan_type: None,
            scan_info: String::new(),
            progress_percent: 0,
            files_scanned: 0,
            threats_found: 0,
            total_files: 0,
            skipped_paths: 0,
            elapsed: Duration::ZERO,
            scan_was_cancelled: false,
            current_file: None,
            results: Vec::new(),
            result_label: None,
            scan_errors: Vec::new(),
            scan_error_count: 0,
            last_retired: None,
        }
    }

    pub fn session(&self) -> &ScanSession {
        &self.session
    }

    /// Start a scan. Fails while another scan is still running.
    pub fn start_scan(&mut self, request: ScanRequest) -> Result<JobId, CoreError> {
        let scan_type = request.scan_type();
        let job = self.session.start(request)?;
        self.reset_display(scan_type);
        info!("{} started as {}", scan_type, job);
        Ok(job)
    }

    /// Stop the running scan (if any) and start `request` from zero.
    pub fn rescan(&mut self, request: ScanRequest) -> Result<JobId, CoreError> {
        let scan_type = request.scan_type();
        let restart = self.session.rescan(request)?;
        self.after_restart(scan_type, restart)
    }

    /// Rescan with the last request.
    pub fn rescan_same(&mut self) -> Result<JobId, CoreError> {
        let restart = self.session.rescan_same()?;
        let scan_type = self
            .session
            .last_request()
            .map_or(ScanType::Custom, ScanRequest::scan_type);
        self.after_restart(scan_type, restart)
    }

    /// Request cancellation. The phase flips when the `Cancelled` event is
    /// drained.
    pub fn cancel_scan(&mut self) {
        self.session.stop();
    }

    /// Process pending scan messages. Called once per frame.
    ///
    /// Returns `true` if the display should be redrawn.
    pub fn process_scan_messages(&mut self) -> bool {
        if self.phase != ConsolePhase::Scanning {
            return false;
        }

        let batch = self.session.poll();
        let mut repaint = !batch.is_empty();

        for msg in batch {
            match msg.event {
                ScanEvent::Started {
                    total_files,
                    skipped_paths,
                } => {
                    self.total_files = total_files;
                    self.skipped_paths = skipped_paths;
                }
                ScanEvent::Progress {
                    percent,
                    files_scanned,
                    threats_found,
                    latest,
                } => {
                    self.progress_percent = percent;
                    self.files_scanned = files_scanned;
                    self.threats_found = threats_found;
                    if self.results.len() < MAX_RESULT_ROWS {
                        self.results.push(ResultRow::from(&latest));
                    }
                }
                ScanEvent::EngineError { path, message } => {
                    self.scan_error_count += 1;
                    if self.scan_errors.len() < MAX_SCAN_ERRORS {
                        self.scan_errors
                            .push((path.to_string_lossy().into_owned(), message));
                    }
                }
                ScanEvent::Completed(report) => {
                    self.progress_percent = report.percent();
                    self.files_scanned = report.files_scanned;
                    self.threats_found = report.threats_found;
                    self.finish(JobState::Completed, None);
                }
                ScanEvent::Cancelled {
                    files_scanned,
                    threats_found,
                } => {
                    self.files_scanned = files_scanned;
                    self.threats_found = threats_found;
                    self.finish(JobState::Cancelled, None);
                }
                ScanEvent::Failed { error } => {
                    warn!("Scan failed: {}", error);
                    self.finish(JobState::Failed, Some(error));
                }
            }
        }

        if self.phase == ConsolePhase::Scanning {
            let current = self
                .session
                .live_counters()
                .and_then(|c| c.current_path)
                .map(|p| p.to_string_lossy().into_owned());
            if current != self.current_file {
                self.current_file = current;
                repaint = true;
            }
        }

        // The elapsed label ticks even when no message arrived.
        let elapsed = self.session.elapsed();
        if elapsed.as_secs() != self.elapsed.as_secs() {
            repaint = true;
        }
        self.elapsed = elapsed;

        repaint
    }

    fn after_restart(&mut self, scan_type: ScanType, restart: Restart) -> Result<JobId, CoreError> {
        if let Some(r) = &restart.retired {
            info!(
                "Rescan replaced {} ({}, {} files scanned)",
                r.job,
                r.outcome.label(),
                r.files_scanned
            );
        }
        self.reset_display(scan_type);
        self.last_retired = restart.retired;
        Ok(restart.job)
    }

    fn reset_display(&mut self, scan_type: ScanType) {
        self.phase = ConsolePhase::Scanning;
        self.scan_type = Some(scan_type);
        self.scan_info = format!("{} in Progress...", scan_type);
        self.progress_percent = 0;
        self.files_scanned = 0;
        self.threats_found = 0;
        self.total_files = 0;
        self.skipped_paths = 0;
        self.elapsed = Duration::ZERO;
        self.scan_was_cancelled = false;
        self.current_file = None;
        self.results.clear();
        self.result_label = None;
        self.scan_errors.clear();
        self.scan_error_count = 0;
    }

    fn finish(&mut self, outcome: JobState, error: Option<String>) {
        self.phase = ConsolePhase::Results;
        self.current_file = None;
        let scan_type = self.scan_type.unwrap_or(ScanType::Custom);
        let n = self.threats_found;

        let (info, label, severity) = match outcome {
            JobState::Completed => (
                format!("{} Complete", scan_type),
                format!("Scan Complete: {} threats detected.", n),
                if n > 0 { Severity::Threat } else { Severity::Clean },
            ),
            JobState::Cancelled => {
                self.scan_was_cancelled = true;
                (
                    format!("{} Cancelled", scan_type),
                    format!("Scan Cancelled: {} threats detected so far.", n),
                    Severity::Warning,
                )
            }
            _ => (
                format!("{} Failed", scan_type),
                format!("Scan Failed: {}", error.unwrap_or_default()),
                Severity::Warning,
            ),
        };
        self.scan_info = info;
        self.result_label = Some((label, severity));
    }
}
