/// Scan session — the long-lived controller a frontend talks to.
///
/// A session owns at most one [`ScanJob`] at a time. Starting while a job is
/// running is rejected; `rescan` explicitly retires the current job (stop,
/// bounded join, discard its channel) before launching the next one.
///
/// The session mirrors the current job's counters into a
/// [`ProgressSnapshot`] as it drains messages in [`ScanSession::poll`] or
/// [`ScanSession::wait`]. Each job has its own channel and a replaced job's
/// channel is dropped in `rescan`, so a superseded worker can never move the
/// display backwards.
use crate::config::SessionConfig;
use crate::engine::ScanEngine;
use crate::error::{CoreError, Result};
use crate::history::{HistoryEntry, ScanHistory};
use crate::job::{CountersSnapshot, Retired, ScanJob};
use crate::progress::{JobId, JobState, ScanEvent, ScanMessage};
use crate::report::ScanReport;
use crate::target::{ScanRequest, ScanType};
use chrono::{DateTime, Local};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Display counters for the current (or most recent) job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub job: Option<JobId>,
    pub scan_type: Option<ScanType>,
    pub state: JobState,
    pub percent: u8,
    pub total_files: u64,
    pub files_scanned: u64,
    pub threats_found: u64,
    pub skipped_paths: u64,
    pub engine_errors: u64,
    pub elapsed: Duration,
}

impl Default for ProgressSnapshot {
    fn default() -> Self {
        Self {
            job: None,
            scan_type: None,
            state: JobState::Idle,
            percent: 0,
            total_files: 0,
            files_scanned: 0,
            threats_found: 0,
            skipped_paths: 0,
            engine_errors: 0,
            elapsed: Duration::ZERO,
        }
    }
}

/// Result of [`ScanSession::rescan`].
#[derive(Debug, Clone)]
pub struct Restart {
    /// Terminal notification for the job that was replaced, if there was one.
    pub retired: Option<Retired>,
    pub job: JobId,
}

pub struct ScanSession {
    engine: Arc<dyn ScanEngine>,
    config: SessionConfig,
    current: Option<ScanJob>,
    last_request: Option<ScanRequest>,
    next_job: u64,
    snapshot: ProgressSnapshot,
    started: Option<Instant>,
    started_wall: Option<DateTime<Local>>,
    frozen_elapsed: Option<Duration>,
    result: Option<ScanReport>,
    history: ScanHistory,
}

impl ScanSession {
    pub fn new(engine: Arc<dyn ScanEngine>) -> Self {
        Self::with_config(engine, SessionConfig::default())
    }

    pub fn with_config(engine: Arc<dyn ScanEngine>, config: SessionConfig) -> Self {
        let config = config.normalised();
        Self {
            engine,
            history: ScanHistory::new(config.history_limit),
            config,
            current: None,
            last_request: None,
            next_job: 1,
            snapshot: ProgressSnapshot::default(),
            started: None,
            started_wall: None,
            frozen_elapsed: None,
            result: None,
        }
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    /// Id of the job the session currently tracks, finished or not.
    pub fn current_job(&self) -> Option<JobId> {
        self.current.as_ref().map(ScanJob::id)
    }

    /// `true` until the current job's terminal event has been drained.
    pub fn is_running(&self) -> bool {
        self.current.is_some() && self.snapshot.state == JobState::Running
    }

    pub fn last_request(&self) -> Option<&ScanRequest> {
        self.last_request.as_ref()
    }

    /// Start a new scan.
    ///
    /// Rejected with [`CoreError::ScanInProgress`] while the current job has
    /// not delivered its terminal event; use [`ScanSession::rescan`] to
    /// replace a running job.
    pub fn start(&mut self, request: ScanRequest) -> Result<JobId> {
        if let Some(job) = &self.current {
            if self.is_running() {
                return Err(CoreError::ScanInProgress(job.id()));
            }
        }
        // The previous job already delivered its terminal event; its worker
        // is exiting on its own.
        self.current = None;
        self.launch(request)
    }

    /// Ask the current job to stop. Non-blocking; the `Cancelled` (or a
    /// racing `Completed`) event arrives through `poll`/`wait`.
    pub fn stop(&mut self) {
        if !self.is_running() {
            return;
        }
        if let Some(job) = &self.current {
            job.stop();
            info!("{} stop requested", job.id());
        }
    }

    /// Cancel the current job (bounded join, then abandon) and start a new
    /// one. Counters and elapsed time restart from zero.
    ///
    /// When this returns no message from the retired job can be observed;
    /// its terminal notification is in [`Restart::retired`].
    pub fn rescan(&mut self, request: ScanRequest) -> Result<Restart> {
        let retired = self.retire_current();
        let job = self.launch(request)?;
        if let Some(r) = &retired {
            info!(
                "Rescan: {} retired as {} (abandoned: {}), {} started",
                r.job,
                r.outcome.label(),
                r.abandoned,
                job
            );
        }
        Ok(Restart { retired, job })
    }

    /// Rescan with the most recent request.
    pub fn rescan_same(&mut self) -> Result<Restart> {
        let request = self
            .last_request
            .clone()
            .ok_or(CoreError::NothingToRescan)?;
        self.rescan(request)
    }

    /// Drain up to `max_events_per_poll` messages without blocking.
    ///
    /// Returns the messages of the current job in emission order, after
    /// applying them to the snapshot. Stops after a terminal event.
    pub fn poll(&mut self) -> Vec<ScanMessage> {
        let Some(job) = &self.current else {
            return Vec::new();
        };
        let mut batch = Vec::new();

        while batch.len() < self.config.max_events_per_poll {
            let msg = match job.receiver().try_recv() {
                Ok(m) => m,
                Err(_) => break,
            };
            debug_assert_eq!(msg.job, job.id());
            let terminal = msg.event.is_terminal();
            batch.push(msg);
            if terminal {
                break;
            }
        }

        for msg in &batch {
            self.apply(&msg.event);
        }
        batch
    }

    /// Block up to `timeout` for the next message of the current job.
    pub fn wait(&mut self, timeout: Duration) -> Option<ScanMessage> {
        let job = self.current.as_ref()?;
        let msg = job.receiver().recv_timeout(timeout).ok()?;
        debug_assert_eq!(msg.job, job.id());
        self.apply(&msg.event);
        Some(msg)
    }

    /// Counters, percent, and elapsed time as of the last drained message.
    pub fn progress_snapshot(&self) -> ProgressSnapshot {
        let mut snapshot = self.snapshot.clone();
        snapshot.elapsed = self.elapsed();
        snapshot
    }

    /// The worker's live atomic counters, which may be ahead of the
    /// snapshot when messages are still queued.
    pub fn live_counters(&self) -> Option<CountersSnapshot> {
        self.current.as_ref().map(ScanJob::counters)
    }

    /// The report of the current job, only once it has completed.
    pub fn result(&self) -> Option<&ScanReport> {
        if self.snapshot.state == JobState::Completed {
            self.result.as_ref()
        } else {
            None
        }
    }

    pub fn history(&self) -> &ScanHistory {
        &self.history
    }

    pub fn elapsed(&self) -> Duration {
        match (self.frozen_elapsed, self.started) {
            (Some(frozen), _) => frozen,
            (None, Some(start)) => start.elapsed(),
            (None, None) => Duration::ZERO,
        }
    }

    // ── Internals ────────────────────────────────────────────────────────

    fn launch(&mut self, request: ScanRequest) -> Result<JobId> {
        let id = JobId(self.next_job);
        self.next_job += 1;

        let job = ScanJob::spawn(
            id,
            request.clone(),
            Arc::clone(&self.engine),
            self.config.channel_capacity,
        )?;

        self.snapshot = ProgressSnapshot {
            job: Some(id),
            scan_type: Some(request.scan_type()),
            state: JobState::Running,
            ..ProgressSnapshot::default()
        };
        self.started = Some(Instant::now());
        self.started_wall = Some(Local::now());
        self.frozen_elapsed = None;
        self.result = None;
        self.last_request = Some(request);
        self.current = Some(job);
        Ok(id)
    }

    fn retire_current(&mut self) -> Option<Retired> {
        let job = self.current.take()?;
        let already_terminal = self.snapshot.state.is_terminal();
        let mut retired = job.retire(self.config.join_timeout);

        if already_terminal {
            // The consumer has seen this job's terminal event already.
            retired.outcome = self.snapshot.state;
        } else {
            // Events still queued at retirement were never applied; the
            // worker's own counters are exact.
            self.snapshot.state = retired.outcome;
            self.snapshot.files_scanned = retired.files_scanned;
            self.snapshot.threats_found = retired.threats_found;
            if let Some(report) = &retired.report {
                self.snapshot.engine_errors = report.engine_errors;
                self.snapshot.skipped_paths = report.skipped.len() as u64;
            }
            self.freeze_elapsed();
            self.record_history(retired.outcome);
        }
        Some(retired)
    }

    fn apply(&mut self, event: &ScanEvent) {
        if event.is_terminal() && self.snapshot.state.is_terminal() {
            debug!("Ignoring second terminal event for {:?}", self.snapshot.job);
            return;
        }

        let s = &mut self.snapshot;
        match event {
            ScanEvent::Started {
                total_files,
                skipped_paths,
            } => {
                s.total_files = *total_files;
                s.skipped_paths = *skipped_paths;
            }
            ScanEvent::Progress {
                percent,
                files_scanned,
                threats_found,
                ..
            } => {
                s.percent = s.percent.max(*percent);
                s.files_scanned = s.files_scanned.max(*files_scanned);
                s.threats_found = s.threats_found.max(*threats_found);
            }
            ScanEvent::EngineError { .. } => {
                s.engine_errors += 1;
            }
            ScanEvent::Completed(report) => {
                s.state = JobState::Completed;
                s.percent = report.percent();
                s.files_scanned = report.files_scanned;
                s.threats_found = report.threats_found;
                s.engine_errors = report.engine_errors;
                self.result = Some((**report).clone());
                self.freeze_elapsed();
                self.record_history(JobState::Completed);
            }
            ScanEvent::Cancelled {
                files_scanned,
                threats_found,
            } => {
                s.state = JobState::Cancelled;
                s.files_scanned = *files_scanned;
                s.threats_found = *threats_found;
                self.freeze_elapsed();
                self.record_history(JobState::Cancelled);
            }
            ScanEvent::Failed { .. } => {
                s.state = JobState::Failed;
                self.freeze_elapsed();
                self.record_history(JobState::Failed);
            }
        }
    }

    fn freeze_elapsed(&mut self) {
        if self.frozen_elapsed.is_none() {
            self.frozen_elapsed = Some(self.started.map_or(Duration::ZERO, |s| s.elapsed()));
        }
    }

    fn record_history(&mut self, outcome: JobState) {
        let (Some(job), Some(scan_type)) = (self.snapshot.job, self.snapshot.scan_type) else {
            return;
        };
        let entry = HistoryEntry {
            job,
            scan_type,
            started_at: self.started_wall.unwrap_or_else(Local::now),
            outcome,
            files_scanned: self.snapshot.files_scanned,
            threats_found: self.snapshot.threats_found,
            elapsed: self.elapsed(),
        };
        self.history.record(entry);
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        // Dropping the job drops its receiver, so the worker exits on its
        // next send; cancelling makes it stop pulling from the engine too.
        if let Some(job) = &self.current {
            job.stop();
        }
    }
}
