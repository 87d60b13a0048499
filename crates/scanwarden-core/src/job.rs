/// Scan job — one scan attempt on a dedicated worker thread.
///
/// The worker enumerates every target, fixes the progress denominator,
/// then pulls engine results one at a time. Between results it checks the
/// cancellation token; it never pushes a result it pulled after a stop
/// request.
///
/// # Shared state
///
/// The worker is the only writer of [`JobCounters`]. Counters are atomics
/// so a reader on another thread never sees a torn value. The infected
/// findings list is never shared: it lives on the worker stack and moves
/// into the `Completed` event.
///
/// # Supersession
///
/// [`ScanJob::retire`] keeps reading the job's channel until the worker
/// hangs up, so a worker blocked on a full channel is released and a report
/// that was already queued is handed back instead of lost. A worker stuck
/// inside an engine call is abandoned after the bounded wait; the receiver
/// is dropped, its next `send` fails and it exits without touching anything
/// the next job owns.
use crate::cancel::CancellationToken;
use crate::engine::{Finding, ScanEngine};
use crate::enumerate::{self, DirectoryTree, SkippedPath};
use crate::error::Result;
use crate::progress::{progress_percent, JobId, JobState, ScanEvent, ScanMessage};
use crate::report::ScanReport;
use crate::target::ScanRequest;
use chrono::Local;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Live counters for one job.
#[derive(Debug, Default)]
pub struct JobCounters {
    state: AtomicU8,
    total_files: AtomicU64,
    files_scanned: AtomicU64,
    threats_found: AtomicU64,
    engine_errors: AtomicU64,
    current_path: Mutex<Option<PathBuf>>,
}

impl JobCounters {
    pub fn state(&self) -> JobState {
        JobState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: JobState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// A consistent-enough copy for display. Each field is read atomically;
    /// fields may come from adjacent updates.
    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            state: self.state(),
            total_files: self.total_files.load(Ordering::Acquire),
            files_scanned: self.files_scanned.load(Ordering::Acquire),
            threats_found: self.threats_found.load(Ordering::Acquire),
            engine_errors: self.engine_errors.load(Ordering::Acquire),
            current_path: self.current_path.lock().clone(),
        }
    }
}

/// Point-in-time copy of [`JobCounters`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountersSnapshot {
    pub state: JobState,
    pub total_files: u64,
    pub files_scanned: u64,
    pub threats_found: u64,
    pub engine_errors: u64,
    pub current_path: Option<PathBuf>,
}

/// What became of a job that was retired by a rescan.
#[derive(Debug, Clone)]
pub struct Retired {
    pub job: JobId,
    /// `Cancelled` unless the worker had already finished on its own.
    pub outcome: JobState,
    /// The worker did not exit within the join timeout and was left to
    /// terminate on its own.
    pub abandoned: bool,
    pub files_scanned: u64,
    pub threats_found: u64,
    /// The job's report, when it completed before anyone read it.
    pub report: Option<Box<ScanReport>>,
}

/// Handle to a running or finished scan job.
pub struct ScanJob {
    id: JobId,
    cancel: CancellationToken,
    counters: Arc<JobCounters>,
    events: Receiver<ScanMessage>,
    /// Disconnects when the worker thread exits.
    done: Receiver<()>,
    thread: Option<thread::JoinHandle<()>>,
}

impl ScanJob {
    /// Spawn the worker thread for `request`.
    ///
    /// The job is `Running` as soon as this returns.
    pub fn spawn(
        id: JobId,
        request: ScanRequest,
        engine: Arc<dyn ScanEngine>,
        channel_capacity: usize,
    ) -> Result<Self> {
        let (tx, events) = crossbeam_channel::bounded::<ScanMessage>(channel_capacity.max(1));
        let (done_tx, done) = crossbeam_channel::bounded::<()>(1);
        let cancel = CancellationToken::new();
        let counters = Arc::new(JobCounters::default());
        counters.set_state(JobState::Running);

        let worker = Worker {
            id,
            request,
            engine,
            cancel: cancel.clone(),
            counters: Arc::clone(&counters),
            tx,
        };

        let thread = thread::Builder::new()
            .name("scanwarden-scanner".into())
            .spawn(move || {
                let _done = done_tx;
                match panic::catch_unwind(AssertUnwindSafe(|| worker.run())) {
                    Ok(Ok(state)) => debug!("{} worker finished: {}", worker.id, state.label()),
                    Ok(Err(Disconnected)) => {
                        if !worker.counters.state().is_terminal() {
                            worker.counters.set_state(JobState::Cancelled);
                        }
                        debug!("{} superseded; worker exiting silently", worker.id);
                    }
                    Err(payload) => {
                        let message = panic_message(payload.as_ref());
                        error!("{} worker panicked: {message}", worker.id);
                        worker.counters.set_state(JobState::Failed);
                        let _ = worker.send(ScanEvent::Failed {
                            error: format!("Internal error: scan worker panicked: {message}"),
                        });
                    }
                }
            })?;

        info!("{} started", id);

        Ok(Self {
            id,
            cancel,
            counters,
            events,
            done,
            thread: Some(thread),
        })
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    /// Request cooperative cancellation. Non-blocking.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stop_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// State as last published by the worker.
    pub fn state(&self) -> JobState {
        self.counters.state()
    }

    pub fn counters(&self) -> CountersSnapshot {
        self.counters.snapshot()
    }

    /// Messages from the worker, in emission order.
    pub fn receiver(&self) -> &Receiver<ScanMessage> {
        &self.events
    }

    /// Wait up to `timeout` for the worker thread to exit.
    ///
    /// Returns `true` if it exited (and was joined).
    pub fn wait_for_exit(&mut self, timeout: Duration) -> bool {
        let exited = wait_done(&self.done, timeout);
        if exited {
            join_worker(self.id, self.thread.take());
        }
        exited
    }

    /// Stop the job, drain its pending messages, and wait up to `timeout`
    /// for the worker to exit. A worker that does not exit in time is
    /// detached.
    pub fn retire(self, timeout: Duration) -> Retired {
        self.cancel.cancel();
        let ScanJob {
            id,
            counters,
            events,
            done,
            thread,
            ..
        } = self;

        // The channel disconnects once the worker has dropped its sender.
        let deadline = Instant::now() + timeout;
        let mut report = None;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match events.recv_timeout(remaining) {
                Ok(ScanMessage {
                    event: ScanEvent::Completed(r),
                    ..
                }) => report = Some(r),
                Ok(_) => {}
                Err(_) => break,
            }
        }
        // Any later send from an abandoned worker fails.
        drop(events);

        let exited = wait_done(&done, deadline.saturating_duration_since(Instant::now()));
        if exited {
            join_worker(id, thread);
        } else {
            warn!("{id}: worker did not exit within {timeout:?}; abandoning it");
        }

        let snapshot = counters.snapshot();
        let outcome = match snapshot.state {
            JobState::Completed => JobState::Completed,
            JobState::Failed => JobState::Failed,
            _ => JobState::Cancelled,
        };

        Retired {
            job: id,
            outcome,
            abandoned: !exited,
            files_scanned: snapshot.files_scanned,
            threats_found: snapshot.threats_found,
            report,
        }
    }
}

fn wait_done(done: &Receiver<()>, timeout: Duration) -> bool {
    match done.recv_timeout(timeout) {
        Err(RecvTimeoutError::Timeout) => false,
        Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
    }
}

fn join_worker(id: JobId, thread: Option<thread::JoinHandle<()>>) {
    if let Some(handle) = thread {
        if handle.join().is_err() {
            warn!("{id}: worker thread panicked outside the panic guard");
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// The receiver was dropped: the job has been superseded.
struct Disconnected;

/// Everything the worker thread owns.
struct Worker {
    id: JobId,
    request: ScanRequest,
    engine: Arc<dyn ScanEngine>,
    cancel: CancellationToken,
    counters: Arc<JobCounters>,
    tx: Sender<ScanMessage>,
}

impl Worker {
    fn send(&self, event: ScanEvent) -> std::result::Result<(), Disconnected> {
        self.tx
            .send(ScanMessage { job: self.id, event })
            .map_err(|_| Disconnected)
    }

    fn run(&self) -> std::result::Result<JobState, Disconnected> {
        let started_at = Local::now();
        let start = Instant::now();

        // ── Enumerate ────────────────────────────────────────────────────
        let mut trees: Vec<DirectoryTree> = Vec::with_capacity(self.request.targets().len());
        for target in self.request.targets() {
            if self.cancel.is_cancelled() {
                break;
            }
            trees.push(enumerate::enumerate(target, &self.cancel));
        }

        let total_files: u64 = trees.iter().map(DirectoryTree::file_count).sum();
        let skipped: Vec<SkippedPath> = trees
            .iter()
            .flat_map(|t| t.skipped().iter().cloned())
            .collect();
        for s in &skipped {
            warn!("{}: skipped {}: {}", self.id, s.path.display(), s.reason);
        }

        self.counters.total_files.store(total_files, Ordering::Release);
        debug!(
            "{}: {} targets enumerated, {} files, {} skipped",
            self.id,
            trees.len(),
            total_files,
            skipped.len()
        );
        self.send(ScanEvent::Started {
            total_files,
            skipped_paths: skipped.len() as u64,
        })?;

        // ── Scan ─────────────────────────────────────────────────────────
        let mut findings: Vec<Finding> = Vec::new();
        let mut files_scanned: u64 = 0;
        let mut threats_found: u64 = 0;
        let mut engine_errors: u64 = 0;

        'targets: for tree in &trees {
            let mut results = self.engine.scan(tree);
            loop {
                if self.cancel.is_cancelled() {
                    break 'targets;
                }
                let Some(item) = results.next() else {
                    break;
                };
                // A stop that arrived while the engine was busy wins over
                // the item it produced.
                if self.cancel.is_cancelled() {
                    break 'targets;
                }

                match item {
                    Ok(finding) => {
                        files_scanned += 1;
                        if finding.is_infected() {
                            threats_found += 1;
                            findings.push(finding.clone());
                        }
                        self.counters
                            .files_scanned
                            .store(files_scanned, Ordering::Release);
                        self.counters
                            .threats_found
                            .store(threats_found, Ordering::Release);
                        *self.counters.current_path.lock() = Some(finding.path.clone());

                        self.send(ScanEvent::Progress {
                            percent: progress_percent(files_scanned, total_files),
                            files_scanned,
                            threats_found,
                            latest: finding,
                        })?;
                    }
                    Err(err) => {
                        engine_errors += 1;
                        self.counters
                            .engine_errors
                            .store(engine_errors, Ordering::Release);
                        warn!("{}: engine error: {err}", self.id);
                        self.send(ScanEvent::EngineError {
                            path: err.path,
                            message: err.message,
                        })?;
                    }
                }
            }
        }

        // ── Terminal ─────────────────────────────────────────────────────
        if self.cancel.is_cancelled() {
            self.counters.set_state(JobState::Cancelled);
            info!(
                "{} cancelled after {} files ({} threats)",
                self.id, files_scanned, threats_found
            );
            self.send(ScanEvent::Cancelled {
                files_scanned,
                threats_found,
            })?;
            return Ok(JobState::Cancelled);
        }

        let report = ScanReport {
            job: self.id,
            scan_type: self.request.scan_type(),
            engine: self.engine.name().to_string(),
            started_at,
            duration: start.elapsed(),
            total_files,
            files_scanned,
            threats_found,
            engine_errors,
            skipped,
            findings,
        };
        self.counters.set_state(JobState::Completed);
        info!(
            "{} completed: {} files, {} threats in {:?}",
            self.id, files_scanned, threats_found, report.duration
        );
        self.send(ScanEvent::Completed(Box::new(report)))?;
        Ok(JobState::Completed)
    }
}
