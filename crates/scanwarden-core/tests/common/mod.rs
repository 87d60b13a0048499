//! Shared fixtures for the scanwarden-core integration tests.
//!
//! The engines here are scripted so tests control exactly what the worker
//! sees and when: fixed result lists, per-item delays, a gate the test
//! opens one item at a time, and an engine that panics.
#![allow(dead_code)]

use crossbeam_channel::{Receiver, Sender};
use scanwarden_core::{
    DirectoryTree, EngineError, Finding, Findings, JobState, ScanEngine, ScanEvent, ScanMessage,
    ScanSession,
};
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// One scripted engine result.
#[derive(Clone, Debug)]
pub enum Step {
    Infected(&'static str),
    Clean(&'static str),
    Fail(&'static str),
    Panic,
}

/// Yields `steps` for every tree, sleeping `delay` before each item.
pub struct ScriptedEngine {
    steps: Vec<Step>,
    delay: Duration,
}

impl ScriptedEngine {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps,
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(steps: Vec<Step>, delay: Duration) -> Self {
        Self { steps, delay }
    }

    pub fn infected(n: usize) -> Self {
        Self::new((0..n).map(|_| Step::Infected("bad.bin")).collect())
    }
}

impl ScanEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    fn scan<'a>(&'a self, tree: &'a DirectoryTree) -> Findings<'a> {
        let root = tree.root().to_path_buf();
        let delay = self.delay;
        Box::new(self.steps.iter().map(move |step| {
            if !delay.is_zero() {
                thread::sleep(delay);
            }
            match step {
                Step::Infected(name) => Ok(Finding::infected(root.join(name), "Test.Threat")),
                Step::Clean(name) => Ok(Finding::clean(root.join(name))),
                Step::Fail(name) => Err(EngineError::new(root.join(name), "unreadable")),
                Step::Panic => panic!("scripted engine exploded"),
            }
        }))
    }
}

/// Blocks before every item until the test sends a token through the gate.
///
/// Only the first `scan` call is gated; later calls (a rescan's job) yield
/// `after_first` infected items immediately. Dropping the gate sender ends
/// the gated sequence.
pub struct GatedEngine {
    gate: Receiver<()>,
    gated_once: AtomicBool,
    waiting: AtomicBool,
    after_first: usize,
}

impl GatedEngine {
    pub fn new(after_first: usize) -> (Self, Sender<()>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (
            Self {
                gate: rx,
                gated_once: AtomicBool::new(false),
                waiting: AtomicBool::new(false),
                after_first,
            },
            tx,
        )
    }

    /// `true` once the gated sequence is blocked waiting for a token.
    pub fn is_waiting(&self) -> bool {
        self.waiting.load(Ordering::SeqCst)
    }

    /// Spin until the worker is parked inside the engine.
    pub fn wait_until_blocked(&self) {
        let deadline = Instant::now() + Duration::from_secs(30);
        while !self.is_waiting() {
            assert!(Instant::now() < deadline, "engine never blocked on its gate");
            thread::sleep(Duration::from_millis(1));
        }
    }
}

impl ScanEngine for GatedEngine {
    fn name(&self) -> &str {
        "gated"
    }

    fn scan<'a>(&'a self, tree: &'a DirectoryTree) -> Findings<'a> {
        let root = tree.root().to_path_buf();
        if self.gated_once.swap(true, Ordering::SeqCst) {
            return Box::new(
                (0..self.after_first).map(move |_| Ok(Finding::infected(root.join("next.bin"), "T"))),
            );
        }
        Box::new(std::iter::from_fn(move || {
            self.waiting.store(true, Ordering::SeqCst);
            let token = self.gate.recv();
            self.waiting.store(false, Ordering::SeqCst);
            token
                .ok()
                .map(|()| Ok(Finding::infected(root.join("gated.bin"), "Gated")))
        }))
    }
}

pub fn write_bytes(path: &Path, n: usize) {
    let mut f = fs::File::create(path).unwrap();
    f.write_all(&vec![0u8; n]).unwrap();
}

/// Create `n` files directly under `root`.
pub fn make_files(root: &Path, n: usize) {
    for i in 0..n {
        write_bytes(&root.join(format!("file{i:03}.bin")), 16);
    }
}

/// Wait on the session until a terminal event arrives, returning every
/// message received (terminal last). Panics after 30 seconds.
pub fn drain_to_terminal(session: &mut ScanSession) -> Vec<ScanMessage> {
    let deadline = Instant::now() + Duration::from_secs(30);
    let mut messages = Vec::new();
    loop {
        assert!(
            Instant::now() < deadline,
            "scan did not reach a terminal event within 30 seconds"
        );
        if let Some(msg) = session.wait(Duration::from_millis(50)) {
            let terminal = msg.event.is_terminal();
            messages.push(msg);
            if terminal {
                return messages;
            }
        }
    }
}

/// Wait until the session has delivered `n` progress events.
pub fn wait_for_progress(session: &mut ScanSession, n: usize) -> Vec<ScanMessage> {
    let deadline = Instant::now() + Duration::from_secs(30);
    let mut messages = Vec::new();
    let mut seen = 0;
    while seen < n {
        assert!(Instant::now() < deadline, "expected {n} progress events");
        if let Some(msg) = session.wait(Duration::from_millis(50)) {
            if matches!(msg.event, ScanEvent::Progress { .. }) {
                seen += 1;
            }
            assert!(!msg.event.is_terminal(), "job ended before {n} progress events");
            messages.push(msg);
        }
    }
    messages
}

/// Wait until the job has enumerated its targets.
pub fn wait_for_started(session: &mut ScanSession) {
    let deadline = Instant::now() + Duration::from_secs(30);
    loop {
        assert!(Instant::now() < deadline, "job never reported Started");
        if let Some(msg) = session.wait(Duration::from_millis(50)) {
            if matches!(msg.event, ScanEvent::Started { .. }) {
                return;
            }
        }
    }
}

pub fn percents(messages: &[ScanMessage]) -> Vec<u8> {
    messages
        .iter()
        .filter_map(|m| match m.event {
            ScanEvent::Progress { percent, .. } => Some(percent),
            _ => None,
        })
        .collect()
}

pub fn terminal_state(messages: &[ScanMessage]) -> JobState {
    match messages.last().map(|m| &m.event) {
        Some(ScanEvent::Completed(_)) => JobState::Completed,
        Some(ScanEvent::Cancelled { .. }) => JobState::Cancelled,
        Some(ScanEvent::Failed { .. }) => JobState::Failed,
        _ => JobState::Running,
    }
}
