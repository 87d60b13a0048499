/// End-to-end tests for `ScanSession` — the scan controller.
///
/// These run real worker threads against real temporary directories. The
/// engines are scripted (see `common`) so timing-sensitive properties such
/// as "stop before the first finding" are deterministic.
mod common;

use common::*;
use scanwarden_core::engine::DenylistEngine;
use scanwarden_core::{
    CoreError, JobId, JobState, ScanEvent, ScanRequest, ScanSession, ScanType, SessionConfig,
};
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn session_with(engine: impl scanwarden_core::ScanEngine + 'static) -> ScanSession {
    ScanSession::new(Arc::new(engine))
}

fn dir_request(tmp: &TempDir) -> ScanRequest {
    ScanRequest::from_paths(ScanType::Custom, [tmp.path()]).unwrap()
}

// ── Completion ───────────────────────────────────────────────────────────────

/// A clean single file with an engine that reports nothing completes with an
/// empty result list at 100 %.
#[test]
fn clean_single_file_completes_at_full_progress() {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("cleanA.txt");
    write_bytes(&file, 10);

    let mut session = session_with(ScriptedEngine::new(Vec::new()));
    let request = ScanRequest::from_paths(ScanType::File, [&file]).unwrap();
    session.start(request).unwrap();
    let messages = drain_to_terminal(&mut session);

    assert_eq!(terminal_state(&messages), JobState::Completed);
    assert!(percents(&messages).is_empty());

    let report = session.result().expect("report after completion");
    assert!(report.findings.is_empty());
    assert_eq!(report.threats_found, 0);
    assert_eq!(report.total_files, 1);

    let snap = session.progress_snapshot();
    assert_eq!(snap.percent, 100);
    assert_eq!(snap.threats_found, 0);
    assert_eq!(snap.state, JobState::Completed);
}

/// Ten enumerated files, three findings: progress 10/20/30 then Completed
/// with all three findings.
#[test]
fn three_findings_over_ten_files() {
    let tmp = TempDir::new().unwrap();
    make_files(tmp.path(), 10);

    let mut session = session_with(ScriptedEngine::infected(3));
    session.start(dir_request(&tmp)).unwrap();
    let messages = drain_to_terminal(&mut session);

    assert!(matches!(
        messages[0].event,
        ScanEvent::Started {
            total_files: 10,
            skipped_paths: 0
        }
    ));
    assert_eq!(percents(&messages), vec![10, 20, 30]);

    match &messages.last().unwrap().event {
        ScanEvent::Completed(report) => {
            assert_eq!(report.findings.len(), 3);
            assert_eq!(report.files_scanned, 3);
            assert_eq!(report.threats_found, 3);
        }
        other => panic!("expected Completed, got {other:?}"),
    }

    let snap = session.progress_snapshot();
    assert_eq!(snap.files_scanned, 3);
    assert_eq!(snap.threats_found, 3);
    assert_eq!(snap.percent, 100);
    assert_eq!(snap.total_files, 10);
}

/// Clean results count as scanned files but not as threats.
#[test]
fn clean_results_count_as_scanned_not_threats() {
    let tmp = TempDir::new().unwrap();
    make_files(tmp.path(), 4);

    let mut session = session_with(ScriptedEngine::new(vec![
        Step::Clean("a"),
        Step::Infected("b"),
        Step::Clean("c"),
        Step::Clean("d"),
    ]));
    session.start(dir_request(&tmp)).unwrap();
    let messages = drain_to_terminal(&mut session);

    assert_eq!(percents(&messages), vec![25, 50, 75, 100]);
    let report = session.result().unwrap();
    assert_eq!(report.files_scanned, 4);
    assert_eq!(report.threats_found, 1);
    assert_eq!(report.findings.len(), 1);
    assert_eq!(report.findings[0].file_name(), "b");
}

/// Findings arrive in engine order and progress never decreases.
#[test]
fn progress_is_monotonic_and_ordered() {
    let tmp = TempDir::new().unwrap();
    make_files(tmp.path(), 7);

    let mut session = session_with(ScriptedEngine::new(vec![
        Step::Infected("1"),
        Step::Clean("2"),
        Step::Infected("3"),
        Step::Clean("4"),
        Step::Clean("5"),
        Step::Infected("6"),
        Step::Clean("7"),
    ]));
    session.start(dir_request(&tmp)).unwrap();
    let messages = drain_to_terminal(&mut session);

    let p = percents(&messages);
    assert!(p.windows(2).all(|w| w[0] <= w[1]), "not monotonic: {p:?}");

    let names: Vec<String> = messages
        .iter()
        .filter_map(|m| match &m.event {
            ScanEvent::Progress { latest, .. } => Some(latest.file_name()),
            _ => None,
        })
        .collect();
    assert_eq!(names, vec!["1", "2", "3", "4", "5", "6", "7"]);
}

/// An engine that reports more results than were enumerated is clamped at 100.
#[test]
fn progress_clamps_when_engine_outruns_enumeration() {
    let tmp = TempDir::new().unwrap();
    make_files(tmp.path(), 2);

    let mut session = session_with(ScriptedEngine::infected(5));
    session.start(dir_request(&tmp)).unwrap();
    let messages = drain_to_terminal(&mut session);
    assert_eq!(percents(&messages), vec![50, 100, 100, 100, 100]);
}

/// An empty directory has no denominator: progress stays 0 until completion.
#[test]
fn empty_directory_reports_zero_until_completion() {
    let tmp = TempDir::new().unwrap();
    let mut session = session_with(ScriptedEngine::infected(2));
    session.start(dir_request(&tmp)).unwrap();
    let messages = drain_to_terminal(&mut session);

    assert_eq!(percents(&messages), vec![0, 0]);
    assert_eq!(terminal_state(&messages), JobState::Completed);
    assert_eq!(session.progress_snapshot().percent, 100);
}

/// Per-file engine failures are reported and counted but do not end the job.
#[test]
fn engine_errors_do_not_abort_the_scan() {
    let tmp = TempDir::new().unwrap();
    make_files(tmp.path(), 3);

    let mut session = session_with(ScriptedEngine::new(vec![
        Step::Infected("a"),
        Step::Fail("locked"),
        Step::Clean("c"),
    ]));
    session.start(dir_request(&tmp)).unwrap();
    let messages = drain_to_terminal(&mut session);

    let errors: Vec<_> = messages
        .iter()
        .filter(|m| matches!(m.event, ScanEvent::EngineError { .. }))
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(terminal_state(&messages), JobState::Completed);

    let report = session.result().unwrap();
    assert_eq!(report.engine_errors, 1);
    assert_eq!(report.files_scanned, 2);
    assert_eq!(session.progress_snapshot().engine_errors, 1);
}

/// A panicking engine still produces exactly one terminal event.
#[test]
fn engine_panic_ends_in_failed() {
    let tmp = TempDir::new().unwrap();
    make_files(tmp.path(), 2);

    let mut session = session_with(ScriptedEngine::new(vec![Step::Infected("a"), Step::Panic]));
    session.start(dir_request(&tmp)).unwrap();
    let messages = drain_to_terminal(&mut session);

    assert_eq!(terminal_state(&messages), JobState::Failed);
    assert!(session.result().is_none());
    assert!(!session.is_running());
    assert_eq!(
        session.history().latest().map(|e| e.outcome),
        Some(JobState::Failed)
    );
}

/// The denylist engine flags matching names in a real tree.
#[test]
fn denylist_engine_end_to_end() {
    let tmp = TempDir::new().unwrap();
    make_files(tmp.path(), 3);
    let sub = tmp.path().join("nested");
    fs::create_dir(&sub).unwrap();
    write_bytes(&sub.join("EVIL.exe"), 8);

    let mut session = session_with(DenylistEngine::from_names(["evil.exe"]));
    session.start(dir_request(&tmp)).unwrap();
    let messages = drain_to_terminal(&mut session);

    assert_eq!(terminal_state(&messages), JobState::Completed);
    let report = session.result().unwrap();
    assert_eq!(report.total_files, 4);
    assert_eq!(report.files_scanned, 4);
    assert_eq!(report.threats_found, 1);
    assert_eq!(report.findings[0].file_name(), "EVIL.exe");
    assert_eq!(report.engine, "denylist");
}

/// A target that disappears between request and start is skipped, counted,
/// and reported, and the rest of the request still completes.
#[test]
fn vanished_target_is_reported_as_skipped() {
    let tmp = TempDir::new().unwrap();
    let keep = tmp.path().join("keep");
    let gone = tmp.path().join("gone");
    fs::create_dir(&keep).unwrap();
    fs::create_dir(&gone).unwrap();
    make_files(&keep, 3);
    make_files(&gone, 2);

    let request = ScanRequest::from_paths(ScanType::Custom, [&keep, &gone]).unwrap();
    fs::remove_dir_all(&gone).unwrap();

    let mut session = session_with(ScriptedEngine::new(Vec::new()));
    session.start(request).unwrap();
    let messages = drain_to_terminal(&mut session);

    assert!(matches!(
        messages[0].event,
        ScanEvent::Started {
            total_files: 3,
            skipped_paths: 1
        }
    ));
    assert_eq!(terminal_state(&messages), JobState::Completed);
    assert_eq!(session.progress_snapshot().skipped_paths, 1);

    let report = session.result().unwrap();
    assert_eq!(report.total_files, 3);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].path, gone);
}

// ── Cancellation ─────────────────────────────────────────────────────────────

/// Stopping before the engine yields anything gives zero findings and a
/// Cancelled terminal event, never Completed.
#[test]
fn stop_before_first_finding_is_cancelled_with_nothing() {
    let tmp = TempDir::new().unwrap();
    make_files(tmp.path(), 5);

    let (engine, gate) = GatedEngine::new(0);
    let mut session = session_with(engine);
    session.start(dir_request(&tmp)).unwrap();
    wait_for_started(&mut session);

    session.stop();
    // Let the blocked engine produce one item; the worker must discard it.
    gate.send(()).unwrap();
    let messages = drain_to_terminal(&mut session);

    assert!(percents(&messages).is_empty());
    match messages.last().unwrap().event {
        ScanEvent::Cancelled {
            files_scanned,
            threats_found,
        } => {
            assert_eq!(files_scanned, 0);
            assert_eq!(threats_found, 0);
        }
        ref other => panic!("expected Cancelled, got {other:?}"),
    }
    assert!(session.result().is_none());
    assert_eq!(session.progress_snapshot().state, JobState::Cancelled);
}

/// start followed immediately by stop: at most one progress event, then
/// Cancelled.
#[test]
fn immediate_stop_yields_at_most_one_progress_event() {
    let tmp = TempDir::new().unwrap();
    make_files(tmp.path(), 5);

    let engine = ScriptedEngine::with_delay(
        vec![Step::Infected("a"); 5],
        Duration::from_millis(50),
    );
    let mut session = session_with(engine);
    session.start(dir_request(&tmp)).unwrap();
    session.stop();
    let messages = drain_to_terminal(&mut session);

    assert!(percents(&messages).len() <= 1);
    assert_eq!(terminal_state(&messages), JobState::Cancelled);
    assert!(!messages
        .iter()
        .any(|m| matches!(m.event, ScanEvent::Completed(_))));
}

/// stop on an idle session is a no-op.
#[test]
fn stop_without_job_is_harmless() {
    let mut session = session_with(ScriptedEngine::new(Vec::new()));
    session.stop();
    assert!(session.poll().is_empty());
    assert_eq!(session.progress_snapshot().state, JobState::Idle);
    assert_eq!(session.progress_snapshot().elapsed, Duration::ZERO);
}

// ── Start / rescan ───────────────────────────────────────────────────────────

/// A second start while the first job is running is rejected.
#[test]
fn concurrent_start_is_rejected() {
    let tmp = TempDir::new().unwrap();
    make_files(tmp.path(), 2);

    let (engine, gate) = GatedEngine::new(0);
    let mut session = session_with(engine);
    let first = session.start(dir_request(&tmp)).unwrap();

    match session.start(dir_request(&tmp)) {
        Err(CoreError::ScanInProgress(id)) => assert_eq!(id, first),
        other => panic!("expected ScanInProgress, got {other:?}"),
    }

    drop(gate);
    let messages = drain_to_terminal(&mut session);
    assert_eq!(terminal_state(&messages), JobState::Completed);

    // After the terminal event a plain start is accepted again.
    let second = session.start(dir_request(&tmp)).unwrap();
    assert!(second > first);
}

/// Rescan resets counters and elapsed time, and nothing from the old job is
/// observed afterwards.
#[test]
fn rescan_resets_and_supersedes() {
    let tmp = TempDir::new().unwrap();
    make_files(tmp.path(), 50);

    let engine = ScriptedEngine::with_delay(
        vec![Step::Infected("x"); 50],
        Duration::from_millis(20),
    );
    let mut session = session_with(engine);
    let first = session.start(dir_request(&tmp)).unwrap();
    wait_for_progress(&mut session, 2);
    assert!(session.progress_snapshot().files_scanned >= 2);

    let restart = session.rescan(dir_request(&tmp)).unwrap();
    let retired = restart.retired.expect("a job was running");
    assert_eq!(retired.job, first);
    assert_eq!(retired.outcome, JobState::Cancelled);
    assert!(!retired.abandoned);
    assert!(retired.files_scanned >= 2);

    let snap = session.progress_snapshot();
    assert_eq!(snap.job, Some(restart.job));
    assert_eq!(snap.files_scanned, 0);
    assert_eq!(snap.threats_found, 0);
    assert_eq!(snap.percent, 0);
    assert!(snap.elapsed < Duration::from_millis(500));

    let messages = wait_for_progress(&mut session, 1);
    assert!(messages.iter().all(|m| m.job == restart.job));
    let first_progress = messages
        .iter()
        .find_map(|m| match m.event {
            ScanEvent::Progress { files_scanned, .. } => Some(files_scanned),
            _ => None,
        })
        .unwrap();
    assert_eq!(first_progress, 1);

    session.stop();
    let rest = drain_to_terminal(&mut session);
    assert!(rest.iter().all(|m| m.job == restart.job));

    // The retired job is in history as cancelled.
    let outcomes: Vec<_> = session.history().iter().map(|e| (e.job, e.outcome)).collect();
    assert_eq!(
        outcomes,
        vec![
            (first, JobState::Cancelled),
            (restart.job, JobState::Cancelled)
        ]
    );
}

/// A worker stuck inside the engine is abandoned after the join timeout;
/// the new job runs unaffected.
#[test]
fn stuck_worker_is_abandoned_on_rescan() {
    let tmp = TempDir::new().unwrap();
    make_files(tmp.path(), 3);

    let (engine, gate) = GatedEngine::new(3);
    let engine = Arc::new(engine);
    let config = SessionConfig {
        join_timeout: Duration::from_millis(50),
        ..SessionConfig::default()
    };
    let mut session = ScanSession::with_config(engine.clone(), config);
    session.start(dir_request(&tmp)).unwrap();
    engine.wait_until_blocked();

    let restart = session.rescan(dir_request(&tmp)).unwrap();
    let retired = restart.retired.unwrap();
    assert!(retired.abandoned);
    assert_eq!(retired.outcome, JobState::Cancelled);

    let messages = drain_to_terminal(&mut session);
    assert!(messages.iter().all(|m| m.job == restart.job));
    assert_eq!(percents(&messages), vec![33, 66, 100]);
    assert_eq!(session.result().unwrap().threats_found, 3);

    // Release the abandoned worker; it must exit without touching the
    // session's state.
    gate.send(()).unwrap();
    drop(gate);
    std::thread::sleep(Duration::from_millis(50));
    assert!(session.poll().is_empty());
    assert_eq!(session.progress_snapshot().threats_found, 3);
}

/// Rescan after completion reports the completed job as the retired outcome.
#[test]
fn rescan_after_completion_keeps_completed_outcome() {
    let tmp = TempDir::new().unwrap();
    make_files(tmp.path(), 1);

    let mut session = session_with(ScriptedEngine::infected(1));
    let first = session.start(dir_request(&tmp)).unwrap();
    drain_to_terminal(&mut session);

    let restart = session.rescan_same().unwrap();
    let retired = restart.retired.unwrap();
    assert_eq!(retired.job, first);
    assert_eq!(retired.outcome, JobState::Completed);
    assert_ne!(restart.job, first);
    assert!(session.result().is_none(), "result resets with the new job");

    drain_to_terminal(&mut session);
    assert_eq!(session.history().len(), 2);
}

/// A job that finished while its events sat unread still hands its tally
/// and report to the rescan that replaces it.
#[test]
fn rescan_of_undrained_finished_job_keeps_its_tally() {
    let tmp = TempDir::new().unwrap();
    make_files(tmp.path(), 5);

    let mut session = session_with(ScriptedEngine::infected(5));
    let first = session.start(dir_request(&tmp)).unwrap();

    let deadline = std::time::Instant::now() + Duration::from_secs(30);
    while session.live_counters().map(|c| c.state) != Some(JobState::Completed) {
        assert!(std::time::Instant::now() < deadline, "job never completed");
        std::thread::sleep(Duration::from_millis(5));
    }
    // Nothing has been drained: the session still believes the job runs.
    assert_eq!(session.progress_snapshot().files_scanned, 0);

    let restart = session.rescan_same().unwrap();
    let retired = restart.retired.expect("a job was replaced");
    assert_eq!(retired.job, first);
    assert_eq!(retired.outcome, JobState::Completed);
    assert!(!retired.abandoned);
    assert_eq!(retired.files_scanned, 5);
    assert_eq!(retired.threats_found, 5);
    let report = retired.report.expect("queued report is handed back");
    assert_eq!(report.findings.len(), 5);
    assert_eq!(report.threats_found, 5);

    let entry = session.history().latest().unwrap();
    assert_eq!(entry.job, first);
    assert_eq!(entry.outcome, JobState::Completed);
    assert_eq!(entry.files_scanned, 5);
    assert_eq!(entry.threats_found, 5);

    drain_to_terminal(&mut session);
}

#[test]
fn rescan_same_without_history_fails() {
    let mut session = session_with(ScriptedEngine::new(Vec::new()));
    assert!(matches!(
        session.rescan_same(),
        Err(CoreError::NothingToRescan)
    ));
}

/// Job ids increase strictly across starts and rescans.
#[test]
fn job_ids_increase() {
    let tmp = TempDir::new().unwrap();
    let mut session = session_with(ScriptedEngine::new(Vec::new()));
    let a = session.start(dir_request(&tmp)).unwrap();
    let b = session.rescan(dir_request(&tmp)).unwrap().job;
    drain_to_terminal(&mut session);
    let c = session.start(dir_request(&tmp)).unwrap();
    assert_eq!(a, JobId(1));
    assert!(a < b && b < c);
}

// ── Back-pressure ────────────────────────────────────────────────────────────

/// With a one-slot channel the worker waits for the consumer; nothing is
/// lost or reordered.
#[test]
fn tiny_channel_applies_backpressure_without_loss() {
    let tmp = TempDir::new().unwrap();
    make_files(tmp.path(), 20);

    let config = SessionConfig {
        channel_capacity: 1,
        max_events_per_poll: 1,
        ..SessionConfig::default()
    };
    let mut session = ScanSession::with_config(Arc::new(ScriptedEngine::infected(20)), config);
    session.start(dir_request(&tmp)).unwrap();

    let deadline = std::time::Instant::now() + Duration::from_secs(30);
    let mut messages = Vec::new();
    while session.is_running() {
        assert!(std::time::Instant::now() < deadline, "scan stalled");
        let batch = session.poll();
        assert!(batch.len() <= 1);
        messages.extend(batch);
        std::thread::sleep(Duration::from_millis(2));
    }

    let p = percents(&messages);
    assert_eq!(p.len(), 20);
    assert_eq!(p.first(), Some(&5));
    assert_eq!(p.last(), Some(&100));
    assert_eq!(terminal_state(&messages), JobState::Completed);
}
