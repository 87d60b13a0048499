//! ScanWarden — background malware-scan orchestration.
//!
//! Thin binary entry point. All logic lives in the `scanwarden-core`
//! and `scanwarden-console` crates.

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use scanwarden_console::render::{result_line, results_table, status_line};
use scanwarden_console::{ConsolePhase, ConsoleState};
use scanwarden_core::engine::DenylistEngine;
use scanwarden_core::target::filter_picked_files;
use scanwarden_core::{ScanRequest, ScanType, SessionConfig};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

/// Frame interval of the render loop.
const TICK: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ScanKind {
    File,
    Custom,
    Full,
}

impl From<ScanKind> for ScanType {
    fn from(kind: ScanKind) -> Self {
        match kind {
            ScanKind::File => ScanType::File,
            ScanKind::Custom => ScanType::Custom,
            ScanKind::Full => ScanType::Full,
        }
    }
}

/// ScanWarden - scan files and folders in the background with live progress
#[derive(Parser, Debug)]
#[command(name = "scanwarden")]
#[command(about = "Scan files and folders against a denylist with live progress")]
#[command(version)]
struct Args {
    /// Files or folders to scan
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// JSON array of file names to flag as threats
    #[arg(short, long)]
    denylist: Option<PathBuf>,

    /// Scan type shown in labels and history
    #[arg(short = 't', long, value_enum, default_value_t = ScanKind::Custom)]
    scan_type: ScanKind,

    /// Drop folders and missing paths from the selection (file-picker mode)
    #[arg(long)]
    files_only: bool,

    /// Write the final report as JSON
    #[arg(long)]
    json: Option<PathBuf>,

    /// Write the final report as CSV
    #[arg(long)]
    csv: Option<PathBuf>,

    /// List clean files in the results table as well
    #[arg(long)]
    show_clean: bool,

    /// Restart the scan once after this many files have been scanned
    #[arg(long)]
    rescan_after: Option<u64>,

    /// How long a rescan waits for the previous worker before abandoning it
    #[arg(long, default_value_t = 1000)]
    join_timeout_ms: u64,

    /// Capacity of the progress channel
    #[arg(long, default_value_t = scanwarden_core::config::PROGRESS_CHANNEL_CAPACITY)]
    channel_capacity: usize,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // Initialise structured logging. Progress goes to stdout, logs to stderr.
    tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_writer(io::stderr)
        .init();

    tracing::info!("ScanWarden starting");

    let engine = match &args.denylist {
        Some(path) => DenylistEngine::load(path)
            .with_context(|| format!("failed to load denylist {}", path.display()))?,
        None => {
            tracing::warn!("No denylist given; every file will be reported clean");
            DenylistEngine::default()
        }
    };

    let paths = if args.files_only {
        filter_picked_files(args.paths.iter().cloned()).context("no files to scan")?
    } else {
        args.paths.clone()
    };
    let request = ScanRequest::from_paths(args.scan_type.into(), paths)
        .context("invalid scan selection")?;

    let config = SessionConfig {
        channel_capacity: args.channel_capacity,
        join_timeout: Duration::from_millis(args.join_timeout_ms),
        ..SessionConfig::default()
    };
    let mut state = ConsoleState::with_config(Arc::new(engine), config);
    tracing::info!("Using the {} engine", state.session().engine_name());
    state.start_scan(request).context("failed to start scan")?;

    run(&mut state, &args)?;

    let report = state.session().result().cloned();
    if let Some(report) = &report {
        if let Some(path) = &args.json {
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            report
                .write_json(BufWriter::new(file))
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!("JSON report written to {}", path.display());
        }
        if let Some(path) = &args.csv {
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            report
                .write_csv(BufWriter::new(file))
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!("CSV report written to {}", path.display());
        }
    } else if args.json.is_some() || args.csv.is_some() {
        tracing::warn!("Scan did not complete; no report written");
    }

    if state.scan_was_cancelled {
        return Ok(ExitCode::from(130));
    }
    match report {
        Some(r) if r.threats_found > 0 => Ok(ExitCode::from(1)),
        Some(_) => Ok(ExitCode::SUCCESS),
        None => bail!("scan failed: {}", state.scan_info),
    }
}

/// Render loop: drain messages once per tick until the scan leaves
/// `Scanning`, then print the results.
fn run(state: &mut ConsoleState, args: &Args) -> Result<()> {
    let mut out = io::stdout().lock();
    let mut rescan_pending = args.rescan_after;
    let mut last_line = String::new();

    while state.phase == ConsolePhase::Scanning {
        if state.process_scan_messages() {
            let line = status_line(state);
            if line != last_line {
                write!(out, "\r{line}")?;
                out.flush()?;
                last_line = line;
            }
        }

        if let Some(threshold) = rescan_pending {
            if state.files_scanned >= threshold {
                rescan_pending = None;
                writeln!(out)?;
                state.rescan_same().context("rescan failed")?;
                if let Some(r) = &state.last_retired {
                    tracing::info!(
                        "Restarted: {} {} after {} files{}",
                        r.job,
                        r.outcome.label(),
                        r.files_scanned,
                        if r.abandoned { " (worker abandoned)" } else { "" }
                    );
                }
            }
        }

        std::thread::sleep(TICK);
    }

    writeln!(out, "\r{}", status_line(state))?;
    if !state.results.is_empty() {
        let table = results_table(&state.results, !args.show_clean);
        write!(out, "\n{table}")?;
    }
    for (path, message) in &state.scan_errors {
        writeln!(out, "error: {path}: {message}")?;
    }
    if let Some(line) = result_line(state) {
        writeln!(out, "\n{line}")?;
    }
    Ok(())
}
