/// Plain-text rendering of [`ConsoleState`] — labels, progress bar, table.
///
/// Everything here is a pure function of the state so it can be tested
/// without a terminal.
use crate::state::{ConsolePhase, ConsoleState, ResultRow, Severity};
use std::fmt::Write as _;
use std::time::Duration;

/// Width of the `[####----]` bar, excluding brackets.
pub const PROGRESS_BAR_WIDTH: usize = 30;

/// Longest current-file path shown in the status line.
const CURRENT_FILE_WIDTH: usize = 50;

/// Format elapsed time as `mm:ss`. Minutes keep counting past 59.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Format a count with thousands separators: `1234567` → `"1,234,567"`.
pub fn format_count(count: u64) -> String {
    if count < 1_000 {
        return count.to_string();
    }
    let s = count.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, ch) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(ch);
    }
    result.chars().rev().collect()
}

/// `[#########---------------------]  30%`
pub fn progress_bar(percent: u8, width: usize) -> String {
    let percent = usize::from(percent.min(100));
    let filled = width * percent / 100;
    format!(
        "[{}{}] {:>3}%",
        "#".repeat(filled),
        "-".repeat(width - filled),
        percent
    )
}

/// Shorten `path` to at most `max_len` characters, replacing the middle
/// with "...".
pub fn truncate_path(path: &str, max_len: usize) -> String {
    let chars: Vec<char> = path.chars().collect();
    if chars.len() <= max_len || max_len < 5 {
        return path.to_string();
    }
    let half = (max_len - 3) / 2;
    let head: String = chars[..half].iter().collect();
    let tail: String = chars[chars.len() - half..].iter().collect();
    format!("{head}...{tail}")
}

/// One-line status for the current phase.
pub fn status_line(state: &ConsoleState) -> String {
    match state.phase {
        ConsolePhase::Idle => "Ready".to_string(),
        ConsolePhase::Scanning | ConsolePhase::Results => {
            let mut line = format!(
                "{} {} | Files Scanned: {} | Threats Detected: {} | Elapsed Time: {}",
                state.scan_info,
                progress_bar(state.progress_percent, PROGRESS_BAR_WIDTH),
                format_count(state.files_scanned),
                format_count(state.threats_found),
                format_elapsed(state.elapsed),
            );
            if state.scan_error_count > 0 {
                let _ = write!(line, " | {} errors", format_count(state.scan_error_count));
            }
            if state.skipped_paths > 0 {
                let _ = write!(line, " | {} skipped", format_count(state.skipped_paths));
            }
            if let Some(current) = &state.current_file {
                let _ = write!(line, " | {}", truncate_path(current, CURRENT_FILE_WIDTH));
            }
            line
        }
    }
}

/// The result line with a severity marker, once the scan has finished.
pub fn result_line(state: &ConsoleState) -> Option<String> {
    state.result_label.as_ref().map(|(text, severity)| {
        let marker = match severity {
            Severity::Clean => "\u{2713}",
            Severity::Threat => "!!",
            Severity::Warning => "\u{23f9}",
        };
        format!("{marker} {text}")
    })
}

/// Render the results table. With `infected_only`, clean rows are left out.
pub fn results_table(rows: &[ResultRow], infected_only: bool) -> String {
    const NAME_WIDTH: usize = 40;

    let mut out = format!("{:<NAME_WIDTH$}  {:<8}  {}\n", "File", "Status", "Threat");
    let _ = writeln!(out, "{}", "-".repeat(NAME_WIDTH + 2 + 8 + 2 + 16));
    for row in rows
        .iter()
        .filter(|r| !infected_only || r.is_highlighted())
    {
        let marker = if row.is_highlighted() { "*" } else { " " };
        let _ = writeln!(
            out,
            "{:<NAME_WIDTH$}  {:<8}  {}{}",
            truncate_path(&row.file_name, NAME_WIDTH),
            row.status.label(),
            row.threat,
            marker,
        );
    }
    out
}
