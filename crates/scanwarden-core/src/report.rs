/// Final scan tally and its export formats.
use crate::engine::Finding;
use crate::enumerate::SkippedPath;
use crate::error::Result;
use crate::progress::JobId;
use crate::target::ScanType;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::io::Write;
use std::time::Duration;

/// Everything a completed job produced.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub job: JobId,
    pub scan_type: ScanType,
    pub engine: String,
    pub started_at: DateTime<Local>,
    pub duration: Duration,
    /// Enumerated denominator. Approximate.
    pub total_files: u64,
    /// Engine results recorded (clean and infected).
    pub files_scanned: u64,
    pub threats_found: u64,
    pub engine_errors: u64,
    pub skipped: Vec<SkippedPath>,
    /// Infected findings only, in engine order.
    pub findings: Vec<Finding>,
}

impl ScanReport {
    /// A completed report is always shown at 100 %.
    pub fn percent(&self) -> u8 {
        100
    }

    pub fn is_clean(&self) -> bool {
        self.threats_found == 0
    }

    /// Pretty-printed JSON.
    pub fn write_json<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// One CSV row per infected finding: `path,status,threat`.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(["path", "status", "threat"])?;
        for finding in &self.findings {
            let path = finding.path.to_string_lossy();
            wtr.write_record([&*path, finding.status.label(), finding.threat.as_str()])?;
        }
        wtr.flush()?;
        Ok(())
    }
}
