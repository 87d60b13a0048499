/// Bounded in-memory history of finished scans.
use crate::progress::{JobId, JobState};
use crate::target::ScanType;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;

/// One finished (or superseded) scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub job: JobId,
    pub scan_type: ScanType,
    pub started_at: DateTime<Local>,
    pub outcome: JobState,
    pub files_scanned: u64,
    pub threats_found: u64,
    pub elapsed: Duration,
}

/// Most-recent-last list of finished scans, capped at `limit` entries.
#[derive(Debug, Clone)]
pub struct ScanHistory {
    entries: VecDeque<HistoryEntry>,
    limit: usize,
}

impl ScanHistory {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            entries: VecDeque::with_capacity(limit.min(64)),
            limit,
        }
    }

    /// Append an entry, evicting the oldest when at capacity.
    pub fn record(&mut self, entry: HistoryEntry) {
        if self.entries.len() >= self.limit {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }
}
