/// Session configuration and the named bounds it defaults to.
use std::time::Duration;

/// Maximum number of scan messages that may queue up in a job's channel.
///
/// A consumer that drains once per frame at ~20 fps and 300 messages per
/// drain clears a full queue in under a second. When it falls further behind
/// the worker blocks on `send` instead of consuming unbounded heap.
pub const PROGRESS_CHANNEL_CAPACITY: usize = 4_096;

/// How long `rescan` waits for a superseded worker before abandoning it.
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Maximum scan messages applied per `ScanSession::poll` call.
///
/// Keeps a single poll short even when a backlog has built up.
pub const MAX_EVENTS_PER_POLL: usize = 300;

/// Maximum entries retained in the scan history.
pub const MAX_HISTORY_ENTRIES: usize = 50;

/// Tunables for a [`ScanSession`](crate::session::ScanSession).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Capacity of each job's bounded message channel.
    pub channel_capacity: usize,
    /// Bounded wait for a stopped worker during `rescan`.
    pub join_timeout: Duration,
    /// Per-poll message budget.
    pub max_events_per_poll: usize,
    /// History cap; oldest entries are evicted first.
    pub history_limit: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            channel_capacity: PROGRESS_CHANNEL_CAPACITY,
            join_timeout: DEFAULT_JOIN_TIMEOUT,
            max_events_per_poll: MAX_EVENTS_PER_POLL,
            history_limit: MAX_HISTORY_ENTRIES,
        }
    }
}

impl SessionConfig {
    /// Clamp values that would make the session unusable.
    ///
    /// A zero-capacity channel turns every `send` into a rendezvous and a
    /// zero poll budget never drains anything.
    pub fn normalised(mut self) -> Self {
        self.channel_capacity = self.channel_capacity.max(1);
        self.max_events_per_poll = self.max_events_per_poll.max(1);
        self.history_limit = self.history_limit.max(1);
        self
    }
}
