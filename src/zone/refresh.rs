use std::time::{Duration, SystemTime};

/// Refresh state machine driving Secondary and Stub zones. A zone
/// starts `Idle` until its first transfer succeeds; after that the
/// SOA's refresh/retry/expire timers govern the polling cadence.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshState {
    /// No successful transfer has ever completed.
    Idle,
    /// A transfer attempt is in flight.
    Refreshing,
    /// The most recent transfer attempt failed; `since` records when the
    /// zone last had good data (if any), `attempts` since then.
    Failed { since: Option<SystemTime>, attempts: u32 },
    /// The SOA `expire` interval elapsed with no successful refresh: the
    /// zone must stop answering authoritatively.
    Expired,
}

impl Default for RefreshState {
    fn default() -> Self {
        RefreshState::Idle
    }
}

/// The SOA-derived timers that drive [`RefreshState`] transitions for a
/// Secondary/Stub zone.
#[derive(Debug, Clone, Copy)]
pub struct RefreshTimers {
    pub refresh: Duration,
    pub retry: Duration,
    pub expire: Duration,
}

impl RefreshTimers {
    pub fn from_soa(refresh: u32, retry: u32, expire: u32) -> Self {
        RefreshTimers {
            refresh: Duration::from_secs(refresh as u64),
            retry: Duration::from_secs(retry as u64),
            expire: Duration::from_secs(expire as u64),
        }
    }

    /// The interval to wait before the next transfer attempt, given the
    /// current state: `refresh` after a success, `retry` after a failure.
    pub fn next_interval(&self, state: &RefreshState) -> Duration {
        match state {
            RefreshState::Failed { .. } => self.retry,
            _ => self.refresh,
        }
    }
}

/// Advances `state` in response to a transfer outcome observed at `now`,
/// given the zone's last-successful-transfer timestamp `last_success`
/// (`None` if it has never synced) and its `expire` timer.
pub fn on_transfer_result(
    state: &RefreshState,
    success: bool,
    now: SystemTime,
    last_success: Option<SystemTime>,
    expire: Duration,
) -> RefreshState {
    if success {
        return RefreshState::Idle;
    }
    let attempts = match state {
        RefreshState::Failed { attempts, .. } => attempts + 1,
        _ => 1,
    };
    let elapsed_since_success = last_success.and_then(|t| now.duration_since(t).ok());
    match elapsed_since_success {
        Some(elapsed) if elapsed >= expire => RefreshState::Expired,
        _ => RefreshState::Failed { since: last_success, attempts },
    }
}
