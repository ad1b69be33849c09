//! Rate governance for sources with strict upstream quotas
//!
//! Two layers:
//! - a local rolling-window counter owned by each governor instance; once the
//!   per-minute budget is spent, callers wait for the window to roll over
//! - a distributed block flag in `SharedState`; an upstream 429 blocks the
//!   source for a fixed cool-down across every process sharing the store
//!
//! While blocked, calls fail before any network I/O. The block lifts when
//! the shared lease expires; there is no explicit reset.

pub mod shared_state;

pub use shared_state::{InMemorySharedState, SharedState};

use crate::error::SourceError;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, warn};

/// Length of the local rate window
pub const WINDOW: Duration = Duration::from_secs(60);

/// Observable governor state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GovernorState {
    Open,
    Blocked { remaining: Duration },
}

/// Per-instance request counter for one 60-second window
#[derive(Debug, Default)]
struct RollingWindow {
    started: Option<Instant>,
    count: u32,
}

impl RollingWindow {
    /// Claim a slot, or return how long until the current window rolls over
    fn try_claim(&mut self, limit: u32, now: Instant) -> Result<(), Duration> {
        match self.started {
            Some(started) if now < started + WINDOW => {
                if self.count >= limit {
                    return Err(started + WINDOW - now);
                }
            }
            _ => {
                self.started = Some(now);
                self.count = 0;
            }
        }
        self.count += 1;
        Ok(())
    }
}

/// Local limiter plus distributed circuit breaker for one source
pub struct RateGovernor {
    source_id: &'static str,
    limit: u32,
    window: Mutex<RollingWindow>,
    shared: Arc<dyn SharedState>,
    block_duration: Duration,
}

impl RateGovernor {
    pub fn new(
        source_id: &'static str,
        requests_per_minute: u32,
        block_duration: Duration,
        shared: Arc<dyn SharedState>,
    ) -> Self {
        Self {
            source_id,
            limit: requests_per_minute.max(1),
            window: Mutex::new(RollingWindow::default()),
            shared,
            block_duration,
        }
    }

    fn block_key(&self) -> String {
        format!("parkfan:quota-block:{}", self.source_id)
    }

    fn usage_key(&self) -> String {
        format!("parkfan:quota-usage:{}", self.source_id)
    }

    /// Current state as seen through the shared block flag
    pub async fn state(&self) -> Result<GovernorState, SourceError> {
        match self.shared.ttl(&self.block_key()).await? {
            Some(remaining) => Ok(GovernorState::Blocked { remaining }),
            None => Ok(GovernorState::Open),
        }
    }

    /// Fail fast with `QuotaExceeded` while the shared block is active
    pub async fn ensure_open(&self) -> Result<(), SourceError> {
        match self.state().await? {
            GovernorState::Open => Ok(()),
            GovernorState::Blocked { remaining } => {
                debug!(
                    source = self.source_id,
                    remaining_secs = remaining.as_secs(),
                    "Source blocked, skipping request"
                );
                Err(SourceError::QuotaExceeded {
                    source_id: self.source_id.to_string(),
                    retry_after: remaining,
                })
            }
        }
    }

    /// Wait for a local slot
    ///
    /// Each sleep lasts at most the remainder of the current window. The
    /// window lock is never held while sleeping; after waking the caller
    /// competes for a slot again.
    pub async fn acquire(&self) -> Result<(), SourceError> {
        self.ensure_open().await?;

        loop {
            let claimed = self.window.lock().await.try_claim(self.limit, Instant::now());
            match claimed {
                Ok(()) => break,
                Err(delay) => {
                    debug!(
                        source = self.source_id,
                        wait_ms = delay.as_millis(),
                        "Local quota spent, waiting for window to roll over"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }

        // The block may have been set by another instance while we waited
        self.ensure_open().await?;

        let fleet_usage = self.shared.incr_with_ttl(&self.usage_key(), WINDOW).await?;
        if fleet_usage > u64::from(self.limit) {
            warn!(
                source = self.source_id,
                fleet_usage,
                limit = self.limit,
                "Requests across all instances exceed the per-minute quota"
            );
        }
        Ok(())
    }

    /// Enter the BLOCKED state for the configured cool-down
    ///
    /// An already-active block is left untouched so concurrent 429s cannot
    /// extend the lease.
    pub async fn record_quota_violation(&self) -> Result<(), SourceError> {
        let set = self
            .shared
            .set_if_absent(&self.block_key(), "429", self.block_duration)
            .await?;
        if set {
            error!(
                source = self.source_id,
                cooldown_secs = self.block_duration.as_secs(),
                "Upstream quota exceeded, blocking source"
            );
        }
        Ok(())
    }

    /// Run one upstream request under the governor
    ///
    /// A `QuotaExceeded` from `op` (HTTP 429) trips the distributed block and
    /// is returned with the cool-down as `retry_after`.
    pub async fn call<F, Fut, T>(&self, op: F) -> Result<T, SourceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, SourceError>>,
    {
        self.acquire().await?;
        match op().await {
            Err(err) if err.is_blocked() => {
                self.record_quota_violation().await?;
                Err(SourceError::QuotaExceeded {
                    source_id: self.source_id.to_string(),
                    retry_after: self.block_duration,
                })
            }
            other => other,
        }
    }
}
