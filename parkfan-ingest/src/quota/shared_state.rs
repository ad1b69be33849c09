//! Distributed shared state used by the Rate Governor
//!
//! Several ingest processes share one upstream quota, so the quota block flag
//! lives in a store every instance can see. Any backend with atomic
//! check-and-set and TTL expiry can implement `SharedState`.
//! `InMemorySharedState` serves single-process deployments and tests.

use crate::error::SourceError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Key/value store with TTL expiry and atomic primitives
#[async_trait]
pub trait SharedState: Send + Sync {
    /// Value for `key`, or `None` if missing or expired
    async fn get(&self, key: &str) -> Result<Option<String>, SourceError>;

    /// Unconditionally set `key` with an expiry
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration)
        -> Result<(), SourceError>;

    /// Set `key` only if absent (or expired); returns whether it was set
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration)
        -> Result<bool, SourceError>;

    /// Remaining lifetime of `key`, or `None` if missing or expired
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, SourceError>;

    /// Atomically increment a counter; the TTL applies when the counter is created
    async fn incr_with_ttl(&self, key: &str, ttl: Duration) -> Result<u64, SourceError>;
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Process-local `SharedState` backed by a mutex-guarded map
#[derive(Debug, Default)]
pub struct InMemorySharedState {
    entries: Mutex<HashMap<String, Entry>>,
}

impl InMemorySharedState {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SharedState for InMemorySharedState {
    async fn get(&self, key: &str) -> Result<Option<String>, SourceError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), SourceError> {
        let expires_at = Instant::now() + ttl;
        self.entries.lock().await.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, SourceError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        if entries.get(key).is_some_and(|e| e.is_live(now)) {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: now + ttl,
            },
        );
        Ok(true)
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, SourceError> {
        let now = Instant::now();
        let entries = self.entries.lock().await;
        Ok(entries
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.expires_at - now))
    }

    async fn incr_with_ttl(&self, key: &str, ttl: Duration) -> Result<u64, SourceError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;

        let current = match entries.get(key) {
            Some(entry) if entry.is_live(now) => entry
                .value
                .parse::<u64>()
                .map_err(|e| SourceError::SharedState(format!("counter {}: {}", key, e)))?,
            _ => 0,
        };
        let next = current + 1;

        let expires_at = match entries.get(key) {
            Some(entry) if entry.is_live(now) => entry.expires_at,
            _ => now + ttl,
        };
        entries.insert(
            key.to_string(),
            Entry {
                value: next.to_string(),
                expires_at,
            },
        );
        Ok(next)
    }
}
