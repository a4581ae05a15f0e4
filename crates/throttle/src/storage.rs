//! Counter store backends for throttling state.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::ThrottleError;

/// Snapshot of one counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Counter {
    pub count: u64,
    /// Time left before the counter resets.
    pub expires_in: Duration,
}

/// Result of an atomic increment-and-compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted { count: u64, remaining: u64 },
    Rejected { retry_after: Duration },
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted { .. })
    }
}

/// Storage for per-key request counters with a time-to-live.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Current counter for `key`, if a live window exists.
    async fn get(&self, key: &str) -> Result<Option<Counter>, ThrottleError>;

    /// Count one request against `key` unless `limit` is already reached.
    ///
    /// The window opens on the first admitted request and lasts `window`.
    /// Rejected requests do not consume quota. Implementations must perform
    /// the compare and the increment as one atomic step.
    async fn increment(
        &self,
        key: &str,
        limit: u64,
        window: Duration,
    ) -> Result<Admission, ThrottleError>;

    /// Drop the counter for `key`.
    async fn expire(&self, key: &str) -> Result<(), ThrottleError>;

    /// Drop every counter.
    async fn clear(&self) -> Result<(), ThrottleError>;

    /// Remove counters whose window has elapsed. Returns how many were removed.
    async fn purge_expired(&self) -> Result<usize, ThrottleError>;
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    count: u64,
    expires_at: Instant,
}

/// Process-local counter store.
#[derive(Default)]
pub struct InMemoryCounterStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn get(&self, key: &str) -> Result<Option<Counter>, ThrottleError> {
        let now = Instant::now();
        let entries = self.entries.lock().await;
        Ok(entries
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| Counter {
                count: entry.count,
                expires_in: entry.expires_at - now,
            }))
    }

    async fn increment(
        &self,
        key: &str,
        limit: u64,
        window: Duration,
    ) -> Result<Admission, ThrottleError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;

        let entry = entries.entry(key.to_string()).or_insert(Entry {
            count: 0,
            expires_at: now + window,
        });
        if entry.expires_at <= now {
            *entry = Entry {
                count: 0,
                expires_at: now + window,
            };
        }

        if entry.count >= limit {
            return Ok(Admission::Rejected {
                retry_after: entry.expires_at - now,
            });
        }

        entry.count += 1;
        Ok(Admission::Admitted {
            count: entry.count,
            remaining: limit - entry.count,
        })
    }

    async fn expire(&self, key: &str) -> Result<(), ThrottleError> {
        self.entries.lock().await.remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), ThrottleError> {
        self.entries.lock().await.clear();
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize, ThrottleError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        let removed = before - entries.len();
        debug!(removed, "purged expired throttle counters");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const HOUR: Duration = Duration::from_secs(3600);

    #[tokio::test]
    async fn counts_up_to_the_limit() {
        let store = InMemoryCounterStore::new();

        for expected in 1..=3 {
            let admission = store.increment("k", 3, HOUR).await.unwrap();
            assert_eq!(
                admission,
                Admission::Admitted {
                    count: expected,
                    remaining: 3 - expected
                }
            );
        }

        let rejected = store.increment("k", 3, HOUR).await.unwrap();
        assert!(!rejected.is_admitted());
        assert_eq!(store.get("k").await.unwrap().unwrap().count, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn window_resets_after_ttl() {
        let store = InMemoryCounterStore::new();
        store.increment("k", 1, HOUR).await.unwrap();

        tokio::time::advance(Duration::from_secs(1800)).await;
        match store.increment("k", 1, HOUR).await.unwrap() {
            Admission::Rejected { retry_after } => {
                assert_eq!(retry_after, Duration::from_secs(1800))
            }
            other => panic!("expected rejection, got {other:?}"),
        }

        tokio::time::advance(Duration::from_secs(1800)).await;
        assert!(store.get("k").await.unwrap().is_none());
        assert!(store.increment("k", 1, HOUR).await.unwrap().is_admitted());
    }

    #[tokio::test]
    async fn expire_and_clear_drop_counters() {
        let store = InMemoryCounterStore::new();
        store.increment("a", 5, HOUR).await.unwrap();
        store.increment("b", 5, HOUR).await.unwrap();

        store.expire("a").await.unwrap();
        assert!(store.get("a").await.unwrap().is_none());
        assert!(store.get("b").await.unwrap().is_some());

        store.clear().await.unwrap();
        assert!(store.get("b").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn purge_removes_only_elapsed_windows() {
        let store = InMemoryCounterStore::new();
        store
            .increment("short", 5, Duration::from_secs(10))
            .await
            .unwrap();
        store.increment("long", 5, HOUR).await.unwrap();

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert!(store.get("long").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn concurrent_requests_never_exceed_limit() {
        let store = Arc::new(InMemoryCounterStore::new());
        let mut handles = Vec::new();
        for _ in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.increment("shared", 20, HOUR).await.unwrap()
            }));
        }

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap().is_admitted() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 20);
    }
}
