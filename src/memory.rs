use crate::algorithms::{Admission, SlidingWindow, WindowStore};
use crate::error::LimiterError;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// In-process window store.
///
/// Holds the same state the Redis script keeps, guarded by one mutex, so an
/// evaluation is atomic with respect to every other evaluation in this
/// process. It gives no cross-process guarantee; share it via `Clone`.
#[derive(Clone, Default)]
pub struct MemoryStore {
    windows: Arc<Mutex<HashMap<String, LocalWindow>>>,
}

struct LocalWindow {
    timestamps: VecDeque<u64>,
    /// Idle keys are dropped once `now_ms` passes this
    expires_at: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries currently recorded for `key`, expired ones included until the
    /// next evaluation or cleanup prunes them.
    pub fn recorded(&self, key: &str) -> Result<usize, LimiterError> {
        let windows = self.lock()?;
        Ok(windows.get(key).map_or(0, |w| w.timestamps.len()))
    }

    /// Drop keys that have been idle for a full window, like key TTL in Redis.
    pub fn cleanup_expired(&self, now_ms: u64) -> Result<usize, LimiterError> {
        let mut windows = self.lock()?;
        let initial_count = windows.len();

        windows.retain(|_, window| window.expires_at > now_ms);

        Ok(initial_count - windows.len())
    }

    pub fn len(&self) -> Result<usize, LimiterError> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, LimiterError> {
        Ok(self.lock()?.is_empty())
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, LocalWindow>>, LimiterError> {
        self.windows.lock().map_err(|_| {
            LimiterError::Internal("Failed to acquire lock on window state".to_string())
        })
    }
}

#[async_trait]
impl WindowStore for MemoryStore {
    async fn evaluate_and_record(
        &self,
        key: &str,
        limit: u64,
        window: Duration,
        now_ms: u64,
    ) -> Result<Admission, LimiterError> {
        let algo = SlidingWindow::new(limit, window);
        let mut windows = self.lock()?;

        if windows.get(key).is_some_and(|w| w.expires_at <= now_ms) {
            windows.remove(key);
        }

        let entry = windows.entry(key.to_string()).or_insert_with(|| LocalWindow {
            timestamps: VecDeque::new(),
            expires_at: 0,
        });

        let admission = algo.evaluate(&mut entry.timestamps, now_ms);
        if admission.admitted {
            // An admission from a clock that stepped back must not shorten the key's life
            let expires_at = now_ms.saturating_add(algo.window_ms());
            entry.expires_at = entry.expires_at.max(expires_at);
        } else if entry.timestamps.is_empty() {
            // limit == 0 never records; do not keep an empty entry around
            windows.remove(key);
        }

        Ok(admission)
    }

    async fn reset(&self, key: &str) -> Result<(), LimiterError> {
        self.lock()?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(10);

    #[tokio::test]
    async fn test_keys_are_independent() {
        let store = MemoryStore::new();

        assert!(store.evaluate_and_record("a", 1, WINDOW, 1_000).await.unwrap().admitted);
        assert!(store.evaluate_and_record("b", 1, WINDOW, 1_000).await.unwrap().admitted);
        assert!(!store.evaluate_and_record("a", 1, WINDOW, 1_001).await.unwrap().admitted);
        assert_eq!(store.len().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_cleanup_drops_idle_keys() {
        let store = MemoryStore::new();
        store.evaluate_and_record("idle", 5, WINDOW, 1_000).await.unwrap();
        store.evaluate_and_record("busy", 5, WINDOW, 9_000).await.unwrap();

        assert_eq!(store.cleanup_expired(10_999).unwrap(), 0);
        assert_eq!(store.cleanup_expired(11_000).unwrap(), 1);
        assert_eq!(store.recorded("idle").unwrap(), 0);
        assert_eq!(store.recorded("busy").unwrap(), 1);
    }

    #[tokio::test]
    async fn test_reset_frees_the_window() {
        let store = MemoryStore::new();
        store.evaluate_and_record("k", 1, WINDOW, 0).await.unwrap();
        assert!(!store.evaluate_and_record("k", 1, WINDOW, 1).await.unwrap().admitted);

        store.reset("k").await.unwrap();

        assert!(store.evaluate_and_record("k", 1, WINDOW, 2).await.unwrap().admitted);
    }

    #[tokio::test]
    async fn test_clock_stepping_back_keeps_newer_entries() {
        let store = MemoryStore::new();

        assert!(store.evaluate_and_record("k", 2, WINDOW, 3_000).await.unwrap().admitted);
        assert!(store.evaluate_and_record("k", 2, WINDOW, 2_500).await.unwrap().admitted);

        // 2_500 has left the window, 3_000 has not
        let at_12_600 = store.evaluate_and_record("k", 2, WINDOW, 12_600).await.unwrap();
        assert!(at_12_600.admitted);
        assert_eq!(at_12_600.count, 2);

        let at_12_601 = store.evaluate_and_record("k", 2, WINDOW, 12_601).await.unwrap();
        assert!(!at_12_601.admitted);
        assert_eq!(at_12_601.retry_after_ms, 399);
        assert_eq!(store.cleanup_expired(12_999).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_huge_window_does_not_overflow() {
        let store = MemoryStore::new();
        let window = Duration::from_secs(u64::MAX);

        assert!(store.evaluate_and_record("k", 1, window, 1_000).await.unwrap().admitted);
        assert!(!store.evaluate_and_record("k", 1, window, 2_000).await.unwrap().admitted);
        assert_eq!(store.cleanup_expired(u64::MAX - 1).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_evaluations_never_overadmit() {
        let store = MemoryStore::new();
        let now = 50_000;

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .evaluate_and_record("contended", 1, WINDOW, now)
                        .await
                        .unwrap()
                        .admitted
                })
            })
            .collect();

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 1);
    }
}
