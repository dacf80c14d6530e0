//! Keyed mutual exclusion with acquisition timeout.
//!
//! One `tokio::sync::Mutex` per key, held in a map behind a `std::sync::Mutex`
//! the way the desktop crate keeps its `WRITE_OPERATION_STATE` cache, except the
//! map itself is an explicitly owned component rather than a process-global
//! `LazyLock`. An entry is dropped once no other task holds a reference to it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::error::StoraxError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// A held lock; the path/location is released when this guard is dropped.
pub struct LockGuard {
    key: String,
    _guard: OwnedMutexGuard<()>,
}

impl LockGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Per-key mutex registry with timeout-bounded acquisition.
pub struct LockManager {
    timeout: Duration,
    entries: StdMutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl LockManager {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            entries: StdMutex::new(HashMap::new()),
        }
    }

    fn entry_for(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut entries = self.entries.lock().expect("lock manager map poisoned");
        entries.entry(key.to_string()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
    }

    /// Acquires the mutex for `key`, waiting up to the configured timeout.
    ///
    /// Declines with `LockTimeout` rather than retrying internally; retry is a
    /// caller decision.
    pub async fn acquire(&self, key: &str) -> Result<LockGuard, StoraxError> {
        let mutex = self.entry_for(key);
        let guard = match tokio::time::timeout(self.timeout, mutex.lock_owned()).await {
            Ok(guard) => guard,
            Err(_) => {
                log::warn!("lock acquisition timed out after {:?} for key {key}", self.timeout);
                return Err(StoraxError::LockTimeout { key: key.to_string() });
            }
        };
        log::debug!("acquired lock for key {key}");

        Ok(LockGuard {
            key: key.to_string(),
            _guard: guard,
        })
    }

    /// Releases the map entry for `key` if nothing else references it.
    ///
    /// Locks are released implicitly when their `LockGuard` drops; this only
    /// reclaims the bookkeeping entry so the map does not grow unboundedly.
    /// Safe to call at any time, including while the lock is held elsewhere.
    pub fn compact(&self, key: &str) {
        let mut entries = self.entries.lock().expect("lock manager map poisoned");
        if let Some(mutex) = entries.get(key) {
            // strong_count == 1 means only the map itself references this mutex.
            if Arc::strong_count(mutex) == 1 {
                entries.remove(key);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("lock manager map poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration as StdDuration;

    #[tokio::test]
    async fn same_key_serializes() {
        let manager = Arc::new(LockManager::new(StdDuration::from_secs(2)));
        let counter = Arc::new(AtomicUsize::new(0));
        let max_concurrent = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let manager = manager.clone();
            let counter = counter.clone();
            let max_concurrent = max_concurrent.clone();
            handles.push(tokio::spawn(async move {
                let _guard = manager.acquire("same-key").await.unwrap();
                let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
                max_concurrent.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(StdDuration::from_millis(5)).await;
                counter.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(max_concurrent.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn distinct_keys_run_concurrently() {
        let manager = Arc::new(LockManager::new(StdDuration::from_secs(2)));
        let start = tokio::time::Instant::now();

        let a = {
            let manager = manager.clone();
            tokio::spawn(async move {
                let _g = manager.acquire("a").await.unwrap();
                tokio::time::sleep(StdDuration::from_millis(50)).await;
            })
        };
        let b = {
            let manager = manager.clone();
            tokio::spawn(async move {
                let _g = manager.acquire("b").await.unwrap();
                tokio::time::sleep(StdDuration::from_millis(50)).await;
            })
        };
        a.await.unwrap();
        b.await.unwrap();
        assert!(start.elapsed() < StdDuration::from_millis(95));
    }

    #[tokio::test]
    async fn timeout_declines() {
        let manager = Arc::new(LockManager::new(StdDuration::from_millis(20)));
        let held = manager.acquire("k").await.unwrap();

        let manager2 = manager.clone();
        let result = tokio::spawn(async move { manager2.acquire("k").await }).await.unwrap();
        assert!(matches!(result, Err(StoraxError::LockTimeout { .. })));
        drop(held);
    }

    #[tokio::test]
    async fn compact_drops_unheld_entry() {
        let manager = LockManager::new(StdDuration::from_secs(1));
        {
            let _guard = manager.acquire("k").await.unwrap();
            assert_eq!(manager.len(), 1);
        }
        manager.compact("k");
        assert!(manager.is_empty());
    }
}
