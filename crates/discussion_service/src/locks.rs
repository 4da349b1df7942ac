//! Per-discussion exclusive locks
//!
//! One async mutex per discussion id. A mutating request holds the guard
//! across the whole load, mutate and save sequence; requests for different
//! discussions never touch the same mutex. Entries exist only while some
//! request holds or waits for them.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::error::{Result, ServiceError};

type LockMap = DashMap<Uuid, Arc<Mutex<()>>>;

#[derive(Clone, Default)]
pub struct DiscussionLocks {
    locks: Arc<LockMap>,
}

/// Exclusive access to one discussion. Releasing it drops the registry
/// entry when nobody else is waiting.
#[derive(Debug)]
pub struct DiscussionGuard {
    discussion: Uuid,
    mutex: Arc<Mutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<LockMap>,
}

impl Drop for DiscussionGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        release_entry(&self.locks, self.discussion, &self.mutex);
    }
}

/// Removes the entry if the only handles left are the map's and `mutex`.
/// Runs under the shard lock, so an acquirer cannot clone the entry
/// between the check and the removal.
fn release_entry(locks: &LockMap, discussion: Uuid, mutex: &Arc<Mutex<()>>) {
    locks.remove_if(&discussion, |_, entry| {
        Arc::ptr_eq(entry, mutex) && Arc::strong_count(entry) == 2
    });
}

impl DiscussionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits up to `timeout` for exclusive access to `discussion`.
    pub async fn acquire(&self, discussion: Uuid, timeout: Duration) -> Result<DiscussionGuard> {
        let mutex = Arc::clone(&self.locks.entry(discussion).or_default());
        let started = Instant::now();

        match tokio::time::timeout(timeout, Arc::clone(&mutex).lock_owned()).await {
            Ok(guard) => {
                tracing::debug!(
                    discussion_id = %discussion,
                    waited_ms = started.elapsed().as_millis() as u64,
                    "DiscussionLocks: acquired"
                );
                Ok(DiscussionGuard {
                    discussion,
                    mutex,
                    guard: Some(guard),
                    locks: Arc::clone(&self.locks),
                })
            }
            Err(_) => {
                release_entry(&self.locks, discussion, &mutex);
                let waited_ms = started.elapsed().as_millis() as u64;
                tracing::warn!(
                    discussion_id = %discussion,
                    waited_ms,
                    "DiscussionLocks: contention, giving up"
                );
                Err(ServiceError::LockContention {
                    discussion,
                    waited_ms,
                })
            }
        }
    }

    /// Number of discussions currently locked or waited on.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_second_acquire_times_out_while_held() {
        let locks = DiscussionLocks::new();
        let id = Uuid::new_v4();
        let _held = locks.acquire(id, Duration::from_millis(50)).await.unwrap();

        let err = locks
            .acquire(id, Duration::from_millis(20))
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::LockContention { discussion, .. } if discussion == id));
        assert_eq!(locks.len(), 1);
    }

    #[tokio::test]
    async fn test_distinct_discussions_do_not_contend() {
        let locks = DiscussionLocks::new();
        let _a = locks
            .acquire(Uuid::new_v4(), Duration::from_millis(50))
            .await
            .unwrap();

        let b = locks.acquire(Uuid::new_v4(), Duration::from_millis(50)).await;

        assert!(b.is_ok());
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn test_lock_is_reusable_after_release() {
        let locks = DiscussionLocks::new();
        let id = Uuid::new_v4();

        drop(locks.acquire(id, Duration::from_millis(50)).await.unwrap());
        let again = locks.acquire(id, Duration::from_millis(50)).await;

        assert!(again.is_ok());
    }

    #[tokio::test]
    async fn test_released_entries_are_dropped() {
        let locks = DiscussionLocks::new();

        for _ in 0..100 {
            let guard = locks
                .acquire(Uuid::new_v4(), Duration::from_millis(50))
                .await
                .unwrap();
            drop(guard);
        }

        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_entry_survives_while_a_waiter_is_queued() {
        let locks = DiscussionLocks::new();
        let id = Uuid::new_v4();
        let held = locks.acquire(id, Duration::from_secs(1)).await.unwrap();

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move { locks.acquire(id, Duration::from_secs(5)).await })
        };
        // map, holder handle and guard, waiter handle and pending lock
        while Arc::strong_count(&held.mutex) < 5 {
            tokio::task::yield_now().await;
        }
        drop(held);

        let second = waiter.await.unwrap().unwrap();
        assert_eq!(locks.len(), 1);
        drop(second);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_timed_out_waiter_does_not_leak_entry() {
        let locks = DiscussionLocks::new();
        let id = Uuid::new_v4();
        let held = locks.acquire(id, Duration::from_millis(50)).await.unwrap();

        assert!(locks.acquire(id, Duration::from_millis(10)).await.is_err());
        drop(held);

        assert!(locks.is_empty());
    }
}
