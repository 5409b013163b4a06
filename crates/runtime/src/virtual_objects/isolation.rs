//! Per-object locking.
//!
//! Each object owns one `RwLock` around its [`ObjectEntry`]. Exclusive
//! invocations hold the write guard for their whole duration; shared
//! invocations only take the read guard long enough to clone the entry.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{OwnedRwLockWriteGuard, RwLock};

use super::entry::ObjectEntry;
use super::object::ObjectId;

/// A lock on a virtual object's entry.
#[derive(Debug, Clone, Default)]
pub struct ObjectLock {
    entry: Arc<RwLock<ObjectEntry>>,
}

impl ObjectLock {
    /// Create a new lock around an empty entry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the write guard.
    pub async fn write(&self) -> OwnedRwLockWriteGuard<ObjectEntry> {
        Arc::clone(&self.entry).write_owned().await
    }

    /// Clone the current entry under a brief read guard.
    pub async fn snapshot(&self) -> ObjectEntry {
        self.entry.read().await.clone()
    }
}

/// Manages locks across multiple objects.
#[derive(Debug, Default)]
pub struct LockManager {
    locks: Arc<RwLock<HashMap<ObjectId, ObjectLock>>>,
}

impl LockManager {
    /// Create a new lock manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the lock for an object.
    pub async fn get_lock(&self, object_id: &ObjectId) -> ObjectLock {
        {
            let locks = self.locks.read().await;
            if let Some(lock) = locks.get(object_id) {
                return lock.clone();
            }
        }

        // Re-check under the write guard so racing creators share one lock.
        let mut locks = self.locks.write().await;
        locks
            .entry(object_id.clone())
            .or_insert_with(ObjectLock::new)
            .clone()
    }

    /// Get the lock for an object without creating one.
    pub async fn peek(&self, object_id: &ObjectId) -> Option<ObjectLock> {
        self.locks.read().await.get(object_id).cloned()
    }

    /// IDs of every object that has a lock.
    pub async fn object_ids(&self) -> Vec<ObjectId> {
        let mut ids: Vec<ObjectId> = self.locks.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::time::Duration;

    use super::*;

    fn id(key: &str) -> ObjectId {
        ObjectId::new("count", key)
    }

    async fn set_count(lock: &ObjectLock, value: i64) {
        let mut guard = lock.write().await;
        if let Some(state) = guard.state_mut() {
            state.set("count", value);
        }
    }

    #[tokio::test]
    async fn test_new_lock_holds_resident_entry() {
        let lock = ObjectLock::new();

        let guard = lock.write().await;
        assert!(guard.tier().is_resident());
    }

    #[tokio::test]
    async fn test_write_is_visible_to_snapshot() {
        let lock = ObjectLock::new();
        set_count(&lock, 5).await;

        let entry = lock.snapshot().await;
        assert_eq!(entry.domain_keys(), vec!["count"]);
    }

    #[tokio::test]
    async fn test_write_guard_excludes_other_writers() {
        let lock = ObjectLock::new();
        let _held = lock.write().await;

        let other = lock.clone();
        let attempt = tokio::time::timeout(Duration::from_millis(20), other.write()).await;
        assert!(attempt.is_err());
    }

    #[tokio::test]
    async fn test_lock_manager_returns_same_lock() {
        let manager = LockManager::new();

        let lock1 = manager.get_lock(&id("obj-1")).await;
        let lock2 = manager.get_lock(&id("obj-1")).await;

        set_count(&lock1, 7).await;
        let entry = lock2.snapshot().await;
        assert_eq!(entry.tier().state().and_then(|s| s.get_i64("count")), Some(7));
        assert_eq!(manager.object_ids().await.len(), 1);
    }

    #[tokio::test]
    async fn test_lock_manager_concurrent_creation_shares_lock() {
        let manager = Arc::new(LockManager::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let manager = Arc::clone(&manager);
                tokio::spawn(async move {
                    let lock = manager.get_lock(&id("hot")).await;
                    let mut guard = lock.write().await;
                    if let Some(state) = guard.state_mut() {
                        let next = state.get_i64("count").unwrap_or(0).saturating_add(1);
                        state.set("count", next);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let entry = manager.get_lock(&id("hot")).await.snapshot().await;
        assert_eq!(entry.tier().state().and_then(|s| s.get_i64("count")), Some(8));
        assert_eq!(manager.object_ids().await, vec![id("hot")]);
    }

    #[tokio::test]
    async fn test_lock_manager_peek_does_not_create() {
        let manager = LockManager::new();

        assert!(manager.peek(&id("obj-1")).await.is_none());
        assert!(manager.object_ids().await.is_empty());

        let _ = manager.get_lock(&id("obj-1")).await;
        let _ = manager.get_lock(&id("obj-2")).await;

        assert!(manager.peek(&id("obj-1")).await.is_some());
        assert_eq!(manager.object_ids().await, vec![id("obj-1"), id("obj-2")]);
    }
}
