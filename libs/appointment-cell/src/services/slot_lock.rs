// libs/appointment-cell/src/services/slot_lock.rs
use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SlotKey {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub time_slot: String,
}

impl SlotKey {
    pub fn new(doctor_id: Uuid, date: NaiveDate, time_slot: &str) -> Self {
        Self { doctor_id, date, time_slot: time_slot.to_string() }
    }
}

/// Per-slot critical sections for booking within one process.
///
/// Bookings for different slots never wait on each other. Entries are
/// dropped once the last holder or waiter releases them.
#[derive(Default)]
pub struct SlotLocks {
    locks: Mutex<HashMap<SlotKey, Arc<AsyncMutex<()>>>>,
}

impl SlotLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(self: &Arc<Self>, key: SlotKey) -> SlotGuard {
        let slot = {
            let mut locks = self.locks.lock();
            locks.entry(key.clone()).or_default().clone()
        };

        let guard = slot.lock_owned().await;
        SlotGuard {
            registry: Arc::clone(self),
            key,
            guard: Some(guard),
        }
    }

    /// Number of slots currently locked or waited on.
    pub fn in_use(&self) -> usize {
        self.locks.lock().len()
    }

    fn release(&self, key: &SlotKey) {
        let mut locks = self.locks.lock();
        // One reference is the map's own; anything more is a waiter.
        if locks.get(key).is_some_and(|slot| Arc::strong_count(slot) == 1) {
            locks.remove(key);
        }
    }
}

pub struct SlotGuard {
    registry: Arc<SlotLocks>,
    key: SlotKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        // The owned guard holds an Arc to the slot mutex; drop it first.
        self.guard.take();
        self.registry.release(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn key(slot: &str) -> SlotKey {
        SlotKey::new(Uuid::nil(), NaiveDate::from_ymd_opt(2030, 1, 7).unwrap(), slot)
    }

    #[tokio::test]
    async fn same_slot_is_exclusive() {
        let locks = Arc::new(SlotLocks::new());
        let first = locks.acquire(key("09:00")).await;

        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move { locks.acquire(key("09:00")).await; })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(first);
        tokio::time::timeout(Duration::from_secs(1), contender).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn different_slots_do_not_block() {
        let locks = Arc::new(SlotLocks::new());
        let _nine = locks.acquire(key("09:00")).await;

        let ten = tokio::time::timeout(Duration::from_millis(100), locks.acquire(key("10:00"))).await;
        assert!(ten.is_ok());
    }

    #[tokio::test]
    async fn released_entries_are_removed() {
        let locks = Arc::new(SlotLocks::new());
        {
            let _guard = locks.acquire(key("09:00")).await;
            assert_eq!(locks.in_use(), 1);
        }
        assert_eq!(locks.in_use(), 0);
    }
}
