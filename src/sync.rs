//! Per-entity async exclusion.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// Keyed mutex serializing operations per guid.
///
/// Guards for different guids are independent; nothing here serializes
/// across unrelated guids. Entries whose guard is no longer held are
/// dropped on the next acquisition to keep the registry bounded.
#[derive(Debug, Default)]
pub struct GuidLocks {
    entries: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl GuidLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the exclusion scope for one guid, waiting if another
    /// holder is active.
    pub async fn acquire(&self, guid: Uuid) -> OwnedMutexGuard<()> {
        let entry = {
            let mut entries = self.entries.lock().await;
            entries.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(entries.entry(guid).or_default())
        };
        entry.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::GuidLocks;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;
    use uuid::Uuid;

    #[tokio::test]
    async fn same_guid_serializes() {
        let locks = Arc::new(GuidLocks::new());
        let guid = Uuid::new_v4();

        let held = locks.acquire(guid).await;
        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move { locks.acquire(guid).await })
        };

        // The second acquisition must block while the first guard lives.
        tokio::task::yield_now().await;
        assert!(!contender.is_finished());

        drop(held);
        let guard = timeout(Duration::from_secs(1), contender)
            .await
            .expect("second acquire should complete once the guard drops")
            .expect("acquire task should not panic");
        drop(guard);
    }

    #[tokio::test]
    async fn different_guids_are_independent() {
        let locks = GuidLocks::new();
        let first = locks.acquire(Uuid::new_v4()).await;
        let second = timeout(Duration::from_secs(1), locks.acquire(Uuid::new_v4()))
            .await
            .expect("unrelated guid must not block");
        drop(first);
        drop(second);
    }

    #[tokio::test]
    async fn released_entries_are_pruned() {
        let locks = GuidLocks::new();
        let guid = Uuid::new_v4();
        drop(locks.acquire(guid).await);
        drop(locks.acquire(Uuid::new_v4()).await);

        let entries = locks.entries.lock().await;
        assert!(entries.len() <= 1);
    }
}
