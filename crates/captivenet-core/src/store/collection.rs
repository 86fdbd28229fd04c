// ── Keyed reactive collection ──
//
// Concurrent storage with O(1) lookups and a `watch`-published snapshot
// that read-only projections subscribe to.

use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;

/// Concurrent, reactive collection of one entity type.
///
/// Entities are stored behind `Arc` and never mutated in place: updates
/// clone, modify and swap, so every snapshot handed out stays frozen.
/// Every mutation republishes the snapshot.
pub(crate) struct EntityCollection<K, T>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    by_key: DashMap<K, Arc<T>>,
    snapshot: watch::Sender<Arc<Vec<Arc<T>>>>,
}

impl<K, T> EntityCollection<K, T>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));

        Self {
            by_key: DashMap::new(),
            snapshot,
        }
    }

    /// Insert or replace an entity. Returns `true` if the key was new.
    pub(crate) fn upsert(&self, key: K, entity: T) -> bool {
        let is_new = self.by_key.insert(key, Arc::new(entity)).is_none();
        self.publish();
        is_new
    }

    /// Insert and hand back the stored entity.
    pub(crate) fn insert_new(&self, key: K, entity: T) -> Arc<T> {
        let stored = Arc::new(entity);
        self.by_key.insert(key, Arc::clone(&stored));
        self.publish();
        stored
    }

    pub(crate) fn get(&self, key: &K) -> Option<Arc<T>> {
        self.by_key.get(key).map(|r| Arc::clone(r.value()))
    }

    pub(crate) fn contains(&self, key: &K) -> bool {
        self.by_key.contains_key(key)
    }

    /// Apply a fallible change to a copy of the entity and store it only
    /// on success. Returns `None` when the key is unknown.
    ///
    /// The entry stays write-locked from read to swap, so concurrent
    /// updates of one key serialize. `f` must not touch this collection.
    pub(crate) fn try_update<R, E>(
        &self,
        key: &K,
        f: impl FnOnce(&mut T) -> Result<R, E>,
    ) -> Option<Result<(R, Arc<T>), E>> {
        let mut entry = self.by_key.get_mut(key)?;
        let mut draft = T::clone(entry.value());
        let outcome = f(&mut draft).map(|out| {
            let stored = Arc::new(draft);
            *entry.value_mut() = Arc::clone(&stored);
            (out, stored)
        });
        // Release the shard before publishing, which iterates every shard.
        drop(entry);
        if outcome.is_ok() {
            self.publish();
        }
        Some(outcome)
    }

    /// Current snapshot (cheap `Arc` clone).
    pub(crate) fn snapshot(&self) -> Arc<Vec<Arc<T>>> {
        self.snapshot.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Arc<Vec<Arc<T>>>> {
        self.snapshot.subscribe()
    }

    pub(crate) fn len(&self) -> usize {
        self.by_key.len()
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn publish(&self) {
        // Collect under the channel lock so the last publisher always sees
        // the last swap. `send_modify` updates even with zero receivers.
        self.snapshot.send_modify(|snap| {
            *snap = Arc::new(self.by_key.iter().map(|r| Arc::clone(r.value())).collect());
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn upsert_reports_new_keys() {
        let col: EntityCollection<u64, String> = EntityCollection::new();
        assert!(col.upsert(1, "hello".into()));
        assert!(!col.upsert(1, "world".into()));
        assert_eq!(*col.get(&1).unwrap(), "world");
        assert_eq!(col.len(), 1);
    }

    #[test]
    fn snapshot_follows_mutations() {
        let col: EntityCollection<u64, String> = EntityCollection::new();
        let rx = col.subscribe();
        assert!(col.snapshot().is_empty());
        col.upsert(1, "a".into());
        col.upsert(2, "b".into());
        assert_eq!(col.snapshot().len(), 2);
        assert!(rx.has_changed().unwrap());
    }

    #[test]
    fn failed_update_leaves_entity_and_snapshot_alone() {
        let col: EntityCollection<u64, String> = EntityCollection::new();
        col.upsert(1, "a".into());
        let rx = col.subscribe();
        let out = col.try_update(&1, |s: &mut String| {
            s.push('!');
            Err::<(), _>("nope")
        });
        assert_eq!(out.unwrap().unwrap_err(), "nope");
        assert_eq!(*col.get(&1).unwrap(), "a");
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn concurrent_updates_of_one_key_are_not_lost() {
        let col: EntityCollection<u64, u64> = EntityCollection::new();
        col.upsert(1, 0);
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..250 {
                        col.try_update(&1, |n| {
                            *n += 1;
                            Ok::<_, ()>(())
                        })
                        .unwrap()
                        .unwrap();
                    }
                });
            }
        });
        assert_eq!(*col.get(&1).unwrap(), 2_000);
        assert_eq!(*col.snapshot()[0], 2_000);
    }

    #[test]
    fn update_swaps_without_touching_old_snapshots() {
        let col: EntityCollection<u64, String> = EntityCollection::new();
        col.upsert(1, "a".into());
        let old = col.snapshot();
        let (len, stored) = col
            .try_update(&1, |s: &mut String| {
                s.push('b');
                Ok::<_, ()>(s.len())
            })
            .unwrap()
            .unwrap();
        assert_eq!(len, 2);
        assert_eq!(*stored, "ab");
        assert_eq!(*old[0], "a");
        assert_eq!(*col.snapshot()[0], "ab");
    }

    #[test]
    fn unknown_key_is_none() {
        let col: EntityCollection<u64, String> = EntityCollection::new();
        assert!(col.try_update(&9, |_| Ok::<_, ()>(())).is_none());
        assert!(!col.contains(&9));
    }
}
