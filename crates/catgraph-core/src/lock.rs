//! Per-key mutual exclusion with reference-counted bookkeeping
//!
//! A registry hands out one lock per key. Distinct keys never block each
//! other, the same thread may re-acquire a key it already holds, and the
//! bookkeeping for a key is dropped as soon as nobody holds or waits for
//! it, so memory tracks the number of active keys only.

use std::collections::HashMap;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

#[derive(Default)]
struct SlotState {
    owner: Option<ThreadId>,
    depth: usize,
}

#[derive(Default)]
struct Slot {
    state: Mutex<SlotState>,
    released: Condvar,
}

impl Slot {
    fn lock_state(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct Entry {
    slot: Arc<Slot>,
    /// Holders plus waiters. Only touched under the registry mutex.
    refs: usize,
}

/// Registry of keyed, reentrant locks.
pub struct KeyedLockRegistry<K> {
    entries: Mutex<HashMap<K, Entry>>,
}

impl<K> KeyedLockRegistry<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        KeyedLockRegistry {
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock_entries(&self) -> MutexGuard<'_, HashMap<K, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until the calling thread holds `key`.
    pub fn acquire(&self, key: K) -> KeyedLockGuard<'_, K> {
        let slot = {
            let mut entries = self.lock_entries();
            let entry = entries.entry(key.clone()).or_insert_with(|| Entry {
                slot: Arc::new(Slot::default()),
                refs: 0,
            });
            entry.refs += 1;
            Arc::clone(&entry.slot)
        };

        let me = thread::current().id();
        let mut state = slot.lock_state();
        while state.owner.is_some_and(|owner| owner != me) {
            state = slot
                .released
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        state.owner = Some(me);
        state.depth += 1;
        drop(state);

        KeyedLockGuard {
            registry: self,
            key,
            slot,
            _not_send: PhantomData,
        }
    }

    /// Number of keys currently held or waited on.
    pub fn active_keys(&self) -> usize {
        self.lock_entries().len()
    }

    fn release(&self, key: &K, slot: &Slot) {
        {
            let mut state = slot.lock_state();
            state.depth = state.depth.saturating_sub(1);
            if state.depth == 0 {
                state.owner = None;
                slot.released.notify_one();
            }
        }

        // Check-and-remove happens under the registry mutex, so a
        // concurrent acquire either sees the entry and bumps `refs`
        // first, or finds nothing and creates a fresh slot.
        let mut entries = self.lock_entries();
        if let Some(entry) = entries.get_mut(key) {
            entry.refs -= 1;
            if entry.refs == 0 {
                entries.remove(key);
            }
        }
    }
}

impl<K> Default for KeyedLockRegistry<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Holds one acquisition of a key; released on drop.
///
/// Ownership is tied to the acquiring thread, so the guard is not `Send`.
pub struct KeyedLockGuard<'a, K>
where
    K: Eq + Hash + Clone,
{
    registry: &'a KeyedLockRegistry<K>,
    key: K,
    slot: Arc<Slot>,
    _not_send: PhantomData<*const ()>,
}

impl<K> KeyedLockGuard<'_, K>
where
    K: Eq + Hash + Clone,
{
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Release this acquisition explicitly.
    pub fn release(self) {
        drop(self);
    }
}

impl<K> Drop for KeyedLockGuard<'_, K>
where
    K: Eq + Hash + Clone,
{
    fn drop(&mut self) {
        self.registry.release(&self.key, &self.slot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_reentrant_acquire() {
        let registry = KeyedLockRegistry::new();
        let outer = registry.acquire("a");
        let inner = registry.acquire("a");
        assert_eq!(registry.active_keys(), 1);
        assert_eq!(*inner.key(), "a");
        inner.release();
        assert_eq!(registry.active_keys(), 1);
        outer.release();
        assert_eq!(registry.active_keys(), 0);
    }

    #[test]
    fn test_distinct_keys_do_not_block() {
        let registry = Arc::new(KeyedLockRegistry::new());
        let _held = registry.acquire("a".to_string());

        let other = Arc::clone(&registry);
        let handle = thread::spawn(move || {
            let guard = other.acquire("b".to_string());
            guard.release();
        });
        handle.join().unwrap();
        assert_eq!(registry.active_keys(), 1);
    }

    #[test]
    fn test_same_key_excludes() {
        let registry = Arc::new(KeyedLockRegistry::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let overlap = Arc::new(AtomicBool::new(false));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let inside = Arc::clone(&inside);
                let overlap = Arc::clone(&overlap);
                thread::spawn(move || {
                    for _ in 0..20 {
                        let _guard = registry.acquire(7u32);
                        if inside.fetch_add(1, Ordering::SeqCst) != 0 {
                            overlap.store(true, Ordering::SeqCst);
                        }
                        thread::sleep(Duration::from_micros(50));
                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(!overlap.load(Ordering::SeqCst));
        assert_eq!(registry.active_keys(), 0);
    }

    #[test]
    fn test_bookkeeping_drains_under_contention() {
        let registry = Arc::new(KeyedLockRegistry::new());
        let handles: Vec<_> = (0..16)
            .map(|t| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    for i in 0..200u32 {
                        let key = (t + i) % 5;
                        let outer = registry.acquire(key);
                        let inner = registry.acquire(key);
                        drop(inner);
                        drop(outer);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.active_keys(), 0);
    }
}
