//! A pool of warm instances keyed by the hash of their code.
//!
//! Instantiating a module is expensive compared to resetting an existing
//! instance, so instances of frequently called contracts are kept around.
//! Each pooled instance sits behind its own mutex, which is held from the
//! reset to the end of its use. The pool never hands out the instance itself,
//! only access to it for the duration of a closure. An instance that fails to
//! reset is dropped from the pool.
use crate::{constants::WARM_POOL_CAPACITY, executor::Instance};
use slab::Slab;
use std::{
    collections::{HashMap, VecDeque},
    marker::PhantomData,
    sync::{Arc, Mutex},
};

/// Hash of the code an instance was created from.
pub type CodeHash = [u8; 32];

struct Entry<I> {
    hash:     CodeHash,
    instance: Arc<Mutex<I>>,
}

pub struct WarmInstancePool<I, H> {
    capacity: usize,
    entries:  Slab<Entry<I>>,
    by_hash:  HashMap<CodeHash, usize>,
    /// Slab keys, least recently used first.
    recency:  VecDeque<usize>,
    phantom:  PhantomData<fn(H)>,
}

impl<I: Instance<H>, H> Default for WarmInstancePool<I, H> {
    fn default() -> Self { Self::new(WARM_POOL_CAPACITY) }
}

impl<I: Instance<H>, H> WarmInstancePool<I, H> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Slab::with_capacity(capacity),
            by_hash: HashMap::with_capacity(capacity),
            recency: VecDeque::with_capacity(capacity),
            phantom: PhantomData,
        }
    }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn contains(&self, hash: &CodeHash) -> bool { self.by_hash.contains_key(hash) }

    fn clean_instance(instance: &Mutex<I>) {
        match instance.lock() {
            Ok(mut guard) => {
                guard.clean();
            }
            Err(poisoned) => {
                poisoned.into_inner().clean();
            }
        }
    }

    fn touch(&mut self, key: usize) {
        self.recency.retain(|&k| k != key);
        self.recency.push_back(key);
    }

    fn remove_key(&mut self, key: usize) -> Option<Arc<Mutex<I>>> {
        let entry = self.entries.try_remove(key)?;
        self.by_hash.remove(&entry.hash);
        self.recency.retain(|&k| k != key);
        Some(entry.instance)
    }

    /// Put an instance in the pool, replacing and cleaning any instance for the
    /// same code. If the pool is over capacity afterwards, the least recently
    /// used instances are evicted.
    pub fn save(&mut self, hash: CodeHash, instance: I) {
        if let Some(&key) = self.by_hash.get(&hash) {
            if let Some(old) = self.remove_key(key) {
                Self::clean_instance(&old);
            }
        }
        let key = self.entries.insert(Entry {
            hash,
            instance: Arc::new(Mutex::new(instance)),
        });
        self.by_hash.insert(hash, key);
        self.recency.push_back(key);
        while self.entries.len() > self.capacity {
            let Some(oldest) = self.recency.front().copied() else {
                break;
            };
            if let Some(evicted) = self.remove_key(oldest) {
                log::debug!(target: "vm/pool", "Evicted least recently used instance.");
                Self::clean_instance(&evicted);
            }
        }
    }

    /// Reset the warm instance for the given code and run `f` on it. The
    /// instance stays locked from the reset until `f` returns, so `f` always
    /// starts from the initial state. Returns `None` if there is no instance
    /// for the code or it failed to reset, in which case it is evicted.
    pub fn with_warm_instance<R>(
        &mut self,
        hash: &CodeHash,
        f: impl FnOnce(&mut I) -> R,
    ) -> Option<R> {
        let key = *self.by_hash.get(hash)?;
        let instance = Arc::clone(&self.entries.get(key)?.instance);
        let outcome = match instance.lock() {
            Ok(mut guard) => {
                if guard.reset() {
                    Some(f(&mut *guard))
                } else {
                    None
                }
            }
            Err(_) => None,
        };
        match outcome {
            Some(result) => {
                self.touch(key);
                Some(result)
            }
            None => {
                log::debug!(target: "vm/pool", "Warm instance failed to reset, evicting.");
                if let Some(evicted) = self.remove_key(key) {
                    Self::clean_instance(&evicted);
                }
                None
            }
        }
    }

    /// Remove and clean the instance for the given code.
    pub fn evict(&mut self, hash: &CodeHash) -> bool {
        let Some(&key) = self.by_hash.get(hash) else {
            return false;
        };
        match self.remove_key(key) {
            Some(instance) => {
                Self::clean_instance(&instance);
                true
            }
            None => false,
        }
    }

    /// Remove and clean all instances.
    pub fn clear(&mut self) {
        for entry in self.entries.drain() {
            Self::clean_instance(&entry.instance);
        }
        self.by_hash.clear();
        self.recency.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{BreakpointValue, ExecutorResult, InstanceHandle};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Records what the pool does to it.
    struct FakeInstance {
        id:          u64,
        resets:      usize,
        /// Set by a use, cleared by a reset.
        dirty:       bool,
        cleaned:     Arc<AtomicUsize>,
        fail_resets: bool,
    }

    impl Instance<()> for FakeInstance {
        fn id(&self) -> InstanceHandle { InstanceHandle::from(self.id) }

        fn has_memory(&self) -> bool { false }

        fn get_memory(&self) -> Option<Vec<u8>> { None }

        fn set_memory(&mut self, _data: &[u8]) -> bool { false }

        fn call_function(&mut self, _name: &str) -> ExecutorResult<()> { Ok(()) }

        fn has_function(&self, _name: &str) -> bool { false }

        fn get_function_names(&self) -> Vec<String> { Vec::new() }

        fn validate_void_function(&self, _name: &str) -> ExecutorResult<()> { Ok(()) }

        fn get_points_used(&mut self) -> u64 { 0 }

        fn set_points_used(&mut self, _points: u64) {}

        fn set_gas_limit(&mut self, _limit: u64) {}

        fn get_breakpoint_value(&self) -> BreakpointValue { BreakpointValue::None }

        fn set_breakpoint_value(&mut self, _value: BreakpointValue) {}

        fn cache(&self) -> ExecutorResult<Vec<u8>> { Ok(Vec::new()) }

        fn reset(&mut self) -> bool {
            self.resets += 1;
            self.dirty = false;
            !self.fail_resets
        }

        fn clean(&mut self) -> bool {
            self.cleaned.fetch_add(1, Ordering::SeqCst);
            true
        }

        fn is_function_imported(&self, _name: &str) -> bool { false }

        fn host_data(&self) -> Option<&()> { None }

        fn host_data_mut(&mut self) -> Option<&mut ()> { None }
    }

    fn fake(id: u64, cleaned: &Arc<AtomicUsize>) -> FakeInstance {
        FakeInstance {
            id,
            resets: 0,
            dirty: false,
            cleaned: Arc::clone(cleaned),
            fail_resets: false,
        }
    }

    fn hash(n: u8) -> CodeHash { [n; 32] }

    fn pool(capacity: usize) -> WarmInstancePool<FakeInstance, ()> { WarmInstancePool::new(capacity) }

    #[test]
    fn every_use_starts_from_a_reset_instance() {
        let cleaned = Arc::new(AtomicUsize::new(0));
        let mut pool = pool(2);
        pool.save(hash(1), fake(1, &cleaned));
        for round in 1..=5 {
            let seen = pool.with_warm_instance(&hash(1), |i| {
                let was_dirty = i.dirty;
                i.dirty = true;
                (was_dirty, i.resets)
            });
            assert_eq!(seen, Some((false, round)));
        }
    }

    #[test]
    fn warm_instances_are_reset() {
        let cleaned = Arc::new(AtomicUsize::new(0));
        let mut pool = pool(2);
        pool.save(hash(1), fake(1, &cleaned));
        assert_eq!(pool.with_warm_instance(&hash(1), |i| i.resets), Some(1));
        assert_eq!(pool.with_warm_instance(&hash(1), |i| i.resets), Some(2));
        assert!(pool.with_warm_instance(&hash(2), |i| i.resets).is_none());
        assert_eq!(cleaned.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn least_recently_used_is_evicted() {
        let cleaned = Arc::new(AtomicUsize::new(0));
        let mut pool = pool(2);
        pool.save(hash(1), fake(1, &cleaned));
        pool.save(hash(2), fake(2, &cleaned));
        // Make 1 the most recently used.
        assert!(pool.with_warm_instance(&hash(1), |_| ()).is_some());
        pool.save(hash(3), fake(3, &cleaned));
        assert_eq!(pool.len(), 2);
        assert!(pool.contains(&hash(1)));
        assert!(!pool.contains(&hash(2)));
        assert!(pool.contains(&hash(3)));
        assert_eq!(cleaned.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn save_replaces_and_cleans() {
        let cleaned = Arc::new(AtomicUsize::new(0));
        let mut pool = pool(2);
        pool.save(hash(1), fake(1, &cleaned));
        pool.save(hash(1), fake(2, &cleaned));
        assert_eq!(pool.len(), 1);
        assert_eq!(cleaned.load(Ordering::SeqCst), 1);
        assert_eq!(pool.with_warm_instance(&hash(1), |i| i.id), Some(2));
    }

    #[test]
    fn failed_reset_evicts() {
        let cleaned = Arc::new(AtomicUsize::new(0));
        let mut pool = pool(2);
        let mut instance = fake(1, &cleaned);
        instance.fail_resets = true;
        pool.save(hash(1), instance);
        assert!(pool.with_warm_instance(&hash(1), |i| i.id).is_none());
        assert!(pool.is_empty());
        assert_eq!(cleaned.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn evict_and_clear_clean() {
        let cleaned = Arc::new(AtomicUsize::new(0));
        let mut pool = pool(10);
        for n in 0..5 {
            pool.save(hash(n), fake(u64::from(n), &cleaned));
        }
        assert!(pool.evict(&hash(3)));
        assert!(!pool.evict(&hash(3)));
        assert_eq!(cleaned.load(Ordering::SeqCst), 1);
        pool.clear();
        assert!(pool.is_empty());
        assert_eq!(cleaned.load(Ordering::SeqCst), 5);
    }
}
