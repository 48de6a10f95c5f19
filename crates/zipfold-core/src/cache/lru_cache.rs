//! Size-bounded LRU cache with exclusive, lazily built entries.
//!
//! Every slot carries its own lock (the *exclusivity token*). A
//! [`CacheHandle`] holds that lock for as long as it lives, so at most one
//! caller at a time can look at a given key's value. The value itself is built
//! by the factory passed to [`LruCache::borrow_or_add`], but only when the
//! handle's [`value`](CacheHandle::value) is first called, after the
//! structural lock has been released. Slow factories therefore never block
//! lookups of unrelated keys.
//!
//! # Locking
//!
//! - The structural lock guards the recency index and the size total.
//! - A slot's token guards its value.
//!
//! A hit promotes the slot, drops the structural lock and only then waits for
//! the token. Eviction is different: it takes the victim's token while still
//! holding the structural lock, so a borrowed entry is never evicted and
//! insertions that need room wait for the borrower to finish.
//!
//! A thread holding a handle must not call back into the same cache, not even
//! for [`LruCache::len`]: an insertion on another thread may be holding the
//! structural lock while it waits for that handle's token.
//!
//! # Failures
//!
//! A factory runs at most once per slot. If it fails, the error is stored in
//! the slot and every later borrower sees the same [`CacheError::Construction`]
//! until the slot is evicted.

use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex};
use tracing::{debug, error, trace, warn};

use super::stats::{CacheStats, CacheStatsSnapshot};
use crate::error::{BoxError, CacheError};

/// Lifecycle of a slot's value.
enum SlotState<V> {
    Unbuilt,
    Building,
    Built(V),
    Failed(CacheError),
    /// The slot has been removed from the index; waiters must look again.
    Evicted,
}

type Token<V> = Arc<Mutex<SlotState<V>>>;

struct Slot<V> {
    size: u64,
    token: Token<V>,
}

struct CacheState<K: Hash + Eq, V> {
    /// Key lookup and recency order in one structure.
    index: lru::LruCache<K, Slot<V>>,
    current_size: u64,
    disposed: bool,
}

/// Thread-safe LRU cache bounded by the sum of declared entry sizes.
///
/// After every mutating call, the sum of entry sizes is strictly below
/// [`size_limit`](Self::size_limit). An insertion whose size alone reaches the
/// limit is rejected with [`CacheError::Oversized`].
///
/// # Example
///
/// ```
/// use zipfold_core::cache::LruCache;
///
/// let cache: LruCache<String, Vec<u8>> = LruCache::new("example", 1024);
/// let mut handle = cache
///     .borrow_or_add("greeting".to_string(), 5, || Ok::<_, std::io::Error>(b"hello".to_vec()))
///     .unwrap();
/// assert_eq!(handle.value().unwrap().as_slice(), b"hello");
/// ```
pub struct LruCache<K: Hash + Eq, V> {
    name: &'static str,
    size_limit: u64,
    state: Mutex<CacheState<K, V>>,
    stats: CacheStats,
}

impl<K: Hash + Eq, V> LruCache<K, V> {
    /// Creates an empty cache. `name` labels log lines and statistics.
    pub fn new(name: &'static str, size_limit: u64) -> Self {
        Self {
            name,
            size_limit,
            state: Mutex::new(CacheState {
                index: lru::LruCache::unbounded(),
                current_size: 0,
                disposed: false,
            }),
            stats: CacheStats::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn size_limit(&self) -> u64 {
        self.size_limit
    }

    /// Sum of the declared sizes of all resident entries.
    pub fn current_size(&self) -> u64 {
        self.state.lock().current_size
    }

    /// Number of resident entries.
    pub fn len(&self) -> usize {
        self.state.lock().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Checks residency without touching recency.
    pub fn contains(&self, key: &K) -> bool {
        self.state.lock().index.contains(key)
    }

    pub fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }

    /// Resident keys from least to most recently used.
    pub fn keys_lru_order(&self) -> Vec<K>
    where
        K: Clone,
    {
        self.state
            .lock()
            .index
            .iter()
            .rev()
            .map(|(k, _)| k.clone())
            .collect()
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot(self.name, self.size_limit)
    }

    /// Drops every resident value and refuses further borrows.
    ///
    /// Waits for outstanding handles to be released. Calling it again is a
    /// no-op. Also runs when the cache is dropped.
    pub fn dispose(&self) {
        let mut state = self.state.lock();
        if state.disposed {
            return;
        }
        state.disposed = true;

        let mut released = 0usize;
        while let Some((_, slot)) = state.index.pop_lru() {
            let previous = std::mem::replace(&mut *slot.token.lock(), SlotState::Evicted);
            self.stats.record_remove(slot.size);
            release_value(self.name, previous);
            released += 1;
        }
        state.current_size = 0;
        debug!(cache = self.name, released, "Disposed cache");
    }
}

impl<K, V> LruCache<K, V>
where
    K: Hash + Eq + Clone + fmt::Debug,
{
    /// Borrows `key`, inserting an unbuilt slot of `size` units on a miss.
    ///
    /// The returned handle holds the key's exclusivity token; concurrent
    /// borrowers of the same key block until it is dropped. `factory` is kept
    /// by the handle and runs on the first [`CacheHandle::value`] call if the
    /// slot has not been built yet. On a hit the slot's original size is
    /// kept and `size` is ignored.
    #[cfg_attr(
        feature = "cache-tracing",
        tracing::instrument(level = "trace", skip_all, fields(cache = self.name, key = ?key, size))
    )]
    pub fn borrow_or_add<F, E>(
        &self,
        key: K,
        size: u64,
        factory: F,
    ) -> Result<CacheHandle<'_, K, V, F>, CacheError>
    where
        F: FnOnce() -> Result<V, E>,
        E: Into<BoxError>,
    {
        if size >= self.size_limit {
            self.stats.record_rejected();
            return Err(CacheError::Oversized {
                cache: self.name,
                size,
                limit: self.size_limit,
            });
        }

        loop {
            let mut state = self.state.lock();
            if state.disposed {
                return Err(CacheError::Disposed { cache: self.name });
            }

            if let Some(slot) = state.index.get(&key) {
                let token = Arc::clone(&slot.token);
                drop(state);

                trace!(cache = self.name, key = ?key, "Waiting for entry token");
                let guard = token.lock_arc();
                if matches!(*guard, SlotState::Evicted) {
                    trace!(cache = self.name, key = ?key, "Entry evicted while waiting, retrying");
                    continue;
                }
                self.stats.record_hit();
                return Ok(CacheHandle::new(self.name, key, guard, factory));
            }

            self.stats.record_miss();
            self.make_room(&mut state, size)?;

            let token: Token<V> = Arc::new(Mutex::new(SlotState::Unbuilt));
            let guard = token.lock_arc();
            state.index.push(key.clone(), Slot { size, token });
            state.current_size += size;
            self.stats.record_insert(size);
            trace!(cache = self.name, key = ?key, size, total = state.current_size, "Inserted entry");
            return Ok(CacheHandle::new(self.name, key, guard, factory));
        }
    }

    /// Borrows `key`, runs `f` on its value and releases the borrow.
    pub fn with_value<F, E, R>(
        &self,
        key: K,
        size: u64,
        factory: F,
        f: impl FnOnce(&V) -> R,
    ) -> Result<R, CacheError>
    where
        F: FnOnce() -> Result<V, E>,
        E: Into<BoxError>,
    {
        let mut handle = self.borrow_or_add(key, size, factory)?;
        Ok(f(handle.value()?))
    }

    /// Evicts least recently used entries until the total is at most
    /// `size_limit * target_ratio`.
    ///
    /// Uses the same discipline as insertion-driven eviction: borrowed
    /// entries are waited for, never skipped. Returns the number of entries
    /// evicted. A disposed cache has nothing to compact.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn compact(&self, target_ratio: f64) -> Result<usize, CacheError> {
        let target = (self.size_limit as f64 * target_ratio.clamp(0.0, 1.0)) as u64;
        let mut state = self.state.lock();
        if state.disposed {
            return Ok(0);
        }

        let before = state.current_size;
        let mut evicted = 0usize;
        while state.current_size > target {
            if !self.evict_lru(&mut state)? {
                return Err(self.invariant_violation(format!(
                    "{} units accounted with an empty index",
                    state.current_size
                )));
            }
            evicted += 1;
        }
        if evicted > 0 {
            debug!(
                cache = self.name,
                evicted,
                before,
                after = state.current_size,
                target,
                "Compacted cache"
            );
        }
        Ok(evicted)
    }

    fn make_room(&self, state: &mut CacheState<K, V>, size: u64) -> Result<(), CacheError> {
        while state.current_size + size >= self.size_limit {
            if !self.evict_lru(state)? {
                return Err(self.invariant_violation(format!(
                    "{} units accounted with an empty index",
                    state.current_size
                )));
            }
        }
        Ok(())
    }

    /// Evicts the LRU slot. Returns `false` if the index is empty.
    ///
    /// Must be called with the structural lock held.
    fn evict_lru(&self, state: &mut CacheState<K, V>) -> Result<bool, CacheError> {
        let Some((_, victim)) = state.index.peek_lru() else {
            return Ok(false);
        };
        let token = Arc::clone(&victim.token);
        let size = victim.size;

        // Blocks while the victim is borrowed. Nothing else can touch the
        // index meanwhile, so the LRU slot is still ours afterwards.
        let previous = std::mem::replace(&mut *token.lock(), SlotState::Evicted);

        let Some((key, _)) = state.index.pop_lru() else {
            return Err(self.invariant_violation("LRU slot vanished during eviction".into()));
        };
        state.current_size = state.current_size.checked_sub(size).ok_or_else(|| {
            self.invariant_violation(format!(
                "evicting {key:?} of size {size} underflows total {}",
                state.current_size
            ))
        })?;
        self.stats.record_eviction(size);
        debug!(cache = self.name, key = ?key, size, total = state.current_size, "Evicted entry");
        release_value(self.name, previous);
        Ok(true)
    }

    fn invariant_violation(&self, detail: String) -> CacheError {
        error!(cache = self.name, %detail, "Cache invariant violated");
        CacheError::InvariantViolation {
            cache: self.name,
            detail,
        }
    }
}

/// Drops a removed slot's value. A panicking destructor is logged and
/// contained so the index stays consistent and eviction keeps going.
fn release_value<V>(cache: &'static str, value: SlotState<V>) {
    if panic::catch_unwind(AssertUnwindSafe(move || drop(value))).is_err() {
        warn!(cache, "Value destructor panicked during release");
    }
}

impl<K: Hash + Eq, V> Drop for LruCache<K, V> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<K: Hash + Eq, V> fmt::Debug for LruCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("LruCache")
            .field("name", &self.name)
            .field("entries", &state.index.len())
            .field("current_size", &state.current_size)
            .field("size_limit", &self.size_limit)
            .field("disposed", &state.disposed)
            .finish()
    }
}

/// Exclusive hold on one cache slot.
///
/// Dropping the handle releases the slot's token. The handle is not `Send`:
/// the token must be released on the thread that took it.
pub struct CacheHandle<'c, K, V, F> {
    cache: &'static str,
    _owner: PhantomData<&'c ()>,
    key: K,
    guard: ArcMutexGuard<RawMutex, SlotState<V>>,
    factory: Option<F>,
}

impl<'c, K, V, F> CacheHandle<'c, K, V, F> {
    fn new(
        cache: &'static str,
        key: K,
        guard: ArcMutexGuard<RawMutex, SlotState<V>>,
        factory: F,
    ) -> Self {
        Self {
            cache,
            _owner: PhantomData,
            key,
            guard,
            factory: Some(factory),
        }
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    /// True once the slot holds a value.
    pub fn is_built(&self) -> bool {
        matches!(*self.guard, SlotState::Built(_))
    }
}

impl<K, V, F, E> CacheHandle<'_, K, V, F>
where
    K: fmt::Debug,
    F: FnOnce() -> Result<V, E>,
    E: Into<BoxError>,
{
    /// Returns the slot's value, building it first if nobody has yet.
    pub fn value(&mut self) -> Result<&V, CacheError> {
        if matches!(*self.guard, SlotState::Unbuilt) {
            self.build();
        }
        match &*self.guard {
            SlotState::Built(value) => Ok(value),
            SlotState::Failed(err) => Err(err.clone()),
            SlotState::Building => Err(CacheError::ConstructionAborted),
            SlotState::Unbuilt | SlotState::Evicted => Err(CacheError::InvariantViolation {
                cache: self.cache,
                detail: format!("borrowed slot {:?} has no value", self.key),
            }),
        }
    }

    fn build(&mut self) {
        let Some(factory) = self.factory.take() else {
            return;
        };
        *self.guard = SlotState::Building;
        let started = Instant::now();
        *self.guard = match factory() {
            Ok(value) => {
                debug!(cache = self.cache, key = ?self.key, elapsed = ?started.elapsed(), "Built entry");
                SlotState::Built(value)
            }
            Err(err) => {
                let err = CacheError::construction(err);
                debug!(cache = self.cache, key = ?self.key, error = %err, "Entry construction failed");
                SlotState::Failed(err)
            }
        };
    }
}

impl<K: fmt::Debug, V, F> fmt::Debug for CacheHandle<'_, K, V, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheHandle")
            .field("cache", &self.cache)
            .field("key", &self.key)
            .field("built", &self.is_built())
            .finish_non_exhaustive()
    }
}
