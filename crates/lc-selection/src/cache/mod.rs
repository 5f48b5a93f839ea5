//! # Lazy Keyed Cache
//!
//! Concurrency-safe store that computes a value per key on first request.
//!
//! ## Guarantees
//!
//! - Single-flight: one initializer invocation per key at a time; concurrent
//!   requesters await the same shared future and see the same outcome.
//! - A failed initialization is evicted, so a later request retries.
//! - Materialized entries are never mutated. Expiry or refresh installs a new
//!   entry; readers holding the old `Arc` keep a consistent value.
//! - `close()` runs the finalizer on every materialized value and fails all
//!   later requests. An initialization still in flight runs to completion,
//!   then its value is finalized and its waiters receive `Closed`.
//! - The finalizer runs at most once per value.
//!
//! ## Expiration
//!
//! | Mode | Behaviour |
//! |------|-----------|
//! | `Never` | Entries live until `close()` |
//! | `Absolute(ttl)` | Recomputed on first access `ttl` after materialization |
//! | `Idle(ttl)` | Recomputed on first access after `ttl` without access |
//! | `Refresh(interval)` | Recomputed in the background every `interval` |

use futures::future::{self, BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

/// When cached values are considered stale
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Expiration {
    Never,
    Absolute(Duration),
    Idle(Duration),
    Refresh(Duration),
}

/// Cache failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError<E> {
    /// `close()` was called
    #[error("Cache is closed")]
    Closed,

    /// The initializer failed; the key has been evicted
    #[error("Cache initializer failed: {0}")]
    Init(E),
}

/// Produces the value for a key
pub type Initializer<K, V, E> = Arc<dyn Fn(K) -> BoxFuture<'static, Result<V, E>> + Send + Sync>;

/// Releases resources held by a value that leaves the cache
pub type Finalizer<V> = Arc<dyn Fn(&V) + Send + Sync>;

type SharedInit<V, E> = Shared<BoxFuture<'static, Result<Arc<V>, CacheError<E>>>>;

struct Materialized<V> {
    value: Arc<V>,
    at: Instant,
    released: AtomicBool,
}

impl<V> Materialized<V> {
    fn new(value: Arc<V>, at: Instant) -> Self {
        Self {
            value,
            at,
            released: AtomicBool::new(false),
        }
    }
}

struct Entry<V, E> {
    generation: u64,
    init: SharedInit<V, E>,
    slot: Arc<OnceLock<Materialized<V>>>,
    last_access: Mutex<Instant>,
}

impl<V, E: Clone> Entry<V, E> {
    fn materialized(&self) -> Option<&Materialized<V>> {
        self.slot.get()
    }

    fn failed(&self) -> bool {
        matches!(self.init.peek(), Some(Err(_)))
    }

    fn is_expired(&self, expiration: Expiration, now: Instant) -> bool {
        let Some(materialized) = self.materialized() else {
            return false;
        };
        match expiration {
            Expiration::Absolute(ttl) => now.duration_since(materialized.at) >= ttl,
            Expiration::Idle(ttl) => now.duration_since(*self.last_access.lock()) >= ttl,
            Expiration::Never | Expiration::Refresh(_) => false,
        }
    }
}

struct Inner<K, V, E> {
    entries: Mutex<HashMap<K, Arc<Entry<V, E>>>>,
    initializer: Initializer<K, V, E>,
    finalizer: Option<Finalizer<V>>,
    expiration: Expiration,
    closed: AtomicBool,
    generations: AtomicU64,
}

/// Lazily initialized, single-flight keyed cache
pub struct LazyCache<K, V, E> {
    inner: Arc<Inner<K, V, E>>,
}

impl<K, V, E> LazyCache<K, V, E>
where
    K: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static,
    V: Send + Sync + 'static,
    E: Clone + fmt::Display + Send + Sync + 'static,
{
    /// Cache without a finalizer
    pub fn new<F, Fut>(expiration: Expiration, initializer: F) -> Self
    where
        F: Fn(K) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        Self::from_parts(expiration, boxed_initializer(initializer), None)
    }

    /// Cache that runs `finalizer` on values leaving it
    pub fn with_finalizer<F, Fut, D>(expiration: Expiration, initializer: F, finalizer: D) -> Self
    where
        F: Fn(K) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        D: Fn(&V) + Send + Sync + 'static,
    {
        Self::from_parts(
            expiration,
            boxed_initializer(initializer),
            Some(Arc::new(finalizer)),
        )
    }

    pub fn from_parts(
        expiration: Expiration,
        initializer: Initializer<K, V, E>,
        finalizer: Option<Finalizer<V>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(HashMap::new()),
                initializer,
                finalizer,
                expiration,
                closed: AtomicBool::new(false),
                generations: AtomicU64::new(0),
            }),
        }
    }

    /// Value for `key`, computing it if absent or stale
    pub async fn get(&self, key: &K) -> Result<Arc<V>, CacheError<E>> {
        let entry = self.inner.entry(key)?;
        match entry.init.clone().await {
            Ok(value) => Ok(value),
            Err(CacheError::Init(err)) => {
                self.inner.evict(key, entry.generation);
                Err(CacheError::Init(err))
            }
            Err(CacheError::Closed) => Err(CacheError::Closed),
        }
    }

    /// Tear down: finalize materialized values and reject further requests
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let drained: Vec<_> = self.inner.entries.lock().drain().map(|(_, e)| e).collect();
        debug!(entries = drained.len(), "Closing lazy cache");
        for entry in drained {
            self.inner.finalize(&entry);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Number of entries, including ones still initializing
    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn expiration(&self) -> Expiration {
        self.inner.expiration
    }
}

impl<K, V, E> fmt::Debug for LazyCache<K, V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyCache")
            .field("expiration", &self.inner.expiration)
            .field("closed", &self.inner.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

fn boxed_initializer<K, V, E, F, Fut>(initializer: F) -> Initializer<K, V, E>
where
    F: Fn(K) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<V, E>> + Send + 'static,
{
    Arc::new(move |key: K| initializer(key).boxed())
}

impl<K, V, E> Inner<K, V, E>
where
    K: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static,
    V: Send + Sync + 'static,
    E: Clone + fmt::Display + Send + Sync + 'static,
{
    fn entry(self: &Arc<Self>, key: &K) -> Result<Arc<Entry<V, E>>, CacheError<E>> {
        let now = Instant::now();
        let (entry, stale) = {
            let mut entries = self.entries.lock();
            if self.closed.load(Ordering::Acquire) {
                return Err(CacheError::Closed);
            }
            if let Some(existing) = entries.get(key) {
                if !existing.failed() && !existing.is_expired(self.expiration, now) {
                    *existing.last_access.lock() = now;
                    return Ok(Arc::clone(existing));
                }
            }
            let entry = self.new_entry(key, now);
            let stale = entries.insert(key.clone(), Arc::clone(&entry));
            (entry, stale)
        };

        if let Some(stale) = stale {
            debug!(key = ?key, "Replacing stale cache entry");
            self.finalize(&stale);
        }
        Ok(entry)
    }

    fn new_entry(self: &Arc<Self>, key: &K, now: Instant) -> Arc<Entry<V, E>> {
        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        let slot = Arc::new(OnceLock::new());
        let refresh = match self.expiration {
            Expiration::Refresh(interval) => Some(interval),
            _ => None,
        };

        let initializer = Arc::clone(&self.initializer);
        let cache = Arc::downgrade(self);
        let init_slot = Arc::clone(&slot);
        let key = key.clone();
        let init = async move {
            let value = match initializer(key.clone()).await {
                Ok(value) => Arc::new(value),
                Err(err) => return Err(CacheError::Init(err)),
            };
            let materialized =
                init_slot.get_or_init(|| Materialized::new(Arc::clone(&value), Instant::now()));

            if let Some(inner) = cache.upgrade() {
                // Under the map lock: either close() drains after the slot is
                // set and finalizes it, or we observe the flag here.
                let closed = {
                    let _entries = inner.entries.lock();
                    inner.closed.load(Ordering::Acquire)
                };
                if closed {
                    debug!(key = ?key, "Cache closed during initialization");
                    inner.release(materialized);
                    return Err(CacheError::Closed);
                }
                if let Some(interval) = refresh {
                    tokio::spawn(refresh_loop(cache, key, generation, interval));
                }
            }
            Ok(value)
        }
        .boxed()
        .shared();

        Arc::new(Entry {
            generation,
            init,
            slot,
            last_access: Mutex::new(now),
        })
    }

    fn evict(&self, key: &K, generation: u64) {
        let mut entries = self.entries.lock();
        if entries.get(key).is_some_and(|e| e.generation == generation) {
            entries.remove(key);
            debug!(key = ?key, "Evicted failed cache entry");
        }
    }

    fn is_current(&self, key: &K, generation: u64) -> bool {
        self.entries
            .lock()
            .get(key)
            .is_some_and(|e| e.generation == generation)
    }

    /// Install a refreshed value if `generation` is still current. Returns the
    /// new generation, or `None` if the entry was closed, evicted or replaced.
    fn replace(&self, key: &K, generation: u64, value: V) -> Option<u64> {
        let now = Instant::now();
        let next = self.generations.fetch_add(1, Ordering::Relaxed);
        let value = Arc::new(value);
        let slot = Arc::new(OnceLock::new());
        let _ = slot.set(Materialized::new(Arc::clone(&value), now));
        let entry = Arc::new(Entry {
            generation: next,
            init: future::ready(Ok::<_, CacheError<E>>(value)).boxed().shared(),
            slot,
            last_access: Mutex::new(now),
        });

        let outcome = {
            let mut entries = self.entries.lock();
            let current = !self.closed.load(Ordering::Acquire)
                && entries.get(key).is_some_and(|e| e.generation == generation);
            if current {
                Ok(entries.insert(key.clone(), Arc::clone(&entry)))
            } else {
                Err(entry)
            }
        };

        match outcome {
            Ok(replaced) => {
                if let Some(old) = replaced {
                    self.finalize(&old);
                }
                debug!(key = ?key, "Cache entry refreshed");
                Some(next)
            }
            Err(unpublished) => {
                self.finalize(&unpublished);
                None
            }
        }
    }

    fn finalize(&self, entry: &Entry<V, E>) {
        if let Some(materialized) = entry.materialized() {
            self.release(materialized);
        }
    }

    fn release(&self, materialized: &Materialized<V>) {
        if materialized.released.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(finalizer) = &self.finalizer {
            finalizer(&materialized.value);
        }
    }
}

async fn refresh_loop<K, V, E>(
    cache: Weak<Inner<K, V, E>>,
    key: K,
    mut generation: u64,
    interval: Duration,
) where
    K: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static,
    V: Send + Sync + 'static,
    E: Clone + fmt::Display + Send + Sync + 'static,
{
    loop {
        tokio::time::sleep(interval).await;

        let Some(inner) = cache.upgrade() else {
            return;
        };
        if inner.closed.load(Ordering::Acquire) || !inner.is_current(&key, generation) {
            return;
        }

        match (inner.initializer)(key.clone()).await {
            Ok(value) => match inner.replace(&key, generation, value) {
                Some(next) => generation = next,
                None => return,
            },
            Err(err) => {
                warn!(key = ?key, error = %err, "Background refresh failed, keeping previous value");
            }
        }
    }
}
