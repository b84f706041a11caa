//! Scoped cache of server-confirmed board data
//!
//! Stores one value per `ScopeKey` together with a freshness flag:
//! - `read` only returns fresh values; stale or missing scopes are misses
//! - `invalidate` marks a scope stale without dropping it
//! - `patch` rewrites a fresh value in place (single-field optimistic updates)
//! - `read_through` refetches a miss once, however many readers are waiting
//!
//! Values are stored type-erased and recovered through the typed `Scope`
//! trait. Every change is published as a `CacheEvent` for subscribed views.
//! Invalidation never cascades; callers invalidate each dependent scope.

use dashmap::DashMap;
use kanban_model::{Scope, ScopeKey};
use std::any::Any;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

/// Change notification for subscribed views
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEvent {
    /// Full replace from server data
    Written(ScopeKey),
    /// Optimistic in-place update
    Patched(ScopeKey),
    /// Marked stale
    Invalidated(ScopeKey),
    /// Rolled back to a snapshot
    Restored(ScopeKey),
    /// Every scope dropped
    Cleared,
}

impl CacheEvent {
    /// Scope the event refers to
    #[inline]
    #[must_use]
    pub fn scope(&self) -> Option<ScopeKey> {
        match self {
            Self::Written(key) | Self::Patched(key) | Self::Invalidated(key) | Self::Restored(key) => {
                Some(*key)
            }
            Self::Cleared => None,
        }
    }
}

/// Statistics for cache monitoring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of scopes held (fresh or stale)
    pub entry_count: usize,
    /// Reads answered from cache
    pub hits: u64,
    /// Reads that found nothing fresh
    pub misses: u64,
    /// Remote fetches issued by `read_through`
    pub fetches: u64,
}

/// How `restore` treated a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// Scope rolled back to the snapshot
    Restored,
    /// Server data landed after the snapshot; the scope was marked stale instead
    Invalidated,
    /// Nothing to roll back
    Skipped,
}

#[derive(Debug, Clone)]
struct Entry {
    value: Arc<dyn Any + Send + Sync>,
    fresh: bool,
    version: u64,
    /// Version of the last full `write`; patches and restores keep it
    written: u64,
}

/// Pre-mutation copy of one scope, kept until the mutation settles
#[derive(Debug, Clone)]
pub struct Snapshot {
    key: ScopeKey,
    entry: Option<Entry>,
}

impl Snapshot {
    /// Scope this snapshot was taken from
    #[inline]
    #[must_use]
    pub fn key(&self) -> ScopeKey {
        self.key
    }

    /// Whether the scope held a value when the snapshot was taken
    #[inline]
    #[must_use]
    pub fn was_cached(&self) -> bool {
        self.entry.is_some()
    }

    /// Version of the scope when the snapshot was taken
    #[inline]
    #[must_use]
    pub fn version(&self) -> Option<u64> {
        self.entry.as_ref().map(|e| e.version)
    }
}

/// Scoped board cache
#[derive(Debug)]
pub struct ScopedCache {
    entries: DashMap<ScopeKey, Entry>,
    loads: DashMap<ScopeKey, Arc<Mutex<()>>>,
    events: broadcast::Sender<CacheEvent>,
    versions: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    fetches: AtomicU64,
}

impl ScopedCache {
    /// Create cache whose event channel buffers `event_capacity` events
    #[must_use]
    pub fn new(event_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self {
            entries: DashMap::new(),
            loads: DashMap::new(),
            events,
            versions: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            fetches: AtomicU64::new(0),
        }
    }

    /// Fresh value of a scope, or `None` on miss/stale
    #[must_use]
    pub fn read<S: Scope>(&self, scope: &S) -> Option<S::Value> {
        let found = self.lookup::<S::Value>(&scope.key());
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    /// Replace a scope with server data and mark it fresh
    pub fn write<S: Scope>(&self, scope: &S, value: S::Value) {
        let key = scope.key();
        let version = self.next_version();
        let entry = Entry {
            value: Arc::new(value),
            fresh: true,
            version,
            written: version,
        };
        self.entries.insert(key, entry);
        tracing::debug!(scope = %key, "cache write");
        self.publish(CacheEvent::Written(key));
    }

    /// Mark a scope stale so the next read refetches it.
    ///
    /// Returns `false` (and publishes nothing) when the scope is already
    /// stale or was never cached.
    pub fn invalidate(&self, key: &ScopeKey) -> bool {
        let changed = match self.entries.get_mut(key) {
            Some(mut entry) if entry.fresh => {
                entry.fresh = false;
                true
            }
            _ => false,
        };

        if changed {
            tracing::debug!(scope = %key, "cache invalidate");
            self.publish(CacheEvent::Invalidated(*key));
        }
        changed
    }

    /// Mark every scope stale
    pub fn invalidate_all(&self) {
        let keys: Vec<ScopeKey> = self.entries.iter().map(|e| *e.key()).collect();
        for key in keys {
            self.invalidate(&key);
        }
    }

    /// Apply a transformation to a fresh scope without a round trip.
    ///
    /// Returns `None` and leaves the cache untouched when the scope is
    /// missing or stale; the next read refetches it anyway.
    pub fn patch<S, F, R>(&self, scope: &S, f: F) -> Option<R>
    where
        S: Scope,
        F: FnOnce(&mut S::Value) -> R,
    {
        let key = scope.key();
        let result = {
            let Some(mut entry) = self.entries.get_mut(&key) else {
                tracing::debug!(scope = %key, "patch skipped: not cached");
                return None;
            };
            if !entry.fresh {
                tracing::debug!(scope = %key, "patch skipped: stale");
                return None;
            }
            let Some(current) = entry.value.downcast_ref::<S::Value>() else {
                tracing::warn!(scope = %key, "patch skipped: cached value has unexpected type");
                return None;
            };

            let mut next = current.clone();
            let result = f(&mut next);
            entry.value = Arc::new(next);
            entry.version = self.next_version();
            result
        };

        tracing::debug!(scope = %key, "cache patch");
        self.publish(CacheEvent::Patched(key));
        Some(result)
    }

    /// Return the fresh value, or fetch it.
    ///
    /// Concurrent misses on one scope share a single fetch: later readers
    /// wait for the first and then read what it wrote.
    ///
    /// # Errors
    /// Whatever `fetch` returns; the cache is left unchanged.
    pub async fn read_through<S, F, Fut, E>(&self, scope: &S, fetch: F) -> Result<S::Value, E>
    where
        S: Scope,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<S::Value, E>>,
    {
        if let Some(value) = self.read(scope) {
            return Ok(value);
        }

        let key = scope.key();
        let gate = self.loads.entry(key).or_default().clone();
        let _permit = gate.lock().await;

        if let Some(value) = self.lookup::<S::Value>(&key) {
            return Ok(value);
        }

        self.fetches.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(scope = %key, "cache refetch");
        let value = fetch().await?;
        self.write(scope, value.clone());
        Ok(value)
    }

    /// Copy a scope's current state for later rollback
    #[must_use]
    pub fn snapshot(&self, key: &ScopeKey) -> Snapshot {
        Snapshot {
            key: *key,
            entry: self.entries.get(key).map(|e| e.value().clone()),
        }
    }

    /// Roll a scope back to a snapshot.
    ///
    /// Only patches are rolled back. If server data was written to the scope
    /// after the snapshot, the snapshot is older than that data and the scope
    /// is invalidated instead. A scope invalidated since the snapshot stays
    /// stale; a dropped or never-cached scope is left alone.
    pub fn restore(&self, snapshot: Snapshot) -> RestoreOutcome {
        let key = snapshot.key;
        let Some(mut entry) = snapshot.entry else {
            return RestoreOutcome::Skipped;
        };

        let outcome = match self.entries.get_mut(&key) {
            None => RestoreOutcome::Skipped,
            Some(current) if current.written != entry.written => RestoreOutcome::Invalidated,
            Some(mut current) => {
                entry.fresh = entry.fresh && current.fresh;
                entry.version = self.next_version();
                *current = entry;
                RestoreOutcome::Restored
            }
        };

        match outcome {
            RestoreOutcome::Restored => {
                tracing::debug!(scope = %key, "cache restore");
                self.publish(CacheEvent::Restored(key));
            }
            RestoreOutcome::Invalidated => {
                tracing::debug!(scope = %key, "restore skipped: newer server data");
                self.invalidate(&key);
            }
            RestoreOutcome::Skipped => {
                tracing::debug!(scope = %key, "restore skipped: scope dropped");
            }
        }
        outcome
    }

    /// Whether server data replaced the scope after `snapshot` was taken.
    ///
    /// A scope dropped since the snapshot counts as replaced.
    #[must_use]
    pub fn written_since(&self, snapshot: &Snapshot) -> bool {
        let current = self.entries.get(&snapshot.key).map(|e| e.written);
        let before = snapshot.entry.as_ref().map(|e| e.written);
        current != before
    }

    /// Whether a scope holds a fresh value
    #[inline]
    #[must_use]
    pub fn is_fresh(&self, key: &ScopeKey) -> bool {
        self.entries.get(key).is_some_and(|e| e.fresh)
    }

    /// Version of a scope's value; bumps on every write, patch and restore
    #[inline]
    #[must_use]
    pub fn version(&self, key: &ScopeKey) -> Option<u64> {
        self.entries.get(key).map(|e| e.version)
    }

    /// Whether a scope holds any value, fresh or stale
    #[inline]
    #[must_use]
    pub fn contains(&self, key: &ScopeKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Drop every scope
    pub fn clear(&self) {
        self.entries.clear();
        self.loads.clear();
        self.publish(CacheEvent::Cleared);
    }

    /// Subscribe to change events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    /// Get cache statistics
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            fetches: self.fetches.load(Ordering::Relaxed),
        }
    }

    fn lookup<V: Clone + 'static>(&self, key: &ScopeKey) -> Option<V> {
        let entry = self.entries.get(key)?;
        if !entry.fresh {
            return None;
        }
        let value = entry.value.downcast_ref::<V>().cloned();
        value
    }

    fn next_version(&self) -> u64 {
        self.versions.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn publish(&self, event: CacheEvent) {
        // No subscribers is fine: nobody is rendering this scope.
        let _ = self.events.send(event);
    }
}

impl Default for ScopedCache {
    /// Create cache with a 256-event buffer
    fn default() -> Self {
        Self::new(256)
    }
}
