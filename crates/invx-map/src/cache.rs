//! TTL cache of resolved config snapshots.
//!
//! Entries are `Arc<ResolvedConfig>` values that are only ever replaced or
//! removed, never mutated, each transition under a single write lock. The
//! cache holds copies; the store remains the source of truth.
//!
//! Every invalidation bumps a generation counter. A caller that fetched from
//! the store inserts through [`MappingCache::set_if_current`] with the
//! generation it read before fetching, so a snapshot fetched before an
//! invalidation is never cached after it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use serde::Serialize;

use invx_model::{ConfigScope, ResolvedConfig, ScopeKey};

/// Default time-to-live of a cache entry.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
struct CacheEntry {
    config: Arc<ResolvedConfig>,
    cached_at: Instant,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    expirations: AtomicU64,
    corruptions: AtomicU64,
    invalidations: AtomicU64,
}

/// Point-in-time cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Entries dropped on read because their TTL had passed.
    pub expirations: u64,
    /// Entries dropped on read because their snapshot carried another key.
    pub corruptions: u64,
    /// Entries removed by `invalidate` or `clear`.
    pub invalidations: u64,
    pub entries: usize,
}

/// Why a lookup missed.
enum Stale {
    Expired,
    Corrupt,
}

/// Thread-safe scoped cache of resolved configs.
#[derive(Debug, Clone)]
pub struct MappingCache {
    entries: Arc<RwLock<HashMap<ScopeKey, CacheEntry>>>,
    counters: Arc<Counters>,
    /// Bumped under the write lock by `invalidate` and `clear`.
    generation: Arc<AtomicU64>,
    ttl: Duration,
}

impl Default for MappingCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl MappingCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::default(),
            counters: Arc::default(),
            generation: Arc::default(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<ScopeKey, CacheEntry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<ScopeKey, CacheEntry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Live snapshot for `key`, if any.
    ///
    /// Expired entries and entries whose snapshot is tagged with a different
    /// key are evicted and reported as misses.
    pub fn get(&self, key: &ScopeKey) -> Option<Arc<ResolvedConfig>> {
        let now = Instant::now();
        let stale = {
            let entries = self.read();
            match entries.get(key) {
                None => {
                    self.counters.misses.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
                Some(entry) if entry.config.key() != key => Stale::Corrupt,
                Some(entry) if entry.is_expired(now) => Stale::Expired,
                Some(entry) => {
                    self.counters.hits.fetch_add(1, Ordering::Relaxed);
                    tracing::trace!(
                        key = %key,
                        age_ms = now.duration_since(entry.cached_at).as_millis(),
                        "Config cache hit"
                    );
                    return Some(Arc::clone(&entry.config));
                }
            }
        };

        // Re-check under the write lock; a writer may have replaced the entry.
        let mut entries = self.write();
        let still_stale = entries
            .get(key)
            .is_some_and(|entry| entry.config.key() != key || entry.is_expired(now));
        if still_stale {
            entries.remove(key);
        }
        drop(entries);

        match stale {
            Stale::Expired => {
                self.counters.expirations.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(key = %key, "Config cache entry expired");
            }
            Stale::Corrupt => {
                self.counters.corruptions.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(key = %key, "Evicting config cache entry stored under the wrong key");
            }
        }
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    fn entry(&self, config: Arc<ResolvedConfig>) -> CacheEntry {
        let cached_at = Instant::now();
        CacheEntry {
            config,
            cached_at,
            expires_at: cached_at + self.ttl,
        }
    }

    /// Current invalidation generation. Read it before fetching from the store.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Store a snapshot under `key`, replacing any previous entry.
    pub fn set(&self, key: ScopeKey, config: Arc<ResolvedConfig>) {
        let entry = self.entry(config);
        tracing::trace!(key = %key, "Caching resolved config");
        self.write().insert(key, entry);
    }

    /// Store a snapshot only if no invalidation happened since `generation`
    /// was read. Returns whether the snapshot was cached.
    pub fn set_if_current(
        &self,
        key: ScopeKey,
        config: Arc<ResolvedConfig>,
        generation: u64,
    ) -> bool {
        let entry = self.entry(config);
        let mut entries = self.write();
        if self.generation.load(Ordering::Acquire) != generation {
            drop(entries);
            tracing::debug!(key = %key, "Skipping cache insert invalidated during fetch");
            return false;
        }
        tracing::trace!(key = %key, "Caching resolved config");
        entries.insert(key, entry);
        true
    }

    /// Remove entries for a scope.
    ///
    /// - `Global`: everything
    /// - `Company` with an id: that company and every format entry resolved for it
    /// - `Company` without an id: all company and format entries
    /// - `Format` with an id: entries for that format id
    /// - `Format` without an id: all format entries
    ///
    /// Returns the number of entries removed.
    pub fn invalidate(&self, scope: ConfigScope, id: Option<&str>) -> usize {
        let mut entries = self.write();
        self.generation.fetch_add(1, Ordering::AcqRel);
        let before = entries.len();
        entries.retain(|key, _| !invalidates(scope, id, key));
        let removed = before - entries.len();
        drop(entries);

        self.counters
            .invalidations
            .fetch_add(removed as u64, Ordering::Relaxed);
        tracing::debug!(scope = %scope, id = id.unwrap_or("*"), removed, "Config cache invalidated");
        removed
    }

    pub fn clear(&self) {
        let mut entries = self.write();
        self.generation.fetch_add(1, Ordering::AcqRel);
        let removed = entries.len();
        entries.clear();
        drop(entries);
        self.counters
            .invalidations
            .fetch_add(removed as u64, Ordering::Relaxed);
    }

    /// Drop every expired entry; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - entries.len();
        self.counters
            .expirations
            .fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            expirations: self.counters.expirations.load(Ordering::Relaxed),
            corruptions: self.counters.corruptions.load(Ordering::Relaxed),
            invalidations: self.counters.invalidations.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}

fn invalidates(scope: ConfigScope, id: Option<&str>, key: &ScopeKey) -> bool {
    match (scope, id) {
        (ConfigScope::Global, _) => true,
        (ConfigScope::Company, Some(company)) => {
            matches!(key.scope, ConfigScope::Company | ConfigScope::Format)
                && key.company_id.as_deref() == Some(company)
        }
        (ConfigScope::Company, None) => {
            matches!(key.scope, ConfigScope::Company | ConfigScope::Format)
        }
        (ConfigScope::Format, Some(format)) => {
            key.scope == ConfigScope::Format && key.document_format_id.as_deref() == Some(format)
        }
        (ConfigScope::Format, None) => key.scope == ConfigScope::Format,
    }
}
