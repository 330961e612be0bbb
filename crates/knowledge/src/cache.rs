//! In-process cache for composed answers.
//!
//! Keyed by (airport, normalized question, k). Entries expire after a TTL,
//! capped at [`DEGRADED_TTL`] for `local-fallback` answers, and are dropped
//! lazily on read; inserts evict expired entries and then the oldest ones
//! while the cache is full. Two concurrent misses for the same key both
//! compute and the later insert wins. Errors are never stored, and an answer
//! whose computation overlapped an invalidation is returned but not stored.

use crate::rag::Answer;
use crate::retrieval::PROVIDER_LOCAL_FALLBACK;
use crate::types::Query;
use serde::Serialize;
use skylens_core::AppResult;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Longest time a degraded answer is served from the cache.
pub const DEGRADED_TTL: Duration = Duration::from_secs(30);

/// Monotonic time source, injectable for tests.
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset_millis: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset_millis: AtomicU64::new(0),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.offset_millis
            .fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + Duration::from_millis(self.offset_millis.load(Ordering::SeqCst))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub airport: String,
    pub query: String,
    pub k: usize,
}

impl CacheKey {
    pub fn from_query(query: &Query) -> Self {
        Self {
            airport: query.airport.clone(),
            query: query.normalized_text(),
            k: query.k,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug)]
struct CacheEntry {
    answer: Answer,
    inserted_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_fresh(&self, now: Instant) -> bool {
        now.duration_since(self.inserted_at) < self.ttl
    }
}

/// TTL cache of composed answers.
#[derive(Debug)]
pub struct ResultCache {
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
    ttl: Duration,
    max_entries: usize,
    clock: Arc<dyn Clock>,
    /// Bumped by every invalidation, under the entries lock
    generation: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResultCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self::with_clock(ttl, max_entries, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, max_entries: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            max_entries: max_entries.max(1),
            clock,
            generation: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// A zero TTL disables caching.
    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    /// Fresh cached answer for `key`, if any.
    pub fn get(&self, key: &CacheKey) -> Option<Answer> {
        if !self.is_enabled() {
            return None;
        }

        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let fresh = entries.get(key).map(|entry| entry.is_fresh(now))?;

        if fresh {
            entries.get(key).map(|entry| entry.answer.clone())
        } else {
            entries.remove(key);
            None
        }
    }

    pub fn insert(&self, key: CacheKey, answer: Answer) {
        self.insert_if_current(key, answer, None);
    }

    /// Insert unless the cache was invalidated since `generation` was read.
    fn insert_if_current(&self, key: CacheKey, answer: Answer, generation: Option<u64>) -> bool {
        if !self.is_enabled() {
            return false;
        }

        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if generation.is_some_and(|g| g != self.generation.load(Ordering::SeqCst)) {
            return false;
        }

        entries.retain(|_, entry| entry.is_fresh(now));

        while entries.len() >= self.max_entries && !entries.contains_key(&key) {
            let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, entry)| entry.inserted_at)
                .map(|(k, _)| k.clone())
            else {
                break;
            };
            entries.remove(&oldest);
        }

        let ttl = if answer.provider == PROVIDER_LOCAL_FALLBACK {
            self.ttl.min(DEGRADED_TTL)
        } else {
            self.ttl
        };
        entries.insert(
            key,
            CacheEntry {
                answer,
                inserted_at: now,
                ttl,
            },
        );
        true
    }

    /// Return the cached answer for `key` or compute, store and return it.
    ///
    /// The lock is not held while `compute` runs. A failed computation is
    /// returned as-is and leaves the cache untouched, as does one that was
    /// still running when the cache was invalidated.
    pub async fn get_or_compute<F, Fut>(&self, key: CacheKey, compute: F) -> AppResult<Answer>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<Answer>>,
    {
        if let Some(answer) = self.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(airport = %key.airport, k = key.k, "Answer cache hit");
            return Ok(answer);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let generation = self.generation.load(Ordering::SeqCst);
        let answer = compute().await?;
        if !self.insert_if_current(key.clone(), answer.clone(), Some(generation))
            && self.is_enabled()
        {
            tracing::debug!(
                airport = %key.airport,
                k = key.k,
                "Cache invalidated during computation, answer not stored"
            );
        }
        Ok(answer)
    }

    pub fn invalidate_all(&self) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        self.generation.fetch_add(1, Ordering::SeqCst);
        let dropped = entries.len();
        entries.clear();
        if dropped > 0 {
            tracing::debug!(entries = dropped, "Answer cache invalidated");
        }
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner()).len();
        CacheStats {
            entries,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
