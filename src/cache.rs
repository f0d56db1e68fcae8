//! Memoized validation results.
//!
//! Large addon files repeat the same component shapes many times and the
//! branch resolver validates a subtree once per candidate, so results are
//! cached per (effective schema, schema position, validation options,
//! document path, subtree text, remaining depth). Problems are stored relative to the subtree start
//! so a hit still lines up after edits elsewhere in the file.
//!
//! Eviction is least-recently-used at a fixed capacity; entries also expire
//! after a time-to-live, swept every [`CLEANUP_INTERVAL`] inserts or on
//! demand through [`ResultCache::cleanup_expired`].

use std::collections::{BTreeMap, HashMap};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::config::Settings;
use crate::validation::ValidationProblem;

const CLEANUP_INTERVAL: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub schema_id: u64,
    pub schema_address: usize,
    /// [`ValidationOptions::fingerprint`](crate::validation::ValidationOptions::fingerprint)
    pub options: u64,
    pub path: String,
    pub content_hash: u64,
    pub depth: usize,
}

impl CacheKey {
    pub fn new(
        schema_id: u64,
        schema_address: usize,
        options: u64,
        path: String,
        content: &str,
        depth: usize,
    ) -> Self {
        let mut hasher = DefaultHasher::new();
        content.hash(&mut hasher);
        Self {
            schema_id,
            schema_address,
            options,
            path,
            content_hash: hasher.finish(),
            depth,
        }
    }
}

struct CacheEntry {
    problems: Arc<[ValidationProblem]>,
    inserted: Instant,
    last_used: u64,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<CacheKey, CacheEntry>,
    /// Recency index: use tick → key. The smallest tick is evicted first.
    recency: BTreeMap<u64, CacheKey>,
    tick: u64,
    inserts_since_cleanup: usize,
}

impl CacheState {
    fn touch(&mut self, key: &CacheKey) {
        self.tick += 1;
        let tick = self.tick;
        if let Some(entry) = self.entries.get_mut(key) {
            self.recency.remove(&entry.last_used);
            entry.last_used = tick;
            self.recency.insert(tick, key.clone());
        }
    }

    fn remove(&mut self, key: &CacheKey) {
        if let Some(entry) = self.entries.remove(key) {
            self.recency.remove(&entry.last_used);
        }
    }
}

pub struct ResultCache {
    state: Mutex<CacheState>,
    capacity: usize,
    ttl: Duration,
}

impl ResultCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            capacity: capacity.max(1),
            ttl,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.cache_capacity,
            Duration::from_secs(settings.cache_ttl_secs),
        )
    }

    fn state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<[ValidationProblem]>> {
        let mut state = self.state();
        let expired = state.entries.get(key)?.inserted.elapsed() > self.ttl;
        if expired {
            state.remove(key);
            return None;
        }
        state.touch(key);
        state.entries.get(key).map(|entry| Arc::clone(&entry.problems))
    }

    pub fn insert(&self, key: CacheKey, problems: Vec<ValidationProblem>) {
        let mut state = self.state();
        state.remove(&key);

        while state.entries.len() >= self.capacity {
            let Some((_, oldest)) = state.recency.pop_first() else {
                break;
            };
            state.entries.remove(&oldest);
        }

        state.tick += 1;
        let tick = state.tick;
        state.recency.insert(tick, key.clone());
        state.entries.insert(
            key,
            CacheEntry {
                problems: problems.into(),
                inserted: Instant::now(),
                last_used: tick,
            },
        );

        state.inserts_since_cleanup += 1;
        if state.inserts_since_cleanup >= CLEANUP_INTERVAL {
            state.inserts_since_cleanup = 0;
            drop(state);
            self.cleanup_expired();
        }
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let mut state = self.state();
        let expired: Vec<CacheKey> = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.inserted.elapsed() > self.ttl)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            state.remove(key);
        }
        if !expired.is_empty() {
            debug!(removed = expired.len(), "expired validation cache entries");
        }
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut state = self.state();
        state.entries.clear();
        state.recency.clear();
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}
