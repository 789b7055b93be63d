//! Cache Store Module
//!
//! Byte-bounded response cache with priority-weighted eviction, lazy TTL
//! expiry and write-through persistence.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cache::{eviction, payload_size, CacheEntry, CacheOptions, CacheStats};
use crate::clock::Clock;
use crate::error::{Result, SyncError};
use crate::persistence::{self, DurableStore, CACHE_NAMESPACE};

// == Put Outcome ==
/// What a successful `put` had to do to fit the new entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutOutcome {
    /// Keys evicted for space, in eviction order
    pub evicted: Vec<String>,
}

// == Cache Store ==
/// Main cache storage. Owns its entries; callers only ever get copies.
pub struct CacheStore {
    /// Key-value storage
    entries: HashMap<String, CacheEntry>,
    /// Sum of `size_bytes` over `entries`
    total_bytes: usize,
    /// Activity statistics
    stats: CacheStats,
    /// Byte budget
    capacity_bytes: usize,
    /// TTL for entries inserted without one
    default_ttl: Duration,
    clock: Arc<dyn Clock>,
    store: Arc<dyn DurableStore>,
}

impl CacheStore {
    // == Constructor ==
    /// Creates an empty store. Call [`CacheStore::load`] to restore a
    /// previous snapshot.
    pub fn new(
        capacity_bytes: usize,
        default_ttl: Duration,
        clock: Arc<dyn Clock>,
        store: Arc<dyn DurableStore>,
    ) -> Self {
        Self {
            entries: HashMap::new(),
            total_bytes: 0,
            stats: CacheStats::new(),
            capacity_bytes,
            default_ttl,
            clock,
            store,
        }
    }

    // == Load ==
    /// Restores entries from the durable store, dropping anything already
    /// expired and anything that no longer fits the byte budget.
    ///
    /// Returns the number of entries restored.
    pub async fn load(&mut self) -> usize {
        let items: Vec<CacheEntry> =
            persistence::load_items(self.store.as_ref(), CACHE_NAMESPACE).await;
        let now = self.clock.now_ms();
        let found = items.len();

        self.entries.clear();
        self.total_bytes = 0;

        for mut entry in items {
            // Recompute rather than trust the snapshot
            entry.size_bytes = match payload_size(&entry.payload) {
                Ok(size) => size,
                Err(_) => continue,
            };
            if entry.size_bytes > self.capacity_bytes {
                continue;
            }
            if let Some(old) = self.entries.insert(entry.key.clone(), entry.clone()) {
                self.total_bytes -= old.size_bytes;
            }
            self.total_bytes += entry.size_bytes;
        }

        let expired = self.drop_expired(now);
        let mut trimmed = 0;
        while self.total_bytes > self.capacity_bytes {
            match self.evict_one(now) {
                Some(_) => trimmed += 1,
                None => break,
            }
        }

        self.sync_stats();
        let restored = self.entries.len();
        info!(
            "Cache restored: {} of {} entries ({} bytes, {} expired, {} trimmed for capacity)",
            restored, found, self.total_bytes, expired, trimmed
        );

        if restored != found {
            self.persist().await;
        }
        restored
    }

    // == Put ==
    /// Stores `value` under `key`, evicting lower-scoring entries until it fits.
    ///
    /// An existing entry under the same key is replaced and its bytes are
    /// released before eviction runs.
    ///
    /// # Errors
    /// [`SyncError::CapacityOverflow`] if the value alone is larger than the
    /// whole capacity. The store is left untouched in that case.
    pub async fn put(&mut self, key: &str, value: Value, options: CacheOptions) -> Result<PutOutcome> {
        let now = self.clock.now_ms();
        let ttl = options.ttl.unwrap_or(self.default_ttl);
        let entry = CacheEntry::new(key.to_string(), value, options.priority, ttl, now)?;

        if entry.size_bytes > self.capacity_bytes {
            self.stats.record_rejection();
            warn!(
                "Rejecting cache entry '{}': {} bytes exceeds capacity of {} bytes",
                key, entry.size_bytes, self.capacity_bytes
            );
            return Err(SyncError::CapacityOverflow {
                key: key.to_string(),
                size: entry.size_bytes,
                capacity: self.capacity_bytes,
            });
        }

        self.take(key);

        let mut outcome = PutOutcome::default();
        if self.total_bytes + entry.size_bytes > self.capacity_bytes {
            self.drop_expired(now);
        }
        while self.total_bytes + entry.size_bytes > self.capacity_bytes {
            match self.evict_one(now) {
                Some(evicted) => outcome.evicted.push(evicted),
                None => break,
            }
        }

        self.total_bytes += entry.size_bytes;
        self.entries.insert(key.to_string(), entry);
        self.sync_stats();
        self.persist().await;

        Ok(outcome)
    }

    // == Get ==
    /// Returns a copy of the payload if present and not expired.
    ///
    /// An expired entry is removed on the way out.
    pub async fn get(&mut self, key: &str) -> Option<Value> {
        let now = self.clock.now_ms();
        let expired = match self.entries.get(key) {
            Some(entry) => entry.is_expired(now),
            None => {
                self.stats.record_miss();
                return None;
            }
        };

        if expired {
            self.expire(key).await;
            self.stats.record_miss();
            return None;
        }

        self.stats.record_hit();
        self.entries.get(key).map(|entry| entry.payload.clone())
    }

    // == Has ==
    /// Same expiry rule as [`CacheStore::get`] without touching statistics.
    pub async fn has(&mut self, key: &str) -> bool {
        let now = self.clock.now_ms();
        let expired = match self.entries.get(key) {
            Some(entry) => entry.is_expired(now),
            None => return false,
        };

        if expired {
            self.expire(key).await;
        }
        !expired
    }

    // == Remove ==
    /// Removes an entry. Returns whether it existed.
    pub async fn remove(&mut self, key: &str) -> bool {
        let existed = self.take(key).is_some();
        if existed {
            self.sync_stats();
            self.persist().await;
        }
        existed
    }

    // == Clear ==
    /// Removes every entry.
    pub async fn clear(&mut self) {
        self.entries.clear();
        self.total_bytes = 0;
        self.sync_stats();
        self.persist().await;
    }

    // == Remove Matching ==
    /// Removes every entry whose key matches `pattern`. Returns the number
    /// removed.
    pub async fn remove_matching(&mut self, pattern: &Regex) -> usize {
        let matched: Vec<String> = self
            .entries
            .keys()
            .filter(|key| pattern.is_match(key))
            .cloned()
            .collect();

        for key in &matched {
            self.take(key);
        }
        if !matched.is_empty() {
            self.sync_stats();
            self.persist().await;
        }
        debug!("Removed {} cache entries matching {}", matched.len(), pattern);
        matched.len()
    }

    // == Accessors ==
    /// Inspects an entry without expiry checks or statistics.
    pub fn peek(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current sum of entry sizes.
    pub fn size_bytes(&self) -> usize {
        self.total_bytes
    }

    pub fn capacity_bytes(&self) -> usize {
        self.capacity_bytes
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.clone()
    }

    // == Internals ==
    fn take(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.total_bytes -= entry.size_bytes;
        Some(entry)
    }

    fn evict_one(&mut self, now: u64) -> Option<String> {
        let victim = eviction::select_victim(self.entries.values(), now)?.to_string();
        let entry = self.take(&victim)?;
        self.stats.record_eviction();
        debug!(
            "Evicted '{}' ({} priority, {} bytes, score {:.6})",
            victim,
            entry.priority,
            entry.size_bytes,
            eviction::score(&entry, now)
        );
        Some(victim)
    }

    fn drop_expired(&mut self, now: u64) -> usize {
        let expired: Vec<String> = self
            .entries
            .values()
            .filter(|entry| entry.is_expired(now))
            .map(|entry| entry.key.clone())
            .collect();

        for key in &expired {
            self.take(key);
            self.stats.record_expiration();
        }
        expired.len()
    }

    async fn expire(&mut self, key: &str) {
        if self.take(key).is_some() {
            self.stats.record_expiration();
            debug!("Cache entry '{}' expired", key);
        }
        self.sync_stats();
        self.persist().await;
    }

    fn sync_stats(&mut self) {
        self.stats.set_occupancy(self.entries.len(), self.total_bytes);
    }

    async fn persist(&self) {
        let items: Vec<CacheEntry> = self.entries.values().cloned().collect();
        persistence::save_items(
            self.store.as_ref(),
            CACHE_NAMESPACE,
            items,
            self.clock.now_ms(),
        )
        .await;
    }
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("entries", &self.entries.len())
            .field("total_bytes", &self.total_bytes)
            .field("capacity_bytes", &self.capacity_bytes)
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}
