use crate::clock::{Clock, SystemClock};
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Entries older than this are treated as absent.
    #[serde(with = "duration_ms")]
    pub ttl: Duration,
    /// Maximum number of live entries.
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_millis(300_000),
            capacity: 50,
        }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.capacity == 0 {
            return Err("capacity must be > 0".to_string());
        }
        if self.ttl.is_zero() {
            return Err("ttl must be > 0".to_string());
        }
        Ok(())
    }

    fn ttl_ms(&self) -> u64 {
        u64::try_from(self.ttl.as_millis()).unwrap_or(u64::MAX)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry<T> {
    pub data: T,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub expired: u64,
    pub evicted: u64,
}

/// In-memory memoization with lazy TTL expiry and a hard entry limit.
///
/// When full, the oldest *inserted* entry is dropped. Reads do not refresh
/// an entry's position, and neither does overwriting an existing key.
pub struct ResultCache<T> {
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    entries: HashMap<String, CacheEntry<T>>,
    order: VecDeque<String>,
    stats: CacheStats,
}

impl<T> ResultCache<T> {
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    #[must_use]
    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            entries: HashMap::new(),
            order: VecDeque::new(),
            stats: CacheStats::default(),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Cached value for `key`, or `None` if absent or expired. Expired entries
    /// are removed on the way out.
    pub fn get(&mut self, key: &str) -> Option<&T> {
        let now = self.clock.now_ms();
        let ttl_ms = self.config.ttl_ms();
        let expired = match self.entries.get(key) {
            None => {
                self.stats.misses += 1;
                return None;
            }
            Some(entry) => now.saturating_sub(entry.timestamp) > ttl_ms,
        };

        if expired {
            trace!("cache entry expired");
            self.remove_entry(key);
            self.stats.expired += 1;
            self.stats.misses += 1;
            return None;
        }

        self.stats.hits += 1;
        self.entries.get(key).map(|entry| &entry.data)
    }

    /// Same as `get(key).is_some()`, including its lazy expiry.
    pub fn has(&mut self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn set(&mut self, key: impl Into<String>, data: T) {
        let key = key.into();
        let timestamp = self.clock.now_ms();

        if let Some(entry) = self.entries.get_mut(&key) {
            *entry = CacheEntry { data, timestamp };
            return;
        }

        if self.entries.len() >= self.config.capacity.max(1) {
            if let Some(oldest) = self.order.pop_front() {
                trace!("cache at capacity; evicting oldest entry");
                self.entries.remove(&oldest);
                self.stats.evicted += 1;
            }
        }

        self.order.push_back(key.clone());
        self.entries.insert(key, CacheEntry { data, timestamp });
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn prune(&mut self) -> usize {
        let now = self.clock.now_ms();
        let ttl_ms = self.config.ttl_ms();
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now.saturating_sub(entry.timestamp) <= ttl_ms);
        let entries = &self.entries;
        self.order.retain(|key| entries.contains_key(key));

        let removed = before - self.entries.len();
        if removed > 0 {
            debug!("cache prune removed {removed} expired entries");
        }
        self.stats.expired += removed as u64;
        removed
    }

    pub fn remove(&mut self, key: &str) -> Option<T> {
        self.remove_entry(key).map(|entry| entry.data)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub const fn stats(&self) -> CacheStats {
        self.stats
    }

    fn remove_entry(&mut self, key: &str) -> Option<CacheEntry<T>> {
        let entry = self.entries.remove(key)?;
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
        Some(entry)
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
