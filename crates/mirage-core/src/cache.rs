//! In-memory key/value cache.
//!
//! [`MemoryCache`] stores JSON values with a time-to-live. Keys are stored
//! with a configurable prefix. A disabled cache accepts every call, logs a
//! warning and does nothing, so application code never has to branch on
//! whether caching is turned on.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde_json::Value;

/// Default key prefix.
pub const DEFAULT_PREFIX: &str = "_mirage_";

/// Default time-to-live of one year.
pub const DEFAULT_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    // `None` when the TTL reaches past what `Instant` can represent.
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Concurrent in-memory cache.
///
/// # Example
///
/// ```
/// use mirage_core::MemoryCache;
/// use serde_json::json;
///
/// let cache = MemoryCache::new();
/// cache.set("user:42", json!({"name": "ali"}), None);
/// assert_eq!(cache.get("user:42"), Some(json!({"name": "ali"})));
/// ```
#[derive(Debug)]
pub struct MemoryCache {
    entries: DashMap<String, Entry>,
    prefix: String,
    enabled: bool,
    default_ttl: Duration,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCache {
    /// Creates an enabled cache with the default prefix and TTL.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            prefix: DEFAULT_PREFIX.to_string(),
            enabled: true,
            default_ttl: DEFAULT_TTL,
        }
    }

    /// Sets the key prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Enables or disables the cache.
    #[must_use]
    pub const fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the TTL used when `set` is called without one.
    #[must_use]
    pub const fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Returns `true` if the cache is enabled.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Stores `value` under `key`.
    pub fn set(&self, key: &str, value: Value, ttl: Option<Duration>) {
        if !self.enabled {
            tracing::warn!(key, "cache is disabled, ignoring set");
            return;
        }
        let ttl = ttl.unwrap_or(self.default_ttl);
        tracing::debug!(key, ttl_secs = ttl.as_secs(), "cache set");
        self.entries.insert(
            self.key(key),
            Entry {
                value,
                expires_at: Instant::now().checked_add(ttl),
            },
        );
    }

    /// Returns the value under `key`, if present and not expired.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        if !self.enabled {
            tracing::warn!(key, "cache is disabled, ignoring get");
            return None;
        }
        let full = self.key(key);
        let now = Instant::now();

        let hit = self.entries.get(&full).map(|e| (e.is_expired(now), e.value.clone()));
        match hit {
            Some((false, value)) => {
                tracing::debug!(key, "cache hit");
                Some(value)
            }
            Some((true, _)) => {
                self.entries.remove_if(&full, |_, e| e.is_expired(now));
                tracing::debug!(key, "cache entry expired");
                None
            }
            None => {
                tracing::debug!(key, "cache miss");
                None
            }
        }
    }

    /// Returns every live entry whose key contains `pattern`.
    ///
    /// Keys are returned without the prefix, sorted.
    #[must_use]
    pub fn get_by_pattern(&self, pattern: &str) -> Vec<(String, Value)> {
        if !self.enabled {
            tracing::warn!(pattern, "cache is disabled, ignoring get_by_pattern");
            return Vec::new();
        }
        let now = Instant::now();
        let mut found: Vec<(String, Value)> = self
            .entries
            .iter()
            .filter(|e| !e.is_expired(now))
            .filter_map(|e| {
                let key = e.key().strip_prefix(&self.prefix)?;
                key.contains(pattern)
                    .then(|| (key.to_string(), e.value().value.clone()))
            })
            .collect();
        found.sort_by(|a, b| a.0.cmp(&b.0));
        found
    }

    /// Removes `key`. Returns `true` if an entry was removed.
    pub fn delete(&self, key: &str) -> bool {
        if !self.enabled {
            tracing::warn!(key, "cache is disabled, ignoring delete");
            return false;
        }
        self.entries.remove(&self.key(key)).is_some()
    }

    /// Removes every entry whose key contains `pattern` and returns how
    /// many were removed.
    pub fn remove_by_pattern(&self, pattern: &str) -> usize {
        if !self.enabled {
            tracing::warn!(pattern, "cache is disabled, ignoring remove_by_pattern");
            return 0;
        }
        let before = self.entries.len();
        self.entries.retain(|k, _| {
            !k.strip_prefix(&self.prefix)
                .is_some_and(|key| key.contains(pattern))
        });
        let removed = before.saturating_sub(self.entries.len());
        tracing::debug!(pattern, removed, "cache entries removed");
        removed
    }

    /// Returns the number of stored entries, expired ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn key(&self, key: &str) -> String {
        format!("{}{key}", self.prefix)
    }
}
