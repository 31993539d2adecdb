use std::time::{Duration, Instant};

use dashmap::DashMap;

struct CacheEntry {
    value: String,
    expires_at: Instant,
}

/// Short-TTL mirror of hot state. Never authoritative: a miss always falls
/// back to the record store, and writes are best-effort.
pub struct CacheLayer {
    entries: DashMap<String, CacheEntry>,
    default_ttl: Duration,
}

impl CacheLayer {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            default_ttl,
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let expired = match self.entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            self.entries.remove(key);
        }
        None
    }

    pub fn put(&self, key: impl Into<String>, value: String) {
        self.put_with_ttl(key, value, self.default_ttl);
    }

    pub fn put_with_ttl(&self, key: impl Into<String>, value: String, ttl: Duration) {
        self.entries.insert(
            key.into(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    pub fn invalidate(&self, key: &str) {
        self.entries.remove(key);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn booking_key(booking_id: &str) -> String {
    format!("booking:{booking_id}")
}

pub fn drivers_notified_key(booking_id: &str) -> String {
    format!("notification:booking:{booking_id}:drivers_notified")
}
