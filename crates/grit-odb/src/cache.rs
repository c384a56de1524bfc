//! TTL-sliding object cache.

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use grit_graph::LogEntry;
use grit_hash::ObjectId;
use grit_object::{Object, RawObject};
use lru::LruCache;

/// Which representation of an object a cache slot holds.
///
/// Raw bytes, parsed objects, and projected log entries are cached
/// independently so a typed read never pays for a representation it does
/// not want.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheFamily {
    Raw,
    Parsed,
    Log,
}

/// A cached value.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Raw(RawObject),
    Parsed(Object),
    Log(LogEntry),
}

struct Slot {
    value: CacheValue,
    last_access: Instant,
}

/// Capacity-bounded LRU cache whose entries also expire on a sliding TTL:
/// every hit renews the entry's clock.
///
/// Errors are never cached; only successfully materialized values enter.
pub struct TtlCache {
    slots: LruCache<(ObjectId, CacheFamily), Slot>,
    ttl: Duration,
}

impl TtlCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            slots: LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap()),
            ),
            ttl,
        }
    }

    /// Fetch a live entry, renewing its TTL. Expired entries are evicted.
    pub fn get(&mut self, id: &ObjectId, family: CacheFamily) -> Option<CacheValue> {
        let key = (*id, family);
        let now = Instant::now();

        let expired = match self.slots.get_mut(&key) {
            Some(slot) if now.duration_since(slot.last_access) <= self.ttl => {
                slot.last_access = now;
                return Some(slot.value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            self.slots.pop(&key);
        }
        None
    }

    /// Insert or replace an entry.
    pub fn put(&mut self, id: ObjectId, family: CacheFamily, value: CacheValue) {
        self.slots.put(
            (id, family),
            Slot {
                value,
                last_access: Instant::now(),
            },
        );
    }

    /// Number of live slots (including any not yet expired-and-evicted).
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.slots.clear();
    }
}
