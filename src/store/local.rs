//! In-process fallback counter store.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use ahash::AHashMap;
use async_trait::async_trait;
use parking_lot::Mutex;

use super::CounterStore;
use crate::clock::Clock;
use crate::error::Result;

const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Per-node counters used only while the remote store is degraded.
///
/// Keys are partitioned across shards, each behind its own lock, so an
/// outage with thousands of hot keys does not serialize on one mutex.
/// Expired buckets read as 0 immediately; the backing entries are swept
/// lazily, at most once per cleanup interval per shard.
pub(crate) struct LocalCounterStore {
    shards: Vec<Shard>,
    clock: Arc<dyn Clock>,
}

struct Shard {
    data: Mutex<AHashMap<String, Bucket>>,
    next_cleanup: Mutex<SystemTime>,
}

struct Bucket {
    value: i64,
    expires_at: SystemTime,
}

impl LocalCounterStore {
    pub(crate) fn new(clock: Arc<dyn Clock>) -> Self {
        let shard_count = std::thread::available_parallelism()
            .map(|n| n.get() * 4)
            .unwrap_or(16);
        let now = clock.now();
        let shards = (0..shard_count)
            .map(|_| Shard {
                data: Mutex::new(AHashMap::new()),
                next_cleanup: Mutex::new(now + CLEANUP_INTERVAL),
            })
            .collect();
        Self { shards, clock }
    }

    fn shard(&self, key: &str) -> &Shard {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % self.shards.len()]
    }
}

impl Shard {
    fn maybe_clean_expired(&self, now: SystemTime) {
        let mut next_cleanup = self.next_cleanup.lock();
        if now < *next_cleanup {
            return;
        }
        *next_cleanup = now + CLEANUP_INTERVAL;
        drop(next_cleanup);
        self.data.lock().retain(|_, bucket| bucket.expires_at > now);
    }
}

#[async_trait]
impl CounterStore for LocalCounterStore {
    async fn increment_by(&self, key: &str, amount: i64, expiry: Duration) -> Result<()> {
        let now = self.clock.now();
        let shard = self.shard(key);
        shard.maybe_clean_expired(now);

        let mut data = shard.data.lock();
        match data.get_mut(key) {
            // Expiry is fixed at bucket creation; increments do not extend it.
            Some(bucket) if bucket.expires_at > now => bucket.value += amount,
            _ => {
                data.insert(
                    key.to_string(),
                    Bucket {
                        value: amount,
                        expires_at: now + expiry,
                    },
                );
            }
        }
        Ok(())
    }

    async fn read_many(&self, keys: &[String]) -> Result<Vec<i64>> {
        let now = self.clock.now();
        let values = keys
            .iter()
            .map(|key| {
                let data = self.shard(key).data.lock();
                match data.get(key) {
                    Some(bucket) if bucket.expires_at > now => bucket.value,
                    _ => 0,
                }
            })
            .collect();
        Ok(values)
    }
}
