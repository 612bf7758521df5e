//! Counter storage backends.
//!
//! Two implementations of one capability: the Redis-backed shared store used
//! in normal operation, and the in-process store that keeps the system
//! available while Redis is unreachable. The availability gate picks which
//! one serves a given call.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

mod local;
mod remote;

pub(crate) use local::LocalCounterStore;
pub(crate) use remote::RedisCounterStore;

#[async_trait]
pub(crate) trait CounterStore: Send + Sync {
    /// Atomically add `amount` to the bucket at `key`, creating it with
    /// `expiry` when it does not exist. Concurrent increments on one key
    /// must never lose updates.
    async fn increment_by(&self, key: &str, amount: i64, expiry: Duration) -> Result<()>;

    /// Read every requested bucket in one round trip. Absent or expired
    /// buckets read as 0.
    async fn read_many(&self, keys: &[String]) -> Result<Vec<i64>>;
}
