//! Redis-backed shared counter store.

use std::time::Duration;

use async_trait::async_trait;
use redis::Script;
use tokio::time::timeout;

use super::CounterStore;
use crate::config::CounterConfig;
use crate::error::{CounterError, Result};
use crate::pool::ConnectionPool;

/// INCRBY plus EXPIRE as one server-side atomic step. The bucket is new
/// exactly when the returned value equals the delta just applied, so the
/// expiry is set once at creation and never extended by later increments.
const INCREMENT_SCRIPT: &str = r#"
local value = redis.call('INCRBY', KEYS[1], ARGV[1])
if value == tonumber(ARGV[1]) then
    redis.call('EXPIRE', KEYS[1], ARGV[2])
end
return value
"#;

/// Shared counter store speaking to Redis through the bounded pool.
///
/// Reports every network, timeout, or protocol failure as a connection
/// error; retry and fallback policy live in the availability gate.
pub(crate) struct RedisCounterStore {
    pool: ConnectionPool,
    increment: Script,
    request_timeout: Duration,
}

impl RedisCounterStore {
    pub(crate) fn new(config: &CounterConfig) -> Result<Self> {
        Ok(Self {
            pool: ConnectionPool::new(config)?,
            increment: Script::new(INCREMENT_SCRIPT),
            request_timeout: config.request_timeout,
        })
    }

    pub(crate) fn close(&self) {
        self.pool.close();
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn increment_by(&self, key: &str, amount: i64, expiry: Duration) -> Result<()> {
        let mut pooled = self.pool.acquire().await?;
        // EXPIRE takes whole seconds; floor at 1s so a fresh bucket is never
        // created already expired.
        let expiry_secs = expiry.as_secs().max(1);
        let call = async {
            let value: i64 = self
                .increment
                .key(key)
                .arg(amount)
                .arg(expiry_secs)
                .invoke_async(&mut pooled.conn)
                .await?;
            Ok::<i64, CounterError>(value)
        };
        let result = timeout(self.request_timeout, call).await;
        match result {
            Ok(Ok(_value)) => {
                self.pool.release(pooled);
                Ok(())
            }
            Ok(Err(err)) => Err(err),
            Err(_) => Err(CounterError::Timeout),
        }
    }

    async fn read_many(&self, keys: &[String]) -> Result<Vec<i64>> {
        let mut pooled = self.pool.acquire().await?;
        let call = async {
            let values: Vec<Option<i64>> = redis::cmd("MGET")
                .arg(keys)
                .query_async(&mut pooled.conn)
                .await?;
            Ok::<_, CounterError>(values)
        };
        let result = timeout(self.request_timeout, call).await;
        match result {
            Ok(Ok(values)) => {
                self.pool.release(pooled);
                Ok(values.into_iter().map(|v| v.unwrap_or(0)).collect())
            }
            Ok(Err(err)) => Err(err),
            Err(_) => Err(CounterError::Timeout),
        }
    }
}
