//! Bounded pool of multiplexed Redis connections.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use redis::aio::MultiplexedConnection;
use redis::{Client, ConnectionAddr, ConnectionInfo, RedisConnectionInfo};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::timeout;
use tracing::debug;

use crate::config::CounterConfig;
use crate::error::{CounterError, Result};

/// At most `max_active` connections are live at once; callers past the bound
/// wait on the semaphore up to `acquire_timeout`. Up to `max_idle`
/// connections are retained for reuse, the rest are dropped on release.
pub(crate) struct ConnectionPool {
    client: Client,
    client_name: String,
    slots: Arc<Semaphore>,
    idle: Mutex<Vec<MultiplexedConnection>>,
    max_idle: usize,
    connect_timeout: Duration,
    acquire_timeout: Duration,
    closed: AtomicBool,
}

/// A checked-out connection holding one pool slot. Dropping it releases the
/// slot without retaining the connection; pass it back through
/// [`ConnectionPool::release`] to keep the connection for reuse.
#[derive(Debug)]
pub(crate) struct PooledConnection {
    pub(crate) conn: MultiplexedConnection,
    _slot: OwnedSemaphorePermit,
}

impl ConnectionPool {
    pub(crate) fn new(config: &CounterConfig) -> Result<Self> {
        let info = ConnectionInfo {
            addr: ConnectionAddr::Tcp(config.host.clone(), config.port),
            redis: RedisConnectionInfo {
                db: config.db_index,
                ..Default::default()
            },
        };
        let client = Client::open(info)?;
        Ok(Self {
            client,
            client_name: config.client_name.clone(),
            slots: Arc::new(Semaphore::new(config.max_active.max(1))),
            idle: Mutex::new(Vec::new()),
            max_idle: config.max_idle,
            connect_timeout: config.connect_timeout,
            acquire_timeout: config.acquire_timeout,
            closed: AtomicBool::new(false),
        })
    }

    pub(crate) async fn acquire(&self) -> Result<PooledConnection> {
        if self.closed.load(Ordering::Acquire) {
            return Err(CounterError::Closed);
        }

        let slot = match timeout(
            self.acquire_timeout,
            Arc::clone(&self.slots).acquire_owned(),
        )
        .await
        {
            Ok(Ok(slot)) => slot,
            // The semaphore is closed by close(); pending waiters fail
            // deterministically instead of blocking.
            Ok(Err(_)) => return Err(CounterError::Closed),
            Err(_) => return Err(CounterError::PoolExhausted),
        };

        if self.closed.load(Ordering::Acquire) {
            return Err(CounterError::Closed);
        }

        if let Some(conn) = self.idle.lock().pop() {
            return Ok(PooledConnection { conn, _slot: slot });
        }

        let connect = async {
            let mut conn = self.client.get_multiplexed_async_connection().await?;
            if !self.client_name.is_empty() {
                let _: () = redis::cmd("CLIENT")
                    .arg("SETNAME")
                    .arg(&self.client_name)
                    .query_async(&mut conn)
                    .await?;
            }
            Ok::<_, CounterError>(conn)
        };
        let conn = timeout(self.connect_timeout, connect)
            .await
            .map_err(|_| CounterError::Timeout)??;
        debug!("opened new redis connection");

        Ok(PooledConnection { conn, _slot: slot })
    }

    /// Check a healthy connection back in. Connections that saw an error or
    /// timeout are dropped by never being released.
    pub(crate) fn release(&self, pooled: PooledConnection) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        let mut idle = self.idle.lock();
        if idle.len() < self.max_idle {
            idle.push(pooled.conn);
        }
    }

    /// Drop idle connections and fail pending and future acquisitions with
    /// [`CounterError::Closed`].
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.slots.close();
        self.idle.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn refused_config() -> CounterConfig {
        // Bind and drop a listener so the port is known to refuse connections.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        CounterConfig {
            host: "127.0.0.1".to_string(),
            port,
            connect_timeout: Duration::from_millis(200),
            acquire_timeout: Duration::from_millis(200),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn connect_failure_is_a_connection_error() {
        let pool = ConnectionPool::new(&refused_config().await).unwrap();
        let err = pool.acquire().await.unwrap_err();
        assert!(err.is_connection(), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn closed_pool_fails_without_blocking() {
        let pool = ConnectionPool::new(&refused_config().await).unwrap();
        pool.close();
        assert!(matches!(
            pool.acquire().await.unwrap_err(),
            CounterError::Closed
        ));
    }
}
