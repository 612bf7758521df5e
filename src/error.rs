use thiserror::Error;

/// Error type for counter operations.
#[derive(Debug, Error)]
pub enum CounterError {
    /// Network, protocol, or server error from the remote store.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// No pool slot became available within the acquisition timeout.
    #[error("connection pool exhausted")]
    PoolExhausted,

    /// A connect or remote round trip did not complete in time.
    #[error("remote operation timed out")]
    Timeout,

    /// The counter has been closed.
    #[error("counter is closed")]
    Closed,

    /// Window duration must be positive.
    #[error("window duration must be positive")]
    ZeroWindow,

    /// Increment amounts must be zero or positive.
    #[error("negative increment amount: {0}")]
    NegativeAmount(i64),
}

impl CounterError {
    /// Whether the remote store is unreachable or unresponsive.
    ///
    /// Connection errors engage the local fallback (unless disabled); all
    /// other errors are surfaced to the caller unchanged.
    pub fn is_connection(&self) -> bool {
        matches!(
            self,
            Self::Redis(_) | Self::PoolExhausted | Self::Timeout
        )
    }
}

pub type Result<T> = std::result::Result<T, CounterError>;
