//! Public windowed-counter façade.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime};

use parking_lot::RwLock;
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::config::CounterConfig;
use crate::error::{CounterError, Result};
use crate::gate::{AvailabilityGate, Route};
use crate::store::{CounterStore, LocalCounterStore, RedisCounterStore};
use crate::window;

const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy)]
struct Limits {
    max_count: i64,
    window: Duration,
}

/// Windowed request counter backed by Redis with a transparent local
/// fallback.
///
/// For every client key the counter tracks one bucket per fixed time window.
/// [`increment_by`](Self::increment_by) adds to the current window's bucket;
/// [`get`](Self::get) returns the current and previous window's counts in a
/// single batched read, which is what a fixed-window-with-lookback rate
/// limiter needs to make its allow/deny decision.
///
/// The counter is `Send + Sync`; share one instance behind an [`Arc`] across
/// all request handlers. While Redis is unreachable, calls are served from
/// per-node memory and surface no errors; routing returns to Redis
/// automatically once a probe succeeds (see [`CounterConfig`]).
pub struct WindowCounter {
    prefix: String,
    fallback_disabled: bool,
    limits: RwLock<Limits>,
    gate: AvailabilityGate,
    remote: RedisCounterStore,
    local: LocalCounterStore,
    closed: AtomicBool,
}

/// Builder for [`WindowCounter`].
#[derive(Debug)]
pub struct CounterBuilder {
    config: CounterConfig,
    clock: Arc<dyn Clock>,
}

impl CounterBuilder {
    pub fn new() -> Self {
        Self {
            config: CounterConfig::default(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Idle connections retained between calls (0 disables retention).
    pub fn max_idle(mut self, max_idle: usize) -> Self {
        self.config.max_idle = max_idle;
        self
    }

    /// Upper bound on live connections.
    pub fn max_active(mut self, max_active: usize) -> Self {
        self.config.max_active = max_active;
        self
    }

    pub fn db_index(mut self, db_index: i64) -> Self {
        self.config.db_index = db_index;
        self
    }

    pub fn client_name(mut self, client_name: impl Into<String>) -> Self {
        self.config.client_name = client_name.into();
        self
    }

    /// Namespace prefix for all derived counter keys; pick one unique per
    /// logical deployment.
    pub fn prefix_key(mut self, prefix_key: impl Into<String>) -> Self {
        self.config.prefix_key = prefix_key.into();
        self
    }

    /// How long to serve from local memory before re-probing Redis.
    pub fn fallback_timeout(mut self, fallback_timeout: Duration) -> Self {
        self.config.fallback_timeout = fallback_timeout;
        self
    }

    /// Disable the fallback path; remote errors surface unchanged.
    pub fn fallback_disabled(mut self, fallback_disabled: bool) -> Self {
        self.config.fallback_disabled = fallback_disabled;
        self
    }

    pub fn connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.config.connect_timeout = connect_timeout;
        self
    }

    pub fn request_timeout(mut self, request_timeout: Duration) -> Self {
        self.config.request_timeout = request_timeout;
        self
    }

    pub fn acquire_timeout(mut self, acquire_timeout: Duration) -> Self {
        self.config.acquire_timeout = acquire_timeout;
        self
    }

    /// Override the time source. Lets tests drive window expiry and gate
    /// recovery with a [`ManualClock`](crate::ManualClock).
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> Result<WindowCounter> {
        WindowCounter::with_clock(self.config, self.clock)
    }
}

impl Default for CounterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowCounter {
    /// Create a counter from an explicit [`CounterConfig`].
    ///
    /// No connection is opened yet; connections are established on first use.
    pub fn new(config: CounterConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn builder() -> CounterBuilder {
        CounterBuilder::new()
    }

    fn with_clock(config: CounterConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        Ok(Self {
            prefix: config.prefix_key.clone(),
            fallback_disabled: config.fallback_disabled,
            limits: RwLock::new(Limits {
                max_count: 0,
                window: DEFAULT_WINDOW,
            }),
            gate: AvailabilityGate::new(
                config.fallback_timeout,
                config.fallback_disabled,
                Arc::clone(&clock),
            ),
            remote: RedisCounterStore::new(&config)?,
            local: LocalCounterStore::new(clock),
            closed: AtomicBool::new(false),
        })
    }

    /// Set the advisory request limit and the window duration.
    ///
    /// Call once at startup, before traffic; reconfiguring while increments
    /// and reads are in flight is outside the supported contract. Until
    /// called, the window defaults to 60 seconds. `max_count` is stored for
    /// the caller's decision layer and not enforced here.
    pub fn configure(&self, max_count: i64, window: Duration) -> Result<()> {
        if window.is_zero() {
            return Err(CounterError::ZeroWindow);
        }
        *self.limits.write() = Limits { max_count, window };
        Ok(())
    }

    /// Advisory request limit most recently passed to [`configure`](Self::configure).
    pub fn max_count(&self) -> i64 {
        self.limits.read().max_count
    }

    /// Current window duration.
    pub fn window(&self) -> Duration {
        self.limits.read().window
    }

    /// Add `amount` to the bucket for `key` in the window starting at
    /// `window_start`.
    ///
    /// Not idempotent: repeated calls add repeatedly. `amount` must be zero
    /// or positive. Concurrent increments on the same key are never lost.
    pub async fn increment_by(
        &self,
        key: &str,
        window_start: SystemTime,
        amount: i64,
    ) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(CounterError::Closed);
        }
        if amount < 0 {
            return Err(CounterError::NegativeAmount(amount));
        }

        let expiry = self.bucket_expiry();
        let counter_key = window::counter_key(&self.prefix, key, window_start);
        match self.gate.route() {
            Route::Local => self.local.increment_by(&counter_key, amount, expiry).await,
            Route::Remote => match self.remote.increment_by(&counter_key, amount, expiry).await {
                Ok(()) => {
                    self.gate.record_success();
                    Ok(())
                }
                Err(err) if err.is_connection() => {
                    self.gate.record_failure();
                    if self.fallback_disabled {
                        Err(err)
                    } else {
                        self.local.increment_by(&counter_key, amount, expiry).await
                    }
                }
                Err(err) => Err(err),
            },
        }
    }

    /// Read the counts for the current and previous window in one batched
    /// round trip.
    ///
    /// `previous_window` is expected to be `current_window` minus the window
    /// duration; passing a non-adjacent pair is a caller error and the result
    /// is unspecified (both buckets are still read as addressed).
    pub async fn get(
        &self,
        key: &str,
        current_window: SystemTime,
        previous_window: SystemTime,
    ) -> Result<(i64, i64)> {
        if self.closed.load(Ordering::Acquire) {
            return Err(CounterError::Closed);
        }

        let keys = [
            window::counter_key(&self.prefix, key, current_window),
            window::counter_key(&self.prefix, key, previous_window),
        ];
        let values = match self.gate.route() {
            Route::Local => self.local.read_many(&keys).await?,
            Route::Remote => match self.remote.read_many(&keys).await {
                Ok(values) => {
                    self.gate.record_success();
                    values
                }
                Err(err) if err.is_connection() => {
                    self.gate.record_failure();
                    if self.fallback_disabled {
                        return Err(err);
                    }
                    self.local.read_many(&keys).await?
                }
                Err(err) => return Err(err),
            },
        };

        let current = values.first().copied().unwrap_or(0);
        let previous = values.get(1).copied().unwrap_or(0);
        Ok((current, previous))
    }

    /// Release pooled connections.
    ///
    /// Afterwards every operation, including calls already waiting on the
    /// pool, fails with [`CounterError::Closed`] without blocking.
    /// Idempotent.
    pub fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.remote.close();
            debug!("window counter closed");
        }
        Ok(())
    }

    fn bucket_expiry(&self) -> Duration {
        // Two window lengths keeps the previous-window read valid for one
        // full window after rollover.
        self.limits.read().window * 2
    }
}
