//! Connection and fallback configuration.

use std::time::Duration;

/// Configuration for a [`WindowCounter`](crate::WindowCounter).
///
/// Immutable after construction. Build one directly, or use
/// [`WindowCounter::builder`](crate::WindowCounter::builder) for the fluent
/// form.
#[derive(Debug, Clone)]
pub struct CounterConfig {
    /// Redis host.
    pub host: String,
    /// Redis port.
    pub port: u16,
    /// Idle connections retained between calls. 0 disables retention.
    pub max_idle: usize,
    /// Upper bound on live connections. Callers past the bound wait up to
    /// [`acquire_timeout`](Self::acquire_timeout) for a slot.
    pub max_active: usize,
    /// Logical Redis database selected at connection setup.
    pub db_index: i64,
    /// Name reported via `CLIENT SETNAME`. Diagnostics only; empty to skip.
    pub client_name: String,
    /// Namespace prefix prepended to every derived counter key. Choose a
    /// value unique per logical deployment to avoid cross-tenant collisions.
    pub prefix_key: String,
    /// How long the gate stays degraded before re-probing the remote store.
    pub fallback_timeout: Duration,
    /// When true, the local fallback is never consulted and remote errors
    /// surface to the caller unchanged. Intended for testing against a real
    /// Redis, not for production defaults.
    pub fallback_disabled: bool,
    /// Bound on establishing (and naming) a new connection.
    pub connect_timeout: Duration,
    /// Bound on a single remote round trip.
    pub request_timeout: Duration,
    /// Bound on waiting for a pool slot.
    pub acquire_timeout: Duration,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            max_idle: 20,
            max_active: 50,
            db_index: 0,
            client_name: "countercrab".to_string(),
            prefix_key: "countercrab".to_string(),
            fallback_timeout: Duration::from_secs(1),
            fallback_disabled: false,
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(5),
            acquire_timeout: Duration::from_secs(5),
        }
    }
}
