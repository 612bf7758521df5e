//! Remote-store availability tracking and per-call routing.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::clock::Clock;

/// Which store serves the current call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Route {
    Remote,
    Local,
}

#[derive(Debug, Clone, Copy)]
enum State {
    Healthy,
    Degraded { until: SystemTime },
}

/// Routes calls between the remote store and the local fallback.
///
/// Healthy calls go remote. A remote failure degrades the gate for the
/// fallback timeout; during that period every call routes straight to the
/// local store without touching Redis. Once the period elapses the next call
/// probes the remote store; a failed probe extends the degraded period
/// instead of letting every call retry a struggling dependency.
pub(crate) struct AvailabilityGate {
    state: Mutex<State>,
    fallback_timeout: Duration,
    fallback_disabled: bool,
    clock: Arc<dyn Clock>,
}

impl AvailabilityGate {
    pub(crate) fn new(
        fallback_timeout: Duration,
        fallback_disabled: bool,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            state: Mutex::new(State::Healthy),
            fallback_timeout,
            fallback_disabled,
            clock,
        }
    }

    pub(crate) fn route(&self) -> Route {
        if self.fallback_disabled {
            return Route::Remote;
        }
        match *self.state.lock() {
            State::Healthy => Route::Remote,
            State::Degraded { until } => {
                if self.clock.now() >= until {
                    // Degraded period elapsed: this call probes the remote store.
                    Route::Remote
                } else {
                    Route::Local
                }
            }
        }
    }

    pub(crate) fn record_success(&self) {
        let mut state = self.state.lock();
        if matches!(*state, State::Degraded { .. }) {
            info!("remote counter store recovered");
            *state = State::Healthy;
        }
    }

    /// Concurrent failures are serialized by the state mutex; the first one
    /// in a failure episode logs the transition, later ones just push the
    /// degraded deadline further out.
    pub(crate) fn record_failure(&self) {
        if self.fallback_disabled {
            return;
        }
        let until = self.clock.now() + self.fallback_timeout;
        let mut state = self.state.lock();
        if matches!(*state, State::Healthy) {
            warn!("remote counter store unavailable, serving from local fallback");
        }
        *state = State::Degraded { until };
    }
}
