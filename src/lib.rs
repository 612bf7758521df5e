//! # countercrab
//!
//! Fixed-window request counting for rate limiters, backed by a shared Redis
//! store with a transparent in-process fallback.
//!
//! ## Overview
//!
//! A [`WindowCounter`] accumulates per-key counts in fixed time windows and
//! reports the current and previous window in one batched read. An external
//! decision layer compares the two counts against its threshold to allow or
//! deny requests; this crate only counts.
//!
//! - **Atomic increments**: the Redis bucket is updated with a single
//!   server-side operation, so thousands of concurrent writers on one key
//!   never lose updates.
//! - **Bounded pooling**: at most `max_active` connections are live; callers
//!   past the bound wait for a slot instead of spawning unbounded
//!   connections.
//! - **Transparent fallback**: when Redis is unreachable, calls are served
//!   from per-node memory with no error surfaced, and routing returns to
//!   Redis automatically after the fallback timeout.
//!
//! ## Quick start
//!
//! ```no_run
//! use std::time::{Duration, SystemTime};
//! use countercrab::{WindowCounter, window_start};
//!
//! # async fn run() -> countercrab::Result<()> {
//! let counter = WindowCounter::builder()
//!     .host("127.0.0.1")
//!     .port(6379)
//!     .prefix_key("myapp:ratelimit")
//!     .build()?;
//! counter.configure(1000, Duration::from_secs(60))?;
//!
//! let window = Duration::from_secs(60);
//! let current = window_start(SystemTime::now(), window);
//! counter.increment_by("client-1", current, 1).await?;
//! let (curr, prev) = counter.get("client-1", current, current - window).await?;
//! # let _ = (curr, prev);
//! # Ok(())
//! # }
//! ```
//!
//! ## Counting model
//!
//! Buckets are created implicitly on first increment and expire after two
//! window lengths, so the previous window stays readable for one full window
//! after rollover and then ages out on its own. Counts are approximate while
//! the fallback is engaged (per-node rather than shared); exact distributed
//! consensus during a partition is explicitly not a goal.

pub mod clock;
pub mod config;
pub mod counter;
pub mod error;

mod gate;
mod pool;
mod store;
mod window;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CounterConfig;
pub use counter::{CounterBuilder, WindowCounter};
pub use error::{CounterError, Result};
pub use window::window_start;
