//! Window truncation and counter-key derivation.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Truncate `now` to the start of its window.
///
/// Two window starts are adjacent when they differ by exactly one `window`
/// duration, so the pair expected by `get` is `(start, start - window)`.
/// Pre-epoch times clamp to the epoch.
pub fn window_start(now: SystemTime, window: Duration) -> SystemTime {
    let secs = now
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let window_secs = window.as_secs().max(1);
    UNIX_EPOCH + Duration::from_secs(secs - secs % window_secs)
}

/// Canonical storage key for one (prefix, client key, window) bucket.
///
/// The trailing segment is the window start in unix seconds and contains no
/// separator, so distinct client keys or windows never collide under one
/// prefix.
pub(crate) fn counter_key(prefix: &str, key: &str, window_start: SystemTime) -> String {
    let unix = window_start
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format!("{prefix}:{key}:{unix}")
}
