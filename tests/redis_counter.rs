//! End-to-end counting against a live Redis.
//!
//! Gated on `COUNTERCRAB_TEST_REDIS` (host or host:port); without it the
//! tests are skipped so the suite passes on machines with no Redis running.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use countercrab::{WindowCounter, window_start};

const WINDOW: Duration = Duration::from_secs(60);
const KEYS: usize = 1000;

fn test_endpoint() -> Option<(String, u16)> {
    let raw = std::env::var("COUNTERCRAB_TEST_REDIS").ok()?;
    match raw.rsplit_once(':') {
        Some((host, port)) => Some((host.to_string(), port.parse().ok()?)),
        None => Some((raw, 6379)),
    }
}

fn live_counter() -> Option<WindowCounter> {
    let (host, port) = test_endpoint()?;
    let counter = WindowCounter::builder()
        .host(host)
        .port(port)
        .max_idle(0)
        .max_active(8)
        .client_name("countercrab-test")
        // Unique prefix per run so repeated runs never see stale buckets.
        .prefix_key(format!("countercrab:test:{}", rand::random::<u32>()))
        .fallback_timeout(Duration::from_secs(1))
        .fallback_disabled(true)
        .build()
        .unwrap();
    counter.configure(1000, WINDOW).unwrap();
    Some(counter)
}

struct Step {
    name: &'static str,
    advance: Duration,
    incr_by: i64,
    prev: i64,
    curr: i64,
}

const fn step(
    name: &'static str,
    advance: Duration,
    incr_by: i64,
    prev: i64,
    curr: i64,
) -> Step {
    Step {
        name,
        advance,
        incr_by,
        prev,
        curr,
    }
}

#[tokio::test]
async fn windowed_counts_roll_over_for_many_concurrent_keys() {
    let Some(counter) = live_counter() else {
        eprintln!("skipping: COUNTERCRAB_TEST_REDIS not set");
        return;
    };
    let counter = Arc::new(counter);

    // In each step: advance the window pair, increment every key, then check
    // the previous and current counts for every key.
    let steps = [
        step("t=0m: init", Duration::ZERO, 0, 0, 0),
        step("t=0m: increment by 1", Duration::ZERO, 1, 0, 1),
        step("t=0m: increment by 99", Duration::ZERO, 99, 0, 100),
        step("t=1m: move clock by 1m", WINDOW, 0, 100, 0),
        step("t=1m: increment by 20", Duration::ZERO, 20, 100, 20),
        step("t=1m: increment by 20", Duration::ZERO, 20, 100, 40),
        step("t=2m: move clock by 1m", WINDOW, 0, 40, 0),
        step("t=2m: increment by 1", Duration::ZERO, 1, 40, 1),
        step("t=2m: increment by 9", Duration::ZERO, 9, 40, 10),
        step("t=2m: increment by 20", Duration::ZERO, 20, 40, 30),
        step(
            "t=4m: move clock by 2m",
            Duration::from_secs(120),
            0,
            0,
            0,
        ),
    ];

    let mut current = window_start(SystemTime::now(), WINDOW);
    let mut previous = current - WINDOW;

    for s in steps {
        if !s.advance.is_zero() {
            current += s.advance;
            previous += s.advance;
        }

        if s.incr_by > 0 {
            let tasks: Vec<_> = (0..KEYS)
                .map(|i| {
                    let counter = Arc::clone(&counter);
                    let incr_by = s.incr_by;
                    tokio::spawn(async move {
                        let key = format!("key:{i}");
                        counter.increment_by(&key, current, incr_by).await
                    })
                })
                .collect();
            for task in tasks {
                task.await.unwrap().unwrap_or_else(|e| panic!("{}: {e}", s.name));
            }
        }

        let tasks: Vec<_> = (0..KEYS)
            .map(|i| {
                let counter = Arc::clone(&counter);
                tokio::spawn(async move {
                    let key = format!("key:{i}");
                    counter.get(&key, current, previous).await
                })
            })
            .collect();
        for task in tasks {
            let (curr, prev) = task
                .await
                .unwrap()
                .unwrap_or_else(|e| panic!("{}: {e}", s.name));
            assert_eq!(curr, s.curr, "{}: unexpected current count", s.name);
            assert_eq!(prev, s.prev, "{}: unexpected previous count", s.name);
        }
    }

    counter.close().unwrap();
}

#[tokio::test]
async fn concurrent_increments_on_one_key_sum_exactly() {
    let Some(counter) = live_counter() else {
        eprintln!("skipping: COUNTERCRAB_TEST_REDIS not set");
        return;
    };
    let counter = Arc::new(counter);
    let t0 = window_start(SystemTime::now(), WINDOW);

    let tasks: Vec<_> = (0..2000)
        .map(|_| {
            let counter = Arc::clone(&counter);
            tokio::spawn(async move { counter.increment_by("hot", t0, 1).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(counter.get("hot", t0, t0 - WINDOW).await.unwrap(), (2000, 0));
    counter.close().unwrap();
}
