//! Process-wide timestamp source.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

static LAST: AtomicI64 = AtomicI64::new(i64::MIN);

/// Nanoseconds since the Unix epoch, strictly increasing within the process.
///
/// Wall-clock readings that fail to advance past the previous value are
/// bumped by one nanosecond, so rapid sequential calls never tie.
pub fn now_nanos() -> i64 {
    let now = Utc::now();
    let wall = now
        .timestamp_nanos_opt()
        .unwrap_or_else(|| now.timestamp_micros().saturating_mul(1_000));

    let mut prev = LAST.load(Ordering::Relaxed);
    loop {
        let next = wall.max(prev.saturating_add(1));
        match LAST.compare_exchange_weak(prev, next, Ordering::AcqRel, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(actual) => prev = actual,
        }
    }
}
