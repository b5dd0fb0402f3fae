//! A tiny retry-with-backoff helper for store round-trips.
//!
//! Shaped after the teacher's `StepProfiler` in `processor.rs`: wrap a
//! closure, observe the outcome, keep going. Here the observation
//! drives a retry decision instead of a timing log.

use std::thread::sleep;
use std::time::{Duration, Instant};

use crate::error::CoreError;

/// Retries `f` up to `max_attempts` times with linear backoff, as long
/// as the error it returns is retryable and the overall time budget
/// hasn't elapsed. Returns the last error if every attempt fails.
pub fn with_retry<T>(
    max_attempts: u32,
    budget: Duration,
    mut f: impl FnMut() -> Result<T, CoreError>,
) -> Result<T, CoreError> {
    let start = Instant::now();
    let mut last_err = None;
    for attempt in 0..max_attempts.max(1) {
        match f() {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !err.is_retryable() || start.elapsed() >= budget {
                    return Err(err);
                }
                tracing::warn!(attempt, %err, "store operation failed, retrying");
                last_err = Some(err);
                sleep(Duration::from_millis(200 * u64::from(attempt + 1)));
            }
        }
    }
    Err(last_err.unwrap_or_else(|| CoreError::StoreTransient("retry budget exhausted".into())))
}

/// Default retry policy used across the pipeline: five attempts inside
/// a 30 second budget.
pub fn with_default_retry<T>(f: impl FnMut() -> Result<T, CoreError>) -> Result<T, CoreError> {
    with_retry(5, Duration::from_secs(30), f)
}
