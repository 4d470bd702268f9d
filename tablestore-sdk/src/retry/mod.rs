//! The three concrete retry policies (§4.3): `Deadline` paces attempts
//! against a wall-clock budget, `Counting` caps the number of attempts,
//! `None` never retries. Each call gets a fresh clone so concurrent calls
//! never share mutable retry state.

use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use tablestore_api::{Action, Error, RetryPolicy};

const PAUSE_BASE_CAP_MS: u64 = 400;

fn doubled_pause_base(attempt: u32) -> Duration {
    let ms = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    Duration::from_millis(ms.min(PAUSE_BASE_CAP_MS))
}

fn uniform_between(rng: &mut StdRng, low: Duration, high: Duration) -> Duration {
    if low >= high {
        return low;
    }
    let low_us = low.as_micros() as u64;
    let high_us = high.as_micros() as u64;
    Duration::from_micros(rng.random_range(low_us..=high_us))
}

/// Retries as long as `Instant::now()` is before the deadline and the error
/// is retriable for the action. Back-off base starts at 1ms and doubles up
/// to a 400ms cap; the actual pause is uniform in `[base/2, base]`.
pub struct DeadlinePolicy {
    deadline: Instant,
    timeout: Duration,
    rng: StdRng,
}

impl DeadlinePolicy {
    pub fn new(timeout: Duration, seed: u64) -> Self {
        DeadlinePolicy {
            deadline: Instant::now() + timeout,
            timeout,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl RetryPolicy for DeadlinePolicy {
    fn should_retry(&self, action: Action, _attempt: u32, error: &Error) -> bool {
        Instant::now() < self.deadline && error.is_retriable_for(action)
    }

    fn next_pause(&mut self, attempt: u32) -> Duration {
        let base = doubled_pause_base(attempt);
        uniform_between(&mut self.rng, base / 2, base)
    }

    fn clone_policy(&self) -> Box<dyn RetryPolicy> {
        let mut rng = self.rng.clone();
        let seed = rng.random();
        Box::new(DeadlinePolicy {
            deadline: Instant::now() + self.timeout,
            timeout: self.timeout,
            rng: StdRng::seed_from_u64(seed),
        })
    }
}

/// Retries up to `max_retries` times, independent of wall-clock time; the
/// pause is uniform in `[100us, interval]`.
pub struct CountingPolicy {
    max_retries: u32,
    interval: Duration,
    rng: StdRng,
}

impl CountingPolicy {
    pub fn new(max_retries: u32, interval: Duration, seed: u64) -> Self {
        assert!(interval >= Duration::from_micros(100), "interval must be at least 100us");
        CountingPolicy { max_retries, interval, rng: StdRng::seed_from_u64(seed) }
    }
}

impl RetryPolicy for CountingPolicy {
    fn should_retry(&self, action: Action, attempt: u32, error: &Error) -> bool {
        attempt < self.max_retries && error.is_retriable_for(action)
    }

    fn next_pause(&mut self, _attempt: u32) -> Duration {
        uniform_between(&mut self.rng, Duration::from_micros(100), self.interval)
    }

    fn clone_policy(&self) -> Box<dyn RetryPolicy> {
        let mut rng = self.rng.clone();
        let seed = rng.random();
        Box::new(CountingPolicy {
            max_retries: self.max_retries,
            interval: self.interval,
            rng: StdRng::seed_from_u64(seed),
        })
    }
}

/// Never retries.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonePolicy;

impl RetryPolicy for NonePolicy {
    fn should_retry(&self, _action: Action, _attempt: u32, _error: &Error) -> bool {
        false
    }

    fn next_pause(&mut self, _attempt: u32) -> Duration {
        Duration::ZERO
    }

    fn clone_policy(&self) -> Box<dyn RetryPolicy> {
        Box::new(NonePolicy)
    }
}
