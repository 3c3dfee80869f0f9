//! Exponential backoff schedule with optional jitter.

use super::policy::RetryPolicy;
use rand::Rng;
use std::time::Duration;

/// The sequence of waits for one retry invocation.
///
/// Each call to [`Iterator::next`] yields the next *unjittered* wait and then
/// grows the stored delay for the round after it. The first value is the
/// policy's `initial_delay` exactly as configured; later values are scaled by
/// `factor` and clamped to `max_delay`.
///
/// # Mathematical Formula
///
/// ```text
/// wait_1 = initial_delay
/// wait_k = min(wait_{k-1} * factor, max_delay)    if factor > 0
/// wait_k = wait_{k-1}                             otherwise
/// ```
///
/// Jitter is applied by [`Backoff::next_wait`] to the value being slept only;
/// the randomized wait never feeds into the next round's computation.
///
/// # Examples
///
/// ```rust
/// use turboretry::{Backoff, RetryPolicy};
/// use std::time::Duration;
///
/// let policy = RetryPolicy::builder()
///     .initial_delay(Duration::from_millis(5))
///     .max_delay(Duration::from_millis(20))
///     .factor(2.0)
///     .jitter(false)
///     .build();
///
/// let waits: Vec<_> = Backoff::new(&policy).take(4).collect();
/// assert_eq!(
///     waits,
///     [5, 10, 20, 20].map(Duration::from_millis),
/// );
/// ```
#[derive(Debug, Clone)]
pub struct Backoff {
    current: Duration,
    max_delay: Duration,
    factor: f64,
    jitter: bool,
}

impl Backoff {
    /// Start a schedule at the policy's initial delay.
    pub fn new(policy: &RetryPolicy) -> Self {
        Self {
            current: policy.initial_delay,
            max_delay: policy.max_delay,
            factor: policy.factor,
            jitter: policy.jitter,
        }
    }

    /// The next wait, with jitter applied if the policy enables it.
    pub fn next_wait(&mut self) -> Duration {
        let delay = self.advance();
        if self.jitter { jitter(delay) } else { delay }
    }

    fn advance(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.grow(delay);
        delay
    }

    fn grow(&self, delay: Duration) -> Duration {
        // NaN and non-positive factors hold the delay constant.
        let next = if self.factor > 0.0 {
            scale(delay, self.factor)
        } else {
            delay
        };

        if !self.max_delay.is_zero() && next > self.max_delay {
            self.max_delay
        } else {
            next
        }
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        Some(self.advance())
    }
}

/// Multiply in nanoseconds so integral factors stay exact, saturating on overflow.
///
/// A zero delay or a NaN product (`0 * inf`) holds the delay where it is.
fn scale(delay: Duration, factor: f64) -> Duration {
    if delay.is_zero() || factor == 1.0 {
        return delay;
    }
    let nanos = delay.as_nanos() as f64 * factor;
    if nanos.is_nan() {
        return delay;
    }
    if nanos < u64::MAX as f64 {
        return Duration::from_nanos(nanos.round() as u64);
    }
    Duration::try_from_secs_f64(nanos / 1e9).unwrap_or(Duration::MAX)
}

/// "Equal jitter": a uniform draw from `[delay / 2, delay]`.
///
/// Keeping the lower half guarantees progress between attempts while the
/// upper bound never exceeds the computed delay.
fn jitter(delay: Duration) -> Duration {
    let half = delay / 2;
    let spread = u64::try_from((delay - half).as_nanos()).unwrap_or(u64::MAX);
    if spread == 0 {
        return delay;
    }
    half + Duration::from_nanos(rand::thread_rng().gen_range(0..=spread))
}
