//! Retry policy configuration and retry predicates.

use super::executor;
use crate::context::Context;
use crate::error::RetryError;
use std::error::Error;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Default number of attempts, including the first.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Default wait before the second attempt.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(100);
/// Default ceiling on any computed wait.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(1);
/// Default growth factor between waits.
pub const DEFAULT_FACTOR: f64 = 2.0;
/// Jitter is on by default.
pub const DEFAULT_JITTER: bool = true;

/// Decides whether a failed attempt may be retried.
///
/// Implemented for every `Fn(&(dyn Error + 'static)) -> bool` closure, so most
/// callers never name this trait. Use [`Error::downcast_ref`] or [`Error::is`]
/// to match on concrete error types.
///
/// # Examples
///
/// ```rust
/// use turboretry::retry::RetryPredicate;
/// use std::error::Error;
/// use std::io;
///
/// struct TransientOnly;
///
/// impl RetryPredicate for TransientOnly {
///     fn is_retryable(&self, error: &(dyn Error + 'static)) -> bool {
///         error
///             .downcast_ref::<io::Error>()
///             .is_some_and(|e| e.kind() == io::ErrorKind::TimedOut)
///     }
/// }
///
/// let timeout = io::Error::new(io::ErrorKind::TimedOut, "slow");
/// assert!(TransientOnly.is_retryable(&timeout));
/// ```
pub trait RetryPredicate: Send + Sync {
    /// Return `true` if the operation should be attempted again after `error`.
    fn is_retryable(&self, error: &(dyn Error + 'static)) -> bool;
}

impl<F> RetryPredicate for F
where
    F: Fn(&(dyn Error + 'static)) -> bool + Send + Sync,
{
    fn is_retryable(&self, error: &(dyn Error + 'static)) -> bool {
        self(error)
    }
}

/// A predicate that retries every error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlwaysRetry;

impl RetryPredicate for AlwaysRetry {
    fn is_retryable(&self, _error: &(dyn Error + 'static)) -> bool {
        true
    }
}

/// Configuration for one retry invocation.
///
/// The fields are public: start from [`RetryPolicy::default`] and adjust what
/// you need. Each call to `default()` returns an independent value.
///
/// # Delay schedule
///
/// The wait before attempt `n + 1` is the delay computed after attempt `n`:
///
/// ```text
/// wait_1 = initial_delay
/// wait_k = min(wait_{k-1} * factor, max_delay)   (k > 1)
/// ```
///
/// A `factor` of zero or less keeps the delay constant, and a `max_delay` of
/// zero disables the ceiling. The first wait is `initial_delay` as given, even
/// when it exceeds `max_delay`.
///
/// # Examples
///
/// ```rust
/// use turboretry::RetryPolicy;
/// use std::time::Duration;
///
/// let mut policy = RetryPolicy::default();
/// policy.max_attempts = 5;
/// policy.jitter = false;
///
/// let policy = policy.with_retry_if(|err| !err.to_string().contains("bad request"));
/// assert_eq!(policy.max_attempts, 5);
/// ```
#[derive(Clone)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first. Must be at least 1.
    pub max_attempts: u32,
    /// Wait before the second attempt.
    pub initial_delay: Duration,
    /// Ceiling on computed waits. `Duration::ZERO` means uncapped.
    pub max_delay: Duration,
    /// Multiplier applied to the delay after each failed attempt.
    pub factor: f64,
    /// Randomize each wait within `[delay / 2, delay]`.
    pub jitter: bool,
    /// Retry classification. `None` retries every error.
    pub is_retryable: Option<Arc<dyn RetryPredicate>>,
}

impl Default for RetryPolicy {
    /// Defaults:
    /// - `max_attempts`: 3
    /// - `initial_delay`: 100ms
    /// - `max_delay`: 1s
    /// - `factor`: 2.0
    /// - `jitter`: on
    /// - `is_retryable`: every error
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay: DEFAULT_INITIAL_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            factor: DEFAULT_FACTOR,
            jitter: DEFAULT_JITTER,
            is_retryable: None,
        }
    }
}

impl RetryPolicy {
    /// Create a new builder for configuring a policy.
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::default()
    }

    /// Replace the retry predicate with a closure.
    pub fn with_retry_if<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&(dyn Error + 'static)) -> bool + Send + Sync + 'static,
    {
        self.is_retryable = Some(Arc::new(predicate));
        self
    }

    /// Classify `error` with the configured predicate.
    pub fn should_retry(&self, error: &(dyn Error + 'static)) -> bool {
        self.is_retryable
            .as_ref()
            .is_none_or(|predicate| predicate.is_retryable(error))
    }

    /// Run `operation` under this policy.
    ///
    /// Shorthand for [`execute(ctx, self, operation)`](executor::execute).
    pub async fn execute<F, Fut, T, E>(
        &self,
        ctx: &Context,
        operation: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(Context) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Error + 'static,
    {
        executor::execute(ctx, self, operation).await
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("initial_delay", &self.initial_delay)
            .field("max_delay", &self.max_delay)
            .field("factor", &self.factor)
            .field("jitter", &self.jitter)
            .field(
                "is_retryable",
                &self.is_retryable.as_ref().map(|_| "<predicate>"),
            )
            .finish()
    }
}

impl PartialEq for RetryPolicy {
    /// Predicates compare by identity.
    fn eq(&self, other: &Self) -> bool {
        let same_predicate = match (&self.is_retryable, &other.is_retryable) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        };
        self.max_attempts == other.max_attempts
            && self.initial_delay == other.initial_delay
            && self.max_delay == other.max_delay
            && self.factor == other.factor
            && self.jitter == other.jitter
            && same_predicate
    }
}

/// Builder for configuring a [`RetryPolicy`].
///
/// Unset parameters fall back to the [`RetryPolicy::default`] values.
///
/// # Examples
///
/// ```rust
/// use turboretry::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::builder()
///     .max_attempts(5)
///     .initial_delay(Duration::from_millis(50))
///     .max_delay(Duration::from_secs(2))
///     .factor(3.0)
///     .jitter(false)
///     .build();
///
/// assert_eq!(policy.factor, 3.0);
/// ```
#[derive(Default)]
pub struct RetryPolicyBuilder {
    max_attempts: Option<u32>,
    initial_delay: Option<Duration>,
    max_delay: Option<Duration>,
    factor: Option<f64>,
    jitter: Option<bool>,
    is_retryable: Option<Arc<dyn RetryPredicate>>,
}

impl RetryPolicyBuilder {
    /// Set the total number of attempts, including the first.
    ///
    /// Default: 3
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Set the wait before the second attempt.
    ///
    /// Default: 100ms
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = Some(delay);
        self
    }

    /// Set the ceiling on computed waits (`Duration::ZERO` for none).
    ///
    /// Default: 1s
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = Some(delay);
        self
    }

    /// Set the growth factor.
    ///
    /// Default: 2.0
    pub fn factor(mut self, factor: f64) -> Self {
        self.factor = Some(factor);
        self
    }

    /// Enable or disable jitter.
    ///
    /// Default: enabled
    pub fn jitter(mut self, jitter: bool) -> Self {
        self.jitter = Some(jitter);
        self
    }

    /// Retry only errors for which `predicate` returns `true`.
    pub fn retry_if<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&(dyn Error + 'static)) -> bool + Send + Sync + 'static,
    {
        self.is_retryable = Some(Arc::new(predicate));
        self
    }

    /// Use a shared predicate object.
    pub fn predicate(mut self, predicate: Arc<dyn RetryPredicate>) -> Self {
        self.is_retryable = Some(predicate);
        self
    }

    /// Build the `RetryPolicy`.
    pub fn build(self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
            initial_delay: self.initial_delay.unwrap_or(DEFAULT_INITIAL_DELAY),
            max_delay: self.max_delay.unwrap_or(DEFAULT_MAX_DELAY),
            factor: self.factor.unwrap_or(DEFAULT_FACTOR),
            jitter: self.jitter.unwrap_or(DEFAULT_JITTER),
            is_retryable: self.is_retryable,
        }
    }
}
