//! The retry loop.

use super::backoff::Backoff;
use super::policy::RetryPolicy;
use crate::context::Context;
use crate::error::RetryError;
use std::error::Error;
use std::future::Future;
use tokio::time;

/// Run `operation` until it succeeds, is rejected, runs out of attempts, or
/// `ctx` is done.
///
/// Each attempt receives a handle to `ctx` so the operation can observe
/// cancellation itself. Between attempts the executor sleeps for the next
/// backoff delay, racing the sleep against the context.
///
/// # Outcomes
///
/// In priority order:
///
/// 1. `ctx` already done before an attempt → [`RetryError::Context`]
/// 2. the operation succeeds → `Ok(value)`, with no further waiting
/// 3. the predicate rejects the error → [`RetryError::Rejected`] holding it verbatim
/// 4. `ctx` finishes during the wait → [`RetryError::Context`]
/// 5. the final attempt fails retryably → [`RetryError::Exhausted`]
///
/// Outcomes 4 and 5 never meet in one round: there is no wait after the
/// final attempt.
///
/// A policy with `max_attempts == 0` returns [`RetryError::NoAttempts`]
/// without invoking the operation.
///
/// # Examples
///
/// ```rust
/// use turboretry::{execute, Context, RetryPolicy};
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut policy = RetryPolicy::default();
/// policy.max_attempts = 5;
/// policy.initial_delay = Duration::from_millis(1);
///
/// let calls = AtomicU32::new(0);
/// let value = execute(&Context::background(), &policy, |_ctx| {
///     let call = calls.fetch_add(1, Ordering::SeqCst);
///     async move {
///         if call < 2 {
///             Err(std::io::Error::other("transient"))
///         } else {
///             Ok("done")
///         }
///     }
/// })
/// .await?;
///
/// assert_eq!(value, "done");
/// assert_eq!(calls.load(Ordering::SeqCst), 3);
/// # Ok(())
/// # }
/// ```
pub async fn execute<F, Fut, T, E>(
    ctx: &Context,
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut(Context) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Error + 'static,
{
    let max_attempts = policy.max_attempts;
    if max_attempts == 0 {
        return Err(RetryError::NoAttempts);
    }

    let mut backoff = Backoff::new(policy);
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;

        if let Some(reason) = ctx.err() {
            #[cfg(feature = "tracing")]
            tracing::debug!(attempt, max_attempts, %reason, "context done before attempt");
            return Err(RetryError::Context(reason));
        }

        let err = match operation(ctx.clone()).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !policy.should_retry(&err) {
            #[cfg(feature = "tracing")]
            tracing::debug!(attempt, max_attempts, error = %err, "error is not retryable");
            return Err(RetryError::Rejected(err));
        }

        if attempt >= max_attempts {
            #[cfg(feature = "tracing")]
            tracing::warn!(attempts = attempt, error = %err, "retry attempts exhausted");
            return Err(RetryError::Exhausted {
                attempts: attempt,
                last: err,
            });
        }

        let wait = backoff.next_wait();

        #[cfg(feature = "tracing")]
        tracing::debug!(
            attempt,
            max_attempts,
            ?wait,
            error = %err,
            "attempt failed, backing off"
        );

        // Dropping the losing branch releases the timer.
        tokio::select! {
            biased;
            reason = ctx.done() => {
                #[cfg(feature = "tracing")]
                tracing::debug!(attempt, %reason, "context done during backoff");
                return Err(RetryError::Context(reason));
            }
            _ = time::sleep(wait) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextError;
    use std::io;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::time::Instant;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::builder()
            .max_attempts(max_attempts)
            .initial_delay(Duration::from_millis(1))
            .jitter(false)
            .build()
    }

    /// Paused-clock timers fire on millisecond ticks.
    fn assert_close(actual: Duration, expected: Duration) {
        assert!(
            actual >= expected && actual < expected + Duration::from_millis(2),
            "expected ~{expected:?}, got {actual:?}"
        );
    }

    #[tokio::test]
    async fn test_immediate_success() {
        let calls = AtomicU32::new(0);
        let result = execute(&Context::background(), &fast_policy(3), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, io::Error>(42) }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_failures_records_waits() {
        let policy = RetryPolicy::builder()
            .max_attempts(5)
            .initial_delay(Duration::from_millis(5))
            .max_delay(Duration::from_millis(20))
            .factor(2.0)
            .jitter(false)
            .build();

        let start = Instant::now();
        let stamps = Mutex::new(Vec::new());
        let result = execute(&Context::background(), &policy, |_| {
            let mut stamps = stamps.lock().unwrap();
            stamps.push(start.elapsed());
            let call = stamps.len();
            async move {
                if call < 5 {
                    Err(io::Error::other(format!("failure {call}")))
                } else {
                    Ok(call)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 5);
        let stamps = stamps.into_inner().unwrap();
        assert_eq!(stamps.len(), 5);
        for (gap, expected) in stamps.windows(2).map(|w| w[1] - w[0]).zip([5, 10, 20, 20]) {
            assert_close(gap, Duration::from_millis(expected));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_jittered_waits_stay_within_half_to_full_delay() {
        let policy = RetryPolicy::builder()
            .max_attempts(5)
            .initial_delay(Duration::from_millis(40))
            .max_delay(Duration::from_millis(200))
            .factor(2.0)
            .jitter(true)
            .build();

        let start = Instant::now();
        let stamps = Mutex::new(Vec::new());
        let result = execute(&Context::background(), &policy, |_| {
            stamps.lock().unwrap().push(start.elapsed());
            async { Err::<(), _>(io::Error::other("transient")) }
        })
        .await;

        assert!(result.unwrap_err().is_exhausted());
        let stamps = stamps.into_inner().unwrap();
        assert_eq!(stamps.len(), 5);
        for (gap, base) in stamps.windows(2).map(|w| w[1] - w[0]).zip([40, 80, 160, 200]) {
            let base = Duration::from_millis(base);
            assert!(
                gap >= base / 2 && gap < base + Duration::from_millis(2),
                "jittered gap {gap:?} outside [{:?}, {base:?}]",
                base / 2
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_wait_after_final_attempt() {
        let policy = RetryPolicy::builder()
            .max_attempts(2)
            .initial_delay(Duration::from_secs(1))
            .jitter(false)
            .build();

        let start = Instant::now();
        let result = execute(&Context::background(), &policy, |_| async {
            Err::<(), _>(io::Error::other("always"))
        })
        .await;

        assert!(result.unwrap_err().is_exhausted());
        assert_close(start.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_exhaustion_reports_attempts() {
        let calls = AtomicU32::new(0);
        let err = execute(&Context::background(), &fast_policy(4), |_| {
            let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Err::<(), _>(io::Error::other(format!("failure {call}"))) }
        })
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(err.attempts(), Some(4));
        assert_eq!(err.to_string(), "operation failed after 4 attempts: failure 4");
    }

    #[tokio::test]
    async fn test_rejected_error_stops_immediately() {
        let calls = AtomicU32::new(0);
        let policy = fast_policy(5).with_retry_if(|err| {
            err.downcast_ref::<io::Error>().map(io::Error::kind) != Some(io::ErrorKind::InvalidInput)
        });

        let err = execute(&Context::background(), &policy, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err::<(), _>(io::Error::new(io::ErrorKind::InvalidInput, "bad request"))
            }
        })
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        match err {
            RetryError::Rejected(inner) => assert_eq!(inner.kind(), io::ErrorKind::InvalidInput),
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_zero_attempts_rejected() {
        let calls = AtomicU32::new(0);
        let err = execute(&Context::background(), &fast_policy(0), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, io::Error>(()) }
        })
        .await
        .unwrap_err();

        assert!(matches!(err, RetryError::NoAttempts));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_already_cancelled_context() {
        let ctx = Context::background();
        ctx.cancel();

        let calls = AtomicU32::new(0);
        let err = execute(&ctx, &fast_policy(3), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, io::Error>(()) }
        })
        .await
        .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff_returns_promptly() {
        let ctx = Context::background();
        let policy = RetryPolicy::builder()
            .max_attempts(3)
            .initial_delay(Duration::from_secs(60))
            .jitter(false)
            .build();

        let canceller = ctx.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let calls = AtomicU32::new(0);
        let start = Instant::now();
        let err = execute(&ctx, &policy, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(io::Error::other("transient")) }
        })
        .await
        .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_during_backoff() {
        let ctx = Context::background().with_timeout(Duration::from_millis(30));
        let policy = RetryPolicy::builder()
            .max_attempts(10)
            .initial_delay(Duration::from_millis(20))
            .factor(1.0)
            .jitter(false)
            .build();

        let calls = AtomicU32::new(0);
        let err = execute(&ctx, &policy, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(io::Error::other("transient")) }
        })
        .await
        .unwrap_err();

        // Attempts at t=0 and t=20ms; the deadline lands inside the second wait.
        assert!(err.is_deadline_exceeded());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_operation_receives_context() {
        let ctx = Context::background();
        let result = execute(&ctx, &fast_policy(2), |attempt_ctx| async move {
            attempt_ctx.cancel();
            Err::<(), _>(io::Error::other("cancelled myself"))
        })
        .await;

        // The attempt cancelled the shared context, so the wait aborts.
        assert_eq!(
            result.unwrap_err().context_error(),
            Some(ContextError::Canceled)
        );
        assert!(ctx.is_done());
    }
}
