//! Example: retrying a flaky network call
//!
//! This example demonstrates:
//! 1. The default policy against a call that fails ~70% of the time
//! 2. A context timeout shorter than the retry schedule
//! 3. A non-retryable error that stops the loop immediately
//!
//! Run with:
//! ```bash
//! RUST_LOG=debug cargo run -p turboretry --example retry_example
//! ```

use rand::Rng;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::time;
use tracing::info;
use tracing_subscriber::EnvFilter;
use turboretry::prelude::*;

#[derive(Debug, Error)]
enum CallError {
    #[error("simulated network error: connection timeout")]
    Network,
    #[error("bad request, do not retry")]
    BadRequest,
    #[error("generic retryable error on attempt {0}")]
    Generic(u32),
    #[error(transparent)]
    Context(#[from] ContextError),
}

/// A call that takes 50ms and fails roughly 70% of the time.
async fn simulated_network_call(ctx: Context, call_id: u32) -> Result<(), CallError> {
    info!(call_id, "attempting simulated network call");

    tokio::select! {
        _ = time::sleep(Duration::from_millis(50)) => {}
        reason = ctx.done() => {
            info!(call_id, %reason, "context done during simulated work");
            return Err(reason.into());
        }
    }

    if rand::thread_rng().gen_range(0..10) < 7 {
        let err = CallError::Network;
        info!(call_id, error = %err, "operation failed");
        return Err(err);
    }

    info!(call_id, "operation succeeded");
    Ok(())
}

/// Example 1: Default policy with a few more attempts
async fn example_default_policy() {
    println!("\n=== Example 1: Default Retry Policy ===\n");

    let mut policy = RetryPolicy::default();
    policy.max_attempts = 5;

    let calls = AtomicU32::new(0);
    let result = policy
        .execute(&Context::background(), |ctx| {
            let call_id = calls.fetch_add(1, Ordering::SeqCst) + 1;
            simulated_network_call(ctx, call_id)
        })
        .await;

    match result {
        Ok(()) => println!("Example 1 eventually succeeded."),
        Err(err) => println!("Example 1 ultimately failed: {err}"),
    }
}

/// Example 2: Context timeout cuts the schedule short
async fn example_context_timeout() {
    println!("\n=== Example 2: Retry with Context Timeout ===\n");

    let ctx = Context::background().with_timeout(Duration::from_millis(200));

    let mut policy = RetryPolicy::default();
    policy.max_attempts = 10;
    policy.initial_delay = Duration::from_millis(70);

    let calls = AtomicU32::new(0);
    let result = execute(&ctx, &policy, |ctx| {
        let call_id = calls.fetch_add(1, Ordering::SeqCst) + 1;
        simulated_network_call(ctx, call_id)
    })
    .await;

    match result {
        Ok(()) => println!("Example 2 succeeded inside the timeout."),
        Err(err) if err.context_error() == Some(ContextError::DeadlineExceeded) => {
            println!("Example 2 failed due to context deadline exceeded, as expected: {err}");
        }
        Err(err) => println!("Example 2 ultimately failed: {err}"),
    }
}

/// Example 3: Non-retryable error on the second attempt
async fn example_non_retryable() {
    println!("\n=== Example 3: Non-Retryable Error ===\n");

    let policy = RetryPolicy::builder()
        .max_attempts(5)
        .retry_if(|err| !matches!(err.downcast_ref::<CallError>(), Some(CallError::BadRequest)))
        .build();

    let calls = AtomicU32::new(0);
    let result = execute(&Context::background(), &policy, |_ctx| {
        let call_id = calls.fetch_add(1, Ordering::SeqCst) + 1;
        async move {
            if call_id == 2 {
                info!(call_id, "returning a non-retryable error");
                Err::<(), _>(CallError::BadRequest)
            } else {
                info!(call_id, "returning a generic retryable error");
                Err(CallError::Generic(call_id))
            }
        }
    })
    .await;

    match result {
        Err(RetryError::Rejected(CallError::BadRequest)) => {
            println!("Example 3 failed due to non-retryable error, as expected.");
        }
        Err(err) => println!("Example 3 failed unexpectedly: {err}"),
        Ok(()) => println!("Example 3 succeeded (should not happen)."),
    }
    println!("Total attempts: {}", calls.load(Ordering::SeqCst));
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    example_default_policy().await;
    example_context_timeout().await;
    example_non_retryable().await;
}
