//! Retry policies, backoff schedules, and the retry loop.
//!
//! # Key Types
//!
//! - [`RetryPolicy`] - Attempt limit, delay growth, jitter, and retry predicate
//! - [`RetryPredicate`] - Pluggable "may this error be retried?" capability
//! - [`Backoff`] - The delay schedule derived from a policy
//! - [`execute`] - The retry loop itself
//!
//! # Examples
//!
//! ```rust
//! use turboretry::retry::{execute, RetryPolicy};
//! use turboretry::Context;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let policy = RetryPolicy::builder()
//!     .max_attempts(3)
//!     .initial_delay(Duration::from_millis(100))
//!     .build();
//!
//! let result = execute(&Context::background(), &policy, |_ctx| async {
//!     // Your operation here
//!     Ok::<_, std::io::Error>(42)
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

mod backoff;
mod executor;
mod policy;

pub use backoff::Backoff;
pub use executor::execute;
pub use policy::{
    AlwaysRetry, DEFAULT_FACTOR, DEFAULT_INITIAL_DELAY, DEFAULT_JITTER, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_MAX_DELAY, RetryPolicy, RetryPolicyBuilder, RetryPredicate,
};
