#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Context-aware retry with exponential backoff.
//!
//! This crate wraps a fallible async operation in a bounded retry loop:
//!
//! - **Bounded attempts** via [`RetryPolicy::max_attempts`]
//! - **Exponential backoff** with an optional ceiling and jitter
//! - **Pluggable retry predicates** via the [`RetryPredicate`] trait
//! - **Cooperative cancellation** via [`Context`], checked before every
//!   attempt and raced against every backoff sleep
//!
//! Every invocation is self-contained: the policy and the operation are
//! borrowed for the duration of one call and no state survives it.
//!
//! # Examples
//!
//! Using the prelude for convenient imports:
//!
//! ```rust
//! use turboretry::prelude::*;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut policy = RetryPolicy::default();
//! policy.max_attempts = 5;
//! policy.initial_delay = Duration::from_millis(10);
//!
//! let ctx = Context::background().with_timeout(Duration::from_secs(2));
//! let value = policy
//!     .execute(&ctx, |_ctx| async { Ok::<_, std::io::Error>(42) })
//!     .await?;
//! assert_eq!(value, 42);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod retry;

pub use config::{ConfigError, RetrySettings};
pub use context::{Context, ContextError};
pub use error::RetryError;
pub use retry::{AlwaysRetry, Backoff, RetryPolicy, RetryPolicyBuilder, RetryPredicate, execute};

/// Convenient re-exports of commonly used items.
///
/// ```rust
/// use turboretry::prelude::*;
/// ```
pub mod prelude {
    pub use crate::context::{Context, ContextError};
    pub use crate::error::RetryError;
    pub use crate::retry::{RetryPolicy, RetryPredicate, execute};
}
