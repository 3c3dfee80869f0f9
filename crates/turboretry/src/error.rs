//! Error types for retry invocations.
//!
//! A retry call ends in exactly one of four ways when it does not succeed:
//!
//! | Variant                      | Cause                                        |
//! |------------------------------|----------------------------------------------|
//! | [`RetryError::Context`]      | the context was done before an attempt or during a wait |
//! | [`RetryError::Rejected`]     | the predicate classified an error as terminal |
//! | [`RetryError::Exhausted`]    | every permitted attempt failed retryably     |
//! | [`RetryError::NoAttempts`]   | the policy permitted zero attempts           |

use crate::context::ContextError;
use std::error::Error as StdError;
use thiserror::Error;

/// Terminal failure of a retry invocation.
///
/// `E` is the operation's own error type. Cancellation and rejection keep
/// their underlying error's `Display` and `source()` unchanged, so callers can
/// match on the original value; exhaustion wraps the last error as its
/// `source()`.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// The context was cancelled or its deadline passed.
    #[error(transparent)]
    Context(ContextError),

    /// The operation failed with an error the policy refused to retry.
    #[error(transparent)]
    Rejected(E),

    /// All attempts failed with retryable errors.
    #[error("operation failed after {attempts} attempts: {last}")]
    Exhausted {
        /// Number of attempts made.
        attempts: u32,
        /// The error returned by the final attempt.
        #[source]
        last: E,
    },

    /// The policy's `max_attempts` was zero.
    #[error("retry policy permits no attempts (max_attempts must be at least 1)")]
    NoAttempts,
}

impl<E> RetryError<E> {
    /// Number of attempts reported by an exhaustion error.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            Self::Exhausted { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }

    /// Whether the invocation stopped because its context was done.
    pub fn is_context(&self) -> bool {
        matches!(self, Self::Context(_))
    }

    /// Whether the invocation was explicitly cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Context(ContextError::Canceled))
    }

    /// Whether the invocation ran past its context deadline.
    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, Self::Context(ContextError::DeadlineExceeded))
    }

    /// Whether every permitted attempt was used up.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }

    /// The operation's own error, for rejection and exhaustion.
    pub fn inner(&self) -> Option<&E> {
        match self {
            Self::Rejected(err) | Self::Exhausted { last: err, .. } => Some(err),
            Self::Context(_) | Self::NoAttempts => None,
        }
    }

    /// Consume the error, returning the operation's own error if there is one.
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Rejected(err) | Self::Exhausted { last: err, .. } => Some(err),
            Self::Context(_) | Self::NoAttempts => None,
        }
    }
}

impl<E> RetryError<E>
where
    E: StdError + 'static,
{
    /// Find a [`ContextError`] anywhere in this error's cause chain.
    ///
    /// This detects cancellation that surfaced *through* the operation, such as
    /// an exhaustion error whose last attempt itself returned a context error.
    pub fn context_error(&self) -> Option<ContextError> {
        if let Self::Context(err) = self {
            return Some(*err);
        }
        let mut current = self.inner().map(|e| e as &(dyn StdError + 'static));
        while let Some(err) = current {
            if let Some(ctx_err) = err.downcast_ref::<ContextError>() {
                return Some(*ctx_err);
            }
            current = err.source();
        }
        None
    }
}

impl<E> From<ContextError> for RetryError<E> {
    fn from(err: ContextError) -> Self {
        Self::Context(err)
    }
}
