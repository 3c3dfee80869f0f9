//! Loading retry policies from configuration files and the environment.
//!
//! [`RetrySettings`] is the serializable face of a [`RetryPolicy`]: every
//! field is optional and falls back to the default policy, so a config file
//! only needs to name what it changes.
//!
//! ```toml
//! [retry]
//! max_attempts = 5
//! initial_delay_ms = 250
//! jitter = false
//! ```
//!
//! The same knobs can be read from the environment:
//!
//! - `TURBORETRY_MAX_ATTEMPTS`
//! - `TURBORETRY_INITIAL_DELAY_MS`
//! - `TURBORETRY_MAX_DELAY_MS`
//! - `TURBORETRY_FACTOR`
//! - `TURBORETRY_JITTER` (`true`/`false`, `1`/`0`, `yes`/`no`)

use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::env::{self, VarError};
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Environment variable for [`RetrySettings::max_attempts`].
pub const ENV_MAX_ATTEMPTS: &str = "TURBORETRY_MAX_ATTEMPTS";
/// Environment variable for [`RetrySettings::initial_delay_ms`].
pub const ENV_INITIAL_DELAY_MS: &str = "TURBORETRY_INITIAL_DELAY_MS";
/// Environment variable for [`RetrySettings::max_delay_ms`].
pub const ENV_MAX_DELAY_MS: &str = "TURBORETRY_MAX_DELAY_MS";
/// Environment variable for [`RetrySettings::factor`].
pub const ENV_FACTOR: &str = "TURBORETRY_FACTOR";
/// Environment variable for [`RetrySettings::jitter`].
pub const ENV_JITTER: &str = "TURBORETRY_JITTER";

/// Errors produced while loading or validating retry settings.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// A value could not be parsed.
    #[error("invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        /// Setting or environment variable name.
        key: &'static str,
        /// The raw value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// `max_attempts` was zero.
    #[error("max_attempts must be at least 1")]
    ZeroAttempts,

    /// `factor` was NaN or infinite.
    #[error("factor must be finite, got {0}")]
    NonFiniteFactor(f64),
}

/// Serializable retry settings.
///
/// Unset fields take their value from [`RetryPolicy::default`]. The retry
/// predicate is code, not configuration, and is attached after conversion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySettings {
    /// Total number of attempts, including the first.
    pub max_attempts: Option<u32>,
    /// Wait before the second attempt, in milliseconds.
    pub initial_delay_ms: Option<u64>,
    /// Ceiling on computed waits, in milliseconds (0 = uncapped).
    pub max_delay_ms: Option<u64>,
    /// Growth factor between waits.
    pub factor: Option<f64>,
    /// Randomize waits.
    pub jitter: Option<bool>,
}

impl RetrySettings {
    /// Read settings from `TURBORETRY_*` environment variables.
    ///
    /// Unset variables stay `None`; set but unparsable ones are an error.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            max_attempts: env_value(ENV_MAX_ATTEMPTS)?,
            initial_delay_ms: env_value(ENV_INITIAL_DELAY_MS)?,
            max_delay_ms: env_value(ENV_MAX_DELAY_MS)?,
            factor: env_value(ENV_FACTOR)?,
            jitter: env_raw(ENV_JITTER)?
                .map(|raw| parse_bool(ENV_JITTER, &raw))
                .transpose()?,
        })
    }

    /// Check the settings without converting them.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == Some(0) {
            return Err(ConfigError::ZeroAttempts);
        }
        if let Some(factor) = self.factor
            && !factor.is_finite()
        {
            return Err(ConfigError::NonFiniteFactor(factor));
        }
        Ok(())
    }

    /// Validate and convert into a policy, filling gaps from the defaults.
    pub fn into_policy(self) -> Result<RetryPolicy, ConfigError> {
        self.validate()?;

        let defaults = RetryPolicy::default();
        Ok(RetryPolicy {
            max_attempts: self.max_attempts.unwrap_or(defaults.max_attempts),
            initial_delay: self
                .initial_delay_ms
                .map_or(defaults.initial_delay, Duration::from_millis),
            max_delay: self
                .max_delay_ms
                .map_or(defaults.max_delay, Duration::from_millis),
            factor: self.factor.unwrap_or(defaults.factor),
            jitter: self.jitter.unwrap_or(defaults.jitter),
            is_retryable: None,
        })
    }
}

impl From<&RetryPolicy> for RetrySettings {
    fn from(policy: &RetryPolicy) -> Self {
        Self {
            max_attempts: Some(policy.max_attempts),
            initial_delay_ms: Some(millis(policy.initial_delay)),
            max_delay_ms: Some(millis(policy.max_delay)),
            factor: Some(policy.factor),
            jitter: Some(policy.jitter),
        }
    }
}

impl RetryPolicy {
    /// Build a policy from `TURBORETRY_*` environment variables.
    ///
    /// See the [`config`](crate::config) module for the variable names.
    pub fn from_env() -> Result<Self, ConfigError> {
        RetrySettings::from_env()?.into_policy()
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn env_raw(key: &'static str) -> Result<Option<String>, ConfigError> {
    match env::var(key) {
        Ok(raw) => Ok(Some(raw)),
        Err(VarError::NotPresent) => Ok(None),
        Err(VarError::NotUnicode(raw)) => Err(ConfigError::InvalidValue {
            key,
            value: raw.to_string_lossy().into_owned(),
            reason: "not valid unicode".to_string(),
        }),
    }
}

fn env_value<T>(key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    let Some(raw) = env_raw(key)? else {
        return Ok(None);
    };
    raw.trim()
        .parse()
        .map(Some)
        .map_err(|e: T::Err| ConfigError::InvalidValue {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        })
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: raw.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}
