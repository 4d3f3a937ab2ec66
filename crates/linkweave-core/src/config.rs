//! Run configuration.
//!
//! The configuration is persisted with the upload state, so a resumed run
//! keeps the settings of the run it continues.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::error::CoreError;

/// Retry schedule for remote requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts per request, the first one included
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay_ms: u64,
    /// Factor applied to the delay after every failed attempt
    pub backoff_multiplier: f64,
    /// Upper bound for a single delay
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 7,
            initial_delay_ms: 1000,
            backoff_multiplier: 2.0,
            max_delay_ms: 64_000,
        }
    }
}

impl RetryPolicy {
    /// Policy that retries without waiting; handy for tests
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay_ms: 0,
            backoff_multiplier: 1.0,
            max_delay_ms: 0,
        }
    }

    /// Delay to wait after the `attempt`-th failed attempt (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as f64;
        let delay_ms = (self.initial_delay_ms as f64 * self.backoff_multiplier.powf(exponent))
            .min(self.max_delay_ms as f64)
            .max(0.0) as u64;
        Duration::from_millis(delay_ms)
    }
}

/// Settings of one upload run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Retry schedule for create and patch requests
    #[serde(default)]
    pub retry: RetryPolicy,

    /// Persist the upload state after this many record outcomes
    #[serde(default = "default_checkpoint_every")]
    pub checkpoint_every: usize,

    /// Queue previously failed records again when resuming
    #[serde(default = "default_retry_failed_on_resume")]
    pub retry_failed_on_resume: bool,
}

fn default_checkpoint_every() -> usize {
    1
}

fn default_retry_failed_on_resume() -> bool {
    true
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            checkpoint_every: default_checkpoint_every(),
            retry_failed_on_resume: default_retry_failed_on_resume(),
        }
    }
}

impl UploadConfig {
    /// Defaults overridden by `LINKWEAVE_*` environment variables.
    ///
    /// A `.env` file in the working directory is loaded first if present.
    pub fn from_env() -> Result<Self, CoreError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for the `LINKWEAVE_*` keys
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = parse_var(&lookup, "LINKWEAVE_MAX_ATTEMPTS")? {
            config.retry.max_attempts = v;
        }
        if let Some(v) = parse_var(&lookup, "LINKWEAVE_INITIAL_DELAY_MS")? {
            config.retry.initial_delay_ms = v;
        }
        if let Some(v) = parse_var(&lookup, "LINKWEAVE_BACKOFF_MULTIPLIER")? {
            config.retry.backoff_multiplier = v;
        }
        if let Some(v) = parse_var(&lookup, "LINKWEAVE_MAX_DELAY_MS")? {
            config.retry.max_delay_ms = v;
        }
        if let Some(v) = parse_var(&lookup, "LINKWEAVE_CHECKPOINT_EVERY")? {
            config.checkpoint_every = v;
        }
        if let Some(v) = parse_var(&lookup, "LINKWEAVE_RETRY_FAILED_ON_RESUME")? {
            config.retry_failed_on_resume = v;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the orchestrator cannot work with
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.retry.max_attempts == 0 {
            return Err(CoreError::ConfigurationError(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.checkpoint_every == 0 {
            return Err(CoreError::ConfigurationError(
                "checkpoint_every must be at least 1".to_string(),
            ));
        }
        if !self.retry.backoff_multiplier.is_finite() || self.retry.backoff_multiplier < 1.0 {
            return Err(CoreError::ConfigurationError(format!(
                "backoff_multiplier must be a finite number >= 1, got {}",
                self.retry.backoff_multiplier
            )));
        }
        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, CoreError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| CoreError::ConfigurationError(format!("invalid value for {key}: {e}"))),
    }
}
