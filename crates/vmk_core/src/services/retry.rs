//! Exponential backoff around blocking service calls.

use std::time::Duration;

use backoff::ExponentialBackoff;

use super::ServiceError;
use crate::config::RetrySettings;

/// Retry policy built from the `[retry]` config section.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    initial_interval: Duration,
    max_interval: Duration,
}

impl RetryPolicy {
    pub fn from_settings(settings: &RetrySettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            initial_interval: Duration::from_millis(settings.initial_interval_ms),
            max_interval: Duration::from_millis(settings.max_interval_ms),
        }
    }

    /// Policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            initial_interval: Duration::ZERO,
            max_interval: Duration::ZERO,
        }
    }

    /// Run `op`, retrying transient failures up to `max_retries` times.
    pub fn run<T, F>(&self, what: &str, mut op: F) -> Result<T, ServiceError>
    where
        F: FnMut() -> Result<T, ServiceError>,
    {
        let config = ExponentialBackoff {
            initial_interval: self.initial_interval,
            max_interval: self.max_interval,
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        };

        let mut attempt = 0u32;
        let operation = || {
            attempt += 1;
            op().map_err(|e| {
                if e.is_transient() && attempt <= self.max_retries {
                    tracing::warn!("{} failed (attempt {}), retrying: {}", what, attempt, e);
                    backoff::Error::transient(e)
                } else {
                    backoff::Error::permanent(e)
                }
            })
        };

        backoff::retry(config, operation).map_err(|e| match e {
            backoff::Error::Permanent(err) => err,
            backoff::Error::Transient { err, .. } => err,
        })
    }
}
