//! Runtime tuning for store access.
//!
//! Defaults suit an interactive client. Each knob can be overridden from an
//! `OVERFLOW_*` environment variable holding a plain integer.

#![allow(clippy::missing_errors_doc)]

use std::env;
use std::future::Future;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

const STORE_TIMEOUT_VAR: &str = "OVERFLOW_STORE_TIMEOUT_MS";
const READ_RETRIES_VAR: &str = "OVERFLOW_READ_RETRIES";
const RETRY_BASE_VAR: &str = "OVERFLOW_RETRY_BASE_MS";
const POLL_VAR: &str = "OVERFLOW_POLL_MS";

/// Upper bound on a single backoff sleep, however many retries are configured.
const MAX_BACKOFF: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoreConfig {
    /// Deadline for any single store call.
    pub store_timeout: Duration,
    /// Extra attempts after a failed read before giving up.
    pub read_retries: u32,
    /// First backoff delay; doubles on every further attempt.
    pub retry_base_delay: Duration,
    /// How often a change-feed subscription polls the store.
    pub poll_interval: Duration,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_secs(5),
            read_retries: 3,
            retry_base_delay: Duration::from_millis(200),
            poll_interval: Duration::from_millis(250),
        }
    }
}

impl CoreConfig {
    /// Defaults overridden by whatever `OVERFLOW_*` variables are set.
    pub fn from_env() -> Result<Self> {
        Self::with_overrides(|name| env::var(name).ok())
    }

    /// Defaults overridden by the values `lookup` returns.
    pub fn with_overrides(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(ms) = parse_u64(&lookup, STORE_TIMEOUT_VAR)? {
            config.store_timeout = Duration::from_millis(ms);
        }
        if let Some(retries) = parse_u64(&lookup, READ_RETRIES_VAR)? {
            config.read_retries = u32::try_from(retries)
                .with_context(|| format!("{READ_RETRIES_VAR} is out of range: {retries}"))?;
        }
        if let Some(ms) = parse_u64(&lookup, RETRY_BASE_VAR)? {
            config.retry_base_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_u64(&lookup, POLL_VAR)? {
            if ms == 0 {
                return Err(anyhow!("{POLL_VAR} must be greater than zero"));
            }
            config.poll_interval = Duration::from_millis(ms);
        }

        Ok(config)
    }

    /// Sleep before retry number `attempt` (0-based): base, 2x base, 4x base, ...
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.retry_base_delay
            .checked_mul(factor)
            .map_or(MAX_BACKOFF, |delay| delay.min(MAX_BACKOFF))
    }

    /// Run a store call under `store_timeout`.
    ///
    /// Elapsing counts as a failure of the call itself.
    pub async fn bounded<T, F>(&self, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::time::timeout(self.store_timeout, call)
            .await
            .map_err(|_| anyhow!("store call timed out after {:?}", self.store_timeout))?
    }
}

fn parse_u64(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<u64>> {
    lookup(name)
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
        .map(|raw| {
            raw.parse::<u64>()
                .with_context(|| format!("{name} must be a non-negative integer, got '{raw}'"))
        })
        .transpose()
}
