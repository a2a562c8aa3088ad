//! Tracker configuration.
//!
//! Configuration is plain data built with `with_*` methods. Hosts that keep
//! settings in files can enable the `serde` feature and deserialize a
//! [`TrackerConfig`] directly; missing fields fall back to defaults.
//!
//! ```rust
//! use livetrack::{RetryPolicy, TrackerConfig};
//! use std::time::Duration;
//!
//! let config = TrackerConfig::new(Duration::from_secs(5)).with_policy(
//!     RetryPolicy::exponential(Duration::from_secs(1))
//!         .with_max_retries(3)
//!         .with_timeout(Duration::from_secs(10)),
//! );
//!
//! assert!(config.validate().is_ok());
//! ```

use std::fmt;
use std::time::Duration;

use crate::policy::RetryPolicy;

/// Settings for a [`crate::Tracker`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TrackerConfig {
    update_interval: Duration,
    policy: RetryPolicy,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl TrackerConfig {
    /// Poll every `update_interval` using the default retry policy.
    pub fn new(update_interval: Duration) -> Self {
        Self {
            update_interval,
            policy: RetryPolicy::default(),
        }
    }

    /// Replace the retry policy.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replace the polling interval.
    pub fn with_update_interval(mut self, interval: Duration) -> Self {
        self.update_interval = interval;
        self
    }

    /// Time between interval-driven fetches.
    pub fn update_interval(&self) -> Duration {
        self.update_interval
    }

    /// The retry policy.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Reject configurations a tracker cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.update_interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        self.policy.validate()
    }
}

/// Invalid configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// The polling interval is zero.
    ZeroInterval,
    /// The fetch timeout is zero.
    ZeroTimeout,
    /// The retry budget is zero.
    ZeroRetries,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroInterval => write!(f, "update interval must be greater than zero"),
            ConfigError::ZeroTimeout => write!(f, "fetch timeout must be greater than zero"),
            ConfigError::ZeroRetries => write!(f, "max retries must be at least one"),
        }
    }
}

impl std::error::Error for ConfigError {}
