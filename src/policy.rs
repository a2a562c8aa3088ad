//! Retry policy types and configuration.

use std::time::Duration;

use crate::config::ConfigError;

/// A retry policy describing how a tracker recovers from failed fetches.
///
/// Policies are pure data: they describe retry behavior but don't execute
/// it. The [`crate::scheduler::RetryScheduler`] consumes them.
///
/// Delays grow exponentially: the retry following the k-th consecutive
/// failure waits `base_delay * 2^(k-1)`, optionally capped by `max_delay`.
///
/// # Examples
///
/// ```rust
/// use livetrack::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::exponential(Duration::from_millis(100))
///     .with_max_retries(5)
///     .with_timeout(Duration::from_secs(2));
///
/// assert_eq!(policy.max_retries(), 5);
/// assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
/// assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(800));
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RetryPolicy {
    base_delay: Duration,
    max_retries: u32,
    max_delay: Option<Duration>,
    timeout: Duration,
    auto_retry: bool,
    jitter: JitterStrategy,
}

/// Strategy for adding randomness to delays.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum JitterStrategy {
    /// No jitter applied.
    #[default]
    None,
    /// Add ±percentage randomness to delay.
    Proportional(f64),
    /// Random delay between 0 and calculated delay.
    Full,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential(Duration::from_secs(1))
    }
}

impl RetryPolicy {
    /// Create an exponential backoff policy with the default budget:
    /// 3 retries, a 10 second fetch timeout, auto-retry enabled.
    pub fn exponential(base_delay: Duration) -> Self {
        Self {
            base_delay,
            max_retries: 3,
            max_delay: None,
            timeout: Duration::from_secs(10),
            auto_retry: true,
            jitter: JitterStrategy::None,
        }
    }

    /// Set the retry budget.
    ///
    /// Once this many consecutive retryable failures have been seen the
    /// tracker gives up with a `MAX_RETRIES` error.
    pub fn with_max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    /// Cap individual backoff delays.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use livetrack::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::exponential(Duration::from_millis(100))
    ///     .with_max_retries(10)
    ///     .with_max_delay(Duration::from_millis(500));
    ///
    /// assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(400));
    /// assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(500));
    /// ```
    pub fn with_max_delay(mut self, d: Duration) -> Self {
        self.max_delay = Some(d);
        self
    }

    /// Set how long a single fetch may run before it is abandoned.
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout = d;
        self
    }

    /// Enable or disable automatic retries.
    ///
    /// Manual retries are accepted either way.
    pub fn with_auto_retry(mut self, enabled: bool) -> Self {
        self.auto_retry = enabled;
        self
    }

    /// Add proportional jitter to delays.
    ///
    /// The factor is clamped to `0.0..=1.0`; `0.25` means ±25%.
    ///
    /// **Note**: Requires the `jitter` feature. Without it, delays are exact.
    pub fn with_jitter(mut self, factor: f64) -> Self {
        self.jitter = JitterStrategy::Proportional(factor.clamp(0.0, 1.0));
        self
    }

    /// Use full jitter: a random delay between zero and the computed delay.
    ///
    /// **Note**: Requires the `jitter` feature. Without it, delays are exact.
    pub fn with_full_jitter(mut self) -> Self {
        self.jitter = JitterStrategy::Full;
        self
    }

    /// Base delay of the first retry.
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Retry budget.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay cap, if any.
    pub fn max_delay(&self) -> Option<Duration> {
        self.max_delay
    }

    /// Per-fetch timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Whether failures are retried automatically.
    pub fn auto_retry(&self) -> bool {
        self.auto_retry
    }

    /// Get the jitter strategy.
    pub fn jitter(&self) -> &JitterStrategy {
        &self.jitter
    }

    /// True once `retry_count` consecutive failures have used the budget.
    pub fn is_exhausted(&self, retry_count: u32) -> bool {
        retry_count >= self.max_retries
    }

    /// Delay before retry `attempt` (0-indexed), without jitter.
    ///
    /// Delay = base_delay * 2^attempt, capped by `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let raw = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        match self.max_delay {
            Some(max) => raw.min(max),
            None => raw,
        }
    }

    /// Delay before retry `attempt` with jitter applied.
    pub fn delay_with_jitter(&self, attempt: u32) -> Duration {
        self.jitter
            .apply(self.delay_for_attempt(attempt), self.max_delay)
    }

    /// Check the policy for values that would make a tracker useless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_retries == 0 {
            return Err(ConfigError::ZeroRetries);
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}

impl JitterStrategy {
    /// Apply jitter to a base delay, then re-apply the cap.
    pub fn apply(&self, base_delay: Duration, max_delay: Option<Duration>) -> Duration {
        let jittered = match self {
            JitterStrategy::None => base_delay,
            #[cfg(feature = "jitter")]
            JitterStrategy::Proportional(factor) => {
                use rand::Rng;
                let base_millis = base_delay.as_millis() as f64;
                let range = base_millis * factor;
                let min = (base_millis - range).max(0.0);
                let max = base_millis + range;
                if max <= min {
                    base_delay
                } else {
                    let millis = rand::rng().random_range(min..=max);
                    Duration::from_millis(millis as u64)
                }
            }
            #[cfg(not(feature = "jitter"))]
            JitterStrategy::Proportional(_) => base_delay,
            #[cfg(feature = "jitter")]
            JitterStrategy::Full => {
                use rand::Rng;
                let max_millis = base_delay.as_millis() as u64;
                if max_millis == 0 {
                    Duration::ZERO
                } else {
                    Duration::from_millis(rand::rng().random_range(0..=max_millis))
                }
            }
            #[cfg(not(feature = "jitter"))]
            JitterStrategy::Full => base_delay,
        };

        match max_delay {
            Some(max) => jittered.min(max),
            None => jittered,
        }
    }
}
