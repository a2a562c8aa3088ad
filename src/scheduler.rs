//! Retry/backoff scheduling state machine.
//!
//! The scheduler is pure bookkeeping: it decides *whether* and *when* a
//! failed fetch should be retried, and the tracker owns the actual timer.
//!
//! ```text
//!            retryable failure, budget left
//!   Idle ─────────────────────────────────▶ Scheduled
//!    ▲                                         │ delay elapsed
//!    │ success                                 ▼
//!    └──────────────────────────────────── Retrying
//!                                              │ failure, budget left
//!                                              └──────▶ Scheduled
//!
//!   any state ── budget used ──▶ Exhausted (until reset)
//! ```

use std::time::Duration;

use crate::error::TrackingError;
use crate::policy::RetryPolicy;

/// Where the scheduler is in the retry cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// No retry pending.
    Idle,
    /// A retry timer is armed.
    Scheduled {
        /// 1-indexed number of the retry that will run.
        attempt: u32,
        /// Backoff before it runs.
        delay: Duration,
    },
    /// A retry fetch is running.
    Retrying,
    /// The budget is used up; nothing runs until [`RetryScheduler::reset`].
    Exhausted,
}

/// Outcome of feeding a failure to the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Arm a retry timer for this delay.
    RetryAfter(Duration),
    /// Keep the error; only a manual retry moves things forward.
    Hold,
    /// The budget is exhausted. Publish this `MAX_RETRIES` error.
    Exhausted(TrackingError),
}

/// Retry bookkeeping for one tracker.
#[derive(Debug, Clone)]
pub struct RetryScheduler {
    policy: RetryPolicy,
    state: SchedulerState,
    retry_count: u32,
}

impl RetryScheduler {
    /// A fresh scheduler in the `Idle` state.
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            state: SchedulerState::Idle,
            retry_count: 0,
        }
    }

    /// Current state.
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Consecutive retryable failures since the last success or reset.
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// The policy driving decisions.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Record a failed fetch and decide what happens next.
    ///
    /// Non-retryable errors leave the count alone and are never retried
    /// automatically. Retryable errors bump the count; once the count
    /// reaches the budget the scheduler becomes `Exhausted`.
    pub fn on_failure(&mut self, error: &TrackingError) -> RetryDecision {
        if !error.is_retryable() {
            self.state = SchedulerState::Idle;
            return RetryDecision::Hold;
        }

        self.retry_count = self.retry_count.saturating_add(1);

        if self.policy.is_exhausted(self.retry_count) {
            self.state = SchedulerState::Exhausted;
            return RetryDecision::Exhausted(TrackingError::max_retries(
                self.policy.max_retries(),
            ));
        }

        if !self.policy.auto_retry() {
            self.state = SchedulerState::Idle;
            return RetryDecision::Hold;
        }

        let delay = self.policy.delay_with_jitter(self.retry_count - 1);
        self.state = SchedulerState::Scheduled {
            attempt: self.retry_count,
            delay,
        };
        RetryDecision::RetryAfter(delay)
    }

    /// The armed timer elapsed. Returns false if nothing was scheduled,
    /// in which case the caller must not fetch.
    pub fn fire(&mut self) -> bool {
        match self.state {
            SchedulerState::Scheduled { .. } => {
                self.state = SchedulerState::Retrying;
                true
            }
            _ => false,
        }
    }

    /// Gate a manual retry.
    ///
    /// Accepted regardless of the auto-retry setting; rejected with a
    /// `MAX_RETRIES` error once the budget is exhausted.
    pub fn begin_manual(&mut self) -> Result<(), TrackingError> {
        if self.policy.is_exhausted(self.retry_count) {
            self.state = SchedulerState::Exhausted;
            return Err(TrackingError::max_retries(self.policy.max_retries()));
        }
        self.state = SchedulerState::Retrying;
        Ok(())
    }

    /// A fetch succeeded.
    pub fn on_success(&mut self) {
        self.retry_count = 0;
        self.state = SchedulerState::Idle;
    }

    /// Drop any pending retry, keeping the count.
    pub fn cancel(&mut self) {
        if self.state != SchedulerState::Exhausted {
            self.state = SchedulerState::Idle;
        }
    }

    /// Forget all failures.
    pub fn reset(&mut self) {
        self.retry_count = 0;
        self.state = SchedulerState::Idle;
    }
}
