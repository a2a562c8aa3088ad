//! Error recording collaborators.
//!
//! The tracker hands every classified failure to an [`ErrorRecorder`]
//! supplied by the host. Recording is fire-and-forget: implementations
//! must not block and cannot influence retry behavior.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::error::TrackingError;

/// Sink for tracking failures.
pub trait ErrorRecorder: Send + Sync {
    /// Record one failure.
    fn record(&self, error: &TrackingError);
}

/// Records failures as `tracing` warnings. The tracker's default.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRecorder;

impl ErrorRecorder for TracingRecorder {
    fn record(&self, error: &TrackingError) {
        tracing::warn!(
            code = %error.code(),
            retryable = error.is_retryable(),
            "tracking error: {}",
            error.message()
        );
    }
}

/// Keeps the most recent failures in memory, oldest evicted first.
#[derive(Debug)]
pub struct MemoryRecorder {
    capacity: usize,
    entries: Mutex<VecDeque<TrackingError>>,
}

impl MemoryRecorder {
    /// Default number of retained errors.
    pub const DEFAULT_CAPACITY: usize = 10;

    /// Retain at most `capacity` errors.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Retained errors, oldest first.
    pub fn entries(&self) -> Vec<TrackingError> {
        match self.entries.lock() {
            Ok(entries) => entries.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }

    /// Number of retained errors.
    pub fn len(&self) -> usize {
        match self.entries.lock() {
            Ok(entries) => entries.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    /// True if nothing has been recorded (or everything was cleared).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all retained errors.
    pub fn clear(&self) {
        match self.entries.lock() {
            Ok(mut entries) => entries.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }
}

impl Default for MemoryRecorder {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl ErrorRecorder for MemoryRecorder {
    fn record(&self, error: &TrackingError) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = match self.entries.lock() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(error.clone());
    }
}
