//! Scripted data source shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use livetrack::{Fetch, FetchError};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Counters observed by a [`scripted`] source.
#[derive(Clone, Default)]
pub struct Probe {
    calls: Arc<AtomicU32>,
    active: Arc<AtomicU32>,
    max_active: Arc<AtomicU32>,
    times: Arc<Mutex<Vec<Instant>>>,
}

impl Probe {
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn active(&self) -> u32 {
        self.active.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> u32 {
        self.max_active.load(Ordering::SeqCst)
    }

    /// Offsets of each call from the first one.
    pub fn offsets(&self) -> Vec<Duration> {
        let times = self.times.lock().unwrap();
        match times.first() {
            Some(first) => times.iter().map(|t| *t - *first).collect(),
            None => Vec::new(),
        }
    }
}

/// Decrements the active counter even when the fetch future is dropped.
struct ActiveGuard(Arc<AtomicU32>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A source whose n-th call (1-based) resolves to `plan(n)` after `latency`.
pub fn scripted<P>(probe: &Probe, latency: Duration, plan: P) -> impl Fetch<u32>
where
    P: Fn(u32) -> Result<u32, FetchError> + Send + Sync + 'static,
{
    let probe = probe.clone();
    move |cancel: CancellationToken| {
        let n = probe.calls.fetch_add(1, Ordering::SeqCst) + 1;
        probe.times.lock().unwrap().push(Instant::now());
        let result = plan(n);
        let probe = probe.clone();

        async move {
            let now_active = probe.active.fetch_add(1, Ordering::SeqCst) + 1;
            probe.max_active.fetch_max(now_active, Ordering::SeqCst);
            let _guard = ActiveGuard(probe.active.clone());

            if !latency.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(FetchError::message("aborted")),
                    _ = tokio::time::sleep(latency) => {}
                }
            }
            result
        }
    }
}

pub fn network_down(_n: u32) -> Result<u32, FetchError> {
    Err(FetchError::Network("connection refused".into()))
}

pub fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}
