//! The polling loop controller.
//!
//! A [`Tracker`] owns one data source and keeps a [`ConnectionState`] up to
//! date by fetching from it on an interval. Failures are classified,
//! recorded, and retried with exponential backoff until the policy's
//! budget is used up.
//!
//! At any moment there is at most one fetch in flight and at most one
//! armed retry timer. Every fetch carries a [`FetchTicket`]; results from a
//! ticket that was superseded or cancelled are dropped without touching
//! state.
//!
//! All methods that spawn work ([`Tracker::start`], [`Tracker::retry`])
//! must be called from within a Tokio runtime.
//!
//! # Example
//!
//! ```rust
//! use livetrack::{FetchError, Tracker, TrackerConfig};
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! # tokio_test::block_on(async {
//! let tracker = Tracker::new(
//!     |_cancel: CancellationToken| async { Ok::<_, FetchError>((515_074, -1_278)) },
//!     TrackerConfig::new(Duration::from_secs(5)),
//! )
//! .unwrap();
//!
//! let mut updates = tracker.subscribe();
//! tracker.start();
//!
//! while !updates.borrow_and_update().is_connected {
//!     updates.changed().await.unwrap();
//! }
//! assert_eq!(tracker.state().data, Some((515_074, -1_278)));
//!
//! tracker.stop();
//! # });
//! ```

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::Instrument;

use crate::config::{ConfigError, TrackerConfig};
use crate::error::TrackingError;
use crate::fetch::{fetch_with_timeout, Fetch, FetchGate, FetchOutcome, FetchTicket};
use crate::recorder::{ErrorRecorder, TracingRecorder};
use crate::scheduler::{RetryDecision, RetryScheduler, SchedulerState};
use crate::state::{ConnectionState, StateStore};

/// What started a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Start,
    Interval,
    Retry,
    Manual,
}

impl Trigger {
    fn as_str(self) -> &'static str {
        match self {
            Trigger::Start => "start",
            Trigger::Interval => "interval",
            Trigger::Retry => "retry",
            Trigger::Manual => "manual",
        }
    }
}

/// Task handles and retry bookkeeping. Guarded by one mutex so that
/// teardown and result application never interleave.
struct Control {
    scheduler: RetryScheduler,
    poller: Option<JoinHandle<()>>,
    retry_timer: Option<JoinHandle<()>>,
    manual: Option<JoinHandle<()>>,
    // bumped whenever the armed timer is replaced or cancelled
    timer_seq: u64,
}

impl Control {
    fn disarm_retry(&mut self) {
        if let Some(timer) = self.retry_timer.take() {
            timer.abort();
        }
        self.timer_seq += 1;
    }

    fn abort_all(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.abort();
        }
        if let Some(manual) = self.manual.take() {
            manual.abort();
        }
        self.disarm_retry();
        self.scheduler.cancel();
    }
}

struct Shared<T> {
    fetcher: Arc<dyn Fetch<T>>,
    config: TrackerConfig,
    store: StateStore<T>,
    gate: FetchGate,
    recorder: Arc<dyn ErrorRecorder>,
    control: Mutex<Control>,
}

impl<T: Send + Sync + 'static> Shared<T> {
    fn lock_control(&self) -> MutexGuard<'_, Control> {
        match self.control.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Cancel everything in flight and drop the loading flag.
    fn teardown(&self, control: &mut Control) {
        control.abort_all();
        self.gate.cancel();
        self.store.update_if(|s| {
            let was_loading = s.is_loading;
            s.is_loading = false;
            was_loading
        });
    }

    /// Run the fetch for `ticket` and apply its outcome.
    async fn run_fetch(self: Arc<Self>, ticket: FetchTicket, trigger: Trigger) {
        let span = tracing::debug_span!(
            "fetch_cycle",
            generation = ticket.generation(),
            trigger = trigger.as_str()
        );

        async {
            if !self.gate.is_current(&ticket) {
                tracing::debug!("ticket superseded before fetch started");
                return;
            }
            self.store.update(|s| s.is_loading = true);
            tracing::debug!("fetch started");

            let timeout = self.config.policy().timeout();
            let outcome = fetch_with_timeout(&*self.fetcher, ticket.token(), timeout).await;
            self.complete(&ticket, outcome);
        }
        .instrument(span)
        .await
    }

    fn complete(self: &Arc<Self>, ticket: &FetchTicket, outcome: FetchOutcome<T>) {
        if outcome.is_cancelled() {
            tracing::debug!("fetch cancelled");
            return;
        }

        let mut control = self.lock_control();
        if !self.gate.finish(ticket) {
            tracing::debug!("discarding stale fetch result");
            return;
        }

        match outcome {
            FetchOutcome::Completed(value) => {
                control.scheduler.on_success();
                tracing::debug!("fetch succeeded");
                self.store.update(|s| {
                    s.is_loading = false;
                    s.is_connected = true;
                    s.error = None;
                    s.last_update = Some(Instant::now());
                    s.retry_count = 0;
                    s.data = Some(value);
                });
            }
            FetchOutcome::Failed(error) => {
                self.recorder.record(&error);
                let published = match control.scheduler.on_failure(&error) {
                    RetryDecision::RetryAfter(delay) => {
                        tracing::warn!(
                            code = %error.code(),
                            retry_count = control.scheduler.retry_count(),
                            ?delay,
                            "fetch failed, retry scheduled"
                        );
                        self.arm_retry(&mut control, delay);
                        error
                    }
                    RetryDecision::Hold => {
                        tracing::warn!(
                            code = %error.code(),
                            retryable = error.is_retryable(),
                            "fetch failed, waiting for manual retry"
                        );
                        error
                    }
                    RetryDecision::Exhausted(exhausted) => {
                        tracing::error!(
                            last_code = %error.code(),
                            max_retries = control.scheduler.policy().max_retries(),
                            "retry budget exhausted, tracking halted"
                        );
                        self.recorder.record(&exhausted);
                        exhausted
                    }
                };
                let retry_count = control.scheduler.retry_count();
                self.store.update(|s| {
                    s.is_loading = false;
                    s.is_connected = false;
                    s.error = Some(published);
                    s.retry_count = retry_count;
                });
            }
            FetchOutcome::Cancelled => {}
        }
    }

    /// Arm the single retry timer, replacing any previous one.
    fn arm_retry(self: &Arc<Self>, control: &mut Control, delay: Duration) {
        control.disarm_retry();
        let seq = control.timer_seq;
        let shared = Arc::clone(self);

        control.retry_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let ticket = {
                let mut control = shared.lock_control();
                if control.timer_seq != seq {
                    return;
                }
                // the handle is released, not aborted: this task goes on to
                // run the fetch and may arm the next timer itself
                control.retry_timer = None;
                if !control.scheduler.fire() {
                    return;
                }
                tracing::debug!(?delay, "retry timer fired");
                shared.gate.begin()
            };

            shared.run_fetch(ticket, Trigger::Retry).await;
        }));
    }

    async fn poll_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.config.update_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut trigger = Trigger::Start;

        loop {
            ticker.tick().await;

            let ticket = {
                let control = self.lock_control();
                let skip = match trigger {
                    Trigger::Start => control.scheduler.state() == SchedulerState::Exhausted,
                    _ => self.store.has_error(),
                };
                if skip {
                    tracing::debug!(trigger = trigger.as_str(), "error unresolved, skipping fetch");
                    trigger = Trigger::Interval;
                    continue;
                }
                self.gate.begin()
            };

            Arc::clone(&self).run_fetch(ticket, trigger).await;
            trigger = Trigger::Interval;
        }
    }
}

/// Polls a data source and publishes its connection state.
pub struct Tracker<T: Send + Sync + 'static> {
    shared: Arc<Shared<T>>,
}

impl<T: Send + Sync + 'static> Tracker<T> {
    /// Create a tracker that logs failures through `tracing`.
    ///
    /// Nothing runs until [`Tracker::start`] or [`Tracker::retry`].
    pub fn new<F>(fetcher: F, config: TrackerConfig) -> Result<Self, ConfigError>
    where
        F: Fetch<T>,
    {
        Self::builder(fetcher).config(config).build()
    }

    /// Start configuring a tracker.
    pub fn builder<F>(fetcher: F) -> TrackerBuilder<T>
    where
        F: Fetch<T>,
    {
        TrackerBuilder {
            fetcher: Arc::new(fetcher),
            config: TrackerConfig::default(),
            recorder: Arc::new(TracingRecorder),
        }
    }

    /// Fetch now, then every `update_interval`.
    ///
    /// Calling this while running tears the previous loop down first. The
    /// immediate fetch is skipped only when the retry budget is exhausted.
    pub fn start(&self) {
        let mut control = self.shared.lock_control();
        if control.poller.is_some() {
            tracing::debug!("restarting tracker");
        }
        self.shared.teardown(&mut control);

        tracing::info!(
            interval = ?self.shared.config.update_interval(),
            "tracker started"
        );
        let shared = Arc::clone(&self.shared);
        control.poller = Some(tokio::spawn(shared.poll_loop()));
    }

    /// Stop polling and cancel any in-flight fetch or pending retry.
    ///
    /// State is left as it was, except that `is_loading` drops to false.
    pub fn stop(&self) {
        let mut control = self.shared.lock_control();
        let was_running = control.poller.is_some();
        self.shared.teardown(&mut control);
        if was_running {
            tracing::info!("tracker stopped");
        }
    }

    /// Fetch now, cancelling any pending retry timer and superseding any
    /// in-flight fetch.
    ///
    /// Accepted even with auto-retry disabled. Once the retry budget is
    /// exhausted this is a no-op that returns (and publishes) the
    /// `MAX_RETRIES` error; call [`Tracker::clear_error`] first.
    pub fn retry(&self) -> Result<(), TrackingError> {
        let mut control = self.shared.lock_control();

        if let Err(exhausted) = control.scheduler.begin_manual() {
            tracing::warn!("manual retry rejected, retry budget exhausted");
            self.shared.store.update_if(|s| {
                let already = s
                    .error
                    .as_ref()
                    .is_some_and(|e| e.code() == exhausted.code());
                if !already {
                    s.error = Some(exhausted.clone());
                }
                !already
            });
            return Err(exhausted);
        }

        control.disarm_retry();
        if let Some(previous) = control.manual.take() {
            previous.abort();
        }
        tracing::debug!("manual retry");

        let ticket = self.shared.gate.begin();
        let shared = Arc::clone(&self.shared);
        control.manual = Some(tokio::spawn(shared.run_fetch(ticket, Trigger::Manual)));
        Ok(())
    }

    /// Forget the current error and the retry count.
    ///
    /// `is_connected`, `last_update` and `data` are left alone. Interval
    /// fetches resume on the next tick.
    pub fn clear_error(&self) {
        let mut control = self.shared.lock_control();
        control.disarm_retry();
        control.scheduler.reset();
        self.shared.store.update(|s| {
            s.error = None;
            s.retry_count = 0;
        });
        tracing::debug!("error cleared");
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState<T>> {
        self.shared.store.subscribe()
    }

    /// Whether the polling loop is active.
    pub fn is_running(&self) -> bool {
        self.shared
            .lock_control()
            .poller
            .as_ref()
            .is_some_and(|poller| !poller.is_finished())
    }

    /// Where the retry scheduler currently is.
    pub fn scheduler_state(&self) -> SchedulerState {
        self.shared.lock_control().scheduler.state()
    }

    /// The configuration this tracker was built with.
    pub fn config(&self) -> &TrackerConfig {
        &self.shared.config
    }
}

impl<T: Clone + Send + Sync + 'static> Tracker<T> {
    /// Snapshot of the current state.
    pub fn state(&self) -> ConnectionState<T> {
        self.shared.store.snapshot()
    }
}

impl<T: Send + Sync + 'static> Drop for Tracker<T> {
    fn drop(&mut self) {
        let mut control = self.shared.lock_control();
        self.shared.teardown(&mut control);
    }
}

impl<T: Send + Sync + 'static> fmt::Debug for Tracker<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracker")
            .field("config", &self.shared.config)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Tracker`].
pub struct TrackerBuilder<T> {
    fetcher: Arc<dyn Fetch<T>>,
    config: TrackerConfig,
    recorder: Arc<dyn ErrorRecorder>,
}

impl<T: Send + Sync + 'static> TrackerBuilder<T> {
    /// Use this configuration instead of the default.
    pub fn config(mut self, config: TrackerConfig) -> Self {
        self.config = config;
        self
    }

    /// Send failures to `recorder` instead of `tracing`.
    pub fn recorder(mut self, recorder: Arc<dyn ErrorRecorder>) -> Self {
        self.recorder = recorder;
        self
    }

    /// Validate the configuration and build the tracker.
    pub fn build(self) -> Result<Tracker<T>, ConfigError> {
        self.config.validate()?;
        let scheduler = RetryScheduler::new(self.config.policy().clone());

        Ok(Tracker {
            shared: Arc::new(Shared {
                fetcher: self.fetcher,
                config: self.config,
                store: StateStore::new(),
                gate: FetchGate::new(),
                recorder: self.recorder,
                control: Mutex::new(Control {
                    scheduler,
                    poller: None,
                    retry_timer: None,
                    manual: None,
                    timer_seq: 0,
                }),
            }),
        })
    }
}

impl<T> fmt::Debug for TrackerBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackerBuilder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
