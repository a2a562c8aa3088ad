//! Fetch-with-timeout wrapper.
//!
//! A fetch races three things: the caller's operation, the timeout, and a
//! [`CancellationToken`]. [`FetchGate`] guarantees at most one fetch is
//! live: starting a new fetch cancels the previous one, and a ticket that
//! has been superseded is no longer current, so its result must be thrown
//! away.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use crate::classify::classify;
use crate::error::{FetchError, TrackingError};

/// A source of tracking data.
///
/// Implementations should observe `cancel` and return promptly once it
/// fires; a result produced after cancellation is discarded anyway.
///
/// Closures of the form `Fn(CancellationToken) -> impl Future<Output =
/// Result<T, FetchError>>` implement this trait.
pub trait Fetch<T>: Send + Sync + 'static {
    /// Start one fetch.
    fn fetch(&self, cancel: CancellationToken) -> BoxFuture<'static, Result<T, FetchError>>;
}

impl<T, F, Fut> Fetch<T> for F
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
{
    fn fetch(&self, cancel: CancellationToken) -> BoxFuture<'static, Result<T, FetchError>> {
        (self)(cancel).boxed()
    }
}

/// How a single fetch ended.
#[derive(Debug)]
pub enum FetchOutcome<T> {
    /// The operation produced a value in time.
    Completed(T),
    /// The operation failed or timed out.
    Failed(TrackingError),
    /// The fetch was cancelled. Nothing should be applied.
    Cancelled,
}

impl<T> FetchOutcome<T> {
    /// True for [`FetchOutcome::Cancelled`].
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchOutcome::Cancelled)
    }
}

/// Run one fetch, bounded by `timeout` and `cancel`.
///
/// On timeout the token is cancelled so the operation can stop its work.
/// A result that races with cancellation is reported as
/// [`FetchOutcome::Cancelled`].
///
/// ```rust
/// use livetrack::fetch::{fetch_with_timeout, FetchOutcome};
/// use livetrack::FetchError;
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
///
/// # tokio_test::block_on(async {
/// let source = |_cancel: CancellationToken| async { Ok::<_, FetchError>(42u32) };
///
/// let outcome = fetch_with_timeout(
///     &source,
///     CancellationToken::new(),
///     Duration::from_secs(1),
/// )
/// .await;
///
/// assert!(matches!(outcome, FetchOutcome::Completed(42)));
/// # });
/// ```
pub async fn fetch_with_timeout<T, F>(
    fetcher: &F,
    cancel: CancellationToken,
    timeout: Duration,
) -> FetchOutcome<T>
where
    F: Fetch<T> + ?Sized,
{
    let operation = fetcher.fetch(cancel.clone());

    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => return FetchOutcome::Cancelled,
        result = tokio::time::timeout(timeout, operation) => result,
    };

    if cancel.is_cancelled() {
        return FetchOutcome::Cancelled;
    }

    match result {
        Ok(Ok(value)) => FetchOutcome::Completed(value),
        Ok(Err(raw)) => FetchOutcome::Failed(classify(&raw)),
        Err(_) => {
            cancel.cancel();
            FetchOutcome::Failed(TrackingError::timeout(timeout))
        }
    }
}

/// Permission to run one fetch.
///
/// Issued by [`FetchGate::begin`]; stays current until the next `begin`
/// or a [`FetchGate::cancel`].
#[derive(Debug, Clone)]
pub struct FetchTicket {
    generation: u64,
    token: CancellationToken,
}

impl FetchTicket {
    /// Monotonic id of this fetch.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Token the fetch must observe.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

#[derive(Debug, Default)]
struct GateInner {
    generation: u64,
    in_flight: Option<CancellationToken>,
}

/// Enforces a single in-flight fetch.
#[derive(Debug, Default)]
pub struct FetchGate {
    inner: Mutex<GateInner>,
}

impl FetchGate {
    /// An empty gate.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, GateInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Cancel the in-flight fetch, if any, and issue a ticket for a new one.
    pub fn begin(&self) -> FetchTicket {
        let mut inner = self.lock();
        if let Some(previous) = inner.in_flight.take() {
            tracing::debug!(generation = inner.generation, "superseding in-flight fetch");
            previous.cancel();
        }
        inner.generation += 1;
        let token = CancellationToken::new();
        inner.in_flight = Some(token.clone());
        FetchTicket {
            generation: inner.generation,
            token,
        }
    }

    /// Retire `ticket`. Returns false if it was superseded or the gate was
    /// cancelled, in which case its result must be discarded.
    ///
    /// A ticket whose token was cancelled by its own timeout is still
    /// current.
    pub fn finish(&self, ticket: &FetchTicket) -> bool {
        let mut inner = self.lock();
        if inner.generation != ticket.generation {
            return false;
        }
        inner.in_flight = None;
        true
    }

    /// Cancel whatever is in flight and invalidate outstanding tickets.
    pub fn cancel(&self) {
        let mut inner = self.lock();
        if let Some(token) = inner.in_flight.take() {
            token.cancel();
        }
        inner.generation += 1;
    }

    /// True while a ticket is outstanding.
    pub fn is_in_flight(&self) -> bool {
        self.lock().in_flight.is_some()
    }

    /// True if `ticket` is still the newest.
    pub fn is_current(&self, ticket: &FetchTicket) -> bool {
        self.lock().generation == ticket.generation
    }
}
