//! Live Tracking Example
//!
//! Drives a [`Tracker`] against a simulated GPS feed that drops out now and
//! then. Shows:
//! - Subscribing to connection state changes
//! - Automatic exponential-backoff reconnects
//! - Recording failures in memory alongside `tracing` output
//! - Manual recovery once the retry budget is exhausted

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use livetrack::{
    FetchError, MemoryRecorder, RetryPolicy, SchedulerState, Tracker, TrackerConfig,
};
use rand::Rng;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq)]
struct Fix {
    seq: u32,
    lat: f64,
    lon: f64,
}

/// A feed that fails roughly a third of the time, sometimes slowly.
fn simulated_feed(
    seq: Arc<AtomicU32>,
) -> impl Fn(CancellationToken) -> BoxFuture<'static, Result<Fix, FetchError>> + Send + Sync + 'static
{
    move |cancel: CancellationToken| -> BoxFuture<'static, Result<Fix, FetchError>> {
        let seq = seq.fetch_add(1, Ordering::SeqCst);
        let (roll, latency_ms, jitter) = {
            let mut rng = rand::rng();
            (
                rng.random_range(0..10u32),
                rng.random_range(20..400u64),
                rng.random_range(-0.001..0.001f64),
            )
        };

        Box::pin(async move {
            tokio::select! {
                _ = cancel.cancelled() => return Err(FetchError::message("cancelled")),
                _ = tokio::time::sleep(Duration::from_millis(latency_ms)) => {}
            }
            match roll {
                0..=1 => Err(FetchError::Network("gps receiver unreachable".into())),
                2 => Err(FetchError::Code {
                    code: 3,
                    message: "position acquisition timed out".into(),
                }),
                _ => Ok(Fix {
                    seq,
                    lat: 52.5200 + jitter,
                    lon: 13.4050 - jitter,
                }),
            }
        })
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("======================================");
    println!("        Live Tracking Example         ");
    println!("======================================");

    let config = TrackerConfig::new(Duration::from_millis(800)).with_policy(
        RetryPolicy::exponential(Duration::from_millis(200))
            .with_max_retries(3)
            .with_timeout(Duration::from_millis(300)),
    );

    let recorder = Arc::new(MemoryRecorder::default());
    let tracker = match Tracker::builder(simulated_feed(Arc::new(AtomicU32::new(0))))
        .config(config)
        .recorder(recorder.clone())
        .build()
    {
        Ok(tracker) => tracker,
        Err(e) => {
            eprintln!("invalid configuration: {}", e);
            return;
        }
    };

    let mut updates = tracker.subscribe();
    let printer = tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let state = updates.borrow_and_update().clone();
            match (&state.error, &state.data) {
                (Some(err), _) => println!(
                    "  [retry {}] {} ({})",
                    state.retry_count,
                    err,
                    if err.is_retryable() { "retryable" } else { "fatal" }
                ),
                (None, Some(fix)) if state.is_connected && !state.is_loading => println!(
                    "  fix #{:<3} lat={:.5} lon={:.5}",
                    fix.seq, fix.lat, fix.lon
                ),
                _ => {}
            }
        }
    });

    tracker.start();

    for _ in 0..20 {
        tokio::time::sleep(Duration::from_millis(500)).await;
        if tracker.scheduler_state() == SchedulerState::Exhausted {
            println!("\n  retry budget exhausted, clearing and retrying by hand");
            tracker.clear_error();
            if let Err(e) = tracker.retry() {
                println!("  manual retry refused: {}", e);
            }
        }
    }

    tracker.stop();
    drop(tracker);
    let _ = tokio::time::timeout(Duration::from_secs(1), printer).await;

    println!("\n--- Last {} recorded failures ---", recorder.len());
    for error in recorder.entries() {
        println!("  {}", error);
    }

    println!("\n======================================");
    println!("           Example Complete            ");
    println!("======================================");
}
