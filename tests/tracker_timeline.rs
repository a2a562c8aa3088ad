//! Retry timelines driven on a paused clock.

mod support;

use std::sync::Arc;
use std::time::Duration;

use livetrack::{
    ErrorCode, FetchError, MemoryRecorder, RetryPolicy, SchedulerState, Tracker, TrackerConfig,
};
use support::{ms, network_down, scripted, Probe};

fn config(max_retries: u32, base: Duration) -> TrackerConfig {
    TrackerConfig::new(Duration::from_secs(5)).with_policy(
        RetryPolicy::exponential(base)
            .with_max_retries(max_retries)
            .with_timeout(Duration::from_secs(2)),
    )
}

#[tokio::test(start_paused = true)]
async fn three_failures_exhaust_then_manual_retry_recovers() {
    let probe = Probe::default();
    let source = scripted(&probe, Duration::ZERO, |n| {
        if n <= 3 {
            Err(FetchError::Network("gps feed unreachable".into()))
        } else {
            Ok(n)
        }
    });
    let tracker = Tracker::new(source, config(3, ms(1000))).unwrap();

    tracker.start();

    tokio::time::sleep(ms(10)).await;
    assert_eq!(probe.calls(), 1);
    assert_eq!(tracker.state().retry_count, 1);

    tokio::time::sleep(ms(1000)).await;
    assert_eq!(probe.calls(), 2);
    assert_eq!(tracker.state().retry_count, 2);

    tokio::time::sleep(ms(2000)).await;
    assert_eq!(probe.calls(), 3);
    assert_eq!(probe.offsets(), vec![ms(0), ms(1000), ms(3000)]);

    let state = tracker.state();
    let error = state.error.expect("error should be set");
    assert_eq!(error.code(), ErrorCode::MaxRetries);
    assert!(!error.is_retryable());
    assert_eq!(state.retry_count, 3);
    assert!(!state.is_connected);
    assert_eq!(tracker.scheduler_state(), SchedulerState::Exhausted);

    // interval ticks at 5s and 10s are skipped while the error stands
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(probe.calls(), 3);

    // retry is refused until the error is cleared
    let refused = tracker.retry().unwrap_err();
    assert_eq!(refused.code(), ErrorCode::MaxRetries);
    tokio::time::sleep(ms(10)).await;
    assert_eq!(probe.calls(), 3);

    tracker.clear_error();
    tracker.retry().unwrap();
    tokio::time::sleep(ms(10)).await;

    assert_eq!(probe.calls(), 4);
    let state = tracker.state();
    assert!(state.is_connected);
    assert!(state.error.is_none());
    assert_eq!(state.retry_count, 0);
    assert_eq!(state.data, Some(4));
    assert!(state.last_update.is_some());
}

#[tokio::test(start_paused = true)]
async fn failures_under_budget_keep_retrying() {
    let probe = Probe::default();
    let tracker =
        Tracker::new(scripted(&probe, Duration::ZERO, network_down), config(5, ms(1000))).unwrap();

    tracker.start();
    // attempts at 0, 1000, 3000
    tokio::time::sleep(ms(3500)).await;

    assert_eq!(probe.calls(), 3);
    let state = tracker.state();
    assert_eq!(state.retry_count, 3);
    assert_eq!(state.error.map(|e| e.code()), Some(ErrorCode::Network));
    assert_eq!(
        tracker.scheduler_state(),
        SchedulerState::Scheduled {
            attempt: 3,
            delay: ms(4000)
        }
    );
}

#[tokio::test(start_paused = true)]
async fn backoff_doubles_between_attempts() {
    let probe = Probe::default();
    let tracker = Tracker::new(
        scripted(&probe, Duration::ZERO, network_down),
        config(6, ms(250)).with_update_interval(Duration::from_secs(60)),
    )
    .unwrap();

    tracker.start();
    tokio::time::sleep(Duration::from_secs(30)).await;

    let offsets = probe.offsets();
    assert_eq!(offsets.len(), 6);
    let gaps: Vec<Duration> = offsets.windows(2).map(|w| w[1] - w[0]).collect();
    assert_eq!(gaps, vec![ms(250), ms(500), ms(1000), ms(2000), ms(4000)]);
    assert_eq!(
        tracker.state().error.map(|e| e.code()),
        Some(ErrorCode::MaxRetries)
    );
}

#[tokio::test(start_paused = true)]
async fn success_after_failures_resets_count() {
    let probe = Probe::default();
    let source = scripted(&probe, Duration::ZERO, |n| {
        if n <= 2 {
            Err(FetchError::Timeout)
        } else {
            Ok(n * 10)
        }
    });
    let tracker = Tracker::new(source, config(3, ms(1000))).unwrap();

    tracker.start();
    tokio::time::sleep(ms(3100)).await;

    assert_eq!(probe.calls(), 3);
    let state = tracker.state();
    assert!(state.is_connected);
    assert!(state.error.is_none());
    assert_eq!(state.retry_count, 0);
    assert_eq!(state.data, Some(30));
    assert_eq!(tracker.scheduler_state(), SchedulerState::Idle);

    // polling resumes on the regular interval
    tokio::time::sleep(ms(2000)).await;
    assert_eq!(probe.calls(), 4);
}

#[tokio::test(start_paused = true)]
async fn permission_denied_is_never_retried() {
    let probe = Probe::default();
    let source = scripted(&probe, Duration::ZERO, |_| {
        Err(FetchError::code(1, "User denied Geolocation"))
    });
    let tracker = Tracker::new(source, config(5, ms(100))).unwrap();

    tracker.start();
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(probe.calls(), 1);
    let state = tracker.state();
    let error = state.error.expect("permission error");
    assert_eq!(error.code(), ErrorCode::Permission);
    assert!(!error.is_retryable());
    assert_eq!(state.retry_count, 0);
    assert_eq!(tracker.scheduler_state(), SchedulerState::Idle);
}

#[tokio::test(start_paused = true)]
async fn slow_fetch_times_out_and_is_retried() {
    let probe = Probe::default();
    let tracker = Tracker::new(
        scripted(&probe, Duration::from_secs(20), |n| Ok(n)),
        config(3, ms(1000)),
    )
    .unwrap();

    tracker.start();
    tokio::time::sleep(ms(100)).await;
    assert!(tracker.state().is_loading);

    tokio::time::sleep(ms(2000)).await;
    let state = tracker.state();
    assert!(!state.is_loading);
    assert_eq!(state.error.map(|e| e.code()), Some(ErrorCode::Timeout));
    assert_eq!(state.retry_count, 1);

    // retry fires 1s after the timeout
    tokio::time::sleep(ms(1000)).await;
    assert_eq!(probe.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn manual_retry_replaces_pending_timer() {
    let probe = Probe::default();
    let tracker =
        Tracker::new(scripted(&probe, Duration::ZERO, network_down), config(5, ms(1000))).unwrap();

    tracker.start();
    tokio::time::sleep(ms(500)).await;
    assert_eq!(probe.calls(), 1);

    tracker.retry().unwrap();
    tokio::time::sleep(ms(2100)).await;

    // no attempt at the original 1000ms mark; the manual retry re-armed for +2000ms
    assert_eq!(probe.offsets(), vec![ms(0), ms(500), ms(2500)]);
}

#[tokio::test(start_paused = true)]
async fn auto_retry_disabled_waits_for_manual_retries() {
    let probe = Probe::default();
    let tracker = Tracker::new(
        scripted(&probe, Duration::ZERO, network_down),
        TrackerConfig::new(Duration::from_secs(1)).with_policy(
            RetryPolicy::exponential(ms(100))
                .with_max_retries(3)
                .with_auto_retry(false),
        ),
    )
    .unwrap();

    tracker.start();
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(probe.calls(), 1);
    assert_eq!(tracker.state().retry_count, 1);

    tracker.retry().unwrap();
    tokio::time::sleep(ms(10)).await;
    assert_eq!(tracker.state().retry_count, 2);

    tracker.retry().unwrap();
    tokio::time::sleep(ms(10)).await;
    assert_eq!(probe.calls(), 3);
    assert_eq!(
        tracker.state().error.map(|e| e.code()),
        Some(ErrorCode::MaxRetries)
    );

    assert!(tracker.retry().is_err());
}

#[tokio::test(start_paused = true)]
async fn recorder_sees_every_failure() {
    let probe = Probe::default();
    let recorder = Arc::new(MemoryRecorder::default());
    let tracker = Tracker::builder(scripted(&probe, Duration::ZERO, network_down))
        .config(config(3, ms(100)))
        .recorder(recorder.clone())
        .build()
        .unwrap();

    tracker.start();
    tokio::time::sleep(Duration::from_secs(2)).await;

    let codes: Vec<ErrorCode> = recorder.entries().iter().map(|e| e.code()).collect();
    assert_eq!(
        codes,
        vec![
            ErrorCode::Network,
            ErrorCode::Network,
            ErrorCode::Network,
            ErrorCode::MaxRetries
        ]
    );
}
