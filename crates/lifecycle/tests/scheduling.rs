use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use suggest_lifecycle::{
    IsCancellation, LifecycleConfig, RequestError, RequestLifecycleManager, RequestState,
};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
enum FakeTransportError {
    #[error("connection reset")]
    Reset,
    #[error("aborted")]
    Aborted,
}

impl IsCancellation for FakeTransportError {
    fn is_cancellation(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}

const DEBOUNCE: Duration = Duration::from_millis(300);

fn manager() -> RequestLifecycleManager {
    RequestLifecycleManager::new(LifecycleConfig { debounce: DEBOUNCE })
}

#[tokio::test(start_paused = true)]
async fn single_request_resolves_after_debounce() {
    let manager = manager();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();

    let started = tokio::time::Instant::now();
    let result = manager
        .schedule_request("x", move |token| async move {
            counter.fetch_add(1, Ordering::SeqCst);
            assert!(!token.is_cancelled());
            Ok::<_, FakeTransportError>("labels")
        })
        .await;

    assert_eq!(result.unwrap(), "labels");
    assert!(started.elapsed() >= DEBOUNCE);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(manager.state(), RequestState::Idle);
}

#[tokio::test(start_paused = true)]
async fn burst_only_runs_the_last_call() {
    let manager = manager();
    let first_calls = Arc::new(AtomicUsize::new(0));
    let second_calls = Arc::new(AtomicUsize::new(0));
    let (c1, c2) = (first_calls.clone(), second_calls.clone());

    let (first, second) = tokio::join!(
        manager.schedule_request("x", move |_token| async move {
            c1.fetch_add(1, Ordering::SeqCst);
            Ok::<_, FakeTransportError>(1)
        }),
        manager.schedule_request("x", move |_token| async move {
            c2.fetch_add(1, Ordering::SeqCst);
            Ok::<_, FakeTransportError>(2)
        }),
    );

    assert!(matches!(first, Err(RequestError::Cancelled)));
    assert_eq!(second.unwrap(), 2);
    assert_eq!(first_calls.load(Ordering::SeqCst), 0);
    assert_eq!(second_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn new_key_cancels_unrelated_in_flight_work() {
    let manager = manager();
    let observer = manager.clone();

    let (first, second) = tokio::join!(
        manager.schedule_request("suggest:a", |token| async move {
            // Long network call that honours the token.
            tokio::select! {
                () = token.cancelled() => Err(FakeTransportError::Aborted),
                () = tokio::time::sleep(Duration::from_secs(30)) => Ok("stale"),
            }
        }),
        async {
            tokio::time::sleep(DEBOUNCE + Duration::from_millis(50)).await;
            assert!(observer.is_request_in_flight("suggest:a"));
            assert!(!observer.is_request_in_flight("suggest:b"));
            observer
                .schedule_request("suggest:b", |_token| async {
                    Ok::<_, FakeTransportError>("fresh")
                })
                .await
        },
    );

    assert!(first.unwrap_err().is_cancelled());
    assert_eq!(second.unwrap(), "fresh");
    assert_eq!(manager.state(), RequestState::Idle);
}

#[tokio::test(start_paused = true)]
async fn explicit_cancel_during_debounce_never_starts_work() {
    let manager = manager();
    let observer = manager.clone();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();

    let (result, ()) = tokio::join!(
        manager.schedule_request("x", move |_token| async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, FakeTransportError>(())
        }),
        async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            assert_eq!(observer.state(), RequestState::Debouncing);
            assert!(!observer.is_request_in_flight("x"));
            observer.cancel_current_request();
            observer.cancel_current_request();
        },
    );

    assert!(matches!(result, Err(RequestError::Cancelled)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(manager.state(), RequestState::Idle);
}

#[tokio::test(start_paused = true)]
async fn cancel_after_work_resolves_discards_the_value() {
    let manager = manager();
    let inner = manager.clone();

    let result = manager
        .schedule_request("x", move |_token| async move {
            // Someone cancels between completion and the stale-data check.
            inner.cancel_current_request();
            Ok::<_, FakeTransportError>("stale")
        })
        .await;

    assert!(matches!(result, Err(RequestError::Cancelled)));
}

#[tokio::test(start_paused = true)]
async fn transport_failures_propagate_and_aborts_become_cancellations() {
    let manager = manager();

    let failed = manager
        .schedule_request("x", |_token| async {
            Err::<(), _>(FakeTransportError::Reset)
        })
        .await;
    assert_eq!(failed.unwrap_err().into_failure(), Some(FakeTransportError::Reset));
    assert_eq!(manager.state(), RequestState::Idle);

    let aborted = manager
        .schedule_request("x", |_token| async {
            Err::<(), _>(FakeTransportError::Aborted)
        })
        .await;
    assert!(aborted.unwrap_err().is_cancelled());
    assert_eq!(manager.state(), RequestState::Idle);
}

#[tokio::test(start_paused = true)]
async fn dispose_rejects_current_and_future_requests() {
    let manager = manager();
    let observer = manager.clone();

    let (pending, ()) = tokio::join!(
        manager.schedule_request("x", |_token| async { Ok::<_, FakeTransportError>(()) }),
        async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            observer.dispose();
        },
    );
    assert!(pending.unwrap_err().is_cancelled());
    assert!(manager.is_disposed());

    let later = manager
        .schedule_request("y", |_token| async { Ok::<_, FakeTransportError>(()) })
        .await;
    assert!(later.unwrap_err().is_cancelled());
}

#[tokio::test(start_paused = true)]
async fn dropping_the_caller_frees_the_slot() {
    let manager = manager();
    let future = manager.schedule_request("x", |_token| async {
        Ok::<_, FakeTransportError>(())
    });
    let timed_out = tokio::time::timeout(Duration::from_millis(50), future).await;
    assert!(timed_out.is_err());
    assert_eq!(manager.state(), RequestState::Idle);
}
