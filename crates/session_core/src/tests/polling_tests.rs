use super::*;
use crate::{
    fixtures,
    loopback::{LoopbackSession, LoopbackState},
};
use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

const FAST: PollBudget = PollBudget::new(5, 1);

#[tokio::test]
async fn stops_at_first_complete_recheck() {
    let fetches = AtomicU32::new(0);
    let triggered = Arc::new(AtomicU32::new(0));
    let trigger_count = triggered.clone();
    let trigger: BoxFuture<'_, SessionResult<()>> = Box::pin(async move {
        trigger_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    let value = poll_until(
        "test",
        || {
            let n = fetches.fetch_add(1, Ordering::SeqCst);
            async move { Ok(n) }
        },
        // Initial fetch returns 0; re-check #2 returns 2.
        |n: &u32| *n >= 2,
        Some(trigger),
        FAST,
    )
    .await
    .expect("completes");

    assert_eq!(value, 2);
    assert_eq!(triggered.load(Ordering::SeqCst), 1);
    let post_trigger_fetches = fetches.load(Ordering::SeqCst) - 1;
    assert_eq!(post_trigger_fetches, 2);
}

#[tokio::test]
async fn complete_initial_fetch_skips_trigger() {
    let triggered = Arc::new(AtomicU32::new(0));
    let trigger_count = triggered.clone();
    let trigger: BoxFuture<'_, SessionResult<()>> = Box::pin(async move {
        trigger_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    let value = poll_until("test", || async { Ok(true) }, |done: &bool| *done, Some(trigger), FAST)
        .await
        .expect("already complete");

    assert!(value);
    assert_eq!(triggered.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn exhausts_after_max_attempts_refetches() {
    let fetches = AtomicU32::new(0);

    let err = poll_until(
        "test",
        || {
            fetches.fetch_add(1, Ordering::SeqCst);
            async { Ok(false) }
        },
        |done: &bool| *done,
        None,
        FAST,
    )
    .await
    .err()
    .expect("never completes");

    assert!(matches!(err, SessionError::RetriesExhausted { attempts: 5 }));
    assert_eq!(fetches.load(Ordering::SeqCst), 1 + FAST.max_attempts);
}

#[tokio::test]
async fn fetch_error_aborts_polling() {
    let fetches = AtomicU32::new(0);

    let err = poll_until(
        "test",
        || {
            let n = fetches.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 1 {
                    return Err(SessionError::SessionClosed);
                }
                Ok(false)
            }
        },
        |done: &bool| *done,
        None,
        FAST,
    )
    .await
    .err()
    .expect("aborted");

    assert!(matches!(err, SessionError::SessionClosed));
    assert_eq!(fetches.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn download_is_requested_once_and_polled_to_completion() {
    let mut state = LoopbackState::new();
    state.add_file(fixtures::remote_file(77));
    let session = LoopbackSession::with_file_latency(state, 3, 1);

    let file = await_download(session.as_ref(), FileId(77), FAST)
        .await
        .expect("downloaded");

    assert!(file.is_downloaded());
    assert_eq!(session.request_count("download_file"), 1);
    // One initial fetch plus three re-checks.
    assert_eq!(session.request_count("get_file"), 4);
}

#[tokio::test]
async fn downloaded_file_needs_no_trigger() {
    let mut state = LoopbackState::new();
    state.add_file(fixtures::local_file(78));
    let session = LoopbackSession::new(state);

    let file = await_download(session.as_ref(), FileId(78), FAST)
        .await
        .expect("already local");

    assert_eq!(file.local.path.as_deref(), Some("/cache/78.jpg"));
    assert_eq!(session.request_count("download_file"), 0);
    assert_eq!(session.request_count("get_file"), 1);
}

#[tokio::test]
async fn slow_download_exhausts_budget() {
    let mut state = LoopbackState::new();
    state.add_file(fixtures::remote_file(79));
    let session = LoopbackSession::with_file_latency(state, 10, 1);

    let err = await_download(session.as_ref(), FileId(79), PollBudget::new(2, 1))
        .await
        .err()
        .expect("too slow");

    assert!(matches!(err, SessionError::RetriesExhausted { attempts: 2 }));
}
