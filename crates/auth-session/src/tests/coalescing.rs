//! Concurrent 401s share a single refresh.

use super::harness::{RefreshMode, Route, TestHarness, PROTECTED_URL};
use crate::transport::HttpRequest;
use crate::{AuthError, AuthStateChangedPayload, Navigation, SessionStatus};
use futures_util::future::join_all;
use parking_lot::Mutex;
use std::sync::Arc;

const CALLERS: usize = 8;

/// Release held refreshes once every caller has been rejected and the
/// single refresh request has arrived.
fn release_when_all_rejected(h: &TestHarness, callers: usize) -> tokio::task::JoinHandle<()> {
    let service = h.service.clone();
    tokio::spawn(async move {
        service.wait_for_calls(Route::Protected, callers).await;
        service.wait_for_calls(Route::Refresh, 1).await;
        service.release_refreshes();
    })
}

#[tokio::test]
async fn concurrent_unauthorized_requests_share_one_refresh() {
    let h = TestHarness::logged_in().await;
    h.service.expire_access_tokens();
    h.service.hold_refreshes();
    let releaser = release_when_all_rejected(&h, CALLERS);

    let fetcher = h.fetcher();
    let results = join_all(
        (0..CALLERS).map(|_| fetcher.fetch_with_token_refresh(HttpRequest::get(PROTECTED_URL))),
    )
    .await;
    releaser.await.unwrap();

    assert_eq!(h.service.calls(Route::Refresh), 1);
    assert_eq!(h.controller.refresh_count(), 1);
    assert_eq!(h.service.calls(Route::Protected), CALLERS * 2);
    for result in results {
        assert_eq!(result.unwrap().status, 200);
    }

    // Every retry carried the same refreshed token.
    let fresh = h.store().access_token();
    let retried: Vec<_> = h.service.protected_bearers().split_off(CALLERS);
    assert!(retried.iter().all(|bearer| *bearer == fresh));
    assert!(!h.controller.is_refreshing());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn coalescing_holds_across_worker_threads() {
    let h = TestHarness::logged_in().await;
    h.service.expire_access_tokens();
    h.service.hold_refreshes();
    let releaser = release_when_all_rejected(&h, CALLERS);

    let tasks: Vec<_> = (0..CALLERS)
        .map(|_| {
            let fetcher = h.fetcher();
            tokio::spawn(async move {
                fetcher
                    .fetch_with_token_refresh(HttpRequest::get(PROTECTED_URL))
                    .await
            })
        })
        .collect();
    let results = join_all(tasks).await;
    releaser.await.unwrap();

    assert_eq!(h.service.calls(Route::Refresh), 1);
    for result in results {
        assert_eq!(result.unwrap().unwrap().status, 200);
    }
}

#[tokio::test]
async fn later_expiry_starts_a_new_refresh() {
    let h = TestHarness::logged_in().await;
    let fetcher = h.fetcher();

    h.service.expire_access_tokens();
    fetcher
        .fetch_with_token_refresh(HttpRequest::get(PROTECTED_URL))
        .await
        .unwrap();
    let first = h.store().access_token();

    h.service.expire_access_tokens();
    fetcher
        .fetch_with_token_refresh(HttpRequest::get(PROTECTED_URL))
        .await
        .unwrap();

    assert_eq!(h.service.calls(Route::Refresh), 2);
    assert_eq!(h.controller.refresh_count(), 2);
    assert_ne!(h.store().access_token(), first);
}

#[tokio::test]
async fn concurrent_rejections_end_the_session_once() {
    let h = TestHarness::logged_in().await;
    let seen: Arc<Mutex<Vec<AuthStateChangedPayload>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    h.controller
        .set_state_callback(Box::new(move |payload| sink.lock().push(payload)));

    h.service.expire_access_tokens();
    h.service.set_refresh_mode(RefreshMode::Reject);
    h.service.hold_refreshes();
    let releaser = release_when_all_rejected(&h, CALLERS);

    let fetcher = h.fetcher();
    let results = join_all(
        (0..CALLERS).map(|_| fetcher.fetch_with_token_refresh(HttpRequest::get(PROTECTED_URL))),
    )
    .await;
    releaser.await.unwrap();

    assert_eq!(h.service.calls(Route::Refresh), 1);
    for result in results {
        assert!(matches!(result, Err(AuthError::SessionExpired)));
    }
    assert_eq!(h.controller.status(), SessionStatus::Unauthenticated);
    assert!(h.storage.is_empty());

    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].status, SessionStatus::Unauthenticated);
    assert_eq!(seen[0].navigate_to, Some(Navigation::EntryPage));
}

#[tokio::test]
async fn requests_after_rejection_do_not_refresh_again() {
    let h = TestHarness::logged_in().await;
    h.service.expire_access_tokens();
    h.service.set_refresh_mode(RefreshMode::Reject);
    let fetcher = h.fetcher();

    for _ in 0..3 {
        assert!(matches!(
            fetcher
                .fetch_with_token_refresh(HttpRequest::get(PROTECTED_URL))
                .await,
            Err(AuthError::SessionExpired)
        ));
    }

    assert_eq!(h.service.calls(Route::Refresh), 1);
    assert_eq!(h.service.calls(Route::Protected), 1);
}
