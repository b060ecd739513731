//! Server-directed retries, driven on a paused clock.

mod common;

use std::time::Duration;

use recsync::{RetryOp, RetryPolicy, SyncConfig, SyncEvent};
use tokio::sync::broadcast;

use common::{Failure, Harness, MockService, id, item};

/// Drain every event published so far.
fn drain(events: &mut broadcast::Receiver<SyncEvent>) -> Vec<SyncEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

#[tokio::test(start_paused = true)]
async fn test_upload_retried_after_server_delay() {
    let h = Harness::quiet(MockService::new());
    let mut events = h.engine.events();
    h.service.fail_next_saves(1, Failure::unavailable(5));

    let err = h.engine.upload(item("a", 1)).await.unwrap_err();
    assert_eq!(err.retry_after(), Some(Duration::from_secs(5)));

    // The snapshot is the safety net until the retry lands.
    assert_eq!(h.pending_ids(), vec!["a"]);
    assert_eq!(h.engine.pending_retries(), 1);

    tokio::time::sleep(Duration::from_secs(4)).await;
    assert_eq!(h.service.calls.saves(), 1);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(h.service.calls.saves(), 2);
    assert!(h.pending_ids().is_empty());
    assert!(h.service.contains("a"));

    assert_eq!(
        drain(&mut events),
        vec![
            SyncEvent::RetryScheduled {
                op: RetryOp::Upload,
                id: id("a"),
                attempt: 2,
                after: Duration::from_secs(5),
            },
            SyncEvent::RetrySucceeded {
                op: RetryOp::Upload,
                id: id("a"),
                attempt: 2,
            },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_failure_without_hint_is_not_retried() {
    let h = Harness::quiet(MockService::new());
    h.service.fail_next_saves(1, Failure::terminal());

    assert!(h.engine.upload(item("a", 1)).await.is_err());
    assert_eq!(h.engine.pending_retries(), 0);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(h.service.calls.saves(), 1);
    // Still queued for the next flush.
    assert_eq!(h.pending_ids(), vec!["a"]);
}

#[tokio::test(start_paused = true)]
async fn test_retry_skipped_when_record_deleted_meanwhile() {
    let h = Harness::quiet(MockService::new());
    let mut events = h.engine.events();
    h.service.fail_next_saves(1, Failure::unavailable(5));

    assert!(h.engine.upload(item("a", 1)).await.is_err());
    h.engine.delete(&id("a")).await.unwrap();

    tokio::time::sleep(Duration::from_secs(6)).await;

    assert_eq!(h.service.calls.saves(), 1);
    assert_eq!(h.service.calls.deletes(), 0);
    assert!(!h.service.contains("a"));
    assert!(drain(&mut events).contains(&SyncEvent::RetrySkipped {
        op: RetryOp::Upload,
        id: id("a"),
    }));
}

#[tokio::test(start_paused = true)]
async fn test_retry_uses_latest_queued_version() {
    let h = Harness::quiet(MockService::new());
    h.service.fail_next_saves(2, Failure::unavailable(5));

    assert!(h.engine.upload(item("a", 1)).await.is_err());
    assert!(h.engine.upload(item("a", 2)).await.is_err());

    tokio::time::sleep(Duration::from_secs(6)).await;

    let stored = h.service.get("a").unwrap();
    assert_eq!(stored.get("rank"), Some(&recsync::FieldValue::Int(2)));
    assert!(h.pending_ids().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_retries_are_capped() {
    let policy = RetryPolicy {
        max_attempts: 3,
        max_delay: Duration::from_secs(600),
    };
    let h = Harness::new(
        MockService::new(),
        SyncConfig::new(10)
            .with_flush_on_fetch(false)
            .with_retry(policy),
    );
    let mut events = h.engine.events();
    h.service.fail_all_saves(Failure::unavailable(1));

    assert!(h.engine.upload(item("a", 1)).await.is_err());
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(h.service.calls.saves(), 3);
    assert_eq!(h.engine.pending_retries(), 0);
    assert_eq!(h.pending_ids(), vec!["a"]);
    assert!(drain(&mut events).contains(&SyncEvent::RetryExhausted {
        op: RetryOp::Upload,
        id: id("a"),
        attempt: 3,
    }));
}

#[tokio::test(start_paused = true)]
async fn test_server_delay_is_clamped_to_policy_ceiling() {
    let policy = RetryPolicy {
        max_attempts: 8,
        max_delay: Duration::from_secs(10),
    };
    let h = Harness::new(
        MockService::new(),
        SyncConfig::new(10)
            .with_flush_on_fetch(false)
            .with_retry(policy),
    );
    h.service.fail_next_saves(1, Failure::unavailable(3600));

    assert!(h.engine.upload(item("a", 1)).await.is_err());
    tokio::time::sleep(Duration::from_secs(11)).await;

    assert_eq!(h.service.calls.saves(), 2);
    assert!(h.pending_ids().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_delete_retried_after_server_delay() {
    let h = Harness::quiet(MockService::with_items(1));
    h.service.fail_next_deletes(1, Failure::unavailable(2));

    assert!(h.engine.delete(&id("item-00")).await.is_err());
    assert_eq!(h.engine.pending_deletions().unwrap(), vec![id("item-00")]);

    tokio::time::sleep(Duration::from_secs(3)).await;

    assert_eq!(h.service.calls.deletes(), 2);
    assert!(!h.service.contains("item-00"));
    assert!(h.engine.pending_deletions().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_retry_while_offline_leaves_entry_queued() {
    let h = Harness::quiet(MockService::new());
    h.service.fail_next_saves(1, Failure::unavailable(5));

    assert!(h.engine.upload(item("a", 1)).await.is_err());
    h.go_offline();
    tokio::time::sleep(Duration::from_secs(6)).await;

    assert_eq!(h.service.calls.saves(), 1);
    assert_eq!(h.pending_ids(), vec!["a"]);

    h.go_online();
    let report = h.engine.flush_pending().await;
    assert_eq!(report.uploaded, vec![id("a")]);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_engine_cancels_retries() {
    let h = Harness::quiet(MockService::new());
    h.service.fail_next_saves(1, Failure::unavailable(5));
    assert!(h.engine.upload(item("a", 1)).await.is_err());

    let service = h.service.clone();
    drop(h);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(service.calls.saves(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_retries() {
    let h = Harness::quiet(MockService::new());
    h.service.fail_next_saves(1, Failure::unavailable(5));
    assert!(h.engine.upload(item("a", 1)).await.is_err());

    h.engine.shutdown();
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(h.service.calls.saves(), 1);
    assert_eq!(h.pending_ids(), vec!["a"]);
}
