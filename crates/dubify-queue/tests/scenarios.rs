//! End-to-end queue scenarios against in-process fakes.

mod common;

use std::sync::atomic::Ordering;

use common::{request, Harness};
use dubify_models::{FailureReason, JobState, PlanTier};
use dubify_queue::QueueError;

#[tokio::test]
async fn completes_job_without_auto_publish() {
    let h = Harness::new();
    let id = h
        .queue
        .enqueue(request("alice", "https://www.youtube.com/watch?v=a"))
        .await
        .unwrap();

    let report = h.queue.drain().await.unwrap();
    assert_eq!(report.completed, vec![id.clone()]);

    let view = h.queue.status(&id).await.unwrap();
    assert_eq!(view.state, JobState::Completed);
    assert!(view.result_url.as_deref().is_some_and(|u| !u.is_empty()));
    assert_eq!(view.provider_job_id.as_deref(), Some("dub_1"));
    assert!(view.last_error.is_none());
    assert_eq!(h.quota.used("alice").await, 1);
    assert_eq!(h.records.len().await, 1);
    assert_eq!(h.chainer.calls(), 0);
}

#[tokio::test]
async fn rejects_enqueue_at_plan_limit() {
    let h = Harness::new();
    h.quota.set_user("alice", PlanTier::Starter, 10).await;

    let err = h
        .queue
        .enqueue(request("alice", "https://www.youtube.com/watch?v=a"))
        .await
        .unwrap_err();

    assert!(matches!(err, QueueError::AdmissionDenied(_)));
    assert!(h.queue.list().await.is_empty());
    assert_eq!(h.provider.submits(), 0);
    assert_eq!(h.quota.used("alice").await, 10);
}

#[tokio::test]
async fn rejects_invalid_requests_synchronously() {
    let h = Harness::new();

    let err = h.queue.enqueue(request("alice", "")).await.unwrap_err();
    assert!(matches!(err, QueueError::Validation(_)));

    let err = h
        .queue
        .enqueue(dubify_models::DubRequest::new(
            "alice",
            "https://example.com/v.mp4",
            "tlh",
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, QueueError::Validation(_)));
    assert!(h.queue.list().await.is_empty());
}

#[tokio::test]
async fn blank_user_is_rejected_before_any_provider_work() {
    let h = Harness::new();

    let err = h
        .queue
        .enqueue(request("   ", "https://www.youtube.com/watch?v=a"))
        .await
        .unwrap_err();
    assert!(matches!(err, QueueError::Validation(_)));
    assert!(h.queue.list().await.is_empty());

    let report = h.queue.drain().await.unwrap();
    assert!(report.completed.is_empty());
    assert!(report.failed.is_empty());
    assert_eq!(h.provider.submits(), 0);
    assert_eq!(h.quota.used("").await, 0);
}

#[tokio::test]
async fn submit_failure_does_not_stop_the_queue() {
    let h = Harness::new();
    h.provider.submit_failures.store(1, Ordering::SeqCst);

    let first = h
        .queue
        .enqueue(request("alice", "https://example.com/1.mp4"))
        .await
        .unwrap();
    let second = h
        .queue
        .enqueue(request("bob", "https://example.com/2.mp4"))
        .await
        .unwrap();

    let report = h.queue.drain().await.unwrap();
    assert_eq!(report.failed, vec![(first.clone(), FailureReason::ProviderError)]);
    assert_eq!(report.completed, vec![second.clone()]);

    let failed = h.queue.status(&first).await.unwrap();
    assert_eq!(failed.state, JobState::Failed);
    assert!(failed.provider_job_id.is_none());
    assert!(failed.result_url.is_none());
    // Not accepted, not charged
    assert_eq!(h.quota.used("alice").await, 0);
}

#[tokio::test]
async fn chain_failure_keeps_result_url() {
    let h = Harness::new();
    h.chainer.fail.store(true, Ordering::SeqCst);

    let id = h
        .queue
        .enqueue(request("alice", "https://example.com/1.mp4").with_auto_publish(true))
        .await
        .unwrap();
    h.queue.drain().await.unwrap();

    let view = h.queue.status(&id).await.unwrap();
    assert_eq!(view.state, JobState::Failed);
    assert_eq!(
        view.last_error.as_ref().map(|e| e.reason),
        Some(FailureReason::PublishError)
    );
    assert!(view.result_url.is_some());
    assert!(view.external_video_id.is_none());
    assert_eq!(h.records.len().await, 1);
}

#[tokio::test]
async fn only_non_active_jobs_can_be_cancelled() {
    let h = Harness::new();
    h.provider.hold(true);

    let first = h
        .queue
        .enqueue(request("alice", "https://example.com/1.mp4"))
        .await
        .unwrap();
    let second = h
        .queue
        .enqueue(request("alice", "https://example.com/2.mp4"))
        .await
        .unwrap();

    let drain = h.spawn_drain();
    h.wait_for_state(&first, JobState::Polling).await;

    h.queue.cancel(&second).await.unwrap();
    assert!(matches!(
        h.queue.status(&second).await,
        Err(QueueError::JobNotFound(_))
    ));

    let err = h.queue.cancel(&first).await.unwrap_err();
    assert!(err.is_rejected());
    assert_eq!(h.queue.status(&first).await.unwrap().state, JobState::Polling);

    h.provider.hold(false);
    let report = drain.await.unwrap().unwrap();
    assert_eq!(report.completed, vec![first]);
    assert_eq!(h.provider.submits(), 1);
}

#[tokio::test]
async fn retry_after_provider_error_charges_once() {
    let h = Harness::new();
    h.provider.submit_failures.store(1, Ordering::SeqCst);

    let id = h
        .queue
        .enqueue(request("alice", "https://example.com/1.mp4"))
        .await
        .unwrap();
    h.queue.drain().await.unwrap();
    assert_eq!(h.queue.status(&id).await.unwrap().state, JobState::Failed);
    assert_eq!(h.quota.used("alice").await, 0);

    h.queue.retry(&id).await.unwrap();
    let view = h.queue.status(&id).await.unwrap();
    assert_eq!(view.state, JobState::Waiting);
    assert_eq!(view.attempt, 2);
    assert!(view.last_error.is_none());

    let report = h.queue.drain().await.unwrap();
    assert_eq!(report.completed, vec![id.clone()]);
    assert_eq!(h.quota.used("alice").await, 1);
}

#[tokio::test]
async fn retry_rejected_unless_failed() {
    let h = Harness::new();
    let id = h
        .queue
        .enqueue(request("alice", "https://example.com/1.mp4"))
        .await
        .unwrap();

    let before = h.queue.status(&id).await.unwrap();
    let err = h.queue.retry(&id).await.unwrap_err();
    assert!(err.is_rejected());
    assert_eq!(h.queue.status(&id).await.unwrap(), before);

    h.queue.drain().await.unwrap();
    let completed = h.queue.status(&id).await.unwrap();
    assert!(h.queue.retry(&id).await.unwrap_err().is_rejected());
    assert_eq!(h.queue.status(&id).await.unwrap(), completed);
}
