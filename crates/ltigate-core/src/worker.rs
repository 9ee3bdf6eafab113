//! Background grade passback.
//!
//! Launch and execute handlers hand grades to a bounded queue drained by a
//! single worker task, so a slow or failing platform never holds up the
//! response. Failures are logged and reported to an observer; they are
//! never surfaced to the request that enqueued them.

use crate::error::LtiError;
use crate::grade::{GradeEnvelope, GradePassbackClient, GradeSubmission};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct GradeJob {
    pub id: Uuid,
    pub submission: GradeSubmission,
}

/// Returned when the queue cannot take another job.
#[derive(Debug, Error)]
#[error("grade queue is full, dropped job {job_id}")]
pub struct GradeQueueFull {
    pub job_id: Uuid,
}

/// Called once per processed job with its outcome.
pub type GradeObserver = Arc<dyn Fn(&GradeJob, &Result<GradeEnvelope, LtiError>) + Send + Sync>;

/// Sending half of the grade queue.
#[derive(Clone)]
pub struct GradeQueue {
    tx: mpsc::Sender<GradeJob>,
}

impl GradeQueue {
    /// Create a queue and its receiver without starting a worker.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<GradeJob>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Create a queue and spawn the worker that drains it.
    pub fn spawn(
        passback: Arc<GradePassbackClient>,
        capacity: usize,
        observer: Option<GradeObserver>,
    ) -> (Self, JoinHandle<()>) {
        let (queue, rx) = Self::channel(capacity);
        let handle = tokio::spawn(run_worker(passback, rx, observer));
        (queue, handle)
    }

    /// Queue a submission without waiting. Returns the job id.
    pub fn enqueue(&self, submission: GradeSubmission) -> Result<Uuid, GradeQueueFull> {
        let job = GradeJob {
            id: Uuid::new_v4(),
            submission,
        };
        let job_id = job.id;

        match self.tx.try_send(job) {
            Ok(()) => {
                tracing::debug!(job_id = %job_id, "grade queued");
                Ok(job_id)
            }
            Err(mpsc::error::TrySendError::Full(job)) => {
                tracing::warn!(
                    job_id = %job_id,
                    user_id = %job.submission.user_id,
                    "grade queue full, dropping submission"
                );
                Err(GradeQueueFull { job_id })
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                tracing::warn!(
                    job_id = %job_id,
                    user_id = %job.submission.user_id,
                    "grade worker stopped, dropping submission"
                );
                Err(GradeQueueFull { job_id })
            }
        }
    }
}

/// Drain `rx` until every sender is dropped.
pub async fn run_worker(
    passback: Arc<GradePassbackClient>,
    mut rx: mpsc::Receiver<GradeJob>,
    observer: Option<GradeObserver>,
) {
    tracing::info!("grade worker started");

    while let Some(job) = rx.recv().await {
        let result = passback.submit(&job.submission, None).await;
        if let Err(e) = &result {
            tracing::warn!(
                job_id = %job.id,
                error = %e,
                "background grade passback failed"
            );
        }
        if let Some(observer) = &observer {
            observer(&job, &result);
        }
    }

    tracing::info!("grade worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::exchange::TokenExchangeClient;
    use ltigate_test::MockPlatform;
    use std::time::Duration;

    fn submission(lineitem_url: String) -> GradeSubmission {
        GradeSubmission {
            lineitem_url,
            user_id: "user-42".into(),
            score: 100.0,
            max_score: 100.0,
            comment: None,
        }
    }

    fn passback(platform: &MockPlatform) -> Arc<GradePassbackClient> {
        let config = test_config(&platform.issuer());
        let http = reqwest::Client::new();
        let exchange = Arc::new(TokenExchangeClient::new(http.clone(), &config));
        Arc::new(GradePassbackClient::new(http, exchange))
    }

    fn recording_observer() -> (GradeObserver, mpsc::UnboundedReceiver<(Uuid, bool)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let observer: GradeObserver = Arc::new(move |job: &GradeJob, result: &Result<GradeEnvelope, LtiError>| {
            let _ = tx.send((job.id, result.is_ok()));
        });
        (observer, rx)
    }

    #[tokio::test]
    async fn test_worker_submits_and_reports() {
        let platform = MockPlatform::start().await;
        platform.serve_token("bg-token").await;
        platform.accept_scores("42", "bg-token").await;

        let (observer, mut outcomes) = recording_observer();
        let (queue, _handle) = GradeQueue::spawn(passback(&platform), 10, Some(observer));

        let job_id = queue.enqueue(submission(platform.lineitem_url("42"))).unwrap();
        let (seen_id, ok) = tokio::time::timeout(Duration::from_secs(5), outcomes.recv())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(seen_id, job_id);
        assert!(ok);
        assert_eq!(platform.received_scores("42").await.len(), 1);
    }

    #[tokio::test]
    async fn test_worker_reports_failure_and_keeps_running() {
        let platform = MockPlatform::start().await;
        platform.serve_token("bg-token").await;
        platform.reject_scores("1", 500).await;
        platform.accept_scores("2", "bg-token").await;

        let (observer, mut outcomes) = recording_observer();
        let (queue, _handle) = GradeQueue::spawn(passback(&platform), 10, Some(observer));

        queue.enqueue(submission(platform.lineitem_url("1"))).unwrap();
        queue.enqueue(submission(platform.lineitem_url("2"))).unwrap();

        let first = tokio::time::timeout(Duration::from_secs(5), outcomes.recv())
            .await
            .unwrap()
            .unwrap();
        let second = tokio::time::timeout(Duration::from_secs(5), outcomes.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(!first.1);
        assert!(second.1);
    }

    #[tokio::test]
    async fn test_enqueue_full_queue() {
        let (queue, _rx) = GradeQueue::channel(1);
        queue
            .enqueue(submission("https://lms/lineitems/1".into()))
            .unwrap();
        let err = queue
            .enqueue(submission("https://lms/lineitems/1".into()))
            .unwrap_err();
        assert!(err.to_string().contains("grade queue is full"));
    }

    #[tokio::test]
    async fn test_enqueue_after_worker_stopped() {
        let (queue, rx) = GradeQueue::channel(4);
        drop(rx);
        assert!(queue
            .enqueue(submission("https://lms/lineitems/1".into()))
            .is_err());
    }
}
