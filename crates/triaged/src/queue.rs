//! Async-task provider client.
//!
//! Enqueues minimal triage jobs. The job body is HMAC-signed with the
//! queue secret so the worker endpoint can verify delivery; this secret is
//! distinct from the webhook secret by design.

use async_trait::async_trait;
use std::time::Duration;
use tracing::info;
use triage_common::TriageJobPayload;

use crate::auth;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("enqueue request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("queue provider returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("job serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Seam for the async-task provider so the dispatcher's enqueue branches
/// run against a fake in tests.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Hand the job to the provider. Ownership of delivery transfers to
    /// the provider's guarantee once this returns Ok.
    async fn enqueue(&self, job: &TriageJobPayload) -> Result<(), QueueError>;
}

pub struct QueueClient {
    http: reqwest::Client,
    endpoint: String,
    secret: String,
}

impl QueueClient {
    pub fn new(endpoint: &str, secret: &str) -> Result<Self, QueueError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            endpoint: endpoint.to_string(),
            secret: secret.to_string(),
        })
    }
}

#[async_trait]
impl JobQueue for QueueClient {
    async fn enqueue(&self, job: &TriageJobPayload) -> Result<(), QueueError> {
        let body = serde_json::to_vec(job)?;
        let signature = auth::sign_queue_body(&self.secret, &body);

        let resp = self
            .http
            .post(&self.endpoint)
            .header("content-type", "application/json")
            .header("x-queue-signature", signature)
            .body(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(QueueError::Api {
                status: status.as_u16(),
                body,
            });
        }

        info!("enqueued triage job for {}", job.case_number);
        Ok(())
    }
}
