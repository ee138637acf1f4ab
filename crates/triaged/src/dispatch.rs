//! Triage dispatch: synchronous classification or queued hand-off.
//!
//! Async disabled or no queue configured means inline classification. An
//! enqueue failure degrades gracefully to inline processing rather than
//! dropping the event, unless the deployment is configured to fail closed.

use anyhow::Context as _;
use chrono::Utc;
use tracing::{info, warn};
use triage_common::{CaseEvent, ClassificationResult, TriageJobPayload};

use crate::classify::{DiscoveryContext, Orchestrator};
use crate::error::ApiError;
use crate::events::{CompletionEvent, EventBus};
use crate::queue::JobQueue;
use crate::ticketing::CaseStore;

#[derive(Debug, Clone, Copy)]
pub struct DispatchOptions {
    pub async_enabled: bool,
    pub fail_closed: bool,
}

#[derive(Debug)]
pub enum DispatchOutcome {
    /// Processed inline; full result available.
    Classified(Box<ClassificationResult>),
    /// Handed to the async-task provider.
    Enqueued(TriageJobPayload),
}

pub async fn dispatch(
    event: &CaseEvent,
    orchestrator: &Orchestrator,
    store: &dyn CaseStore,
    queue: Option<&dyn JobQueue>,
    opts: DispatchOptions,
    events: &EventBus,
) -> Result<DispatchOutcome, ApiError> {
    if opts.async_enabled {
        if let Some(queue) = queue {
            // Deliberately minimal job: the worker re-derives state from
            // the sys_id, so delayed delivery cannot act on stale fields.
            let job = TriageJobPayload {
                case_sys_id: event.sys_id.clone(),
                case_number: event.case_number.clone(),
                enqueued_at: Utc::now(),
            };
            match queue.enqueue(&job).await {
                Ok(()) => return Ok(DispatchOutcome::Enqueued(job)),
                Err(e) if opts.fail_closed => {
                    return Err(ApiError::Internal(
                        anyhow::Error::new(e).context("enqueue failed (fail-closed)"),
                    ));
                }
                Err(e) => {
                    warn!(
                        "enqueue failed for {}, degrading to synchronous processing: {}",
                        event.case_number, e
                    );
                }
            }
        }
    }

    let result = classify_and_apply(event, orchestrator, store, events).await?;
    Ok(DispatchOutcome::Classified(Box::new(result)))
}

/// Classify one event and write the outcome back to the ticketing record.
/// Re-running for the same event re-writes the same fields and note, so a
/// retried job stays idempotent.
pub async fn classify_and_apply(
    event: &CaseEvent,
    orchestrator: &Orchestrator,
    store: &dyn CaseStore,
    events: &EventBus,
) -> Result<ClassificationResult, ApiError> {
    let result = orchestrator
        .classify(event, &DiscoveryContext::default())
        .await
        .map_err(|e| {
            ApiError::Internal(
                anyhow::Error::new(e)
                    .context(format!("classification failed for {}", event.case_number)),
            )
        })?;

    store
        .update_classification(&event.sys_id, &result)
        .await
        .with_context(|| format!("failed to update record for {}", event.case_number))
        .map_err(ApiError::Internal)?;

    store
        .add_work_note(&event.sys_id, &classification_note(&result))
        .await
        .with_context(|| format!("failed to add work note for {}", event.case_number))
        .map_err(ApiError::Internal)?;

    events.emit(CompletionEvent {
        case_sys_id: event.sys_id.clone(),
        case_number: event.case_number.clone(),
        category: result.category.clone(),
        confidence: result.confidence,
    });

    info!(
        "applied classification for {}: {}",
        event.case_number, result.category
    );
    Ok(result)
}

fn classification_note(result: &ClassificationResult) -> String {
    let mut note = format!(
        "[triage] category: {} / {} (confidence {:.2}, urgency {})\n{}",
        result.category,
        result.subcategory,
        result.confidence,
        result.urgency_level.as_str(),
        result.reasoning,
    );
    if let Some(suggestion) = &result.record_type_suggestion {
        note.push_str(&format!("\nsuggested record type: {}", suggestion));
    }
    note
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{ChatBackend, ClassifyError};
    use crate::queue::QueueError;
    use crate::ticketing::{CaseRecord, StoreError};
    use async_trait::async_trait;
    use chrono::DateTime;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use triage_common::{TechnicalEntities, UrgencyLevel, UsageMetrics};

    struct FakeBackend {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ChatBackend for FakeBackend {
        async fn complete(
            &self,
            _system: &str,
            _user: &str,
        ) -> Result<(String, UsageMetrics), ClassifyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok((
                r#"{"category":"access","subcategory":"auth","confidence":0.9,"reasoning":"r","urgency_level":"high"}"#.to_string(),
                UsageMetrics::default(),
            ))
        }
    }

    #[derive(Default)]
    struct FakeStore {
        updates: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CaseStore for FakeStore {
        async fn fetch_case(&self, sys_id: &str) -> Result<CaseRecord, StoreError> {
            Err(StoreError::NotFound(sys_id.to_string()))
        }

        async fn query_stale(
            &self,
            _group: &str,
            _cutoff: DateTime<Utc>,
            _limit: usize,
        ) -> Result<Vec<CaseRecord>, StoreError> {
            Ok(vec![])
        }

        async fn add_work_note(&self, _sys_id: &str, _note: &str) -> Result<(), StoreError> {
            Ok(())
        }

        async fn update_classification(
            &self,
            sys_id: &str,
            result: &ClassificationResult,
        ) -> Result<(), StoreError> {
            self.updates
                .lock()
                .unwrap()
                .push(format!("{}: {}", sys_id, result.category));
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeQueue {
        jobs: Mutex<Vec<TriageJobPayload>>,
        fail: bool,
    }

    #[async_trait]
    impl JobQueue for FakeQueue {
        async fn enqueue(&self, job: &TriageJobPayload) -> Result<(), QueueError> {
            if self.fail {
                return Err(QueueError::Api {
                    status: 503,
                    body: "unavailable".to_string(),
                });
            }
            self.jobs.lock().unwrap().push(job.clone());
            Ok(())
        }
    }

    fn event() -> CaseEvent {
        serde_json::from_value(serde_json::json!({
            "case_number": "CASE001",
            "sys_id": "sys-1",
            "short_description": "Login issues"
        }))
        .unwrap()
    }

    fn fixture() -> (Orchestrator, Arc<FakeBackend>, FakeStore, EventBus) {
        let backend = Arc::new(FakeBackend {
            calls: AtomicUsize::new(0),
        });
        (
            Orchestrator::new(backend.clone()),
            backend,
            FakeStore::default(),
            EventBus::default(),
        )
    }

    #[tokio::test]
    async fn test_async_enqueue_returns_ack_without_classifying() {
        let (orchestrator, backend, store, events) = fixture();
        let queue = FakeQueue::default();
        let opts = DispatchOptions {
            async_enabled: true,
            fail_closed: false,
        };

        let outcome = dispatch(&event(), &orchestrator, &store, Some(&queue), opts, &events)
            .await
            .unwrap();

        let DispatchOutcome::Enqueued(job) = outcome else {
            panic!("expected enqueued outcome");
        };
        assert_eq!(job.case_sys_id, "sys-1");
        assert_eq!(queue.jobs.lock().unwrap().len(), 1);
        // Classification is deferred to the worker.
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
        assert!(store.updates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_enqueue_failure_degrades_to_inline() {
        let (orchestrator, backend, store, events) = fixture();
        let queue = FakeQueue {
            jobs: Mutex::new(vec![]),
            fail: true,
        };
        let opts = DispatchOptions {
            async_enabled: true,
            fail_closed: false,
        };

        let outcome = dispatch(&event(), &orchestrator, &store, Some(&queue), opts, &events)
            .await
            .unwrap();

        assert!(matches!(outcome, DispatchOutcome::Classified(_)));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.updates.lock().unwrap().as_slice(), ["sys-1: access"]);
    }

    #[tokio::test]
    async fn test_enqueue_failure_fail_closed_rejects() {
        let (orchestrator, backend, store, events) = fixture();
        let queue = FakeQueue {
            jobs: Mutex::new(vec![]),
            fail: true,
        };
        let opts = DispatchOptions {
            async_enabled: true,
            fail_closed: true,
        };

        let err = dispatch(&event(), &orchestrator, &store, Some(&queue), opts, &events)
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Internal(_)));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
        assert!(store.updates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_async_enabled_without_queue_classifies_inline() {
        let (orchestrator, backend, store, events) = fixture();
        let opts = DispatchOptions {
            async_enabled: true,
            fail_closed: false,
        };

        let outcome = dispatch(&event(), &orchestrator, &store, None, opts, &events)
            .await
            .unwrap();

        assert!(matches!(outcome, DispatchOutcome::Classified(_)));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_classification_note_format() {
        let result = ClassificationResult {
            category: "access".to_string(),
            subcategory: "auth".to_string(),
            confidence: 0.91,
            reasoning: "Login failure.".to_string(),
            keywords: vec![],
            entities: TechnicalEntities::default(),
            urgency_level: UrgencyLevel::High,
            record_type_suggestion: Some("incident".to_string()),
            usage: UsageMetrics::default(),
        };
        let note = classification_note(&result);
        assert!(note.starts_with("[triage] category: access / auth"));
        assert!(note.contains("urgency high"));
        assert!(note.contains("suggested record type: incident"));
    }
}
