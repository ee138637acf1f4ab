//! Async worker execution.
//!
//! The queue provider delivers a minimal job; the worker re-fetches the
//! full record by sys_id and never trusts job fields beyond the
//! identifiers. Every failure is caught, timed, and returned as a typed
//! outcome so the provider's retry policy can act on the HTTP status.

use serde::Deserialize;
use std::time::Instant;
use tracing::{error, info};
use triage_common::WorkerResponse;

use crate::classify::Orchestrator;
use crate::dispatch::classify_and_apply;
use crate::events::EventBus;
use crate::ticketing::CaseStore;

/// Job body as delivered by the queue provider. Aliases cover the change
/// and case shapes the provider may emit.
#[derive(Debug, Clone, Deserialize)]
pub struct JobRequest {
    #[serde(alias = "caseSysId", alias = "changeSysId")]
    pub case_sys_id: String,
    #[serde(default, alias = "caseNumber", alias = "changeNumber")]
    pub case_number: Option<String>,
}

/// Run one delivered job to completion. Never propagates an error past
/// this boundary; the caller maps `success` to an HTTP status.
pub async fn run_job(
    job: &JobRequest,
    store: &dyn CaseStore,
    orchestrator: &Orchestrator,
    events: &EventBus,
) -> WorkerResponse {
    let start = Instant::now();
    let fallback_number = job
        .case_number
        .clone()
        .unwrap_or_else(|| job.case_sys_id.clone());

    match process(job, store, orchestrator, events).await {
        Ok((case_number, category)) => {
            let duration_ms = start.elapsed().as_millis() as u64;
            info!(
                "worker classified {} as {} in {}ms",
                case_number, category, duration_ms
            );
            WorkerResponse {
                success: true,
                case_number,
                overall_status: "classified".to_string(),
                duration_ms,
                error: None,
            }
        }
        Err(e) => {
            let duration_ms = start.elapsed().as_millis() as u64;
            error!(
                "worker failed for {} after {}ms: {:#}",
                fallback_number, duration_ms, e
            );
            WorkerResponse {
                success: false,
                case_number: fallback_number,
                overall_status: "failed".to_string(),
                duration_ms,
                error: Some(e.to_string()),
            }
        }
    }
}

async fn process(
    job: &JobRequest,
    store: &dyn CaseStore,
    orchestrator: &Orchestrator,
    events: &EventBus,
) -> anyhow::Result<(String, String)> {
    // Re-fetch by sys_id: tolerates stale or duplicate deliveries.
    let record = store.fetch_case(&job.case_sys_id).await?;
    let event = record.to_event();

    let result = classify_and_apply(&event, orchestrator, store, events)
        .await
        .map_err(anyhow::Error::new)?;

    Ok((event.case_number, result.category))
}
