//! HTTP surface DTOs shared between the daemon and its callers.

use serde::{Deserialize, Serialize};

/// 200 body for an accepted webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookAck {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_number: Option<String>,
    /// Present when the event was classified inline rather than enqueued.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// Error body for 4xx/5xx responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Job payload handed to the async-task provider. Deliberately minimal:
/// the worker re-derives all descriptive state from the sys_id, so a
/// delayed delivery cannot act on stale fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageJobPayload {
    pub case_sys_id: String,
    pub case_number: String,
    pub enqueued_at: chrono::DateTime<chrono::Utc>,
}

/// Worker endpoint response, success or typed failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerResponse {
    pub success: bool,
    pub case_number: String,
    pub overall_status: String,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per assignment-group aggregate for one sweep run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepGroupSummary {
    pub assignment_group: String,
    pub total_stale: usize,
    pub followups_posted: usize,
    pub age_threshold_hours: u64,
    /// Notification channel bound to the group, when configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
}

/// Full sweep run report. Created fresh per run, never persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepSummary {
    pub groups: Vec<SweepGroupSummary>,
    pub total_stale: usize,
    pub followups_posted: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}
