//! API routes for triaged.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;
use triage_common::{ErrorResponse, HealthResponse, WebhookAck};

use crate::auth;
use crate::dispatch::{self, DispatchOptions, DispatchOutcome};
use crate::error::ApiError;
use crate::intent;
use crate::payload::{self, RepairError};
use crate::resolution::{self, ResolutionCheckContext};
use crate::server::AppState;
use crate::sweeper;
use crate::validate;
use crate::worker::{self, JobRequest};

type AppStateArc = Arc<AppState>;

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

// ============================================================================
// Webhook Route
// ============================================================================

pub fn webhook_routes() -> Router<AppStateArc> {
    Router::new().route("/v1/webhook/case", post(webhook_case))
}

async fn webhook_case(
    State(state): State<AppStateArc>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    // Authentication first, over the exact raw bytes. A forged payload is
    // rejected before any parsing runs so repair telemetry never leaks.
    let signature = header_str(&headers, "x-webhook-signature")
        .or_else(|| header_str(&headers, "authorization"));
    if !auth::verify_webhook(signature, &body, state.config.webhook.secret.as_deref()) {
        return Err(ApiError::Authentication);
    }

    let repaired = payload::normalize(&body).map_err(|e| match e {
        RepairError::Empty => ApiError::Parse {
            details: Some("empty payload".to_string()),
        },
        RepairError::Unparseable(msg) => ApiError::Parse { details: Some(msg) },
        RepairError::NotJson => ApiError::Parse { details: None },
    })?;
    for warning in &repaired.diagnostics.warnings {
        warn!("webhook payload: {}", warning);
    }

    let event = validate::validate(&repaired.value).map_err(ApiError::Validation)?;

    let outcome = dispatch::dispatch(
        &event,
        &state.orchestrator,
        state.store.as_ref(),
        state.queue.as_deref(),
        DispatchOptions {
            async_enabled: state.config.dispatch.async_enabled,
            fail_closed: state.config.dispatch.fail_closed,
        },
        &state.events,
    )
    .await?;

    let ack = match outcome {
        DispatchOutcome::Classified(result) => WebhookAck {
            status: "ok".to_string(),
            case_number: Some(event.case_number),
            category: Some(result.category),
            confidence: Some(result.confidence),
        },
        DispatchOutcome::Enqueued(job) => WebhookAck {
            status: "queued".to_string(),
            case_number: Some(job.case_number),
            category: None,
            confidence: None,
        },
    };
    Ok(Json(ack))
}

// ============================================================================
// Async Worker Route
// ============================================================================

pub fn worker_routes() -> Router<AppStateArc> {
    Router::new().route("/v1/worker/triage", post(worker_triage))
}

async fn worker_triage(
    State(state): State<AppStateArc>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    // Provider delivery signature: a separate trust boundary from the
    // webhook secret. Verified before the job body is even parsed.
    if let Some(secret) = state.config.dispatch.queue_secret.as_deref() {
        let signature = header_str(&headers, "x-queue-signature");
        if !auth::verify_queue_signature(signature, &body, secret) {
            return Err(ApiError::Authentication);
        }
    }

    let job: JobRequest = serde_json::from_slice(&body).map_err(|e| ApiError::Parse {
        details: Some(e.to_string()),
    })?;

    let response =
        worker::run_job(&job, state.store.as_ref(), &state.orchestrator, &state.events).await;

    let status = if response.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    Ok((status, Json(response)).into_response())
}

// ============================================================================
// Sweep Trigger Route
// ============================================================================

pub fn sweep_routes() -> Router<AppStateArc> {
    Router::new().route("/v1/sweep/run", post(sweep_run))
}

async fn sweep_run(
    State(state): State<AppStateArc>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let bearer = header_str(&headers, "authorization");
    if !auth::verify_internal_bearer(bearer, state.config.internal.bearer_secret.as_deref()) {
        return Err(ApiError::Authentication);
    }

    // One sweep at a time; a concurrent trigger gets a conflict rather
    // than a queued second run.
    let Ok(_guard) = state.sweep_lock.try_lock() else {
        return Ok((
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: "sweep already running".to_string(),
                details: None,
            }),
        )
            .into_response());
    };

    let summary = sweeper::sweep(state.store.as_ref(), &state.config.sweeper.groups).await;

    Ok((
        [(header::CACHE_CONTROL, "no-store")],
        Json(summary),
    )
        .into_response())
}

// ============================================================================
// Conversation Routes
// ============================================================================

pub fn conversation_routes() -> Router<AppStateArc> {
    Router::new().route("/v1/conversation/check", post(conversation_check))
}

#[derive(Debug, Deserialize)]
struct ConversationCheckRequest {
    message: String,
    #[serde(default)]
    context: Value,
    /// When the case was first detected; defaults to now, which keeps the
    /// resolution cooldown active for unknown histories.
    #[serde(default)]
    detected_at: Option<DateTime<Utc>>,
    #[serde(default)]
    recent_messages: Vec<String>,
    #[serde(default)]
    already_resolved: bool,
}

/// Intent + resolution check for one conversation message. Feeds the
/// downstream conversational state; internal callers only.
async fn conversation_check(
    State(state): State<AppStateArc>,
    headers: HeaderMap,
    Json(req): Json<ConversationCheckRequest>,
) -> Result<Json<Value>, ApiError> {
    let bearer = header_str(&headers, "authorization");
    if !auth::verify_internal_bearer(bearer, state.config.internal.bearer_secret.as_deref()) {
        return Err(ApiError::Authentication);
    }

    let intent_result = intent::detect_intent(
        &req.message,
        &req.context,
        &state.intent_cache,
        state.orchestrator.backend().as_ref(),
    )
    .await;

    let now = Utc::now();
    let resolution = resolution::detect_resolution(
        &req.message,
        &ResolutionCheckContext {
            detected_at: req.detected_at.unwrap_or(now),
            recent_messages: req.recent_messages,
            already_resolved: req.already_resolved,
        },
        now,
    );

    Ok(Json(json!({
        "intent": intent_result,
        "resolution": {
            "is_resolved": resolution.is_resolved,
            "reason": resolution.reason,
        },
    })))
}

// ============================================================================
// Health Route
// ============================================================================

pub fn health_routes() -> Router<AppStateArc> {
    Router::new().route("/v1/health", get(health_check))
}

async fn health_check(State(state): State<AppStateArc>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}
