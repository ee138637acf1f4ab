//! Shared types for the case triage daemon.
//!
//! Wire DTOs for the chat-completion provider, the HTTP surface, and the
//! classification domain types produced by the orchestrator.

pub mod api;
pub mod case;
pub mod chat;
pub mod classification;
pub mod prompts;

pub use api::{
    ErrorResponse, HealthResponse, SweepGroupSummary, SweepSummary, TriageJobPayload, WebhookAck,
    WorkerResponse,
};
pub use case::{CaseEvent, FieldViolation};
pub use chat::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ChatUsage};
pub use classification::{
    ClassificationResult, TechnicalEntities, UrgencyLevel, UsageMetrics,
};
