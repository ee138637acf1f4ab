//! Multi-stage classification orchestration.
//!
//! Stages run strictly sequentially; each builds a shared textual context
//! from the event and any discovery context, makes one deterministic
//! chat-completion call, and parses the reply with defaulting. Usage is
//! captured per call and summed across stages for cost attribution.

pub mod llm_client;
pub mod parse;

use std::sync::Arc;
use tracing::info;
use triage_common::{prompts, CaseEvent, ClassificationResult, UsageMetrics};

pub use llm_client::{ChatBackend, HttpChatBackend};

#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("chat request failed: {0}")]
    Transport(String),

    #[error("chat request timed out")]
    Timeout,

    #[error("provider returned an empty response")]
    EmptyResponse,

    /// Stage-scoped: unparseable stage output fails the whole
    /// classification rather than guessing at partial structure.
    #[error("stage '{stage}' returned unparseable output: {message}")]
    StageParse { stage: &'static str, message: String },
}

/// Discovery context assembled by the caller: recent conversation, company
/// metadata, policy constraints. A pure input snapshot.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryContext {
    pub recent_messages: Vec<String>,
    pub company_notes: Option<String>,
    pub policy_constraints: Vec<String>,
}

pub struct Orchestrator {
    backend: Arc<dyn ChatBackend>,
}

impl Orchestrator {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn ChatBackend> {
        &self.backend
    }

    /// Run all classification stages for one event. Later stages may depend
    /// on earlier output, so order is fixed.
    pub async fn classify(
        &self,
        event: &CaseEvent,
        context: &DiscoveryContext,
    ) -> Result<ClassificationResult, ClassifyError> {
        let mut usage = UsageMetrics::default();
        let stage_context = build_stage_context(event, context);

        let mut result = self
            .run_categorization(&stage_context, &mut usage)
            .await?;

        result.usage = usage;
        info!(
            "classified {}: {} / {} (confidence {:.2}, {} tokens)",
            event.case_number,
            result.category,
            result.subcategory,
            result.confidence,
            result.usage.total()
        );
        Ok(result)
    }

    async fn run_categorization(
        &self,
        stage_context: &str,
        usage: &mut UsageMetrics,
    ) -> Result<ClassificationResult, ClassifyError> {
        let (text, call_usage) = self
            .backend
            .complete(prompts::CATEGORIZATION_SYSTEM_PROMPT, stage_context)
            .await?;
        usage.add(&call_usage);

        parse::parse_classification(&text).map_err(|message| ClassifyError::StageParse {
            stage: "categorization",
            message,
        })
    }
}

/// Shared textual context for all stages of one event.
fn build_stage_context(event: &CaseEvent, context: &DiscoveryContext) -> String {
    let mut out = String::new();
    out.push_str(&format!("Case: {}\n", event.case_number));
    out.push_str(&format!("Short description: {}\n", event.short_description));
    if let Some(desc) = &event.description {
        out.push_str(&format!("Description: {}\n", desc));
    }
    if let Some(priority) = &event.priority {
        out.push_str(&format!("Priority: {}\n", priority));
    }
    if let Some(group) = &event.assignment_group {
        out.push_str(&format!("Assignment group: {}\n", group));
    }
    if let Some(company) = &event.company {
        out.push_str(&format!("Company: {}\n", company));
    }

    if let Some(notes) = &context.company_notes {
        out.push_str(&format!("\nCompany context:\n{}\n", notes));
    }
    if !context.policy_constraints.is_empty() {
        out.push_str("\nPolicy constraints:\n");
        for constraint in &context.policy_constraints {
            out.push_str(&format!("- {}\n", constraint));
        }
    }
    if !context.recent_messages.is_empty() {
        out.push_str("\nRecent conversation:\n");
        for msg in &context.recent_messages {
            out.push_str(&format!("- {}\n", msg));
        }
    }
    out
}
