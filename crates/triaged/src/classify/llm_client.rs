//! Chat-completion client.
//!
//! The model is a black box: prompt in, text out, usage out. Temperature is
//! pinned to 0 so classification stays deterministic, the timeout is a
//! fixed ceiling, and transport failures get a small bounded retry before
//! surfacing as a typed error.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{info, warn};
use triage_common::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, UsageMetrics,
};

use super::ClassifyError;
use crate::config::LlmConfig;

/// Seam for the chat-completion provider so stages run against a fake in
/// tests.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// One chat-completion round trip: returns the reply text and the
    /// provider-reported usage.
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<(String, UsageMetrics), ClassifyError>;
}

pub struct HttpChatBackend {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_retries: u32,
}

impl HttpChatBackend {
    pub fn new(cfg: &LlmConfig) -> Result<Self, ClassifyError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| ClassifyError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            max_retries: cfg.max_retries,
        })
    }

    async fn call_once(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<(String, UsageMetrics), ClassifyError> {
        let response = self
            .http
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ClassifyError::Timeout
                } else {
                    ClassifyError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClassifyError::Transport(format!(
                "provider returned {}: {}",
                status, body
            )));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ClassifyError::Transport(e.to_string()))?;

        let text = parsed
            .first_text()
            .ok_or(ClassifyError::EmptyResponse)?
            .to_string();

        let usage = parsed
            .usage
            .map(|u| UsageMetrics {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
                cache_read_tokens: u.cached_tokens,
            })
            .unwrap_or_default();

        Ok((text, usage))
    }
}

#[async_trait]
impl ChatBackend for HttpChatBackend {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<(String, UsageMetrics), ClassifyError> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::system(system_prompt),
                ChatMessage::user(user_prompt),
            ],
            temperature: 0.0,
            max_tokens: None,
        };

        info!(
            "chat call [{}]: system {} chars, user {} chars",
            self.model,
            system_prompt.len(),
            user_prompt.len()
        );

        let mut attempt = 0;
        loop {
            match self.call_once(&request).await {
                Ok(result) => return Ok(result),
                // Timeouts are not retried: the ceiling already bounds the
                // caller's wait and the provider's own retry governs beyond it.
                Err(ClassifyError::Timeout) => return Err(ClassifyError::Timeout),
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    warn!("chat call failed (attempt {}): {}", attempt, e);
                    tokio::time::sleep(Duration::from_millis(250 * u64::from(attempt))).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
