//! Configuration for triaged.
//!
//! Loads settings from a TOML file, then applies environment overrides for
//! secrets so credentials never need to live on disk.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Default config file path.
pub const CONFIG_PATH: &str = "/etc/triaged/config.toml";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TriagedConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub ticketing: TicketingConfig,
    #[serde(default)]
    pub sweeper: SweeperConfig,
    #[serde(default)]
    pub internal: InternalConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

fn default_bind_addr() -> String {
    "127.0.0.1:7870".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

/// Inbound webhook boundary. No secret = unauthenticated mode for
/// local/dev.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WebhookConfig {
    #[serde(default)]
    pub secret: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Queue jobs with the async-task provider instead of classifying
    /// inline.
    #[serde(default)]
    pub async_enabled: bool,

    /// Reject the webhook instead of degrading to inline classification
    /// when enqueue fails.
    #[serde(default)]
    pub fail_closed: bool,

    #[serde(default)]
    pub queue_endpoint: Option<String>,

    #[serde(default)]
    pub queue_secret: Option<String>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            async_enabled: false,
            fail_closed: false,
            queue_endpoint: None,
            queue_secret: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Fixed request ceiling for one chat-completion call.
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_llm_retries")]
    pub max_retries: u32,
}

fn default_llm_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_llm_timeout() -> u64 {
    120
}

fn default_llm_retries() -> u32 {
    2
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            api_key: String::new(),
            model: default_llm_model(),
            timeout_secs: default_llm_timeout(),
            max_retries: default_llm_retries(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketingConfig {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_case_table")]
    pub table: String,
    #[serde(default = "default_ticketing_timeout")]
    pub timeout_secs: u64,
}

fn default_case_table() -> String {
    "sn_customerservice_case".to_string()
}

fn default_ticketing_timeout() -> u64 {
    30
}

impl Default for TicketingConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            username: String::new(),
            password: String::new(),
            table: default_case_table(),
            timeout_secs: default_ticketing_timeout(),
        }
    }
}

/// One assignment group's staleness policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupPolicy {
    pub name: String,

    #[serde(default = "default_max_age_hours")]
    pub max_age_hours: u64,

    /// Hard cap on follow-ups per run for this group.
    #[serde(default = "default_followup_limit")]
    pub followup_limit: usize,

    /// Optional notification channel binding.
    #[serde(default)]
    pub channel: Option<String>,
}

fn default_max_age_hours() -> u64 {
    72
}

fn default_followup_limit() -> usize {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SweeperConfig {
    #[serde(default)]
    pub groups: Vec<GroupPolicy>,

    /// Run the sweep automatically at this interval. None = trigger
    /// endpoint only.
    #[serde(default)]
    pub interval_hours: Option<u64>,
}

/// Internal operator endpoints (sweep trigger, conversation checks).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct InternalConfig {
    #[serde(default)]
    pub bearer_secret: Option<String>,
}

impl TriagedConfig {
    /// Load from `path` (or defaults when absent), then apply environment
    /// overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let config: TriagedConfig = toml::from_str(&content)
                .with_context(|| format!("failed to parse {}", path.display()))?;
            info!("loaded config from {}", path.display());
            config
        } else {
            warn!("{} not found, using defaults", path.display());
            TriagedConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Secrets and credentials can come from the environment instead of
    /// the config file.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("TRIAGED_WEBHOOK_SECRET") {
            self.webhook.secret = Some(v);
        }
        if let Ok(v) = std::env::var("TRIAGED_QUEUE_SECRET") {
            self.dispatch.queue_secret = Some(v);
        }
        if let Ok(v) = std::env::var("TRIAGED_LLM_API_KEY") {
            self.llm.api_key = v;
        }
        if let Ok(v) = std::env::var("TRIAGED_INTERNAL_SECRET") {
            self.internal.bearer_secret = Some(v);
        }
        if let Ok(v) = std::env::var("SERVICENOW_URL") {
            self.ticketing.base_url = v;
        }
        if let Ok(v) = std::env::var("SERVICENOW_USERNAME") {
            self.ticketing.username = v;
        }
        if let Ok(v) = std::env::var("SERVICENOW_PASSWORD") {
            self.ticketing.password = v;
        }
    }
}
