//! Two-tier intent detection for conversational queries.
//!
//! A rule-based classifier runs first and wins outright at confidence
//! >= 0.8. Otherwise the LLM classifier runs; its result is preferred only
//! when its confidence is strictly higher. LLM results are cached for 30
//! minutes keyed by message text + serialized context, with lazy eviction
//! on read. The cache takes an injected clock so tests can advance time.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use triage_common::prompts;

use crate::classify::{ChatBackend, ClassifyError};

/// Rule-based results at or above this confidence skip the LLM entirely.
pub const RULE_CONFIDENCE_THRESHOLD: f64 = 0.8;

/// How long a cached LLM intent stays valid.
pub const INTENT_CACHE_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentSource {
    RuleBased,
    Llm,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentResult {
    pub intent: String,
    pub confidence: f64,
    pub source: IntentSource,
}

/// Injected clock so cache expiry is testable with a fake.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

struct CacheEntry {
    stored_at: Instant,
    result: IntentResult,
}

/// Mutex-guarded TTL cache for LLM intent results. Constructed once per
/// process; staleness is tolerated, exactness is not required.
pub struct IntentCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    ttl: Duration,
    clock: Box<dyn Clock>,
}

impl IntentCache {
    pub fn new() -> Self {
        Self::with_clock(INTENT_CACHE_TTL, Box::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Box<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            clock,
        }
    }

    /// Composite key: message text + serialized context.
    pub fn key(message: &str, context: &Value) -> String {
        format!("{}|{}", message, context)
    }

    /// Expired entries are evicted here, on read.
    pub fn get(&self, key: &str) -> Option<IntentResult> {
        let now = self.clock.now();
        let mut entries = match self.entries.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        match entries.get(key) {
            Some(entry) if now.duration_since(entry.stored_at) < self.ttl => {
                Some(entry.result.clone())
            }
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: String, result: IntentResult) {
        let mut entries = match self.entries.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.insert(
            key,
            CacheEntry {
                stored_at: self.clock.now(),
                result,
            },
        );
    }
}

impl Default for IntentCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Fast rule-based classifier. Keyword tables, no I/O.
pub fn rule_classify(message: &str) -> IntentResult {
    let lower = message.to_lowercase();
    let trimmed = lower.trim();

    let result = |intent: &str, confidence: f64| IntentResult {
        intent: intent.to_string(),
        confidence,
        source: IntentSource::RuleBased,
    };

    if trimmed.is_empty() {
        return result("other", 0.3);
    }

    let is_question = trimmed.ends_with('?');

    if ["hi", "hello", "hey", "good morning", "good afternoon", "thanks", "thank you"]
        .iter()
        .any(|g| trimmed == *g || trimmed.starts_with(&format!("{} ", g)))
    {
        return result("smalltalk", 0.9);
    }

    let status_markers = ["any update", "status", "eta", "how long", "when will"];
    if status_markers.iter().any(|m| trimmed.contains(m)) {
        return result("status_inquiry", 0.85);
    }

    let resolution_markers = ["fixed", "resolved", "working now", "works now", "all good", "sorted"];
    if resolution_markers.iter().any(|m| trimmed.contains(m)) {
        // "is this fixed?" is a status question, not a confirmation.
        if is_question {
            return result("status_inquiry", 0.85);
        }
        return result("resolution_confirmation", 0.8);
    }

    let issue_markers = ["error", "cannot", "can't", "unable", "broken", "down", "failing", "not working"];
    if issue_markers.iter().any(|m| trimmed.contains(m)) {
        return result("new_issue", 0.75);
    }

    if trimmed.contains("still") || trimmed.contains("again") {
        return result("followup", 0.7);
    }

    result("other", 0.4)
}

/// Two-tier detection. Never fails: LLM errors fall back to the rule-based
/// result.
pub async fn detect_intent(
    message: &str,
    context: &Value,
    cache: &IntentCache,
    backend: &dyn ChatBackend,
) -> IntentResult {
    let rule = rule_classify(message);
    if rule.confidence >= RULE_CONFIDENCE_THRESHOLD {
        return rule;
    }

    let key = IntentCache::key(message, context);
    let llm = match cache.get(&key) {
        Some(cached) => {
            debug!("intent cache hit");
            cached
        }
        None => match llm_classify(message, context, backend).await {
            Ok(result) => {
                cache.insert(key, result.clone());
                result
            }
            Err(e) => {
                warn!("LLM intent classification failed, using rule result: {}", e);
                return rule;
            }
        },
    };

    // LLM wins only on strictly higher confidence.
    if llm.confidence > rule.confidence {
        llm
    } else {
        rule
    }
}

async fn llm_classify(
    message: &str,
    context: &Value,
    backend: &dyn ChatBackend,
) -> Result<IntentResult, ClassifyError> {
    let user = format!("Context: {}\nMessage: {}", context, message);
    let (text, _usage) = backend
        .complete(prompts::INTENT_SYSTEM_PROMPT, &user)
        .await?;

    let value: Value = serde_json::from_str(&text).map_err(|e| ClassifyError::StageParse {
        stage: "intent",
        message: e.to_string(),
    })?;

    Ok(IntentResult {
        intent: value
            .get("intent")
            .and_then(|v| v.as_str())
            .unwrap_or("other")
            .to_string(),
        confidence: value
            .get("confidence")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0)
            .clamp(0.0, 1.0),
        source: IntentSource::Llm,
    })
}
