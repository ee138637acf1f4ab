//! Classification output types produced by the orchestrator.

use serde::{Deserialize, Serialize};

/// Urgency level assigned by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrgencyLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl UrgencyLevel {
    /// Parse a model-supplied urgency string, defaulting to Medium on
    /// anything unrecognized.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "low" => Self::Low,
            "medium" => Self::Medium,
            "high" => Self::High,
            "critical" => Self::Critical,
            _ => Self::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

/// Technical entities extracted from the case text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TechnicalEntities {
    #[serde(default)]
    pub systems: Vec<String>,
    #[serde(default)]
    pub components: Vec<String>,
    #[serde(default)]
    pub error_codes: Vec<String>,
}

impl TechnicalEntities {
    pub fn is_empty(&self) -> bool {
        self.systems.is_empty() && self.components.is_empty() && self.error_codes.is_empty()
    }
}

/// Token usage for one chat-completion call, summed across stages for cost
/// attribution.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UsageMetrics {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: u64,
}

impl UsageMetrics {
    pub fn add(&mut self, other: &UsageMetrics) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.cache_read_tokens += other.cache_read_tokens;
    }

    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// Immutable classification produced once per case event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub category: String,
    pub subcategory: String,
    /// Model confidence, clamped to [0, 1].
    pub confidence: f64,
    pub reasoning: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub entities: TechnicalEntities,
    pub urgency_level: UrgencyLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_type_suggestion: Option<String>,
    #[serde(default)]
    pub usage: UsageMetrics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urgency_parse_defaults_to_medium() {
        assert_eq!(UrgencyLevel::parse("HIGH"), UrgencyLevel::High);
        assert_eq!(UrgencyLevel::parse("critical"), UrgencyLevel::Critical);
        assert_eq!(UrgencyLevel::parse("whatever"), UrgencyLevel::Medium);
    }

    #[test]
    fn test_usage_sum() {
        let mut a = UsageMetrics {
            input_tokens: 100,
            output_tokens: 40,
            cache_read_tokens: 10,
        };
        let b = UsageMetrics {
            input_tokens: 50,
            output_tokens: 20,
            cache_read_tokens: 0,
        };
        a.add(&b);
        assert_eq!(a.input_tokens, 150);
        assert_eq!(a.output_tokens, 60);
        assert_eq!(a.total(), 210);
    }
}
