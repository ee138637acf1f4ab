//! Validated case event domain type.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A validated inbound support-case event.
///
/// `case_number`, `sys_id` and `short_description` are guaranteed present
/// and non-empty after validation. Any vendor fields the validator does not
/// recognize are preserved verbatim in `extra` for forward compatibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseEvent {
    pub case_number: String,
    pub sys_id: String,
    pub short_description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignment_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing_context: Option<String>,

    /// Unrecognized vendor fields, passed through unmodified.
    #[serde(default, flatten)]
    pub extra: Map<String, Value>,
}

/// A single violated schema constraint, reported alongside its peers so the
/// caller can log complete diagnostics in one response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: String,
    pub problem: String,
}

impl FieldViolation {
    pub fn new(field: &str, problem: &str) -> Self {
        Self {
            field: field.to_string(),
            problem: problem.to_string(),
        }
    }
}
