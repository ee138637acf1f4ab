//! Schema validation: normalized payload -> typed CaseEvent.
//!
//! Required-field presence is checked first, then type/format checks. All
//! violations are collected so the caller logs complete diagnostics in one
//! response. Unrecognized vendor fields pass through in `extra`.

use chrono::DateTime;
use serde_json::{Map, Value};
use triage_common::{CaseEvent, FieldViolation};

/// Required string fields, present and non-empty after validation.
const REQUIRED_FIELDS: &[&str] = &["case_number", "sys_id", "short_description"];

/// Optional string fields lifted into typed slots.
const OPTIONAL_FIELDS: &[&str] = &[
    "description",
    "priority",
    "urgency",
    "category",
    "assignment_group",
    "company",
    "state",
    "routing_context",
];

/// Fields that must parse as ISO-8601 timestamps when present.
const TIMESTAMP_FIELDS: &[&str] = &["opened_at", "updated_at", "resolved_at"];

pub fn validate(payload: &Value) -> Result<CaseEvent, Vec<FieldViolation>> {
    let Some(obj) = payload.as_object() else {
        return Err(vec![FieldViolation::new(
            "payload",
            "must be a JSON object",
        )]);
    };

    let mut violations = Vec::new();

    // Pass 1: required presence, fast rejection before format checks.
    for field in REQUIRED_FIELDS {
        match obj.get(*field) {
            None => violations.push(FieldViolation::new(field, "required field is missing")),
            Some(Value::String(s)) if s.trim().is_empty() => {
                violations.push(FieldViolation::new(field, "must be non-empty"))
            }
            Some(Value::String(_)) => {}
            Some(_) => violations.push(FieldViolation::new(field, "must be a string")),
        }
    }

    // Pass 2: type/format checks on optional fields.
    for field in OPTIONAL_FIELDS {
        if let Some(v) = obj.get(*field) {
            if !v.is_string() && !v.is_null() {
                violations.push(FieldViolation::new(field, "must be a string"));
            }
        }
    }
    for field in TIMESTAMP_FIELDS {
        if let Some(Value::String(s)) = obj.get(*field) {
            if !s.is_empty() && !is_iso8601(s) {
                violations.push(FieldViolation::new(field, "must be an ISO-8601 timestamp"));
            }
        }
    }

    if !violations.is_empty() {
        return Err(violations);
    }

    let get_str = |field: &str| -> Option<String> {
        obj.get(field)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
    };

    let known: Vec<&str> = REQUIRED_FIELDS
        .iter()
        .chain(OPTIONAL_FIELDS.iter())
        .copied()
        .collect();
    let mut extra = Map::new();
    for (k, v) in obj {
        if !known.contains(&k.as_str()) {
            extra.insert(k.clone(), v.clone());
        }
    }

    Ok(CaseEvent {
        // Unwraps are safe: pass 1 verified presence and non-emptiness.
        case_number: get_str("case_number").unwrap_or_default(),
        sys_id: get_str("sys_id").unwrap_or_default(),
        short_description: get_str("short_description").unwrap_or_default(),
        description: get_str("description"),
        priority: get_str("priority"),
        urgency: get_str("urgency"),
        category: get_str("category"),
        assignment_group: get_str("assignment_group"),
        company: get_str("company"),
        state: get_str("state"),
        routing_context: get_str("routing_context"),
        extra,
    })
}

/// RFC 3339 or the ticketing platform's "YYYY-MM-DD HH:MM:SS" variant.
fn is_iso8601(s: &str) -> bool {
    DateTime::parse_from_rfc3339(s).is_ok()
        || chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").is_ok()
        || chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_minimal_event() {
        let payload = json!({
            "case_number": "CASE001003",
            "sys_id": "abc123",
            "short_description": "Login issues"
        });
        let event = validate(&payload).unwrap();
        assert_eq!(event.case_number, "CASE001003");
        assert_eq!(event.sys_id, "abc123");
        assert!(event.extra.is_empty());
    }

    #[test]
    fn test_all_violations_reported_at_once() {
        let payload = json!({"short_description": ""});
        let violations = validate(&payload).unwrap_err();
        let fields: Vec<&str> = violations.iter().map(|v| v.field.as_str()).collect();
        assert!(fields.contains(&"case_number"));
        assert!(fields.contains(&"sys_id"));
        assert!(fields.contains(&"short_description"));
        assert_eq!(violations.len(), 3);
    }

    #[test]
    fn test_wrong_type_rejected() {
        let payload = json!({
            "case_number": 42,
            "sys_id": "abc",
            "short_description": "x",
            "priority": {"nested": true}
        });
        let violations = validate(&payload).unwrap_err();
        let fields: Vec<&str> = violations.iter().map(|v| v.field.as_str()).collect();
        assert!(fields.contains(&"case_number"));
        assert!(fields.contains(&"priority"));
    }

    #[test]
    fn test_bad_timestamp_rejected() {
        let payload = json!({
            "case_number": "C1",
            "sys_id": "abc",
            "short_description": "x",
            "opened_at": "yesterday-ish"
        });
        let violations = validate(&payload).unwrap_err();
        assert_eq!(violations[0].field, "opened_at");
    }

    #[test]
    fn test_platform_timestamp_accepted() {
        let payload = json!({
            "case_number": "C1",
            "sys_id": "abc",
            "short_description": "x",
            "opened_at": "2026-08-20 10:30:00"
        });
        assert!(validate(&payload).is_ok());
    }

    #[test]
    fn test_vendor_fields_pass_through() {
        let payload = json!({
            "case_number": "C1",
            "sys_id": "abc",
            "short_description": "x",
            "u_custom_field": "kept",
            "contact_type": "email"
        });
        let event = validate(&payload).unwrap();
        assert_eq!(event.extra["u_custom_field"], "kept");
        assert_eq!(event.extra["contact_type"], "email");
    }

    #[test]
    fn test_non_object_rejected() {
        let violations = validate(&json!(["not", "an", "object"])).unwrap_err();
        assert_eq!(violations[0].field, "payload");
    }
}
