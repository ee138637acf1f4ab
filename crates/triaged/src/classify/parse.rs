//! Tolerant parsing of model classification output.
//!
//! Direct serde parse first; if that fails, extract the JSON span from any
//! surrounding prose and walk it as a Value with defaulting: missing
//! optional sub-objects become empty collections. Outright unparseable
//! text is an error so the stage fails instead of guessing.

use serde_json::Value;
use triage_common::{ClassificationResult, TechnicalEntities, UrgencyLevel, UsageMetrics};

/// Parse stage output into a classification. Usage is filled in by the
/// orchestrator after summing across stages.
pub fn parse_classification(text: &str) -> Result<ClassificationResult, String> {
    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(_) => {
            let extracted = extract_json(text);
            serde_json::from_str(&extracted).map_err(|e| e.to_string())?
        }
    };

    let obj = value.as_object().ok_or("classification is not an object")?;

    let get_str = |k: &str| -> Option<String> {
        obj.get(k)
            .and_then(|v| if v.is_null() { None } else { v.as_str() })
            .map(|s| s.to_string())
    };

    let confidence = obj
        .get("confidence")
        .and_then(|v| v.as_f64())
        .unwrap_or(0.0)
        .clamp(0.0, 1.0);

    let keywords = obj
        .get("keywords")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|x| x.as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default();

    let entities = obj
        .get("entities")
        .map(parse_entities)
        .unwrap_or_default();

    let urgency_level = get_str("urgency_level")
        .map(|s| UrgencyLevel::parse(&s))
        .unwrap_or(UrgencyLevel::Medium);

    let record_type_suggestion =
        get_str("record_type_suggestion").filter(|s| !s.is_empty() && s != "null");

    Ok(ClassificationResult {
        category: get_str("category").unwrap_or_else(|| "uncategorized".to_string()),
        subcategory: get_str("subcategory").unwrap_or_default(),
        confidence,
        reasoning: get_str("reasoning").unwrap_or_default(),
        keywords,
        entities,
        urgency_level,
        record_type_suggestion,
        usage: UsageMetrics::default(),
    })
}

/// Missing arrays default to empty rather than failing the stage.
fn parse_entities(v: &Value) -> TechnicalEntities {
    let strings = |k: &str| -> Vec<String> {
        v.get(k)
            .and_then(|x| x.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|x| x.as_str().map(|s| s.to_string()))
                    .collect()
            })
            .unwrap_or_default()
    };
    TechnicalEntities {
        systems: strings("systems"),
        components: strings("components"),
        error_codes: strings("error_codes"),
    }
}

/// Extract the JSON span from text that may have prose around it.
fn extract_json(text: &str) -> String {
    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            return text[start..=end].to_string();
        }
    }
    text.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_classification_parses() {
        let text = r#"{
            "category": "access",
            "subcategory": "authentication",
            "confidence": 0.92,
            "reasoning": "Login failure reported.",
            "keywords": ["login", "sso"],
            "entities": {"systems": ["okta"], "components": [], "error_codes": ["AUTH-401"]},
            "urgency_level": "high",
            "record_type_suggestion": "incident"
        }"#;
        let result = parse_classification(text).unwrap();
        assert_eq!(result.category, "access");
        assert_eq!(result.confidence, 0.92);
        assert_eq!(result.urgency_level, UrgencyLevel::High);
        assert_eq!(result.entities.systems, vec!["okta"]);
        assert_eq!(result.record_type_suggestion.as_deref(), Some("incident"));
    }

    #[test]
    fn test_missing_optional_sections_default_empty() {
        let text = r#"{"category": "network", "confidence": 0.7}"#;
        let result = parse_classification(text).unwrap();
        assert_eq!(result.category, "network");
        assert!(result.keywords.is_empty());
        assert!(result.entities.is_empty());
        assert_eq!(result.urgency_level, UrgencyLevel::Medium);
        assert!(result.record_type_suggestion.is_none());
    }

    #[test]
    fn test_confidence_clamped() {
        let result = parse_classification(r#"{"category": "x", "confidence": 1.7}"#).unwrap();
        assert_eq!(result.confidence, 1.0);
        let result = parse_classification(r#"{"category": "x", "confidence": -0.2}"#).unwrap();
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_json_extracted_from_prose() {
        let text = "Sure, here is the classification:\n{\"category\": \"email\"}\nHope that helps!";
        let result = parse_classification(text).unwrap();
        assert_eq!(result.category, "email");
    }

    #[test]
    fn test_unparseable_text_is_an_error() {
        assert!(parse_classification("I cannot classify this").is_err());
        assert!(parse_classification("{broken").is_err());
    }

    #[test]
    fn test_null_record_type_dropped() {
        let result =
            parse_classification(r#"{"category": "x", "record_type_suggestion": null}"#).unwrap();
        assert!(result.record_type_suggestion.is_none());
    }
}
