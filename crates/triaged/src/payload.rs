//! Payload repair for malformed inbound webhook bodies.
//!
//! Ticketing platforms deliver bodies with byte-order marks, smart quotes,
//! bare backslashes, form-encoded wrappers, and occasionally base64-wrapped
//! JSON. Repair applies ordered strategies until one candidate both looks
//! like JSON and parses to a non-empty object or array. Each strategy is a
//! pure function so it stays independently testable.

use serde_json::Value;
use tracing::debug;

/// Repair failure. `Empty` short-circuits before any strategy runs.
#[derive(Debug, thiserror::Error)]
pub enum RepairError {
    #[error("empty payload")]
    Empty,

    /// At least one candidate looked like JSON but none parsed.
    #[error("unparseable payload: {0}")]
    Unparseable(String),

    /// No candidate even looked like JSON.
    #[error("unable to parse payload")]
    NotJson,
}

/// Diagnostic metadata for observability. Never affects the returned value.
#[derive(Debug, Clone)]
pub struct RepairDiagnostics {
    /// Name of the strategy whose candidate parsed.
    pub strategy: &'static str,
    pub warnings: Vec<String>,
}

/// Successful repair: the recovered value plus how we got it.
#[derive(Debug)]
pub struct RepairOutcome {
    pub value: Value,
    pub diagnostics: RepairDiagnostics,
}

type Strategy = fn(&str) -> Option<String>;

/// Ordered repair strategies. First candidate that looks like JSON, parses,
/// and is a non-empty object/array wins.
const STRATEGIES: &[(&str, Strategy)] = &[
    ("trim", strategy_trim),
    ("sanitize", strategy_sanitize),
    ("form_extract", strategy_form_extract),
    ("base64", strategy_base64),
];

/// Repair and parse a raw webhook body.
pub fn normalize(raw: &[u8]) -> Result<RepairOutcome, RepairError> {
    let text = String::from_utf8_lossy(raw);
    if text.trim().is_empty() {
        return Err(RepairError::Empty);
    }

    let mut warnings = Vec::new();
    let mut last_parse_error: Option<String> = None;

    for (name, strategy) in STRATEGIES {
        let Some(candidate) = strategy(&text) else {
            continue;
        };
        if !looks_like_json(&candidate) {
            continue;
        }
        match serde_json::from_str::<Value>(&candidate) {
            Ok(value) if is_nonempty_container(&value) => {
                if *name != "trim" {
                    warnings.push(format!("payload repaired via {} strategy", name));
                }
                debug!("payload normalized via {} strategy", name);
                return Ok(RepairOutcome {
                    value,
                    diagnostics: RepairDiagnostics {
                        strategy: name,
                        warnings,
                    },
                });
            }
            Ok(_) => {
                last_parse_error = Some("payload parsed to an empty document".to_string());
            }
            Err(e) => {
                last_parse_error = Some(e.to_string());
            }
        }
    }

    match last_parse_error {
        Some(e) => Err(RepairError::Unparseable(e)),
        None => Err(RepairError::NotJson),
    }
}

/// Object or array with at least one entry.
fn is_nonempty_container(value: &Value) -> bool {
    match value {
        Value::Object(m) => !m.is_empty(),
        Value::Array(a) => !a.is_empty(),
        _ => false,
    }
}

/// Cheap structural check: starts like a JSON document and braces/brackets
/// balance out. Brace counting ignores characters inside string literals.
fn looks_like_json(text: &str) -> bool {
    let trimmed = text.trim();
    if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return false;
    }

    let mut braces = 0i64;
    let mut brackets = 0i64;
    let mut in_string = false;
    let mut escaped = false;
    for c in trimmed.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => braces += 1,
            '}' => braces -= 1,
            '[' => brackets += 1,
            ']' => brackets -= 1,
            _ => {}
        }
        if braces < 0 || brackets < 0 {
            return false;
        }
    }
    braces == 0 && brackets == 0
}

/// Strategy (a): trim whitespace and strip a leading byte-order mark.
fn strategy_trim(text: &str) -> Option<String> {
    Some(text.trim().trim_start_matches('\u{feff}').to_string())
}

/// Strategy (b): trim, then sanitize common corruption.
fn strategy_sanitize(text: &str) -> Option<String> {
    let trimmed = strategy_trim(text)?;
    Some(sanitize(&trimmed))
}

/// Escape bare backslashes, repair control characters, strip
/// line/paragraph separators, and normalize smart quotes to their ASCII
/// equivalents. Tracks string-literal state: a raw newline/return/tab
/// inside a string is illegal JSON and becomes its escape sequence;
/// outside a string it is ordinary whitespace and stays.
fn sanitize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut in_string = false;
    while let Some(c) = chars.next() {
        // Normalize smart quotes first so a curly delimiter still toggles
        // string state.
        let c = match c {
            '\u{201c}' | '\u{201d}' | '\u{201e}' => '"',
            '\u{2018}' | '\u{2019}' => '\'',
            c => c,
        };
        match c {
            '"' => {
                in_string = !in_string;
                out.push('"');
            }
            '\\' => match chars.peek() {
                // A valid escape is consumed as a pair so an escaped quote
                // never toggles string state.
                Some(&e @ ('"' | '\\' | '/' | 'b' | 'f' | 'n' | 'r' | 't' | 'u')) => {
                    out.push('\\');
                    out.push(e);
                    chars.next();
                }
                // A bare backslash must itself be escaped.
                _ => out.push_str("\\\\"),
            },
            '\u{2028}' | '\u{2029}' => {}
            '\n' if in_string => out.push_str("\\n"),
            '\r' if in_string => out.push_str("\\r"),
            '\t' if in_string => out.push_str("\\t"),
            '\n' | '\r' | '\t' => out.push(c),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out
}

/// Strategy (c): extract JSON from a form-encoded wrapper. Looks for the
/// conventional wrapper keys, then falls back to a whole-body percent
/// decode when the text itself is percent-encoded JSON.
fn strategy_form_extract(text: &str) -> Option<String> {
    let trimmed = text.trim();

    for key in ["payload=", "body=", "data=", "json="] {
        if let Some(idx) = trimmed.find(key) {
            // Wrapper keys appear at the start or after a '&' separator.
            if idx != 0 && trimmed.as_bytes().get(idx - 1) != Some(&b'&') {
                continue;
            }
            let rest = &trimmed[idx + key.len()..];
            let value = rest.split('&').next().unwrap_or(rest);
            let decoded = percent_decode(value);
            return Some(sanitize(decoded.trim()));
        }
    }

    if trimmed.starts_with("%7B") || trimmed.starts_with("%7b") || trimmed.starts_with("%5B") {
        return Some(sanitize(percent_decode(trimmed).trim()));
    }

    None
}

/// Decode percent escapes and '+' as space. Invalid escapes pass through.
fn percent_decode(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' => {
                let hex = bytes.get(i + 1..i + 3);
                match hex.and_then(|h| std::str::from_utf8(h).ok()) {
                    Some(h) => match u8::from_str_radix(h, 16) {
                        Ok(b) => {
                            out.push(b);
                            i += 3;
                        }
                        Err(_) => {
                            out.push(b'%');
                            i += 1;
                        }
                    },
                    None => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Strategy (d)+(e): decode plausible base64, then sanitize the decoded
/// text. Only fires when the body actually resembles base64 so that plain
/// malformed JSON never round-trips through a decoder.
fn strategy_base64(text: &str) -> Option<String> {
    use base64::Engine as _;

    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if !plausibly_base64(&compact) {
        return None;
    }

    let decoded = base64::engine::general_purpose::STANDARD
        .decode(compact.as_bytes())
        .ok()?;
    let decoded_text = String::from_utf8(decoded).ok()?;
    Some(sanitize(decoded_text.trim()))
}

/// Length multiple of 4, restricted alphabet, no stray braces or quotes.
fn plausibly_base64(text: &str) -> bool {
    if text.len() < 8 || text.len() % 4 != 0 {
        return false;
    }
    text.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '='))
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;

    #[test]
    fn test_clean_json_wins_on_first_strategy() {
        let raw = br#"{"case_number":"CASE001","sys_id":"abc"}"#;
        let outcome = normalize(raw).unwrap();
        assert_eq!(outcome.diagnostics.strategy, "trim");
        assert!(outcome.diagnostics.warnings.is_empty());
        assert_eq!(outcome.value["case_number"], "CASE001");
    }

    #[test]
    fn test_empty_payload_short_circuits() {
        assert!(matches!(normalize(b""), Err(RepairError::Empty)));
        assert!(matches!(normalize(b"   \n "), Err(RepairError::Empty)));
    }

    #[test]
    fn test_bom_stripped() {
        let raw = "\u{feff}{\"a\":1}".as_bytes();
        let outcome = normalize(raw).unwrap();
        assert_eq!(outcome.diagnostics.strategy, "trim");
        assert_eq!(outcome.value["a"], 1);
    }

    #[test]
    fn test_smart_quotes_repaired() {
        let raw = "{\"short_description\":\u{201c}Login issues\u{201d}}".as_bytes();
        let outcome = normalize(raw).unwrap();
        assert_eq!(outcome.diagnostics.strategy, "sanitize");
        assert_eq!(outcome.value["short_description"], "Login issues");
    }

    #[test]
    fn test_bare_backslash_escaped() {
        let raw = br#"{"path":"C:\temp\new"}"#;
        let outcome = normalize(raw).unwrap();
        // \t and \n are valid escapes and stay; the repair must not lose
        // the document.
        assert!(outcome.value.get("path").is_some());
    }

    #[test]
    fn test_control_characters_stripped() {
        let raw = b"{\"a\":\"b\x01c\"}";
        let outcome = normalize(raw).unwrap();
        assert_eq!(outcome.value["a"], "bc");
    }

    #[test]
    fn test_raw_newline_inside_string_escaped() {
        // A literal newline inside a string value is illegal JSON; the
        // repair must recover the document without losing the line break.
        let raw = b"{\"a\":\"b\nc\"}";
        let outcome = normalize(raw).unwrap();
        assert_eq!(outcome.diagnostics.strategy, "sanitize");
        assert_eq!(outcome.value["a"], "b\nc");
    }

    #[test]
    fn test_multiline_description_recovered() {
        let raw = b"{\n  \"case_number\": \"CASE001\",\n  \"sys_id\": \"abc\",\n  \"short_description\": \"line one\nline two\tindented\"\n}";
        let outcome = normalize(raw).unwrap();
        assert_eq!(
            outcome.value["short_description"],
            "line one\nline two\tindented"
        );
        // Whitespace between tokens is legal and untouched.
        assert_eq!(outcome.value["case_number"], "CASE001");
    }

    #[test]
    fn test_escaped_quote_does_not_break_string_tracking() {
        let raw = b"{\"a\":\"say \\\"hi\\\"\nok\"}";
        let outcome = normalize(raw).unwrap();
        assert_eq!(outcome.value["a"], "say \"hi\"\nok");
    }

    #[test]
    fn test_form_encoded_extraction() {
        let raw = b"payload=%7B%22a%22%3A1%7D";
        let outcome = normalize(raw).unwrap();
        assert_eq!(outcome.diagnostics.strategy, "form_extract");
        assert_eq!(outcome.value["a"], 1);
    }

    #[test]
    fn test_form_encoded_secondary_key() {
        let raw = b"foo=bar&json=%7B%22ok%22%3Atrue%7D";
        let outcome = normalize(raw).unwrap();
        assert_eq!(outcome.value["ok"], true);
    }

    #[test]
    fn test_percent_encoded_whole_body() {
        let raw = b"%7B%22a%22%3A%22b%22%7D";
        let outcome = normalize(raw).unwrap();
        assert_eq!(outcome.value["a"], "b");
    }

    #[test]
    fn test_base64_wrapped_json() {
        let encoded =
            base64::engine::general_purpose::STANDARD.encode(br#"{"case_number":"CASE002"}"#);
        let outcome = normalize(encoded.as_bytes()).unwrap();
        assert_eq!(outcome.diagnostics.strategy, "base64");
        assert_eq!(outcome.value["case_number"], "CASE002");
    }

    #[test]
    fn test_base64_not_attempted_for_braced_text() {
        // Contains braces, so it is not plausibly base64 and the garbage
        // must fail as unparseable rather than being fed to a decoder.
        let raw = b"{ this is not valid json }";
        match normalize(raw) {
            Err(RepairError::Unparseable(_)) => {}
            other => panic!("expected Unparseable, got {:?}", other),
        }
    }

    #[test]
    fn test_non_json_text_rejected() {
        assert!(matches!(
            normalize(b"hello world"),
            Err(RepairError::NotJson)
        ));
    }

    #[test]
    fn test_empty_object_rejected() {
        match normalize(b"{}") {
            Err(RepairError::Unparseable(_)) => {}
            other => panic!("expected Unparseable, got {:?}", other),
        }
    }

    #[test]
    fn test_array_payload_accepted() {
        let outcome = normalize(b"[{\"a\":1}]").unwrap();
        assert!(outcome.value.is_array());
    }

    #[test]
    fn test_looks_like_json_ignores_braces_in_strings() {
        assert!(looks_like_json(r#"{"a":"}{"}"#));
        assert!(!looks_like_json(r#"{"a":1"#));
        assert!(!looks_like_json("plain text"));
    }

    #[test]
    fn test_plausibly_base64() {
        assert!(plausibly_base64("eyJhIjoxfQ=="));
        assert!(!plausibly_base64("{\"a\":1}"));
        assert!(!plausibly_base64("abc"));
    }
}
