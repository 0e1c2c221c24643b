//! Response parsing - plain text path and JSON-contract path.
//!
//! The JSON path is deliberately strict: a single object with a non-empty
//! all-string array under the expected key, truncated to the requested
//! count. Anything else is `UnexpectedFormat`, which the orchestrator
//! treats as the signal to fall back to per-item generation.

use crate::error::GenerationError;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// Extract the first candidate's first content part, trimmed.
///
/// Returns an empty string when the path is missing - callers decide
/// whether that is an error.
pub fn parse_text(response: &Value) -> String {
    response
        .get("candidates")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.get(0))
        .and_then(|p| p.get("text"))
        .and_then(|t| t.as_str())
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

/// Unwrap a ```json fenced block if the model ignored the "no fences" rule.
pub fn strip_code_fences(text: &str) -> String {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    let re = FENCE.get_or_init(|| {
        Regex::new(r"```(?:json)?\s*([\s\S]*?)\s*```").expect("static fence pattern")
    });
    match re.captures(text) {
        Some(caps) => caps[1].to_string(),
        None => text.trim().to_string(),
    }
}

/// Parse the JSON-contract response: an object with a non-empty array of
/// strings under `expected_key`, truncated to `requested_count`.
pub fn parse_json_array(
    response: &Value,
    expected_key: &str,
    requested_count: usize,
) -> Result<Vec<String>, GenerationError> {
    let text = parse_text(response);
    if text.is_empty() {
        return Err(GenerationError::UnexpectedFormat(
            "empty candidate content".to_string(),
        ));
    }

    let json_str = strip_code_fences(&text);
    let parsed: Value = serde_json::from_str(&json_str).map_err(|e| {
        GenerationError::UnexpectedFormat(format!("invalid JSON in model output: {}", e))
    })?;

    let array = parsed
        .get(expected_key)
        .and_then(|v| v.as_array())
        .ok_or_else(|| {
            GenerationError::UnexpectedFormat(format!(
                "missing or non-array \"{}\" key",
                expected_key
            ))
        })?;
    if array.is_empty() {
        return Err(GenerationError::UnexpectedFormat(format!(
            "empty \"{}\" array",
            expected_key
        )));
    }

    let mut suggestions = Vec::with_capacity(array.len().min(requested_count));
    for item in array {
        match item.as_str() {
            Some(s) => suggestions.push(s.to_string()),
            None => {
                return Err(GenerationError::UnexpectedFormat(format!(
                    "non-string element in \"{}\" array",
                    expected_key
                )))
            }
        }
    }
    suggestions.truncate(requested_count);

    log::info!("[PARSE] Extracted {} suggestions", suggestions.len());
    Ok(suggestions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn wrap(text: &str) -> Value {
        json!({
            "candidates": [
                { "content": { "parts": [ { "text": text } ] } }
            ]
        })
    }

    #[test]
    fn parse_text_walks_candidate_path() {
        assert_eq!(parse_text(&wrap("  hello  ")), "hello");
    }

    #[test]
    fn parse_text_missing_path_is_empty() {
        assert_eq!(parse_text(&json!({"candidates": []})), "");
        assert_eq!(parse_text(&json!({})), "");
    }

    #[test]
    fn json_array_round_trip_and_truncation() {
        let response = wrap(r#"{"sugestoes": ["a", "b", "c"]}"#);
        assert_eq!(
            parse_json_array(&response, "sugestoes", 3).unwrap(),
            vec!["a", "b", "c"]
        );
        // Truncation law: requested 2, got 3.
        assert_eq!(
            parse_json_array(&response, "sugestoes", 2).unwrap(),
            vec!["a", "b"]
        );
    }

    #[test]
    fn json_array_is_idempotent() {
        let response = wrap(r#"{"sugestoes": ["x", "y"]}"#);
        let first = parse_json_array(&response, "sugestoes", 2).unwrap();
        let second = parse_json_array(&response, "sugestoes", 2).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn fenced_json_is_unwrapped() {
        let response = wrap("```json\n{\"sugestoes\": [\"a\"]}\n```");
        assert_eq!(
            parse_json_array(&response, "sugestoes", 1).unwrap(),
            vec!["a"]
        );
    }

    #[test]
    fn strip_fences_leaves_plain_text_alone() {
        assert_eq!(strip_code_fences("  {\"k\": 1}  "), "{\"k\": 1}");
        assert_eq!(strip_code_fences("```\n[1]\n```"), "[1]");
    }

    #[test]
    fn malformed_shapes_are_format_errors() {
        let cases = [
            wrap("this is not json at all"),
            wrap(r#"{"wrong_key": ["a"]}"#),
            wrap(r#"{"sugestoes": []}"#),
            wrap(r#"{"sugestoes": [1, 2]}"#),
            wrap(r#"{"sugestoes": "not an array"}"#),
        ];
        for response in &cases {
            let err = parse_json_array(response, "sugestoes", 3).unwrap_err();
            assert!(
                matches!(err, GenerationError::UnexpectedFormat(_)),
                "got {:?}",
                err
            );
        }
    }

    #[test]
    fn missing_candidate_path_is_format_error() {
        let err = parse_json_array(&json!({}), "sugestoes", 3).unwrap_err();
        assert!(matches!(err, GenerationError::UnexpectedFormat(_)));
    }
}
