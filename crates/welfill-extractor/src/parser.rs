//! Parse LLM output into field values

use crate::error::ExtractorError;
use serde_json::Value;
use tracing::{debug, warn};
use welfill_domain::FieldValues;

/// Parse an LLM JSON response into field values
///
/// Keys outside `vocabulary` are dropped. Strings are kept as-is, numbers and
/// booleans are rendered, arrays of scalars are joined with newlines; nulls
/// and nested objects are dropped.
pub fn parse_llm_response(
    response: &str,
    vocabulary: &[&str],
) -> Result<FieldValues, ExtractorError> {
    let json_str = extract_json(response)?;

    let json: Value = serde_json::from_str(json_str)
        .map_err(|e| ExtractorError::InvalidFormat(format!("JSON parse error: {}", e)))?;

    let object = json
        .as_object()
        .ok_or_else(|| ExtractorError::InvalidFormat("Expected JSON object".to_string()))?;

    let mut values = FieldValues::new();
    for (key, value) in object {
        if !vocabulary.contains(&key.as_str()) {
            debug!("Dropping field outside template vocabulary: {}", key);
            continue;
        }
        match scalar_text(value) {
            Some(text) => {
                values.insert(key.clone(), text);
            }
            None => {
                if !value.is_null() {
                    warn!("Dropping non-scalar value for field '{}'", key);
                }
            }
        }
    }

    Ok(values)
}

/// Extract JSON from response, handling markdown code blocks and stray prose
fn extract_json(response: &str) -> Result<&str, ExtractorError> {
    let trimmed = response.trim();

    if trimmed.starts_with("```") {
        let body = trimmed
            .split_once('\n')
            .map(|(_, rest)| rest)
            .ok_or_else(|| ExtractorError::InvalidFormat("Empty code block".to_string()))?;
        let body = body.trim_end();
        let body = body.strip_suffix("```").unwrap_or(body);
        return Ok(body.trim());
    }

    if trimmed.starts_with('{') {
        return Ok(trimmed);
    }

    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => Ok(&trimmed[start..=end]),
        _ => Err(ExtractorError::InvalidFormat(
            "No JSON object in response".to_string(),
        )),
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => {
            let parts: Option<Vec<String>> = items
                .iter()
                .filter(|v| !v.is_null())
                .map(|v| match v {
                    Value::Array(_) | Value::Object(_) => None,
                    other => scalar_text(other),
                })
                .collect();
            parts.map(|p| p.join("\n"))
        }
        Value::Null | Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VOCAB: &[&str] = &["氏名", "作成者", "回数", "支援内容"];

    #[test]
    fn test_parse_valid_json() {
        let response = r#"{"氏名": "山田 太郎", "作成者": "佐藤"}"#;
        let values = parse_llm_response(response, VOCAB).unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values.get("氏名"), Some("山田 太郎"));
    }

    #[test]
    fn test_parse_json_with_markdown_wrapper() {
        let response = "```json\n{\"氏名\": \"鈴木\"}\n```";
        let values = parse_llm_response(response, VOCAB).unwrap();
        assert_eq!(values.get("氏名"), Some("鈴木"));
    }

    #[test]
    fn test_parse_json_with_leading_prose() {
        let response = "Here is the result:\n{\"回数\": 3}\nThanks";
        let values = parse_llm_response(response, VOCAB).unwrap();
        assert_eq!(values.get("回数"), Some("3"));
    }

    #[test]
    fn test_drops_unknown_null_and_blank_fields() {
        let response = r#"{"氏名": null, "作成者": "  ", "unknown": "x", "回数": 2}"#;
        let values = parse_llm_response(response, VOCAB).unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values.get("回数"), Some("2"));
    }

    #[test]
    fn test_array_values_joined() {
        let response = r#"{"支援内容": ["服薬確認", "散歩同行"], "氏名": {"姓": "山田"}}"#;
        let values = parse_llm_response(response, VOCAB).unwrap();
        assert_eq!(values.get("支援内容"), Some("服薬確認\n散歩同行"));
        assert!(!values.contains("氏名"));
    }

    #[test]
    fn test_rejects_non_object() {
        let result = parse_llm_response(r#"["氏名"]"#, VOCAB);
        assert!(matches!(result, Err(ExtractorError::InvalidFormat(_))));
    }

    #[test]
    fn test_rejects_malformed() {
        let result = parse_llm_response("{not json}", VOCAB);
        assert!(matches!(result, Err(ExtractorError::InvalidFormat(_))));

        let result = parse_llm_response("no braces at all", VOCAB);
        assert!(matches!(result, Err(ExtractorError::InvalidFormat(_))));
    }
}
