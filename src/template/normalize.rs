//! Structured-data normalization
//!
//! Rendered text is parsed as YAML and, where it has to be embedded into
//! another template, re-emitted as compact JSON. JSON is valid YAML flow
//! style, so a single JSON line can sit at any indentation without changing
//! the meaning of the surrounding document.

use serde::Deserialize;
use serde_yaml::Value;

/// Parse a YAML stream into its non-empty documents.
///
/// Every document must also be representable as compact JSON; a document
/// that is not (for example one with non-string keys) is rejected here so
/// later consumers can always rely on [`to_compact_json`].
pub fn parse_stream(text: &str) -> Result<Vec<Value>, String> {
    let mut documents = Vec::new();
    for (idx, doc) in serde_yaml::Deserializer::from_str(text).enumerate() {
        let value = Value::deserialize(doc).map_err(|e| describe(idx, e.to_string()))?;
        if value.is_null() {
            continue;
        }
        to_compact_json(&value).map_err(|e| describe(idx, e))?;
        documents.push(value);
    }
    Ok(documents)
}

/// Parse text that must hold at most one document (`Null` when empty)
pub fn parse_single(text: &str) -> Result<Value, String> {
    let mut documents = parse_stream(text)?;
    match documents.len() {
        0 => Ok(Value::Null),
        1 => Ok(documents.remove(0)),
        n => Err(format!("expected a single document, found {}", n)),
    }
}

/// Re-emit a value as one line of JSON
pub fn to_compact_json(value: &Value) -> Result<String, String> {
    serde_json::to_string(value).map_err(|e| e.to_string())
}

/// Parse rendered YAML and re-emit it compactly
pub fn normalize(text: &str) -> Result<String, String> {
    to_compact_json(&parse_single(text)?)
}

fn describe(idx: usize, details: String) -> String {
    if idx == 0 {
        details
    } else {
        format!("document {}: {}", idx + 1, details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_flattens_block_yaml() {
        let json = normalize("httpGet:\n  path: /healthz\n  port: 8080\n").unwrap();
        assert_eq!(json, r#"{"httpGet":{"path":"/healthz","port":8080}}"#);
    }

    #[test]
    fn compact_json_survives_reindentation() {
        let inner = normalize("- a\n- b: [1, 2]\n").unwrap();
        let outer = format!("spec:\n  containers:\n    items: {}\n", inner);
        let value: Value = serde_yaml::from_str(&outer).unwrap();
        assert_eq!(value["spec"]["containers"]["items"][1]["b"][1].as_i64(), Some(2));
    }

    #[test]
    fn stream_skips_empty_documents() {
        let docs = parse_stream("---\na: 1\n---\n---\nb: 2\n").unwrap();
        assert_eq!(docs.len(), 2);
    }

    #[test]
    fn stream_reports_bad_document_index() {
        let err = parse_stream("a: 1\n---\nb: [1\n").unwrap_err();
        assert!(err.starts_with("document 2:"), "{}", err);
    }

    #[test]
    fn non_string_keys_are_rejected() {
        assert!(parse_stream("? [1, 2]\n: x\n").is_err());
    }

    #[test]
    fn single_rejects_streams() {
        assert!(parse_single("a: 1\n---\nb: 2\n").is_err());
        assert_eq!(parse_single("").unwrap(), Value::Null);
    }
}
