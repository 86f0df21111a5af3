//! Shared JSON-output hardening for every auxiliary LLM helper.

use serde_json::Value;

const DANGEROUS_KEYS: [&str; 3] = ["__proto__", "constructor", "prototype"];

/// Recursively strip keys that could enable prototype pollution in a
/// downstream JS-based consumer, before typed decode.
pub fn strip_dangerous_keys(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for key in DANGEROUS_KEYS {
                map.remove(key);
            }
            for v in map.values_mut() {
                strip_dangerous_keys(v);
            }
        }
        Value::Array(items) => {
            for v in items.iter_mut() {
                strip_dangerous_keys(v);
            }
        }
        _ => {}
    }
}

/// Strip a ```json / ``` markdown code fence some models wrap JSON in.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    for fence in ["```json", "```"] {
        if let Some(rest) = trimmed.strip_prefix(fence) {
            return rest.trim_end_matches("```").trim();
        }
    }
    trimmed
}

/// Strictly parse `text` as JSON, strip dangerous keys, then decode into
/// `T`. Returns `None` on any parse or schema mismatch so callers fall
/// back to heuristics rather than propagating an error.
pub fn parse_strict_json<T: serde::de::DeserializeOwned>(text: &str) -> Option<T> {
    let cleaned = strip_code_fence(text);
    let mut value: Value = serde_json::from_str(cleaned).ok()?;
    strip_dangerous_keys(&mut value);
    serde_json::from_value(value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Sample {
        a: u32,
    }

    #[test]
    fn strips_dangerous_keys_at_every_depth() {
        let mut value = serde_json::json!({
            "__proto__": {"polluted": true},
            "nested": {"constructor": "x", "ok": 1},
            "list": [{"prototype": 1, "ok": 2}]
        });
        strip_dangerous_keys(&mut value);
        assert!(value.get("__proto__").is_none());
        assert!(value["nested"].get("constructor").is_none());
        assert_eq!(value["nested"]["ok"], 1);
        assert!(value["list"][0].get("prototype").is_none());
    }

    #[test]
    fn parses_through_markdown_fence() {
        let text = "```json\n{\"a\": 1}\n```";
        let parsed: Sample = parse_strict_json(text).unwrap();
        assert_eq!(parsed, Sample { a: 1 });
    }

    #[test]
    fn rejects_malformed_json() {
        let parsed: Option<Sample> = parse_strict_json("not json");
        assert!(parsed.is_none());
    }

    #[test]
    fn rejects_schema_mismatch() {
        let parsed: Option<Sample> = parse_strict_json("{\"a\": \"not a number\"}");
        assert!(parsed.is_none());
    }
}
