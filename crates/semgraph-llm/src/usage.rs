use serde_json::Value;

use semgraph_core::types::Usage;

fn count(obj: &Value, key: &str) -> Option<u64> {
    obj.get(key).and_then(Value::as_u64)
}

/// Normalize provider usage into `{in, out}`.
///
/// Accepts either a response body carrying a `usage` object or the usage
/// object itself, in the `prompt_tokens`/`completion_tokens` shape or the
/// `input_tokens`/`output_tokens` shape. Missing counts are zero.
pub fn extract_usage(json: &Value) -> Usage {
    let usage = json.get("usage").unwrap_or(json);

    let input = count(usage, "prompt_tokens")
        .or_else(|| count(usage, "input_tokens"))
        .unwrap_or(0);
    let output = count(usage, "completion_tokens")
        .or_else(|| count(usage, "output_tokens"))
        .unwrap_or(0);

    Usage::new(input, output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_openai_shape() {
        let body = json!({"usage": {"prompt_tokens": 12, "completion_tokens": 30, "total_tokens": 42}});
        assert_eq!(extract_usage(&body), Usage::new(12, 30));
    }

    #[test]
    fn test_anthropic_shape() {
        let body = json!({"usage": {"input_tokens": 7, "output_tokens": 9}});
        assert_eq!(extract_usage(&body), Usage::new(7, 9));
    }

    #[test]
    fn test_bare_usage_object() {
        assert_eq!(
            extract_usage(&json!({"input_tokens": 1, "output_tokens": 2})),
            Usage::new(1, 2)
        );
    }

    #[test]
    fn test_missing_usage_is_zero() {
        assert_eq!(extract_usage(&json!({"choices": []})), Usage::default());
    }
}
