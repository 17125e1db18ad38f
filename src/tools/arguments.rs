//! Tool argument parsing.

use serde_json::Value;

/// Parse the raw argument text a model produced for a tool call.
///
/// Models occasionally emit plain text instead of JSON; in that case the
/// text is wrapped as `{"query": <raw>}` so tools still receive an object.
pub fn parse_tool_arguments(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Value::Object(serde_json::Map::new());
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(value @ Value::Object(_)) => value,
        Ok(other) => {
            // Valid JSON but not an object (a bare string or number).
            serde_json::json!({ "query": other })
        }
        Err(_) => serde_json::json!({ "query": trimmed }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_json_objects() {
        let args = parse_tool_arguments(r#"{"query":"meeting notes","limit":5}"#);
        assert_eq!(args["query"], "meeting notes");
        assert_eq!(args["limit"], 5);
    }

    #[test]
    fn falls_back_to_query_wrapper() {
        let args = parse_tool_arguments("just find my meeting notes");
        assert_eq!(args["query"], "just find my meeting notes");
    }

    #[test]
    fn wraps_non_object_json() {
        let args = parse_tool_arguments("\"meeting notes\"");
        assert_eq!(args["query"], "meeting notes");
    }

    #[test]
    fn empty_arguments_become_empty_object() {
        let args = parse_tool_arguments("  ");
        assert_eq!(args, serde_json::json!({}));
    }
}
