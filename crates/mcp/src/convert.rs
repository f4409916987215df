use rmcp::model::{CallToolResult, Tool};
use serde_json::Value;
use slackforce_core::ToolDescriptor;

use crate::McpClientError;

pub fn tool_descriptor(tool: &Tool) -> ToolDescriptor {
    ToolDescriptor::new(
        tool.name.to_string(),
        tool.description.as_deref().map(str::to_owned),
        Value::Object(tool.input_schema.as_ref().clone()),
    )
}

/// Reduces a call result to the JSON value handed back to the model.
///
/// Structured content wins. Otherwise every text block is parsed as JSON when possible
/// and kept as a string when not; a single block is unwrapped. Results flagged as
/// errors become [`McpClientError::ToolError`].
pub fn call_output(name: &str, result: &CallToolResult) -> Result<Value, McpClientError> {
    let wire = serde_json::to_value(result)
        .map_err(|error| McpClientError::Request(format!("unreadable tool result: {error}")))?;
    output_from_wire(name, &wire)
}

fn output_from_wire(name: &str, wire: &Value) -> Result<Value, McpClientError> {
    let texts: Vec<&str> = wire
        .get("content")
        .and_then(Value::as_array)
        .map(|blocks| blocks.iter().filter_map(|block| block.get("text")?.as_str()).collect())
        .unwrap_or_default();

    if wire.get("isError").and_then(Value::as_bool).unwrap_or(false) {
        let message = if texts.is_empty() { "tool reported an error".to_string() } else { texts.join("\n") };
        return Err(McpClientError::ToolError { name: name.to_string(), message });
    }

    if let Some(structured) = wire.get("structuredContent").filter(|value| !value.is_null()) {
        return Ok(structured.clone());
    }

    let mut values: Vec<Value> = texts
        .into_iter()
        .map(|text| serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string())))
        .collect();

    Ok(match values.len() {
        0 => Value::Null,
        1 => values.remove(0),
        _ => Value::Array(values),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::output_from_wire;
    use crate::McpClientError;

    #[test]
    fn json_text_block_is_parsed() {
        let wire = json!({"content": [{"type": "text", "text": "[{\"Name\": \"Acme\"}]"}]});
        assert_eq!(output_from_wire("get_accounts", &wire).expect("output"), json!([{"Name": "Acme"}]));
    }

    #[test]
    fn plain_text_block_stays_a_string() {
        let wire = json!({"content": [{"type": "text", "text": "No accounts found."}]});
        assert_eq!(output_from_wire("get_accounts", &wire).expect("output"), json!("No accounts found."));
    }

    #[test]
    fn structured_content_wins_over_text() {
        let wire = json!({
            "content": [{"type": "text", "text": "ignored"}],
            "structuredContent": {"totalSize": 0}
        });
        assert_eq!(output_from_wire("run_soql", &wire).expect("output"), json!({"totalSize": 0}));
    }

    #[test]
    fn multiple_blocks_become_an_array() {
        let wire = json!({"content": [{"type": "text", "text": "1"}, {"type": "text", "text": "two"}]});
        assert_eq!(output_from_wire("x", &wire).expect("output"), json!([1, "two"]));
    }

    #[test]
    fn error_flag_becomes_tool_error() {
        let wire = json!({"content": [{"type": "text", "text": "INVALID_SESSION_ID"}], "isError": true});
        let error = output_from_wire("get_accounts", &wire).expect_err("tool error");
        assert!(matches!(
            error,
            McpClientError::ToolError { ref name, ref message }
                if name == "get_accounts" && message == "INVALID_SESSION_ID"
        ));
    }
}
