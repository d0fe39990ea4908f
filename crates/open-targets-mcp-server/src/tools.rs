//! The MCP tools exposed by this server.

use rmcp::model::{CallToolResult, Content, ErrorCode, JsonObject};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::McpError;

pub mod batch_query;
pub mod query;
pub mod search_entity;

/// Deserialize tool-call arguments into a typed input.
pub(crate) fn parse_input<T: DeserializeOwned>(
    arguments: Option<&JsonObject>,
) -> Result<T, McpError> {
    let value = arguments
        .cloned()
        .map(Value::Object)
        .unwrap_or_else(|| Value::Object(Default::default()));
    serde_json::from_value(value).map_err(|e| {
        McpError::new(
            ErrorCode::INVALID_PARAMS,
            format!("Invalid input: {e}"),
            None,
        )
    })
}

/// Render a successful tool result carrying a JSON value, both as text
/// content and as structured content.
pub(crate) fn json_result(value: Value) -> CallToolResult {
    let mut result = CallToolResult::success(vec![
        Content::json(&value).unwrap_or_else(|_| Content::text(value.to_string())),
    ]);
    result.structured_content = Some(value);
    result
}

/// Reject a `jq_filter` argument when the projection feature is off.
pub(crate) fn check_filter_allowed(
    filters_enabled: bool,
    jq_filter: Option<&String>,
) -> Result<(), McpError> {
    if !filters_enabled && jq_filter.is_some() {
        return Err(McpError::new(
            ErrorCode::INVALID_PARAMS,
            "response filtering is disabled on this server; omit jq_filter",
            None,
        ));
    }
    Ok(())
}
