//! MCP tool to execute one GraphQL operation.

use rmcp::model::{CallToolResult, Content, ErrorCode, JsonObject, Tool};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::errors::McpError;
use crate::graphql::{GraphQLClient, Request};
use crate::projection::project;
use crate::schema_from_type;
use crate::tools::{check_filter_allowed, json_result, parse_input};

/// The name of the tool to execute an ad hoc GraphQL operation
pub const QUERY_TOOL_NAME: &str = "query";

#[derive(Clone)]
pub struct Query {
    pub tool: Tool,
    client: GraphQLClient,
    filters_enabled: bool,
}

/// Input for the query tool.
#[derive(JsonSchema, Deserialize)]
pub struct Input {
    /// The GraphQL query, starting with the `query` keyword
    query: String,

    /// The variable values represented as JSON
    #[schemars(schema_with = "String::json_schema", default)]
    variables: Option<Value>,

    /// Optional filter expression applied to the response envelope
    /// before it is returned (e.g. `.data.target | {id, approvedSymbol}`)
    #[serde(default)]
    jq_filter: Option<String>,
}

impl Query {
    pub fn new(client: GraphQLClient, filters_enabled: bool) -> Self {
        Self {
            client,
            filters_enabled,
            tool: Tool::new(
                QUERY_TOOL_NAME,
                "Execute a GraphQL query against the Open Targets Platform API. \
                 The response contains targets, diseases, drugs, variants, or studies. \
                 Use `search_entity` first to turn free-text names into canonical IDs, \
                 and `batch_query` to run one query over many variable sets.",
                schema_from_type!(Input),
            ),
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn execute(
        &self,
        arguments: Option<&JsonObject>,
    ) -> Result<CallToolResult, McpError> {
        let input: Input = parse_input(arguments)?;
        check_filter_allowed(self.filters_enabled, input.jq_filter.as_ref())?;
        let variables = parse_variables(input.variables)?;

        let envelope = match self
            .client
            .execute(Request::new(input.query, variables))
            .await
        {
            Ok(envelope) => envelope,
            Err(e) => return Ok(CallToolResult::error(vec![Content::text(e.to_string())])),
        };

        let rendered = match input.jq_filter {
            Some(filter) => apply_filter(envelope, &filter),
            None => envelope,
        };
        Ok(json_result(rendered))
    }
}

/// Apply a projection, degrading to the unfiltered envelope plus a
/// warning when the expression fails. Partial results stay usable.
pub(crate) fn apply_filter(envelope: Value, filter: &str) -> Value {
    match project(&envelope, filter) {
        Ok(filtered) => filtered,
        Err(e) => match envelope {
            Value::Object(mut map) => {
                map.insert("warning".into(), json!(format!("jq filter failed: {e}")));
                Value::Object(map)
            }
            other => json!({
                "result": other,
                "warning": format!("jq filter failed: {e}"),
            }),
        },
    }
}

/// Variables arrive either as a JSON object or as a JSON-encoded
/// string; both forms appear in the wild.
pub(crate) fn parse_variables(
    variables: Option<Value>,
) -> Result<Option<Map<String, Value>>, McpError> {
    match variables {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(Value::String(s)) => serde_json::from_str(&s).map(Some).map_err(|e| {
            McpError::new(
                ErrorCode::INVALID_PARAMS,
                format!("Invalid variables: {e}"),
                None,
            )
        }),
        Some(_) => Err(McpError::new(
            ErrorCode::INVALID_PARAMS,
            "Variables must be a JSON object or string",
            None,
        )),
    }
}
