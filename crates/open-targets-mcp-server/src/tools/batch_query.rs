//! MCP tool to run one query template over many variable sets.

use rmcp::model::{CallToolResult, ErrorCode, JsonObject, Tool};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::batch::{BatchItem, execute_batch};
use crate::errors::{GraphQLError, McpError};
use crate::graphql::GraphQLClient;
use crate::schema_from_type;
use crate::tools::query::apply_filter;
use crate::tools::{check_filter_allowed, json_result, parse_input};

/// The name of the tool to execute a batch of GraphQL operations
pub const BATCH_QUERY_TOOL_NAME: &str = "batch_query";

#[derive(Clone)]
pub struct BatchQuery {
    pub tool: Tool,
    client: GraphQLClient,
    concurrency: usize,
    filters_enabled: bool,
}

/// Input for the batch query tool.
#[derive(JsonSchema, Deserialize)]
pub struct Input {
    /// The GraphQL query to execute for every variable set
    query: String,

    /// One variables object per query execution
    variables_list: Vec<Map<String, Value>>,

    /// Variable field whose value labels each result (e.g. "chemblId")
    #[serde(default)]
    key_field: Option<String>,

    /// Optional filter expression applied identically and individually
    /// to every result
    #[serde(default)]
    jq_filter: Option<String>,
}

impl BatchQuery {
    pub fn new(client: GraphQLClient, concurrency: usize, filters_enabled: bool) -> Self {
        Self {
            client,
            concurrency,
            filters_enabled,
            tool: Tool::new(
                BATCH_QUERY_TOOL_NAME,
                "Execute the same GraphQL query multiple times with different variable sets. \
                 Use this instead of the `query` tool when querying multiple drugs, targets, \
                 or diseases with one query shape. Results are returned in input order, one \
                 entry per variable set, each independently marked success or failure.",
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

        let items = execute_batch(
            &self.client,
            &input.query,
            input.variables_list,
            self.concurrency,
        )
        .await
        .map_err(|e| match e {
            GraphQLError::InvalidRequest(msg) => {
                McpError::new(ErrorCode::INVALID_PARAMS, msg, None)
            }
            other => McpError::new(ErrorCode::INTERNAL_ERROR, other.to_string(), None),
        })?;

        let total = items.len();
        let mut successful = 0usize;
        let mut failed = 0usize;
        let results: Vec<Value> = items
            .into_iter()
            .map(|item| {
                let rendered = render_item(item, input.key_field.as_deref(), input.jq_filter.as_deref());
                if rendered["status"] == json!("success") {
                    successful += 1;
                } else {
                    failed += 1;
                }
                rendered
            })
            .collect();

        Ok(json_result(json!({
            "results": results,
            "summary": {
                "total": total,
                "successful": successful,
                "failed": failed,
            },
        })))
    }
}

/// Render one batch item. A `key_field` missing from a variable set
/// marks that item failed without touching its siblings.
fn render_item(item: BatchItem, key_field: Option<&str>, jq_filter: Option<&str>) -> Value {
    let key = match key_field {
        Some(field) => match item.variables.get(field) {
            Some(value) => Some(value.clone()),
            None => {
                return json!({
                    "status": "error",
                    "message": format!("Key field '{field}' not found in variables"),
                    "variables": item.variables,
                });
            }
        },
        None => None,
    };

    match item.result {
        Ok(envelope) => {
            let data = match jq_filter {
                Some(filter) => apply_filter(envelope, filter),
                None => envelope,
            };
            let mut rendered = Map::new();
            rendered.insert("status".into(), json!("success"));
            if let Some(key) = key {
                rendered.insert("key".into(), key);
            }
            rendered.insert("variables".into(), Value::Object(item.variables));
            rendered.insert("data".into(), data);
            Value::Object(rendered)
        }
        Err(e) => {
            let mut rendered = Map::new();
            rendered.insert("status".into(), json!("error"));
            if let Some(key) = key {
                rendered.insert("key".into(), key);
            }
            rendered.insert("kind".into(), json!(e.kind()));
            rendered.insert("message".into(), json!(e.to_string()));
            rendered.insert("variables".into(), Value::Object(item.variables));
            Value::Object(rendered)
        }
    }
}
