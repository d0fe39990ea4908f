//! MCP tool for entity resolution.

use rmcp::model::{CallToolResult, Content, JsonObject, Tool};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;

use crate::errors::McpError;
use crate::graphql::GraphQLClient;
use crate::resolve::{EntityKind, resolve};
use crate::schema_from_type;
use crate::tools::{json_result, parse_input};

/// The name of the entity resolution tool
pub const SEARCH_ENTITY_TOOL_NAME: &str = "search_entity";

#[derive(Clone)]
pub struct SearchEntity {
    pub tool: Tool,
    client: GraphQLClient,
}

/// Input for the search entity tool.
#[derive(JsonSchema, Deserialize)]
pub struct Input {
    /// The search text (e.g. "BRCA1", "breast cancer", "aspirin"), or a
    /// canonical identifier to recognize directly
    query: String,

    /// Restrict the search to one entity kind; all kinds are searched
    /// when omitted
    #[serde(default)]
    entity: Option<EntityKind>,
}

impl SearchEntity {
    pub fn new(client: GraphQLClient) -> Self {
        Self {
            client,
            tool: Tool::new(
                SEARCH_ENTITY_TOOL_NAME,
                "Search the Open Targets Platform for entities matching a free-text query. \
                 Returns ranked candidates with canonical identifiers across targets, \
                 diseases, drugs, variants, and studies. Use the returned `id` values as \
                 variables for the `query` and `batch_query` tools.",
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
        match resolve(&self.client, &input.query, input.entity).await {
            Ok(candidates) => Ok(json_result(json!({"candidates": candidates}))),
            Err(e) => Ok(CallToolResult::error(vec![Content::text(e.to_string())])),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::{Value, json};

    use super::*;

    fn tool_for(server: &mockito::Server) -> SearchEntity {
        let client = GraphQLClient::new(server.url().parse().unwrap(), Duration::from_secs(5));
        SearchEntity::new(client)
    }

    fn arguments(value: Value) -> JsonObject {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn returns_ranked_candidates() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .match_body(mockito::Matcher::PartialJson(
                json!({"variables": {"queryString": "breast cancer", "entityNames": ["disease"]}}),
            ))
            .with_body(
                json!({"data": {"search": {"hits": [
                    {"id": "MONDO_0007254", "entity": "disease", "name": "breast carcinoma", "score": 71.3},
                ]}}})
                .to_string(),
            )
            .create_async()
            .await;

        let result = tool_for(&server)
            .execute(Some(&arguments(json!({
                "query": "breast cancer",
                "entity": "disease",
            }))))
            .await
            .unwrap();

        let value = result.structured_content.unwrap();
        assert_eq!(value["candidates"][0]["id"], json!("MONDO_0007254"));
        assert_eq!(value["candidates"][0]["entity"], json!("disease"));
    }

    #[tokio::test]
    async fn unknown_entity_kind_is_rejected() {
        let server = mockito::Server::new_async().await;

        let result = tool_for(&server)
            .execute(Some(&arguments(json!({
                "query": "breast cancer",
                "entity": "pathway",
            }))))
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn all_lookups_failing_is_a_tool_error_result() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(500)
            .expect_at_least(1)
            .create_async()
            .await;

        let result = tool_for(&server)
            .execute(Some(&arguments(json!({
                "query": "braf",
                "entity": "target",
            }))))
            .await
            .unwrap();

        assert_eq!(result.is_error, Some(true));
    }
}
