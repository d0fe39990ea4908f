//! GraphQL execution against the Open Targets Platform API.

use std::time::{Duration, Instant};

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Serialize;
use serde_json::{Map, Value};
use url::Url;

use crate::errors::GraphQLError;

/// A single GraphQL request: query text plus optional variables.
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    pub query: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<Map<String, Value>>,
}

impl Request {
    pub fn new(query: impl Into<String>, variables: Option<Map<String, Value>>) -> Self {
        Self {
            query: query.into(),
            variables,
        }
    }
}

/// A client for one GraphQL endpoint.
///
/// Performs exactly one attempt per call. Retry policy, if any,
/// belongs to the caller, which keeps latency predictable and avoids
/// duplicate side effects when the remote operation is a mutation.
#[derive(Debug, Clone)]
pub struct GraphQLClient {
    endpoint: Url,
    timeout: Duration,
    client: reqwest::Client,
}

impl GraphQLClient {
    pub fn new(endpoint: Url, timeout: Duration) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .unwrap_or_default();
        Self {
            endpoint,
            timeout,
            client,
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Execute a request and return the decoded response envelope.
    ///
    /// The envelope is returned whole: both the `data` payload and any
    /// GraphQL-level `errors` list are surfaced to the caller, which
    /// decides what an application-level failure means.
    #[tracing::instrument(skip_all, fields(endpoint = %self.endpoint))]
    pub async fn execute(&self, request: Request) -> Result<Value, GraphQLError> {
        if request.query.trim().is_empty() {
            return Err(GraphQLError::InvalidRequest(
                "query text must be non-empty".into(),
            ));
        }

        let started = Instant::now();
        let response = self
            .client
            .post(self.endpoint.clone())
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_send_error(e, started.elapsed()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GraphQLError::Transport {
                status: Some(status.as_u16()),
                message: format!("endpoint returned status {status}"),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| GraphQLError::Decode(e.to_string()))
    }
}

fn classify_send_error(error: reqwest::Error, elapsed: Duration) -> GraphQLError {
    if error.is_timeout() {
        GraphQLError::Timeout { elapsed }
    } else {
        GraphQLError::Transport {
            status: error.status().map(|s| s.as_u16()),
            message: error.to_string(),
        }
    }
}
