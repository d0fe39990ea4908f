//! Run one query template against many variable sets.

use futures::StreamExt;
use futures::stream;
use serde_json::{Map, Value};

use crate::errors::GraphQLError;
use crate::graphql::{GraphQLClient, Request};

/// Default bound on simultaneous in-flight requests.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// One input variable set paired with its outcome.
#[derive(Debug)]
pub struct BatchItem {
    pub variables: Map<String, Value>,
    pub result: Result<Value, GraphQLError>,
}

/// Execute `query` once per variable set, at most `concurrency`
/// requests in flight at a time.
///
/// The output is index-aligned with the input: `items[i]` always holds
/// the outcome for `variable_sets[i]`, regardless of completion order.
/// One item failing never aborts or cancels its siblings; the call
/// itself only fails on a precondition violation detected before
/// dispatch.
pub async fn execute_batch(
    client: &GraphQLClient,
    query: &str,
    variable_sets: Vec<Map<String, Value>>,
    concurrency: usize,
) -> Result<Vec<BatchItem>, GraphQLError> {
    if query.trim().is_empty() {
        return Err(GraphQLError::InvalidRequest(
            "query text must be non-empty".into(),
        ));
    }

    let concurrency = concurrency.max(1);
    tracing::debug!(
        total = variable_sets.len(),
        concurrency,
        "dispatching batch"
    );

    // `buffered` yields completed futures in input order, which gives
    // the index-alignment invariant without a slot array.
    let items = stream::iter(variable_sets.into_iter().map(|variables| async move {
        let result = client
            .execute(Request::new(query, Some(variables.clone())))
            .await;
        BatchItem { variables, result }
    }))
    .buffered(concurrency)
    .collect::<Vec<_>>()
    .await;

    Ok(items)
}
