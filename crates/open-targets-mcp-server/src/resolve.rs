//! Map free-text input to canonical Open Targets identifiers.

use std::fmt;
use std::sync::LazyLock;

use futures::future::join_all;
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::errors::{GraphQLError, ResolutionError};
use crate::graphql::{GraphQLClient, Request};

/// The entity search operation, matching the platform's search API.
const SEARCH_QUERY: &str = r#"query EntitySearch($queryString: String!, $entityNames: [String!]) {
  search(queryString: $queryString, entityNames: $entityNames, page: { index: 0, size: 10 }) {
    hits {
      id
      entity
      name
      score
    }
  }
}"#;

/// Candidates scoring at or below this are dropped; an empty candidate
/// list is a normal outcome, not an error.
const MIN_SCORE: f64 = 0.0;

/// A domain category with its own canonical identifier format.
///
/// Declaration order is the kind-priority order used to break ranking
/// ties, so repeated calls with identical input are reproducible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Target,
    Disease,
    Drug,
    Variant,
    Study,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Target,
        EntityKind::Disease,
        EntityKind::Drug,
        EntityKind::Variant,
        EntityKind::Study,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Target => "target",
            EntityKind::Disease => "disease",
            EntityKind::Drug => "drug",
            EntityKind::Variant => "variant",
            EntityKind::Study => "study",
        }
    }

    fn priority(&self) -> usize {
        Self::ALL.iter().position(|kind| kind == self).unwrap_or(usize::MAX)
    }

    fn from_api(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }

    /// Whether `text` is already a canonical identifier of this kind.
    fn matches_canonical_id(&self, text: &str) -> bool {
        static TARGET: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"^ENSG\d{11}$").expect("valid pattern"));
        static DISEASE: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"^(?:MONDO|EFO|HP|DOID|OTAR)_\d+$").expect("valid pattern"));
        static DRUG: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"^CHEMBL\d+$").expect("valid pattern"));
        static VARIANT: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"^(?:\d{1,2}|X|Y|MT)_\d+_[ACGT]+_[ACGT]+$").expect("valid pattern")
        });
        static STUDY: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"^GCST\d+$").expect("valid pattern"));

        let pattern: &Regex = match self {
            EntityKind::Target => &TARGET,
            EntityKind::Disease => &DISEASE,
            EntityKind::Drug => &DRUG,
            EntityKind::Variant => &VARIANT,
            EntityKind::Study => &STUDY,
        };
        pattern.is_match(text)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ranked match for a resolution call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityCandidate {
    #[serde(rename = "entity")]
    pub kind: EntityKind,
    pub id: String,
    pub name: String,
    pub score: f64,
}

/// Resolve free-text input to canonical identifiers.
///
/// If `kind` is given only that kind is searched; otherwise all kinds
/// are searched concurrently and the results merged. Input that is
/// already a canonical identifier short-circuits to a single
/// high-confidence candidate without a remote call.
///
/// During an any-kind search, one kind's lookup failing degrades to
/// omitting that kind's candidates; the call fails only when every
/// kind failed.
#[tracing::instrument(skip(client))]
pub async fn resolve(
    client: &GraphQLClient,
    text: &str,
    kind: Option<EntityKind>,
) -> Result<Vec<EntityCandidate>, ResolutionError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(Vec::new());
    }

    let kinds: &[EntityKind] = match &kind {
        Some(kind) => std::slice::from_ref(kind),
        None => &EntityKind::ALL,
    };

    // Exact-format recognition first: patterns are disjoint, and kinds
    // are checked in priority order.
    if let Some(kind) = kinds.iter().find(|kind| kind.matches_canonical_id(text)) {
        return Ok(vec![EntityCandidate {
            kind: *kind,
            id: text.to_string(),
            name: text.to_string(),
            score: 1.0,
        }]);
    }

    let lookups = join_all(
        kinds
            .iter()
            .map(|kind| async move { (*kind, search_kind(client, text, *kind).await) }),
    )
    .await;

    let mut candidates = Vec::new();
    let mut failures = Vec::new();
    for (kind, outcome) in lookups {
        match outcome {
            Ok(hits) => candidates.extend(hits),
            Err(e) => {
                tracing::warn!(kind = %kind, error = %e, "entity lookup failed, omitting kind");
                failures.push(format!("{kind}: {e}"));
            }
        }
    }
    if candidates.is_empty() && failures.len() == kinds.len() && !failures.is_empty() {
        return Err(ResolutionError(failures.join("; ")));
    }

    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.kind.priority().cmp(&b.kind.priority()))
            .then_with(|| a.id.cmp(&b.id))
    });
    Ok(candidates)
}

/// One remote lookup for a single kind.
async fn search_kind(
    client: &GraphQLClient,
    text: &str,
    kind: EntityKind,
) -> Result<Vec<EntityCandidate>, GraphQLError> {
    let mut variables = Map::new();
    variables.insert("queryString".into(), json!(text));
    variables.insert("entityNames".into(), json!([kind.as_str()]));

    let envelope = client
        .execute(Request::new(SEARCH_QUERY, Some(variables)))
        .await?;

    let hits = envelope["data"]["search"]["hits"]
        .as_array()
        .cloned()
        .unwrap_or_default();

    Ok(hits
        .iter()
        .filter_map(|hit| candidate_from_hit(hit, kind))
        .filter(|candidate| candidate.score > MIN_SCORE)
        .collect())
}

fn candidate_from_hit(hit: &Value, requested: EntityKind) -> Option<EntityCandidate> {
    let id = hit["id"].as_str()?;
    let kind = hit["entity"]
        .as_str()
        .and_then(EntityKind::from_api)
        .unwrap_or(requested);
    Some(EntityCandidate {
        kind,
        id: id.to_string(),
        name: hit["name"].as_str().unwrap_or(id).to_string(),
        score: hit["score"].as_f64().unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rstest::rstest;
    use serde_json::json;

    use super::*;

    fn client_for(server: &mockito::Server) -> GraphQLClient {
        let endpoint = server.url().parse().unwrap();
        GraphQLClient::new(endpoint, Duration::from_secs(5))
    }

    fn hits_body(hits: Value) -> String {
        json!({"data": {"search": {"hits": hits}}}).to_string()
    }

    async fn mock_kind(server: &mut mockito::Server, kind: &str, hits: Value) -> mockito::Mock {
        server
            .mock("POST", "/")
            .match_body(mockito::Matcher::PartialJson(
                json!({"variables": {"entityNames": [kind]}}),
            ))
            .with_body(hits_body(hits))
            .create_async()
            .await
    }

    #[tokio::test]
    async fn canonical_id_short_circuits_without_a_remote_call() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("POST", "/").expect(0).create_async().await;

        let candidates = resolve(
            &client_for(&server),
            "ENSG00000139618",
            Some(EntityKind::Target),
        )
        .await
        .unwrap();

        mock.assert_async().await;
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, "ENSG00000139618");
        assert_eq!(candidates[0].kind, EntityKind::Target);
        assert_eq!(candidates[0].score, 1.0);
    }

    #[rstest]
    #[case("ENSG00000139618", EntityKind::Target)]
    #[case("MONDO_0007254", EntityKind::Disease)]
    #[case("EFO_0000305", EntityKind::Disease)]
    #[case("CHEMBL25", EntityKind::Drug)]
    #[case("1_154453788_C_T", EntityKind::Variant)]
    #[case("GCST90002357", EntityKind::Study)]
    #[tokio::test]
    async fn canonical_id_kind_is_recognized_in_any_kind_mode(
        #[case] id: &str,
        #[case] expected: EntityKind,
    ) {
        let mut server = mockito::Server::new_async().await;
        server.mock("POST", "/").expect(0).create_async().await;

        let candidates = resolve(&client_for(&server), id, None).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].kind, expected);
        assert_eq!(candidates[0].id, id);
    }

    #[tokio::test]
    async fn free_text_disease_search_ranks_the_best_hit_first() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_body(mockito::Matcher::PartialJson(json!({
                "variables": {"queryString": "breast cancer", "entityNames": ["disease"]},
            })))
            .with_body(hits_body(json!([
                {"id": "MONDO_0007254", "entity": "disease", "name": "breast carcinoma", "score": 71.3},
                {"id": "EFO_0000305", "entity": "disease", "name": "breast neoplasm", "score": 44.9},
            ])))
            .create_async()
            .await;

        let candidates = resolve(
            &client_for(&server),
            "breast cancer",
            Some(EntityKind::Disease),
        )
        .await
        .unwrap();

        mock.assert_async().await;
        assert!(!candidates.is_empty());
        assert_eq!(candidates[0].id, "MONDO_0007254");
        assert_eq!(candidates[0].kind, EntityKind::Disease);
        assert!(candidates[0].score >= candidates[1].score);
    }

    #[tokio::test]
    async fn ties_break_by_kind_priority_then_id() {
        let mut server = mockito::Server::new_async().await;
        mock_kind(
            &mut server,
            "drug",
            json!([{"id": "CHEMBL25", "entity": "drug", "name": "aspirin", "score": 5.0}]),
        )
        .await;
        mock_kind(
            &mut server,
            "target",
            json!([{"id": "ENSG00000073756", "entity": "target", "name": "PTGS2", "score": 5.0}]),
        )
        .await;
        for kind in ["disease", "variant", "study"] {
            mock_kind(&mut server, kind, json!([])).await;
        }

        let first = resolve(&client_for(&server), "aspirin", None).await.unwrap();

        // Equal scores: target outranks drug by kind priority.
        assert_eq!(first[0].kind, EntityKind::Target);
        assert_eq!(first[1].kind, EntityKind::Drug);
    }

    #[tokio::test]
    async fn repeated_calls_with_identical_input_are_deterministic() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .match_body(mockito::Matcher::PartialJson(
                json!({"variables": {"entityNames": ["disease"]}}),
            ))
            .with_body(hits_body(json!([
                {"id": "MONDO_0007254", "entity": "disease", "name": "breast carcinoma", "score": 71.3},
                {"id": "EFO_0000305", "entity": "disease", "name": "breast neoplasm", "score": 44.9},
            ])))
            .expect(2)
            .create_async()
            .await;

        let client = client_for(&server);
        let first = resolve(&client, "breast cancer", Some(EntityKind::Disease))
            .await
            .unwrap();
        let second = resolve(&client, "breast cancer", Some(EntityKind::Disease))
            .await
            .unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn a_failing_kind_degrades_to_omission_in_any_kind_mode() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .match_body(mockito::Matcher::PartialJson(
                json!({"variables": {"entityNames": ["drug"]}}),
            ))
            .with_status(500)
            .create_async()
            .await;
        mock_kind(
            &mut server,
            "target",
            json!([{"id": "ENSG00000157764", "entity": "target", "name": "BRAF", "score": 12.0}]),
        )
        .await;
        for kind in ["disease", "variant", "study"] {
            mock_kind(&mut server, kind, json!([])).await;
        }

        let candidates = resolve(&client_for(&server), "braf", None).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, "ENSG00000157764");
    }

    #[tokio::test]
    async fn all_kinds_failing_is_a_resolution_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(500)
            .expect_at_least(1)
            .create_async()
            .await;

        let result = resolve(&client_for(&server), "braf", Some(EntityKind::Target)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn no_hits_is_an_empty_list_not_an_error() {
        let mut server = mockito::Server::new_async().await;
        mock_kind(&mut server, "disease", json!([])).await;

        let candidates = resolve(
            &client_for(&server),
            "no such disease",
            Some(EntityKind::Disease),
        )
        .await
        .unwrap();
        assert!(candidates.is_empty());
    }
}
