//! Concept graph access over Neo4j.
//!
//! The graph links campaigns to creatives and creatives to the blog chunks
//! that mention them. `ConceptGraphIndex` turns that traversal into concept
//! hints: chunk ids that the hybrid retriever can promote.

use crate::types::{ConceptRef, Query, SourceOutcome};
use insight_core::config::GraphConfig;
use insight_core::{AppError, AppResult};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Campaign → creative → blog chunk traversal.
///
/// `$terms` narrows campaigns to those whose channel, type, segment or target
/// audience mentions a question term; an empty list leaves it unconstrained.
pub const CONCEPT_QUERY: &str = "MATCH (c:Campaign)-[:HAS_CREATIVE]->(cr)-[:MENTIONED_IN]->(b:BlogChunk) \
WHERE b.chunk_id IS NOT NULL \
AND (size($terms) = 0 OR any(t IN $terms WHERE \
toLower(coalesce(c.channel, '')) CONTAINS t \
OR toLower(coalesce(c.campaign_type, '')) CONTAINS t \
OR toLower(coalesce(c.customer_segment, '')) CONTAINS t \
OR toLower(coalesce(c.target_audience, '')) CONTAINS t)) \
RETURN DISTINCT b.chunk_id LIMIT $limit";

const STOP_WORDS: [&str; 24] = [
    "what", "which", "when", "where", "does", "should", "would", "could", "about", "with", "from",
    "that", "this", "have", "their", "there", "they", "your", "best", "most", "more", "into",
    "improve", "campaign",
];

/// Graph query capability returning distinct string identifiers.
#[async_trait::async_trait]
pub trait GraphStore: Send + Sync {
    async fn distinct_ids(&self, cypher: &str, params: Value) -> AppResult<Vec<String>>;
}

/// Neo4j over its transactional HTTP endpoint.
#[derive(Debug, Clone)]
pub struct Neo4jHttpStore {
    client: Client,
    endpoint: String,
    database: String,
    user: String,
    password: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TxResponse {
    #[serde(default)]
    results: Vec<TxResult>,
    #[serde(default)]
    errors: Vec<TxError>,
}

#[derive(Debug, Deserialize)]
struct TxResult {
    #[serde(default)]
    data: Vec<TxRow>,
}

#[derive(Debug, Deserialize)]
struct TxRow {
    row: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct TxError {
    code: String,
    message: String,
}

impl Neo4jHttpStore {
    pub fn new(config: &GraphConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::Knowledge(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            database: config.database.clone(),
            user: config.user.clone(),
            password: config.password.clone(),
        })
    }

    fn commit_url(&self) -> String {
        format!("{}/db/{}/tx/commit", self.endpoint, self.database)
    }
}

/// First column of every row, as strings.
fn parse_ids(response: TxResponse) -> AppResult<Vec<String>> {
    if let Some(error) = response.errors.first() {
        return Err(AppError::Knowledge(format!(
            "Neo4j error {}: {}",
            error.code, error.message
        )));
    }

    Ok(response
        .results
        .into_iter()
        .flat_map(|result| result.data)
        .filter_map(|row| match row.row.into_iter().next() {
            Some(Value::String(s)) => Some(s),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
        .collect())
}

#[async_trait::async_trait]
impl GraphStore for Neo4jHttpStore {
    #[instrument(skip(self, params), fields(database = %self.database))]
    async fn distinct_ids(&self, cypher: &str, params: Value) -> AppResult<Vec<String>> {
        let body = json!({
            "statements": [{ "statement": cypher, "parameters": params }]
        });

        let response = self
            .client
            .post(self.commit_url())
            .basic_auth(&self.user, self.password.as_deref())
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Knowledge(format!("Failed to reach Neo4j: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Knowledge(format!(
                "Neo4j request failed ({}): {}",
                status, text
            )));
        }

        let parsed: TxResponse = response
            .json()
            .await
            .map_err(|e| AppError::Knowledge(format!("Failed to parse Neo4j response: {}", e)))?;

        parse_ids(parsed)
    }
}

/// In-process graph returning a fixed id list, capped by `$limit`.
#[derive(Debug, Clone, Default)]
pub struct MemoryGraphStore {
    ids: Vec<String>,
}

impl MemoryGraphStore {
    pub fn new(ids: Vec<String>) -> Self {
        Self { ids }
    }
}

#[async_trait::async_trait]
impl GraphStore for MemoryGraphStore {
    async fn distinct_ids(&self, _cypher: &str, params: Value) -> AppResult<Vec<String>> {
        let limit = params
            .get("limit")
            .and_then(Value::as_u64)
            .map(|l| l as usize)
            .unwrap_or(usize::MAX);
        Ok(self.ids.iter().take(limit).cloned().collect())
    }
}

/// Lower-cased question words worth matching against campaign attributes.
pub fn query_terms(question: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    question
        .split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|w| w.chars().count() > 3 && !STOP_WORDS.contains(&w.as_str()))
        .filter(|w| seen.insert(w.clone()))
        .collect()
}

/// Finds concept hints for a query by traversing the campaign graph.
#[derive(Clone)]
pub struct ConceptGraphIndex {
    store: Arc<dyn GraphStore>,
}

impl ConceptGraphIndex {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    /// Up to `limit` distinct concept ids, discovery order kept.
    ///
    /// Back-end failures are reported as `Unavailable`, never as errors.
    pub async fn find_concepts_outcome(&self, query: &Query, limit: usize) -> SourceOutcome<ConceptRef> {
        if limit == 0 {
            return SourceOutcome::Empty;
        }

        let params = json!({
            "limit": limit,
            "terms": query_terms(query.question()),
        });

        let result = self
            .store
            .distinct_ids(CONCEPT_QUERY, params)
            .await
            .map(|ids| {
                let mut seen = HashSet::new();
                ids.into_iter()
                    .filter(|id| seen.insert(id.clone()))
                    .take(limit)
                    .map(ConceptRef::new)
                    .collect()
            });

        let outcome = SourceOutcome::from_result(result);
        match &outcome {
            SourceOutcome::Unavailable(reason) => warn!("Concept graph unavailable: {}", reason),
            SourceOutcome::Empty => debug!("Concept graph returned no hints"),
            SourceOutcome::Found(concepts) => debug!("Concept graph returned {} hints", concepts.len()),
        }
        outcome
    }

    /// Best-effort variant: failures and empty results both give no hints.
    pub async fn find_concepts(&self, query: &Query, limit: usize) -> Vec<ConceptRef> {
        self.find_concepts_outcome(query, limit).await.into_items()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingGraph;

    #[async_trait::async_trait]
    impl GraphStore for FailingGraph {
        async fn distinct_ids(&self, _cypher: &str, _params: Value) -> AppResult<Vec<String>> {
            Err(AppError::Knowledge("connection refused".to_string()))
        }
    }

    #[test]
    fn test_query_terms() {
        let terms = query_terms("How can we improve Email campaigns for Millennials? email");
        assert_eq!(terms, vec!["email", "campaigns", "millennials"]);
    }

    #[test]
    fn test_parse_ids_reads_first_column() {
        let response: TxResponse = serde_json::from_value(json!({
            "results": [{ "columns": ["b.chunk_id"], "data": [
                { "row": ["c1"], "meta": [null] },
                { "row": [42], "meta": [null] },
                { "row": [null], "meta": [null] }
            ]}],
            "errors": []
        }))
        .unwrap();

        assert_eq!(parse_ids(response).unwrap(), vec!["c1", "42"]);
    }

    #[test]
    fn test_parse_ids_surfaces_errors() {
        let response: TxResponse = serde_json::from_value(json!({
            "results": [],
            "errors": [{ "code": "Neo.ClientError.Security.Unauthorized", "message": "bad auth" }]
        }))
        .unwrap();

        let err = parse_ids(response).unwrap_err();
        assert!(err.to_string().contains("Unauthorized"));
    }

    #[test]
    fn test_commit_url() {
        let store = Neo4jHttpStore::new(&GraphConfig {
            endpoint: "http://localhost:7474/".to_string(),
            ..GraphConfig::default()
        })
        .unwrap();
        assert_eq!(store.commit_url(), "http://localhost:7474/db/neo4j/tx/commit");
    }

    #[tokio::test]
    async fn test_find_concepts_dedups_and_limits() {
        let store = MemoryGraphStore::new(vec![
            "c1".to_string(),
            "c2".to_string(),
            "c1".to_string(),
            "c3".to_string(),
        ]);
        let index = ConceptGraphIndex::new(Arc::new(store));

        let concepts = index.find_concepts(&Query::new("email"), 3).await;
        let ids: Vec<&str> = concepts.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2"]);
    }

    #[tokio::test]
    async fn test_find_concepts_failure_is_empty() {
        let index = ConceptGraphIndex::new(Arc::new(FailingGraph));
        let query = Query::new("email");

        assert!(index.find_concepts_outcome(&query, 5).await.is_unavailable());
        assert!(index.find_concepts(&query, 5).await.is_empty());
    }

    #[tokio::test]
    async fn test_zero_limit_skips_backend() {
        let index = ConceptGraphIndex::new(Arc::new(FailingGraph));
        let outcome = index.find_concepts_outcome(&Query::new("email"), 0).await;
        assert_eq!(outcome, SourceOutcome::Empty);
    }
}
