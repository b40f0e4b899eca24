//! Retrieval data model.
//!
//! Every value here is request-scoped: created for one question, consumed by
//! the orchestrator, then dropped.

use crate::scoring;
use insight_core::AppResult;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// An analyst question plus optional retrieval filters.
///
/// Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    question: String,
    filters: QueryFilters,
}

impl Query {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            filters: QueryFilters::default(),
        }
    }

    pub fn with_filters(question: impl Into<String>, filters: QueryFilters) -> Self {
        Self {
            question: question.into(),
            filters,
        }
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn filters(&self) -> &QueryFilters {
        &self.filters
    }
}

/// Optional restrictions applied to semantic results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryFilters {
    /// Only keep passages whose document path contains one of these strings
    pub sources: Option<Vec<String>>,

    /// Drop passages scoring below this similarity
    pub min_score: Option<f32>,
}

impl QueryFilters {
    pub fn with_sources(mut self, sources: Vec<String>) -> Self {
        self.sources = Some(sources);
        self
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = Some(min_score);
        self
    }

    /// Check a chunk against every configured filter.
    pub fn accepts(&self, chunk: &EvidenceChunk) -> bool {
        if let Some(min_score) = self.min_score {
            if chunk.score < min_score {
                return false;
            }
        }

        if let Some(sources) = &self.sources {
            let document = chunk.document.as_deref().unwrap_or(&chunk.source_id);
            if !sources.iter().any(|s| document.contains(s.as_str())) {
                return false;
            }
        }

        true
    }
}

/// A concept/topic identifier surfaced by graph traversal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptRef {
    pub id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f32>,
}

impl ConceptRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            weight: None,
        }
    }
}

/// Which retrieval path found a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Graph,
    Semantic,
    Both,
}

impl Provenance {
    /// Tie-break priority: `Both` > `Graph` > `Semantic`.
    pub fn priority(self) -> u8 {
        match self {
            Provenance::Both => 2,
            Provenance::Graph => 1,
            Provenance::Semantic => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Provenance::Graph => "graph",
            Provenance::Semantic => "semantic",
            Provenance::Both => "both",
        }
    }
}

/// A unit of retrieved text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceChunk {
    /// Identity of the chunk in the passage index (also the graph's `chunk_id`)
    pub source_id: String,

    /// Document the chunk was cut from, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,

    pub content: String,

    /// Higher is more relevant
    pub score: f32,

    pub provenance: Provenance,
}

impl EvidenceChunk {
    pub fn semantic(source_id: impl Into<String>, content: impl Into<String>, score: f32) -> Self {
        Self {
            source_id: source_id.into(),
            document: None,
            content: content.into(),
            score,
            provenance: Provenance::Semantic,
        }
    }

    pub fn with_document(mut self, document: impl Into<String>) -> Self {
        self.document = Some(document.into());
        self
    }

    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = provenance;
        self
    }

    /// Two chunks are the same if either their content or their id matches.
    pub fn same_as(&self, other: &EvidenceChunk) -> bool {
        self.source_id == other.source_id || self.content == other.content
    }

    /// Whether a concept hint points at this chunk or its document.
    pub fn matches_hint(&self, hint: &str) -> bool {
        self.source_id == hint || self.document.as_deref() == Some(hint)
    }
}

/// Ranked, duplicate-free, size-bounded evidence.
///
/// Order: descending score, then provenance priority, then discovery order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EvidenceSet {
    chunks: Vec<EvidenceChunk>,
}

impl EvidenceSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Rank candidates, drop duplicates keeping the best-ranked instance,
    /// and truncate to `cap`.
    ///
    /// Candidates must be passed in discovery order; the sort is stable.
    pub fn from_candidates(mut candidates: Vec<EvidenceChunk>, cap: usize) -> Self {
        for chunk in &mut candidates {
            chunk.score = scoring::sanitize(chunk.score);
        }
        candidates.sort_by(scoring::evidence_order);

        let mut seen_ids: HashSet<String> = HashSet::new();
        let mut seen_contents: HashSet<String> = HashSet::new();
        let mut chunks = Vec::with_capacity(cap.min(candidates.len()));

        for chunk in candidates {
            if chunks.len() == cap {
                break;
            }
            if seen_ids.contains(&chunk.source_id) || seen_contents.contains(&chunk.content) {
                continue;
            }
            seen_ids.insert(chunk.source_id.clone());
            seen_contents.insert(chunk.content.clone());
            chunks.push(chunk);
        }

        Self { chunks }
    }

    pub fn chunks(&self) -> &[EvidenceChunk] {
        &self.chunks
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EvidenceChunk> {
        self.chunks.iter()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Chunk contents in rank order.
    pub fn contents(&self) -> Vec<String> {
        self.chunks.iter().map(|c| c.content.clone()).collect()
    }
}

/// Result of one best-effort back-end lookup.
///
/// Keeps "no data" apart from "back end failed" so the difference can be
/// logged, while both flatten to an empty list for fusion.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceOutcome<T> {
    Found(Vec<T>),
    Empty,
    Unavailable(String),
}

impl<T> SourceOutcome<T> {
    pub fn from_result(result: AppResult<Vec<T>>) -> Self {
        match result {
            Ok(items) if items.is_empty() => SourceOutcome::Empty,
            Ok(items) => SourceOutcome::Found(items),
            Err(e) => SourceOutcome::Unavailable(e.to_string()),
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, SourceOutcome::Unavailable(_))
    }

    pub fn len(&self) -> usize {
        match self {
            SourceOutcome::Found(items) => items.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_items(self) -> Vec<T> {
        match self {
            SourceOutcome::Found(items) => items,
            _ => Vec::new(),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(Vec<T>) -> Vec<U>) -> SourceOutcome<U> {
        match self {
            SourceOutcome::Found(items) => SourceOutcome::from_result(Ok(f(items))),
            SourceOutcome::Empty => SourceOutcome::Empty,
            SourceOutcome::Unavailable(reason) => SourceOutcome::Unavailable(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use insight_core::AppError;

    fn chunk(id: &str, content: &str, score: f32) -> EvidenceChunk {
        EvidenceChunk::semantic(id, content, score)
    }

    #[test]
    fn test_query_is_plain_value() {
        let query = Query::with_filters(
            "Which channel converts best?",
            QueryFilters::default().with_min_score(0.2),
        );
        assert_eq!(query.question(), "Which channel converts best?");
        assert_eq!(query.filters().min_score, Some(0.2));
    }

    #[test]
    fn test_from_candidates_orders_by_score() {
        let set = EvidenceSet::from_candidates(
            vec![chunk("a", "A", 0.6), chunk("b", "B", 0.8), chunk("c", "C", 0.7)],
            10,
        );
        let scores: Vec<f32> = set.iter().map(|c| c.score).collect();
        assert_eq!(scores, vec![0.8, 0.7, 0.6]);
    }

    #[test]
    fn test_from_candidates_breaks_ties_by_provenance_then_discovery() {
        let set = EvidenceSet::from_candidates(
            vec![
                chunk("s1", "semantic first", 0.5),
                chunk("g1", "graph", 0.5).with_provenance(Provenance::Graph),
                chunk("s2", "semantic second", 0.5),
                chunk("b1", "both", 0.5).with_provenance(Provenance::Both),
            ],
            10,
        );
        let ids: Vec<&str> = set.iter().map(|c| c.source_id.as_str()).collect();
        assert_eq!(ids, vec!["b1", "g1", "s1", "s2"]);
    }

    #[test]
    fn test_from_candidates_dedups_by_id_or_content() {
        let set = EvidenceSet::from_candidates(
            vec![
                chunk("a", "Refresh ads weekly", 0.4),
                chunk("b", "Refresh ads weekly", 0.7),
                chunk("a", "Rotate creatives", 0.9),
                chunk("c", "Unique", 0.1),
            ],
            10,
        );

        let ids: Vec<&str> = set.iter().map(|c| c.source_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        // The highest-scoring instance of each identity survives
        assert_eq!(set.chunks()[0].score, 0.9);
        assert_eq!(set.chunks()[1].score, 0.7);

        for (i, x) in set.iter().enumerate() {
            for y in set.chunks().iter().skip(i + 1) {
                assert!(!x.same_as(y));
            }
        }
    }

    #[test]
    fn test_from_candidates_truncates_to_cap() {
        let candidates = (0..10)
            .map(|i| chunk(&format!("c{}", i), &format!("text {}", i), i as f32 / 10.0))
            .collect();
        let set = EvidenceSet::from_candidates(candidates, 3);
        assert_eq!(set.len(), 3);
        assert_eq!(set.chunks()[0].source_id, "c9");
    }

    #[test]
    fn test_filters_accept() {
        let c = chunk("c1", "text", 0.3).with_document("blogs/data/email.txt");
        assert!(QueryFilters::default().accepts(&c));
        assert!(!QueryFilters::default().with_min_score(0.5).accepts(&c));
        assert!(QueryFilters::default()
            .with_sources(vec!["email".to_string()])
            .accepts(&c));
        assert!(!QueryFilters::default()
            .with_sources(vec!["social".to_string()])
            .accepts(&c));
    }

    #[test]
    fn test_matches_hint() {
        let c = chunk("chunk-7", "text", 0.3).with_document("blogs/data/seo.txt");
        assert!(c.matches_hint("chunk-7"));
        assert!(c.matches_hint("blogs/data/seo.txt"));
        assert!(!c.matches_hint("chunk-8"));
    }

    #[test]
    fn test_source_outcome_distinguishes_empty_from_failure() {
        let empty: SourceOutcome<u8> = SourceOutcome::from_result(Ok(vec![]));
        let failed: SourceOutcome<u8> =
            SourceOutcome::from_result(Err(AppError::Knowledge("down".to_string())));
        let found = SourceOutcome::from_result(Ok(vec![1u8, 2]));

        assert_eq!(empty, SourceOutcome::Empty);
        assert!(failed.is_unavailable());
        assert!(failed.into_items().is_empty());
        assert_eq!(found.len(), 2);
    }
}
