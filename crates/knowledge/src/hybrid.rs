//! Hybrid retrieval: concept-graph hints fused with semantic search.

use crate::graph::ConceptGraphIndex;
use crate::scoring;
use crate::semantic::SemanticIndex;
use crate::types::{ConceptRef, EvidenceChunk, EvidenceSet, Provenance, Query, SourceOutcome};
use insight_core::AppConfig;
use std::future::Future;
use std::time::Duration;
use tokio::time::{timeout, Instant};
use tracing::{debug, instrument, warn};

/// Tunables for one retriever.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalSettings {
    /// Maximum concept hints requested from the graph
    pub concept_limit: usize,

    /// Semantic neighbours requested
    pub k: usize,

    /// Additive score bonus for chunks found by both sources
    pub graph_boost: f32,

    /// Cap on the fused evidence set
    pub max_evidence: usize,

    /// Per-source timeout; a late source counts as unavailable
    pub source_timeout: Duration,

    /// Fetch hinted chunks that semantic search missed
    pub hydrate_hints: bool,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            concept_limit: 5,
            k: 3,
            graph_boost: 0.05,
            max_evidence: 5,
            source_timeout: Duration::from_secs(5),
            hydrate_hints: true,
        }
    }
}

impl RetrievalSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            concept_limit: config.graph.concept_limit,
            k: config.vector.k,
            graph_boost: config.retrieval.graph_boost,
            max_evidence: config.retrieval.max_evidence,
            source_timeout: Duration::from_millis(config.retrieval.source_timeout_ms),
            hydrate_hints: config.retrieval.hydrate_hints,
        }
    }
}

/// Evidence plus how each source fared, for logging and diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalReport {
    pub evidence: EvidenceSet,
    pub hints: usize,
    pub graph_unavailable: bool,
    pub semantic_unavailable: bool,
}

/// Promote semantic chunks matching a hint, then rank, dedup and cap.
///
/// `semantic` and `hydrated` must be in discovery order; semantic chunks are
/// discovered first.
pub fn fuse(
    hints: &[ConceptRef],
    semantic: Vec<EvidenceChunk>,
    hydrated: Vec<EvidenceChunk>,
    boost: f32,
    cap: usize,
) -> EvidenceSet {
    let mut candidates = Vec::with_capacity(semantic.len() + hydrated.len());

    for mut chunk in semantic {
        if hints.iter().any(|hint| chunk.matches_hint(&hint.id)) {
            chunk.score = scoring::adjusted_score(chunk.score, Provenance::Both, boost);
            chunk.provenance = Provenance::Both;
        }
        candidates.push(chunk);
    }
    candidates.extend(hydrated);

    EvidenceSet::from_candidates(candidates, cap)
}

async fn within<T>(
    limit: Duration,
    source: &str,
    fut: impl Future<Output = SourceOutcome<T>>,
) -> SourceOutcome<T> {
    match timeout(limit, fut).await {
        Ok(outcome) => outcome,
        Err(_) => {
            warn!("{} timed out after {:?}", source, limit);
            SourceOutcome::Unavailable(format!("{} timed out", source))
        }
    }
}

/// Fuses graph-guided hints with vector similarity into one evidence set.
///
/// Never fails: an unavailable source only reduces coverage.
#[derive(Clone)]
pub struct HybridRetriever {
    graph: Option<ConceptGraphIndex>,
    semantic: SemanticIndex,
    settings: RetrievalSettings,
}

impl HybridRetriever {
    pub fn new(
        graph: Option<ConceptGraphIndex>,
        semantic: SemanticIndex,
        settings: RetrievalSettings,
    ) -> Self {
        Self {
            graph,
            semantic,
            settings,
        }
    }

    pub fn settings(&self) -> &RetrievalSettings {
        &self.settings
    }

    pub async fn retrieve(&self, query: &Query) -> EvidenceSet {
        self.retrieve_detailed(query).await.evidence
    }

    #[instrument(skip(self, query), fields(k = self.settings.k, cap = self.settings.max_evidence))]
    pub async fn retrieve_detailed(&self, query: &Query) -> RetrievalReport {
        let limit = self.settings.source_timeout;
        let started = Instant::now();

        let graph_lookup = async {
            match &self.graph {
                Some(graph) => {
                    within(
                        limit,
                        "concept graph",
                        graph.find_concepts_outcome(query, self.settings.concept_limit),
                    )
                    .await
                }
                None => SourceOutcome::Empty,
            }
        };
        let semantic_lookup = within(
            limit,
            "semantic index",
            self.semantic.search_outcome(query, self.settings.k),
        );

        let (graph_outcome, semantic_outcome) = tokio::join!(graph_lookup, semantic_lookup);

        let graph_unavailable = graph_outcome.is_unavailable();
        let semantic_unavailable = semantic_outcome.is_unavailable();
        let hints = graph_outcome.into_items();
        let semantic = semantic_outcome.into_items();

        // Hydration shares the per-source budget with the lookups above
        let remaining = limit.saturating_sub(started.elapsed());
        let hydrated = if self.settings.hydrate_hints && !semantic_unavailable {
            let missing: Vec<String> = hints
                .iter()
                .filter(|hint| !semantic.iter().any(|chunk| chunk.matches_hint(&hint.id)))
                .map(|hint| hint.id.clone())
                .collect();
            if missing.is_empty() || remaining.is_zero() {
                Vec::new()
            } else {
                within(
                    remaining,
                    "hint hydration",
                    self.semantic.fetch_outcome(query, &missing),
                )
                .await
                .into_items()
            }
        } else {
            Vec::new()
        };

        debug!(
            hints = hints.len(),
            semantic = semantic.len(),
            hydrated = hydrated.len(),
            "Fusing evidence"
        );

        let evidence = fuse(
            &hints,
            semantic,
            hydrated,
            self.settings.graph_boost,
            self.settings.max_evidence,
        );

        if evidence.is_empty() {
            warn!("No evidence found for query");
        }

        RetrievalReport {
            evidence,
            hints: hints.len(),
            graph_unavailable,
            semantic_unavailable,
        }
    }
}
