//! Semantic search over the passage store.

use crate::scoring;
use crate::types::{EvidenceChunk, Provenance, Query, SourceOutcome};
use crate::vector_store::{StoredPassage, VectorStore};
use std::sync::Arc;
use tracing::{debug, warn};

fn to_chunk((passage, score): (StoredPassage, f32)) -> EvidenceChunk {
    EvidenceChunk::semantic(passage.id, passage.text, scoring::sanitize(score))
        .with_document(passage.source)
}

/// Nearest-neighbour search returning evidence chunks.
#[derive(Clone)]
pub struct SemanticIndex {
    store: Arc<dyn VectorStore>,
}

impl SemanticIndex {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self { store }
    }

    /// Up to `k` chunks, descending score, filters applied.
    pub async fn search_outcome(&self, query: &Query, k: usize) -> SourceOutcome<EvidenceChunk> {
        if k == 0 {
            return SourceOutcome::Empty;
        }

        let result = self
            .store
            .similarity_search(query.question(), k)
            .await
            .map(|hits| {
                let mut chunks: Vec<EvidenceChunk> = hits
                    .into_iter()
                    .map(to_chunk)
                    .filter(|chunk| query.filters().accepts(chunk))
                    .collect();
                chunks.sort_by(scoring::evidence_order);
                chunks.truncate(k);
                chunks
            });

        let outcome = SourceOutcome::from_result(result);
        match &outcome {
            SourceOutcome::Unavailable(reason) => warn!("Semantic index unavailable: {}", reason),
            _ => debug!("Semantic index returned {} chunks", outcome.len()),
        }
        outcome
    }

    pub async fn search(&self, query: &Query, k: usize) -> Vec<EvidenceChunk> {
        self.search_outcome(query, k).await.into_items()
    }

    /// Fetch specific chunks by id, scored against the query.
    ///
    /// Fetched chunks are tagged `Graph`: they were reached only through
    /// concept hints.
    pub async fn fetch_outcome(&self, query: &Query, ids: &[String]) -> SourceOutcome<EvidenceChunk> {
        if ids.is_empty() {
            return SourceOutcome::Empty;
        }

        let result = self
            .store
            .fetch_scored(ids, query.question())
            .await
            .map(|hits| {
                hits.into_iter()
                    .map(|hit| to_chunk(hit).with_provenance(Provenance::Graph))
                    .filter(|chunk| query.filters().accepts(chunk))
                    .collect()
            });

        let outcome = SourceOutcome::from_result(result);
        if let SourceOutcome::Unavailable(reason) = &outcome {
            warn!("Hint hydration failed: {}", reason);
        }
        outcome
    }
}
