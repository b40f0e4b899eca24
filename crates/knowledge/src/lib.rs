//! Evidence retrieval for campaign questions.
//!
//! Combines a concept graph (campaign → creative → blog chunk) with
//! semantic search over blog passages into one ranked evidence set.

pub mod embeddings;
pub mod graph;
pub mod hybrid;
pub mod ingest;
pub mod lancedb_store;
pub mod scoring;
pub mod semantic;
pub mod types;
pub mod vector_store;

pub use graph::{ConceptGraphIndex, GraphStore, MemoryGraphStore, Neo4jHttpStore};
pub use hybrid::{fuse, HybridRetriever, RetrievalReport, RetrievalSettings};
pub use ingest::{index_blogs, IngestStats};
pub use lancedb_store::LanceDbStore;
pub use semantic::SemanticIndex;
pub use types::{
    ConceptRef, EvidenceChunk, EvidenceSet, Provenance, Query, QueryFilters, SourceOutcome,
};
pub use vector_store::{MemoryVectorStore, StoredPassage, VectorStore};

use insight_core::{AppConfig, AppResult};
use std::sync::Arc;

/// Open the configured LanceDB passage store.
pub async fn open_vector_store(config: &AppConfig) -> AppResult<Arc<dyn VectorStore>> {
    let embedder = embeddings::create_provider(&config.vector)?;
    let store = LanceDbStore::open(&config.vector_index_path(), &config.vector.table, embedder).await?;
    Ok(Arc::new(store))
}

/// Build a retriever from configuration.
///
/// The graph is optional; a disabled graph simply yields no hints.
pub async fn open_retriever(config: &AppConfig) -> AppResult<HybridRetriever> {
    let semantic = SemanticIndex::new(open_vector_store(config).await?);

    let graph = if config.graph.enabled {
        let store = Neo4jHttpStore::new(&config.graph)?;
        Some(ConceptGraphIndex::new(Arc::new(store)))
    } else {
        tracing::info!("Concept graph disabled; retrieving from semantic index only");
        None
    };

    Ok(HybridRetriever::new(
        graph,
        semantic,
        RetrievalSettings::from_config(config),
    ))
}
