//! Vector store abstraction over embedded blog passages.

use crate::embeddings::{cosine_similarity, EmbeddingProvider};
use insight_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::{Arc, RwLock};

/// A passage as persisted in the vector store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPassage {
    /// Chunk identifier; the graph's `BlogChunk.chunk_id` points here
    pub id: String,

    /// Document the passage was cut from
    pub source: String,

    pub text: String,
}

impl StoredPassage {
    pub fn new(id: impl Into<String>, source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            text: text.into(),
        }
    }
}

/// Similarity search capability over stored passages.
///
/// Implementations own their embedding provider; callers pass raw text.
#[async_trait::async_trait]
pub trait VectorStore: Send + Sync {
    /// Up to `k` passages ranked by descending cosine similarity, ties by id.
    async fn similarity_search(&self, text: &str, k: usize) -> AppResult<Vec<(StoredPassage, f32)>>;

    /// Look up passages by id and score them against `text`.
    ///
    /// Unknown ids are skipped.
    async fn fetch_scored(&self, ids: &[String], text: &str)
        -> AppResult<Vec<(StoredPassage, f32)>>;

    /// Insert or replace passages by id. Returns the number written.
    async fn upsert(&self, passages: &[StoredPassage]) -> AppResult<usize>;

    async fn count(&self) -> AppResult<usize>;
}

/// Sort scored passages by descending score, ties by id, and keep `k`.
pub(crate) fn rank_scored(mut scored: Vec<(StoredPassage, f32)>, k: usize) -> Vec<(StoredPassage, f32)> {
    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.id.cmp(&b.0.id))
    });
    scored.truncate(k);
    scored
}

/// In-process vector store.
///
/// Useful for tests and for running without a LanceDB directory.
pub struct MemoryVectorStore {
    embedder: Arc<dyn EmbeddingProvider>,
    entries: RwLock<Vec<(StoredPassage, Vec<f32>)>>,
}

impl MemoryVectorStore {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            embedder,
            entries: RwLock::new(Vec::new()),
        }
    }

    fn snapshot(&self) -> AppResult<Vec<(StoredPassage, Vec<f32>)>> {
        self.entries
            .read()
            .map(|entries| entries.clone())
            .map_err(|_| AppError::Knowledge("Vector store lock poisoned".to_string()))
    }
}

#[async_trait::async_trait]
impl VectorStore for MemoryVectorStore {
    async fn similarity_search(&self, text: &str, k: usize) -> AppResult<Vec<(StoredPassage, f32)>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let query = self.embedder.embed(text).await?;
        let scored = self
            .snapshot()?
            .into_iter()
            .map(|(passage, embedding)| {
                let score = cosine_similarity(&query, &embedding);
                (passage, score)
            })
            .collect();

        Ok(rank_scored(scored, k))
    }

    async fn fetch_scored(
        &self,
        ids: &[String],
        text: &str,
    ) -> AppResult<Vec<(StoredPassage, f32)>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let query = self.embedder.embed(text).await?;

        Ok(self
            .snapshot()?
            .into_iter()
            .filter(|(passage, _)| wanted.contains(passage.id.as_str()))
            .map(|(passage, embedding)| {
                let score = cosine_similarity(&query, &embedding);
                (passage, score)
            })
            .collect())
    }

    async fn upsert(&self, passages: &[StoredPassage]) -> AppResult<usize> {
        if passages.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = passages.iter().map(|p| p.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;

        let mut entries = self
            .entries
            .write()
            .map_err(|_| AppError::Knowledge("Vector store lock poisoned".to_string()))?;

        for (passage, embedding) in passages.iter().zip(embeddings) {
            match entries.iter_mut().find(|(p, _)| p.id == passage.id) {
                Some(entry) => *entry = (passage.clone(), embedding),
                None => entries.push((passage.clone(), embedding)),
            }
        }

        Ok(passages.len())
    }

    async fn count(&self) -> AppResult<usize> {
        Ok(self.snapshot()?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::TrigramProvider;

    fn store() -> MemoryVectorStore {
        MemoryVectorStore::new(Arc::new(TrigramProvider::new(128)))
    }

    #[tokio::test]
    async fn test_similarity_search_ranks_and_limits() {
        let store = store();
        store
            .upsert(&[
                StoredPassage::new("c1", "email.txt", "Email subject lines lift open rates"),
                StoredPassage::new("c2", "social.txt", "Refresh social ads weekly"),
                StoredPassage::new("c3", "ooh.txt", "Billboards near highways"),
            ])
            .await
            .unwrap();

        let results = store.similarity_search("email open rates", 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0.id, "c1");
        assert!(results[0].1 >= results[1].1);
    }

    #[tokio::test]
    async fn test_search_is_deterministic() {
        let store = store();
        store
            .upsert(&[
                StoredPassage::new("a", "x.txt", "same words"),
                StoredPassage::new("b", "y.txt", "same words"),
            ])
            .await
            .unwrap();

        let first = store.similarity_search("same words", 2).await.unwrap();
        let second = store.similarity_search("same words", 2).await.unwrap();
        assert_eq!(first, second);
        // Equal scores fall back to id order
        assert_eq!(first[0].0.id, "a");
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_id() {
        let store = store();
        store
            .upsert(&[StoredPassage::new("a", "x.txt", "old text")])
            .await
            .unwrap();
        store
            .upsert(&[StoredPassage::new("a", "x.txt", "new text")])
            .await
            .unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        let fetched = store.fetch_scored(&["a".to_string()], "new").await.unwrap();
        assert_eq!(fetched[0].0.text, "new text");
    }

    #[tokio::test]
    async fn test_fetch_scored_skips_unknown_ids() {
        let store = store();
        store
            .upsert(&[StoredPassage::new("a", "x.txt", "weekly refresh")])
            .await
            .unwrap();

        let fetched = store
            .fetch_scored(&["a".to_string(), "missing".to_string()], "refresh")
            .await
            .unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].0.id, "a");
    }

    #[tokio::test]
    async fn test_zero_k_returns_nothing() {
        let store = store();
        store
            .upsert(&[StoredPassage::new("a", "x.txt", "text")])
            .await
            .unwrap();
        assert!(store.similarity_search("text", 0).await.unwrap().is_empty());
    }
}
