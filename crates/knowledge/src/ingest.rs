//! Blog ingestion: split `.txt` posts into passages and index them.

use crate::vector_store::{StoredPassage, VectorStore};
use insight_core::{AppError, AppResult};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::Path;
use text_splitter::{ChunkConfig, TextSplitter};
use walkdir::WalkDir;

pub const DEFAULT_CHUNK_SIZE: usize = 100;
pub const DEFAULT_CHUNK_OVERLAP: usize = 20;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub files: usize,
    pub chunks: usize,
}

/// Stable passage id from the document path and passage text.
pub fn chunk_id(source: &str, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hasher.update([0u8]);
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Split one document into passages.
pub fn split_document(
    source: &str,
    text: &str,
    chunk_size: usize,
    overlap: usize,
) -> AppResult<Vec<StoredPassage>> {
    let config = ChunkConfig::new(chunk_size)
        .with_overlap(overlap)
        .map_err(|e| AppError::Knowledge(format!("Invalid chunk settings: {}", e)))?;
    let splitter = TextSplitter::new(config);

    // Repeated passages hash to the same id; keep the first
    let mut seen = HashSet::new();
    Ok(splitter
        .chunks(text)
        .filter(|chunk| !chunk.trim().is_empty())
        .map(|chunk| StoredPassage::new(chunk_id(source, chunk), source, chunk))
        .filter(|passage| seen.insert(passage.id.clone()))
        .collect())
}

/// Index every `*.txt` file directly under `dir`.
///
/// Passage ids are content hashes, so re-running replaces rather than
/// duplicates.
pub async fn index_blogs(
    dir: &Path,
    store: &dyn VectorStore,
    chunk_size: usize,
    overlap: usize,
) -> AppResult<IngestStats> {
    if !dir.is_dir() {
        return Err(AppError::Knowledge(format!(
            "Blog directory not found: {}",
            dir.display()
        )));
    }

    let mut stats = IngestStats::default();

    for entry in WalkDir::new(dir)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("txt") {
            continue;
        }

        let text = std::fs::read_to_string(path)?;
        let source = path.to_string_lossy().to_string();
        let passages = split_document(&source, &text, chunk_size, overlap)?;

        let written = store.upsert(&passages).await?;
        tracing::debug!("Indexed {} passages from {:?}", written, path);

        stats.files += 1;
        stats.chunks += written;
    }

    tracing::info!(
        "Indexed {} blog files into {} passages",
        stats.files,
        stats.chunks
    );

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::TrigramProvider;
    use crate::vector_store::MemoryVectorStore;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_chunk_id_is_stable_and_source_scoped() {
        assert_eq!(chunk_id("a.txt", "text"), chunk_id("a.txt", "text"));
        assert_ne!(chunk_id("a.txt", "text"), chunk_id("b.txt", "text"));
        assert_eq!(chunk_id("a.txt", "text").len(), 64);
    }

    #[test]
    fn test_split_document_respects_chunk_size() {
        let text = "Refresh ads weekly. Improve targeting. Test new formats. ".repeat(10);
        let passages = split_document("blog.txt", &text, 100, 20).unwrap();

        assert!(passages.len() > 1);
        assert!(passages.iter().all(|p| p.text.chars().count() <= 100));
        assert!(passages.iter().all(|p| p.source == "blog.txt"));
    }

    #[test]
    fn test_split_document_drops_repeated_passages() {
        let text = "Refresh ads weekly. ".repeat(5);
        let passages = split_document("blog.txt", &text, 20, 0).unwrap();

        assert_eq!(passages.len(), 1);
        assert_eq!(passages[0].text, "Refresh ads weekly.");
    }

    #[tokio::test]
    async fn test_index_blogs_counts_unique_passages() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("repeat.txt"),
            "Refresh ads weekly. ".repeat(5),
        )
        .unwrap();

        let store = MemoryVectorStore::new(Arc::new(TrigramProvider::new(64)));
        let stats = index_blogs(temp.path(), &store, 20, 0).await.unwrap();
        assert_eq!(stats.chunks, 1);
        assert_eq!(store.count().await.unwrap(), stats.chunks);
    }

    #[test]
    fn test_overlap_larger_than_chunk_is_rejected() {
        assert!(split_document("blog.txt", "text", 10, 20).is_err());
    }

    #[tokio::test]
    async fn test_index_blogs_reads_only_txt_and_is_idempotent() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("ctr.txt"),
            "CTR may dip due to ad fatigue. Refresh ads weekly, improve targeting.",
        )
        .unwrap();
        std::fs::write(
            temp.path().join("email.txt"),
            "Segment your audience carefully. Personalize subject lines.",
        )
        .unwrap();
        std::fs::write(temp.path().join("notes.md"), "ignored").unwrap();

        let store = MemoryVectorStore::new(Arc::new(TrigramProvider::new(64)));
        let stats = index_blogs(temp.path(), &store, 100, 20).await.unwrap();
        assert_eq!(stats.files, 2);
        assert!(stats.chunks >= 2);

        let count = store.count().await.unwrap();
        index_blogs(temp.path(), &store, 100, 20).await.unwrap();
        assert_eq!(store.count().await.unwrap(), count);
    }

    #[tokio::test]
    async fn test_missing_directory_is_an_error() {
        let store = MemoryVectorStore::new(Arc::new(TrigramProvider::new(64)));
        let result = index_blogs(Path::new("/nonexistent/blogs"), &store, 100, 20).await;
        assert!(result.is_err());
    }
}
