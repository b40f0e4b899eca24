//! LanceDB-backed passage store.

use crate::embeddings::{cosine_similarity, EmbeddingProvider};
use crate::vector_store::{rank_scored, StoredPassage, VectorStore};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use futures::TryStreamExt;
use insight_core::{AppError, AppResult};
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::Table;
use std::path::Path;
use std::sync::Arc;

/// Passage store over a LanceDB table `(id, source, text, embedding)`.
pub struct LanceDbStore {
    table: Table,
    embedder: Arc<dyn EmbeddingProvider>,
    dimensions: usize,
}

impl LanceDbStore {
    /// Open the table at `db_path`, creating it when missing.
    pub async fn open(
        db_path: &Path,
        table_name: &str,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> AppResult<Self> {
        std::fs::create_dir_all(db_path).map_err(|e| {
            AppError::Knowledge(format!("Failed to create index directory: {}", e))
        })?;

        let uri = db_path.to_string_lossy().to_string();
        let conn = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| AppError::Knowledge(format!("Failed to connect to LanceDB: {}", e)))?;

        let table_names = conn
            .table_names()
            .execute()
            .await
            .map_err(|e| AppError::Knowledge(format!("Failed to list tables: {}", e)))?;

        let dimensions = embedder.dimensions();
        let table = if table_names.iter().any(|name| name == table_name) {
            conn.open_table(table_name)
                .execute()
                .await
                .map_err(|e| AppError::Knowledge(format!("Failed to open table: {}", e)))?
        } else {
            let schema = Self::schema(dimensions);
            let empty_batch = RecordBatch::new_empty(schema.clone());

            conn.create_table(
                table_name,
                RecordBatchIterator::new(vec![Ok(empty_batch)], schema),
            )
            .execute()
            .await
            .map_err(|e| AppError::Knowledge(format!("Failed to create table: {}", e)))?
        };

        tracing::debug!("Opened LanceDB table '{}' at {:?}", table_name, db_path);

        Ok(Self {
            table,
            embedder,
            dimensions,
        })
    }

    fn schema(dimensions: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("source", DataType::Utf8, false),
            Field::new("text", DataType::Utf8, false),
            Field::new(
                "embedding",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    dimensions as i32,
                ),
                false,
            ),
        ]))
    }

    fn to_batch(&self, passages: &[StoredPassage], embeddings: &[Vec<f32>]) -> AppResult<RecordBatch> {
        let mut flat = Vec::with_capacity(passages.len() * self.dimensions);
        for embedding in embeddings {
            if embedding.len() != self.dimensions {
                return Err(AppError::Knowledge(format!(
                    "Embedding dimension mismatch: expected {}, got {}",
                    self.dimensions,
                    embedding.len()
                )));
            }
            flat.extend_from_slice(embedding);
        }

        let ids = StringArray::from_iter_values(passages.iter().map(|p| p.id.as_str()));
        let sources = StringArray::from_iter_values(passages.iter().map(|p| p.source.as_str()));
        let texts = StringArray::from_iter_values(passages.iter().map(|p| p.text.as_str()));
        let embedding_array = FixedSizeListArray::try_new(
            Arc::new(Field::new("item", DataType::Float32, true)),
            self.dimensions as i32,
            Arc::new(Float32Array::from(flat)),
            None,
        )
        .map_err(|e| AppError::Knowledge(format!("Failed to build embedding column: {}", e)))?;

        RecordBatch::try_new(
            Self::schema(self.dimensions),
            vec![
                Arc::new(ids),
                Arc::new(sources),
                Arc::new(texts),
                Arc::new(embedding_array),
            ],
        )
        .map_err(|e| AppError::Knowledge(format!("Failed to create RecordBatch: {}", e)))
    }

    /// Decode rows and cosine-score them against `query`.
    fn score_rows(batches: &[RecordBatch], query: &[f32]) -> AppResult<Vec<(StoredPassage, f32)>> {
        let mut scored = Vec::new();

        for batch in batches {
            let ids = string_column(batch, "id")?;
            let sources = string_column(batch, "source")?;
            let texts = string_column(batch, "text")?;
            let embeddings = batch
                .column_by_name("embedding")
                .and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>())
                .ok_or_else(|| AppError::Knowledge("Invalid embedding column".to_string()))?;

            for row in 0..batch.num_rows() {
                let values = embeddings.value(row);
                let Some(values) = values.as_any().downcast_ref::<Float32Array>() else {
                    tracing::warn!("Skipping row {} with invalid embedding values", row);
                    continue;
                };
                let embedding: Vec<f32> = values.values().to_vec();

                scored.push((
                    StoredPassage::new(ids.value(row), sources.value(row), texts.value(row)),
                    cosine_similarity(query, &embedding),
                ));
            }
        }

        Ok(scored)
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> AppResult<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| AppError::Knowledge(format!("Invalid {} column", name)))
}

/// SQL `IN` list with single quotes escaped.
fn id_predicate(ids: &[String]) -> String {
    let quoted: Vec<String> = ids
        .iter()
        .map(|id| format!("'{}'", id.replace('\'', "''")))
        .collect();
    format!("id IN ({})", quoted.join(", "))
}

#[async_trait::async_trait]
impl VectorStore for LanceDbStore {
    async fn similarity_search(&self, text: &str, k: usize) -> AppResult<Vec<(StoredPassage, f32)>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let query = self.embedder.embed(text).await?;
        let batches = self
            .table
            .query()
            .nearest_to(query.clone())
            .map_err(|e| AppError::Knowledge(format!("Failed to create query: {}", e)))?
            .limit(k)
            .execute()
            .await
            .map_err(|e| AppError::Knowledge(format!("Failed to execute search: {}", e)))?
            .try_collect::<Vec<_>>()
            .await
            .map_err(|e| AppError::Knowledge(format!("Failed to collect results: {}", e)))?;

        // LanceDB ranks by its own distance; rescore with cosine for a stable order
        let scored = Self::score_rows(&batches, &query)?;
        tracing::debug!("Retrieved {} passages (requested top-{})", scored.len(), k);

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

        let query = self.embedder.embed(text).await?;
        let batches = self
            .table
            .query()
            .only_if(id_predicate(ids))
            .limit(ids.len())
            .execute()
            .await
            .map_err(|e| AppError::Knowledge(format!("Failed to fetch passages: {}", e)))?
            .try_collect::<Vec<_>>()
            .await
            .map_err(|e| AppError::Knowledge(format!("Failed to collect passages: {}", e)))?;

        Self::score_rows(&batches, &query)
    }

    async fn upsert(&self, passages: &[StoredPassage]) -> AppResult<usize> {
        if passages.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = passages.iter().map(|p| p.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        let batch = self.to_batch(passages, &embeddings)?;

        let ids: Vec<String> = passages.iter().map(|p| p.id.clone()).collect();
        self.table
            .delete(&id_predicate(&ids))
            .await
            .map_err(|e| AppError::Knowledge(format!("Failed to replace passages: {}", e)))?;

        let schema = batch.schema();
        self.table
            .add(RecordBatchIterator::new(vec![Ok(batch)], schema))
            .execute()
            .await
            .map_err(|e| AppError::Knowledge(format!("Failed to add passages: {}", e)))?;

        tracing::debug!("Upserted {} passages into LanceDB", passages.len());
        Ok(passages.len())
    }

    async fn count(&self) -> AppResult<usize> {
        self.table
            .count_rows(None)
            .await
            .map_err(|e| AppError::Knowledge(format!("Failed to count rows: {}", e)))
    }
}
