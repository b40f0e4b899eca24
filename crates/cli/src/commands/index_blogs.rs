//! Index-blogs command handler.

use clap::Args;
use insight_core::{config::AppConfig, AppResult};
use insight_knowledge::ingest::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use std::path::PathBuf;

/// Index blog posts into the vector store
#[derive(Args, Debug)]
pub struct IndexBlogsCommand {
    /// Directory of *.txt blog posts
    #[arg(default_value = "blogs/data")]
    pub dir: PathBuf,

    /// Passage size in characters
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// Characters shared between neighbouring passages
    #[arg(long, default_value_t = DEFAULT_CHUNK_OVERLAP)]
    pub overlap: usize,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IndexBlogsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let dir = config.resolve(&self.dir);
        tracing::info!("Indexing blogs from {:?}", dir);

        let store = insight_knowledge::open_vector_store(config).await?;
        let stats =
            insight_knowledge::index_blogs(&dir, store.as_ref(), self.chunk_size, self.overlap)
                .await?;
        let total = store.count().await?;

        if self.json {
            let output = serde_json::json!({
                "files": stats.files,
                "passages": stats.chunks,
                "indexed": total,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!(
                "Indexed {} files into {} passages ({} in store)",
                stats.files, stats.chunks, total
            );
        }

        Ok(())
    }
}
