//! Ask command handler.

use crate::server::load_dataset;
use clap::Args;
use insight_agent::{AgentOrchestrator, CampaignDataset};
use insight_core::{config::AppConfig, AppError, AppResult};
use std::path::PathBuf;

/// Answer a question, optionally grounded in a campaign CSV
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// Campaign CSV to summarize into the context
    #[arg(long)]
    pub csv: Option<PathBuf>,

    /// Output as JSON ({answer, evidence})
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");

        if self.question.trim().is_empty() {
            return Err(AppError::Config("Question must not be empty".to_string()));
        }

        let dataset = match &self.csv {
            Some(path) => {
                let path = config.resolve(path);
                load_dataset(move || CampaignDataset::from_path(&path)).await
            }
            None => None,
        };

        let orchestrator = AgentOrchestrator::connect(config).await?;
        let result = orchestrator.answer(&self.question, dataset).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&result)?);
        } else {
            println!("{}", result.answer);
        }

        Ok(())
    }
}
