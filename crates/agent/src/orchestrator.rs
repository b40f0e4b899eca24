//! Request pipeline: retrieve → assemble context → draft → refine.

use crate::context::ContextAssembler;
use crate::critique::{Critic, HeuristicCritic, LlmCritic, Severity};
use crate::dataset::CampaignDataset;
use crate::generation::Generator;
use crate::prompts::PromptTemplates;
use crate::refine::{Draft, LlmReviser, Refinement, SelfRefinementLoop};
use crate::summary::{summarize_with_timeout, DatasetSummarizer, DescribeSummarizer};
use insight_core::{AppConfig, AppError, AppResult};
use insight_knowledge::{EvidenceSet, HybridRetriever, Query, RetrievalReport};
use insight_llm::{create_client, LlmClient};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// The only artifact a caller sees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    pub answer: String,

    /// Evidence passages in rank order
    pub evidence: Vec<String>,
}

/// A finished request with its working state, for logging and tests.
#[derive(Debug, Clone)]
pub struct AgentRun {
    pub result: AgentResult,
    pub refinement: Refinement,
    pub retrieval: RetrievalReport,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentSettings {
    pub summarizer_timeout: Duration,

    /// Overall budget for one request
    pub deadline: Duration,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            summarizer_timeout: Duration::from_secs(5),
            deadline: Duration::from_secs(60),
        }
    }
}

impl AgentSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            summarizer_timeout: Duration::from_millis(config.context.summarizer_timeout_ms),
            deadline: Duration::from_millis(config.agent.deadline_ms),
        }
    }
}

pub struct AgentOrchestrator {
    retriever: HybridRetriever,
    generator: Generator,
    templates: Arc<PromptTemplates>,
    assembler: ContextAssembler,
    summarizer: Arc<dyn DatasetSummarizer>,
    refinement: SelfRefinementLoop,
    settings: AgentSettings,
}

impl AgentOrchestrator {
    pub fn new(
        retriever: HybridRetriever,
        generator: Generator,
        templates: Arc<PromptTemplates>,
        refinement: SelfRefinementLoop,
        settings: AgentSettings,
    ) -> Self {
        Self {
            retriever,
            generator,
            templates,
            assembler: ContextAssembler::default(),
            summarizer: Arc::new(DescribeSummarizer),
            refinement,
            settings,
        }
    }

    pub fn with_assembler(mut self, assembler: ContextAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    pub fn with_summarizer(mut self, summarizer: Arc<dyn DatasetSummarizer>) -> Self {
        self.summarizer = summarizer;
        self
    }

    /// Wire an orchestrator from configuration around existing handles.
    pub fn from_config(
        config: &AppConfig,
        retriever: HybridRetriever,
        client: Arc<dyn LlmClient>,
    ) -> AppResult<Self> {
        let templates = Arc::new(PromptTemplates::new()?);
        let generator = Generator::from_config(client, config);
        let heuristic = HeuristicCritic::new(config.refinement.max_answer_words);

        let critic: Arc<dyn Critic> = match config.refinement.critic.as_str() {
            "heuristic" => Arc::new(heuristic),
            "llm" => Arc::new(LlmCritic::new(
                generator.clone(),
                templates.clone(),
                heuristic,
            )),
            other => {
                return Err(AppError::Config(format!(
                    "Unknown critic: {}. Supported: heuristic, llm",
                    other
                )))
            }
        };
        let threshold: Severity = config.refinement.severity_threshold.parse()?;
        let reviser = Arc::new(LlmReviser::new(generator.clone(), templates.clone()));
        let refinement = SelfRefinementLoop::new(
            critic,
            reviser,
            threshold,
            config.refinement.max_iterations,
        );

        Ok(Self::new(
            retriever,
            generator,
            templates,
            refinement,
            AgentSettings::from_config(config),
        )
        .with_assembler(ContextAssembler::from_config(&config.context)))
    }

    /// Open the configured back ends and build an orchestrator.
    pub async fn connect(config: &AppConfig) -> AppResult<Self> {
        let retriever = insight_knowledge::open_retriever(config).await?;
        let client = create_client(
            &config.provider,
            config.endpoint.as_deref(),
            config.api_key.as_deref(),
            Duration::from_millis(config.request_timeout_ms),
        )
        .map_err(AppError::Config)?;

        Self::from_config(config, retriever, client)
    }

    /// Answer a question, optionally grounded in a campaign dataset.
    ///
    /// Retrieval and summary problems only reduce the context. The only
    /// back-end failure returned is `AppError::Generation`, when no first
    /// draft could be produced.
    pub async fn answer(
        &self,
        question: &str,
        dataset: Option<Arc<CampaignDataset>>,
    ) -> AppResult<AgentResult> {
        Ok(self.run(question, dataset).await?.result)
    }

    pub async fn run(
        &self,
        question: &str,
        dataset: Option<Arc<CampaignDataset>>,
    ) -> AppResult<AgentRun> {
        let request_id = Uuid::new_v4();
        let span = info_span!("answer", %request_id);
        self.run_inner(question, dataset).instrument(span).await
    }

    async fn run_inner(
        &self,
        question: &str,
        dataset: Option<Arc<CampaignDataset>>,
    ) -> AppResult<AgentRun> {
        let deadline = Instant::now() + self.settings.deadline;
        let query = Query::new(question);
        info!(provider = self.generator.provider_name(), "Answering question");

        let summary = async {
            match dataset {
                Some(dataset) => {
                    summarize_with_timeout(
                        self.summarizer.clone(),
                        dataset,
                        self.settings.summarizer_timeout,
                    )
                    .await
                }
                None => Err(AppError::Dataset("No dataset supplied".to_string())),
            }
        };
        let retrieval = async {
            let lookup = self.retriever.retrieve_detailed(&query);
            match tokio::time::timeout_at(deadline, lookup).await {
                Ok(report) => report,
                Err(_) => {
                    warn!("Deadline passed during retrieval; continuing without evidence");
                    RetrievalReport {
                        evidence: EvidenceSet::empty(),
                        hints: 0,
                        graph_unavailable: true,
                        semantic_unavailable: true,
                    }
                }
            }
        };
        let (retrieval, summary) = tokio::join!(retrieval, summary);

        let context = self.assembler.assemble(summary, &retrieval.evidence);
        info!(
            evidence = context.evidence_count,
            summary = context.summary_available,
            "Context assembled"
        );

        let prompt = self.templates.draft(question, &context)?;
        let text = match tokio::time::timeout_at(deadline, self.generator.generate(prompt)).await {
            Ok(Ok(text)) if !text.is_empty() => text,
            Ok(Ok(_)) => {
                return Err(AppError::Generation(
                    "The model returned an empty draft".to_string(),
                ))
            }
            Ok(Err(e)) => return Err(AppError::Generation(e.to_string())),
            Err(_) => {
                return Err(AppError::Generation(
                    "Deadline passed before a draft was produced".to_string(),
                ))
            }
        };

        let draft = Draft::new(text, retrieval.evidence.clone());
        let (draft, refinement) = self
            .refinement
            .refine_draft(draft, question, &context, Some(deadline))
            .await;

        info!(
            revisions = refinement.revisions,
            stop = ?refinement.stop,
            "Answer ready"
        );

        Ok(AgentRun {
            result: AgentResult {
                answer: draft.text,
                evidence: draft.evidence.contents(),
            },
            refinement,
            retrieval,
        })
    }
}
