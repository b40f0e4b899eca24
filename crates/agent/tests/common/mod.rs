#![allow(dead_code)]

use insight_agent::{
    AgentOrchestrator, AgentSettings, Critic, Critique, Generator, Issue, IssueKind, LlmReviser,
    PromptTemplates, SelfRefinementLoop, Severity,
};
use insight_agent::Context;
use insight_core::{AppError, AppResult};
use insight_knowledge::embeddings::TrigramProvider;
use insight_knowledge::{
    ConceptGraphIndex, GraphStore, HybridRetriever, MemoryGraphStore, MemoryVectorStore,
    RetrievalSettings, SemanticIndex, StoredPassage, VectorStore,
};
use insight_llm::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const CTR_PASSAGE: &str =
    "CTR may dip due to ad fatigue. Refresh ads weekly, improve targeting, and test new formats.";
pub const EMAIL_PASSAGE: &str =
    "Segment your audience carefully. Personalize subject lines. Strong CTAs drive clicks.";
pub const COPY_PASSAGE: &str =
    "Use urgency in headlines. Localize copy for target audience. Run A/B tests regularly.";

pub const CAMPAIGNS_CSV: &str = "\
Campaign ID,Date,Channel,Acquisition Cost,Clicks,Impressions,ROI
C1,2024-01-05,Email,\"$1,200.00\",120,4000,2.5
C2,2024-01-12,Social,$800,60,3000,1.5
C3,2024-01-19,Email,$400,30,1500,0.5
";

/// LLM fake replaying a fixed script and recording every prompt.
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<(Duration, AppResult<String>)>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn new(replies: Vec<AppResult<String>>) -> Arc<Self> {
        Self::with_delays(replies.into_iter().map(|r| (Duration::ZERO, r)).collect())
    }

    pub fn replying(replies: &[&str]) -> Arc<Self> {
        Self::new(replies.iter().map(|r| Ok(r.to_string())).collect())
    }

    pub fn with_delays(replies: Vec<(Duration, AppResult<String>)>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl LlmClient for ScriptedLlm {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        let next = self.replies.lock().unwrap().pop_front();
        let (delay, reply) =
            next.unwrap_or((Duration::ZERO, Err(AppError::Llm("script exhausted".to_string()))));

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        reply.map(|content| LlmResponse {
            content,
            model: request.model.clone(),
            usage: LlmUsage::default(),
        })
    }
}

/// Critic that always reports one blocking issue.
pub struct AlwaysIssue {
    pub calls: AtomicUsize,
}

impl AlwaysIssue {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Critic for AlwaysIssue {
    async fn critique(&self, _draft: &str, _context: &Context) -> AppResult<Critique> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Critique::new(vec![Issue::new(
            IssueKind::UnsupportedClaim,
            Severity::High,
            "figure not in data",
        )]))
    }
}

pub struct DownGraph;

#[async_trait::async_trait]
impl GraphStore for DownGraph {
    async fn distinct_ids(&self, _cypher: &str, _params: Value) -> AppResult<Vec<String>> {
        Err(AppError::Knowledge("ServiceUnavailable".to_string()))
    }
}

pub struct DownVectors;

#[async_trait::async_trait]
impl VectorStore for DownVectors {
    async fn similarity_search(&self, _: &str, _: usize) -> AppResult<Vec<(StoredPassage, f32)>> {
        Err(AppError::Knowledge("index missing".to_string()))
    }

    async fn fetch_scored(&self, _: &[String], _: &str) -> AppResult<Vec<(StoredPassage, f32)>> {
        Err(AppError::Knowledge("index missing".to_string()))
    }

    async fn upsert(&self, _: &[StoredPassage]) -> AppResult<usize> {
        Err(AppError::Knowledge("index missing".to_string()))
    }

    async fn count(&self) -> AppResult<usize> {
        Ok(0)
    }
}

pub async fn blog_store() -> Arc<MemoryVectorStore> {
    let store = MemoryVectorStore::new(Arc::new(TrigramProvider::new(256)));
    store
        .upsert(&[
            StoredPassage::new("ctr", "blogs/data/Why_CTR_Dips.txt", CTR_PASSAGE),
            StoredPassage::new("email", "blogs/data/Email_Tactics.txt", EMAIL_PASSAGE),
            StoredPassage::new("copy", "blogs/data/Ad_Copy_Tips.txt", COPY_PASSAGE),
        ])
        .await
        .unwrap();
    Arc::new(store)
}

pub fn retrieval_settings() -> RetrievalSettings {
    RetrievalSettings {
        source_timeout: Duration::from_millis(500),
        ..RetrievalSettings::default()
    }
}

pub async fn retriever_with_hints(hints: &[&str]) -> HybridRetriever {
    let graph = MemoryGraphStore::new(hints.iter().map(|h| h.to_string()).collect());
    HybridRetriever::new(
        Some(ConceptGraphIndex::new(Arc::new(graph))),
        SemanticIndex::new(blog_store().await),
        retrieval_settings(),
    )
}

pub fn settings() -> AgentSettings {
    AgentSettings {
        summarizer_timeout: Duration::from_secs(5),
        deadline: Duration::from_secs(10),
    }
}

/// Orchestrator with a custom critic and an LLM-backed reviser.
pub fn orchestrator_with_critic(
    retriever: HybridRetriever,
    llm: Arc<ScriptedLlm>,
    critic: Arc<dyn Critic>,
    max_iterations: usize,
    settings: AgentSettings,
) -> AgentOrchestrator {
    let templates = Arc::new(PromptTemplates::new().unwrap());
    let generator = Generator::new(llm, "test-model");
    let reviser = Arc::new(LlmReviser::new(generator.clone(), templates.clone()));
    let refinement = SelfRefinementLoop::new(critic, reviser, Severity::Medium, max_iterations);

    AgentOrchestrator::new(retriever, generator, templates, refinement, settings)
}
