//! Marketing insight agent.
//!
//! Answers analyst questions about campaign performance: retrieves evidence,
//! summarizes the campaign dataset, drafts an answer and refines it through
//! critique and revision.

pub mod context;
pub mod critique;
pub mod dataset;
pub mod generation;
pub mod orchestrator;
pub mod prompts;
pub mod refine;
pub mod summary;

pub use context::{Context, ContextAssembler};
pub use critique::{Critic, Critique, HeuristicCritic, Issue, IssueKind, LlmCritic, Severity};
pub use dataset::CampaignDataset;
pub use generation::Generator;
pub use orchestrator::{AgentOrchestrator, AgentResult, AgentRun, AgentSettings};
pub use prompts::PromptTemplates;
pub use refine::{
    Draft, DraftStatus, LlmReviser, Refinement, RefinementIteration, Reviser, SelfRefinementLoop,
    StopReason,
};
pub use summary::{DatasetSummarizer, DescribeSummarizer};
