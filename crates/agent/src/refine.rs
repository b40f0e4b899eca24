//! Self-refinement: critique and revise a draft until it is good enough.
//!
//! The loop critiques at most `max_iterations + 1` times and revises at most
//! `max_iterations` times. Whatever happens, it returns an answer: critique
//! or revision failures stop early with the last good draft, and so does an
//! expired deadline.

use crate::context::Context;
use crate::critique::{Critic, Critique, Severity};
use crate::generation::Generator;
use crate::prompts::PromptTemplates;
use insight_core::AppResult;
use insight_knowledge::EvidenceSet;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Rewrites a draft in light of a critique.
#[async_trait::async_trait]
pub trait Reviser: Send + Sync {
    async fn revise(
        &self,
        question: &str,
        draft: &str,
        critique: &Critique,
        context: &Context,
    ) -> AppResult<String>;
}

/// Revision through the generation capability.
pub struct LlmReviser {
    generator: Generator,
    templates: Arc<PromptTemplates>,
}

impl LlmReviser {
    pub fn new(generator: Generator, templates: Arc<PromptTemplates>) -> Self {
        Self {
            generator,
            templates,
        }
    }
}

#[async_trait::async_trait]
impl Reviser for LlmReviser {
    async fn revise(
        &self,
        question: &str,
        draft: &str,
        critique: &Critique,
        context: &Context,
    ) -> AppResult<String> {
        let prompt = self
            .templates
            .revise(question, draft, &critique.to_json(), context)?;
        self.generator.generate(prompt).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftStatus {
    Pending,
    Accepted,
}

/// A candidate answer and the evidence it was conditioned on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Draft {
    pub text: String,
    pub evidence: EvidenceSet,
    pub status: DraftStatus,
}

impl Draft {
    pub fn new(text: impl Into<String>, evidence: EvidenceSet) -> Self {
        Self {
            text: text.into(),
            evidence,
            status: DraftStatus::Pending,
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.status == DraftStatus::Accepted
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefinementIteration {
    pub index: usize,
    pub draft: String,
    pub critique: Critique,
    pub accepted: bool,
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The critique found nothing at or above the threshold
    Accepted,
    /// Revisions ran out; the last draft is kept regardless
    Exhausted,
    /// A critique or revision failed; the last good draft is kept
    Stalled,
    /// The request deadline passed; the best draft so far is kept
    DeadlineExceeded,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Refinement {
    pub answer: String,
    pub iterations: Vec<RefinementIteration>,
    pub revisions: usize,
    pub stop: StopReason,
}

impl Refinement {
    pub fn critiques(&self) -> usize {
        self.iterations.len()
    }
}

/// Await `fut` unless `deadline` passes first.
async fn before<F: Future>(deadline: Option<Instant>, fut: F) -> Option<F::Output> {
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, fut).await.ok(),
        None => Some(fut.await),
    }
}

pub struct SelfRefinementLoop {
    critic: Arc<dyn Critic>,
    reviser: Arc<dyn Reviser>,
    threshold: Severity,
    max_iterations: usize,
}

impl SelfRefinementLoop {
    pub fn new(
        critic: Arc<dyn Critic>,
        reviser: Arc<dyn Reviser>,
        threshold: Severity,
        max_iterations: usize,
    ) -> Self {
        Self {
            critic,
            reviser,
            threshold,
            max_iterations,
        }
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Refine a draft; an accepted draft comes back untouched.
    pub async fn refine_draft(
        &self,
        draft: Draft,
        question: &str,
        context: &Context,
        deadline: Option<Instant>,
    ) -> (Draft, Refinement) {
        if draft.is_accepted() {
            debug!("Draft already accepted; skipping refinement");
            let refinement = Refinement {
                answer: draft.text.clone(),
                iterations: Vec::new(),
                revisions: 0,
                stop: StopReason::Accepted,
            };
            return (draft, refinement);
        }

        let refinement = self.refine(&draft.text, question, context, deadline).await;
        let status = if refinement.stop == StopReason::Accepted {
            DraftStatus::Accepted
        } else {
            DraftStatus::Pending
        };
        let refined = Draft {
            text: refinement.answer.clone(),
            evidence: draft.evidence,
            status,
        };
        (refined, refinement)
    }

    pub async fn refine(
        &self,
        initial: &str,
        question: &str,
        context: &Context,
        deadline: Option<Instant>,
    ) -> Refinement {
        let mut current = initial.to_string();
        let mut iterations = Vec::new();
        let mut revisions = 0;
        let mut index = 0;

        let stop = loop {
            let critique = match before(deadline, self.critic.critique(&current, context)).await {
                Some(Ok(critique)) => critique,
                Some(Err(e)) => {
                    warn!("Critique failed at iteration {}: {}", index, e);
                    break StopReason::Stalled;
                }
                None => break StopReason::DeadlineExceeded,
            };

            let accepted = critique.is_acceptable(self.threshold);
            debug!(
                iteration = index,
                issues = critique.issues.len(),
                accepted,
                "Critiqued draft"
            );

            if accepted || index == self.max_iterations {
                iterations.push(RefinementIteration {
                    index,
                    draft: current.clone(),
                    critique,
                    accepted,
                });
                break if accepted {
                    StopReason::Accepted
                } else {
                    StopReason::Exhausted
                };
            }

            let revised = before(
                deadline,
                self.reviser.revise(question, &current, &critique, context),
            )
            .await;
            iterations.push(RefinementIteration {
                index,
                draft: current.clone(),
                critique,
                accepted: false,
            });

            match revised {
                Some(Ok(text)) if !text.trim().is_empty() => {
                    current = text;
                    revisions += 1;
                    index += 1;
                }
                Some(Ok(_)) => {
                    warn!("Revision {} came back empty", index);
                    break StopReason::Stalled;
                }
                Some(Err(e)) => {
                    warn!("Revision failed at iteration {}: {}", index, e);
                    break StopReason::Stalled;
                }
                None => break StopReason::DeadlineExceeded,
            }
        };

        info!(
            revisions,
            critiques = iterations.len(),
            stop = ?stop,
            "Refinement finished"
        );

        Refinement {
            answer: current,
            iterations,
            revisions,
            stop,
        }
    }
}
