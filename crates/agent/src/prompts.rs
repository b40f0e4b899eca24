//! Handlebars prompt templates for drafting, critiquing and revising.

use crate::context::Context;
use handlebars::Handlebars;
use insight_core::{AppError, AppResult};
use serde_json::json;

pub const DRAFT_TEMPLATE: &str = "\
You're a marketing analyst. Analyze the campaign performance data and answer the question.

**CSV Summary**:
{{summary}}

**Related Blog Insights**:
{{#if evidence}}{{evidence}}{{else}}No supporting blog evidence was found.{{/if}}

**User Question**:
{{question}}

Be concise, data-backed, and actionable.";

pub const CRITIQUE_TEMPLATE: &str = "\
You are reviewing a marketing analyst's answer against the data it was given.

**CSV Summary**:
{{summary}}

**Related Blog Insights**:
{{evidence}}

**Answer under review**:
{{draft}}

List problems with the answer: claims not traceable to the data above, vague or \
non-actionable advice, and statements that contradict each other.
Respond with JSON only, in this shape:
{\"issues\": [{\"kind\": \"unsupported_claim|factual_gap|vague|inconsistency|verbosity|missing_data_reference\", \
\"severity\": \"low|medium|high\", \"detail\": \"...\"}]}
Return {\"issues\": []} when the answer has no problems.";

pub const REVISE_TEMPLATE: &str = "\
You're a marketing analyst revising your answer after review.

**CSV Summary**:
{{summary}}

**Related Blog Insights**:
{{evidence}}

**Question**:
{{question}}

**Previous answer**:
{{draft}}

**Review findings**:
{{#each issues}}- [{{this.severity}}] {{this.kind}}: {{this.detail}}
{{/each}}
Rewrite the answer so every finding is addressed. Only use figures that appear in \
the data above. Be concise, data-backed, and actionable. Return only the revised answer.";

/// Pre-registered prompt templates.
pub struct PromptTemplates {
    registry: Handlebars<'static>,
}

impl PromptTemplates {
    pub fn new() -> AppResult<Self> {
        let mut registry = Handlebars::new();

        // Prompts are plain text
        registry.register_escape_fn(handlebars::no_escape);
        registry.set_strict_mode(false);

        for (name, template) in [
            ("draft", DRAFT_TEMPLATE),
            ("critique", CRITIQUE_TEMPLATE),
            ("revise", REVISE_TEMPLATE),
        ] {
            registry
                .register_template_string(name, template)
                .map_err(|e| AppError::Prompt(format!("Failed to register template {}: {}", name, e)))?;
        }

        Ok(Self { registry })
    }

    fn render(&self, name: &str, data: &serde_json::Value) -> AppResult<String> {
        self.registry
            .render(name, data)
            .map_err(|e| AppError::Prompt(format!("Failed to render template {}: {}", name, e)))
    }

    pub fn draft(&self, question: &str, context: &Context) -> AppResult<String> {
        self.render(
            "draft",
            &json!({
                "summary": context.summary,
                "evidence": context.evidence,
                "question": question,
            }),
        )
    }

    pub fn critique(&self, draft: &str, context: &Context) -> AppResult<String> {
        self.render(
            "critique",
            &json!({
                "summary": context.summary,
                "evidence": context.evidence,
                "draft": draft,
            }),
        )
    }

    pub fn revise(
        &self,
        question: &str,
        draft: &str,
        issues: &serde_json::Value,
        context: &Context,
    ) -> AppResult<String> {
        self.render(
            "revise",
            &json!({
                "summary": context.summary,
                "evidence": context.evidence,
                "question": question,
                "draft": draft,
                "issues": issues,
            }),
        )
    }
}
