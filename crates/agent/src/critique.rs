//! Draft critique: issue taxonomy, deterministic checks and an LLM reviewer.
//!
//! Severity levels:
//! - `UnsupportedClaim` (high): a figure in the draft that the context lacks
//! - `FactualGap` (medium): empty draft, or no overlap with the evidence
//! - `MissingDataReference` (medium): a summary exists but no figure is quoted
//! - `Inconsistency` (medium): reported by the LLM critic only
//! - `Vague` and `Verbosity` (low)

use crate::context::Context;
use crate::generation::Generator;
use crate::prompts::PromptTemplates;
use insight_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

const HEDGING_PHRASES: [&str; 10] = [
    "it depends",
    "various factors",
    "consider improving",
    "might want to",
    "could potentially",
    "in some cases",
    "generally speaking",
    "it is possible that",
    "may or may not",
    "a number of things",
];

const STOP_WORDS: [&str; 20] = [
    "about", "after", "again", "their", "there", "these", "those", "which", "while", "would",
    "could", "should", "where", "other", "being", "every", "because", "through", "under", "within",
];

/// Relative tolerance when matching a quoted figure against the context.
const FIGURE_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl FromStr for Severity {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            other => Err(AppError::Config(format!("Unknown severity: {}", other))),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    UnsupportedClaim,
    FactualGap,
    MissingDataReference,
    Vague,
    Verbosity,
    Inconsistency,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub kind: IssueKind,
    pub severity: Severity,
    pub detail: String,
}

impl Issue {
    pub fn new(kind: IssueKind, severity: Severity, detail: impl Into<String>) -> Self {
        Self {
            kind,
            severity,
            detail: detail.into(),
        }
    }
}

/// Structured feedback on one draft.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Critique {
    pub issues: Vec<Issue>,
}

impl Critique {
    pub fn new(issues: Vec<Issue>) -> Self {
        Self { issues }
    }

    /// Issues at or above `threshold`.
    pub fn actionable(&self, threshold: Severity) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(move |i| i.severity >= threshold)
    }

    /// No issue reaches `threshold`.
    pub fn is_acceptable(&self, threshold: Severity) -> bool {
        self.actionable(threshold).next().is_none()
    }

    /// Append issues not already present (same kind and detail).
    pub fn merge(mut self, other: Critique) -> Self {
        for issue in other.issues {
            let duplicate = self
                .issues
                .iter()
                .any(|i| i.kind == issue.kind && i.detail == issue.detail);
            if !duplicate {
                self.issues.push(issue);
            }
        }
        self
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.issues).unwrap_or(serde_json::Value::Null)
    }
}

/// Evaluates a draft against its context.
#[async_trait::async_trait]
pub trait Critic: Send + Sync {
    async fn critique(&self, draft: &str, context: &Context) -> AppResult<Critique>;
}

/// Numeric tokens as written, e.g. `40%`, `1,200`, `0.034`.
///
/// Bare single digits are skipped; they are usually list markers or counts.
pub fn extract_figures(text: &str) -> Vec<(String, f64)> {
    let mut figures = Vec::new();
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        if !chars[i].is_ascii_digit() {
            i += 1;
            continue;
        }

        let start = i;
        while i < chars.len()
            && (chars[i].is_ascii_digit()
                || ((chars[i] == '.' || chars[i] == ',')
                    && chars.get(i + 1).is_some_and(|c| c.is_ascii_digit())))
        {
            i += 1;
        }
        let percent = chars.get(i) == Some(&'%');

        let raw: String = chars[start..i].iter().collect();
        let cleaned = raw.replace(',', "");
        if let Ok(value) = cleaned.parse::<f64>() {
            let trivial = !percent && !raw.contains('.') && raw.len() == 1;
            if !trivial {
                let written = if percent { format!("{}%", raw) } else { raw };
                figures.push((written, value));
            }
        }
        if percent {
            i += 1;
        }
    }

    figures
}

fn figure_supported(value: f64, known: &[f64]) -> bool {
    let candidates = [value, value / 100.0, value * 100.0];
    known.iter().any(|k| {
        candidates.iter().any(|c| {
            let scale = c.abs().max(k.abs());
            if scale == 0.0 {
                true
            } else {
                (c - k).abs() / scale <= FIGURE_TOLERANCE
            }
        })
    })
}

fn salient_terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|w| w.chars().count() > 4 && !STOP_WORDS.contains(&w.as_str()))
        .collect()
}

/// Deterministic checks; the same draft and context always give the same critique.
#[derive(Debug, Clone)]
pub struct HeuristicCritic {
    max_words: usize,
}

impl Default for HeuristicCritic {
    fn default() -> Self {
        Self { max_words: 250 }
    }
}

impl HeuristicCritic {
    pub fn new(max_words: usize) -> Self {
        Self { max_words }
    }

    pub fn evaluate(&self, draft: &str, context: &Context) -> Critique {
        let mut issues = Vec::new();
        let draft = draft.trim();

        if draft.is_empty() {
            issues.push(Issue::new(
                IssueKind::FactualGap,
                Severity::Medium,
                "The answer is empty",
            ));
            return Critique::new(issues);
        }

        let figures = extract_figures(draft);
        let known: Vec<f64> = extract_figures(&context.render())
            .into_iter()
            .map(|(_, v)| v)
            .collect();
        let unsupported: Vec<&str> = figures
            .iter()
            .filter(|(_, v)| !figure_supported(*v, &known))
            .map(|(w, _)| w.as_str())
            .collect();
        if !unsupported.is_empty() {
            issues.push(Issue::new(
                IssueKind::UnsupportedClaim,
                Severity::High,
                format!(
                    "Figures not found in the data: {}",
                    unsupported.join(", ")
                ),
            ));
        }

        if context.evidence_count > 0 {
            let evidence_terms = salient_terms(&context.evidence);
            let draft_terms = salient_terms(draft);
            if !evidence_terms.is_empty() && evidence_terms.is_disjoint(&draft_terms) {
                issues.push(Issue::new(
                    IssueKind::FactualGap,
                    Severity::Medium,
                    "The answer does not use any of the retrieved evidence",
                ));
            }
        }

        if context.summary_available && figures.is_empty() {
            issues.push(Issue::new(
                IssueKind::MissingDataReference,
                Severity::Medium,
                "The answer quotes no figures from the campaign data",
            ));
        }

        let lower = draft.to_lowercase();
        let hedges: Vec<&str> = HEDGING_PHRASES
            .iter()
            .copied()
            .filter(|p| lower.contains(p))
            .collect();
        if !hedges.is_empty() {
            issues.push(Issue::new(
                IssueKind::Vague,
                Severity::Low,
                format!("Non-actionable phrasing: {}", hedges.join(", ")),
            ));
        }

        let words = draft.split_whitespace().count();
        if words > self.max_words {
            issues.push(Issue::new(
                IssueKind::Verbosity,
                Severity::Low,
                format!("{} words, limit is {}", words, self.max_words),
            ));
        }

        Critique::new(issues)
    }
}

#[async_trait::async_trait]
impl Critic for HeuristicCritic {
    async fn critique(&self, draft: &str, context: &Context) -> AppResult<Critique> {
        Ok(self.evaluate(draft, context))
    }
}

#[derive(Debug, Deserialize)]
struct RawCritique {
    #[serde(default)]
    issues: Vec<RawIssue>,
}

#[derive(Debug, Deserialize)]
struct RawIssue {
    kind: String,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    detail: String,
}

fn default_severity(kind: IssueKind) -> Severity {
    match kind {
        IssueKind::UnsupportedClaim => Severity::High,
        IssueKind::FactualGap | IssueKind::MissingDataReference | IssueKind::Inconsistency => {
            Severity::Medium
        }
        IssueKind::Vague | IssueKind::Verbosity => Severity::Low,
    }
}

/// Parse an LLM critique reply, tolerating code fences and prose around the JSON.
///
/// Issues of unknown kind are dropped.
pub fn parse_critique(reply: &str) -> AppResult<Critique> {
    let start = reply.find('{');
    let end = reply.rfind('}');
    let json = match (start, end) {
        (Some(start), Some(end)) if start < end => &reply[start..=end],
        _ => {
            return Err(AppError::Llm(
                "Critique reply contains no JSON object".to_string(),
            ))
        }
    };

    let raw: RawCritique = serde_json::from_str(json)?;
    let issues = raw
        .issues
        .into_iter()
        .filter_map(|issue| {
            let kind: IssueKind =
                serde_json::from_value(serde_json::Value::String(issue.kind.to_lowercase())).ok()?;
            let severity = issue
                .severity
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(|| default_severity(kind));
            Some(Issue::new(kind, severity, issue.detail))
        })
        .collect();

    Ok(Critique::new(issues))
}

/// Asks the generation capability for a review and merges it with the
/// deterministic checks.
pub struct LlmCritic {
    generator: Generator,
    templates: Arc<PromptTemplates>,
    heuristic: HeuristicCritic,
}

impl LlmCritic {
    pub fn new(generator: Generator, templates: Arc<PromptTemplates>, heuristic: HeuristicCritic) -> Self {
        Self {
            generator,
            templates,
            heuristic,
        }
    }
}

#[async_trait::async_trait]
impl Critic for LlmCritic {
    async fn critique(&self, draft: &str, context: &Context) -> AppResult<Critique> {
        let prompt = self.templates.critique(draft, context)?;
        let reply = self.generator.generate(prompt).await?;
        let reviewed = parse_critique(&reply)?;

        Ok(self.heuristic.evaluate(draft, context).merge(reviewed))
    }
}
