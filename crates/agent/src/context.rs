//! Bounded prompt context: dataset summary plus evidence passages.

use insight_core::config::ContextConfig;
use insight_core::AppResult;
use insight_knowledge::EvidenceSet;
use serde::Serialize;
use unicode_segmentation::UnicodeSegmentation;

/// Keep the first `max_chars` user-perceived characters of `text`.
///
/// Never splits a multi-byte sequence or a grapheme cluster.
pub fn truncate_graphemes(text: &str, max_chars: usize) -> &str {
    match text.grapheme_indices(true).nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

/// Text handed to the generation prompts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Context {
    /// Dataset summary, or the placeholder when summarizing failed
    pub summary: String,

    /// False when `summary` is the placeholder
    pub summary_available: bool,

    /// Evidence passages joined in rank order
    pub evidence: String,

    pub evidence_count: usize,
}

impl Context {
    /// Single text blob with both parts.
    pub fn render(&self) -> String {
        format!(
            "CSV Summary:\n{}\n\nRelated Blog Insights:\n{}",
            self.summary, self.evidence
        )
    }
}

#[derive(Debug, Clone)]
pub struct ContextAssembler {
    summary_max_chars: usize,
    separator: String,
    placeholder: String,
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::from_config(&ContextConfig::default())
    }
}

impl ContextAssembler {
    pub fn new(
        summary_max_chars: usize,
        separator: impl Into<String>,
        placeholder: impl Into<String>,
    ) -> Self {
        Self {
            summary_max_chars,
            separator: separator.into(),
            placeholder: placeholder.into(),
        }
    }

    pub fn from_config(config: &ContextConfig) -> Self {
        Self::new(
            config.summary_max_chars,
            config.evidence_separator.clone(),
            config.summary_placeholder.clone(),
        )
    }

    /// Combine a summary attempt with evidence.
    ///
    /// A failed summary is replaced by the placeholder; it never aborts.
    pub fn assemble(&self, summary: AppResult<String>, evidence: &EvidenceSet) -> Context {
        let (summary, summary_available) = match summary {
            Ok(text) => (
                truncate_graphemes(&text, self.summary_max_chars).to_string(),
                true,
            ),
            Err(e) => {
                tracing::warn!("Using summary placeholder: {}", e);
                (self.placeholder.clone(), false)
            }
        };

        Context {
            summary,
            summary_available,
            evidence: evidence.contents().join(&self.separator),
            evidence_count: evidence.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use insight_core::AppError;
    use insight_knowledge::EvidenceChunk;

    fn evidence() -> EvidenceSet {
        EvidenceSet::from_candidates(
            vec![
                EvidenceChunk::semantic("a", "Refresh ads weekly", 0.9),
                EvidenceChunk::semantic("b", "Personalize subject lines", 0.7),
            ],
            5,
        )
    }

    #[test]
    fn test_truncate_keeps_prefix() {
        assert_eq!(truncate_graphemes("abcdef", 3), "abc");
        assert_eq!(truncate_graphemes("abc", 10), "abc");
        assert_eq!(truncate_graphemes("abc", 0), "");
    }

    #[test]
    fn test_truncate_respects_multibyte() {
        assert_eq!(truncate_graphemes("ação", 2), "aç");
        assert_eq!(truncate_graphemes("📧📧📧", 2), "📧📧");
        // e + combining acute stays one character
        assert_eq!(truncate_graphemes("e\u{301}x", 1), "e\u{301}");
    }

    #[test]
    fn test_assemble_joins_evidence_in_order() {
        let context = ContextAssembler::default().assemble(Ok("rows: 3".to_string()), &evidence());

        assert_eq!(context.evidence, "Refresh ads weekly\n\nPersonalize subject lines");
        assert_eq!(context.evidence_count, 2);
        assert!(context.summary_available);
        assert!(context.render().contains("rows: 3"));
    }

    #[test]
    fn test_assemble_caps_summary() {
        let assembler = ContextAssembler::new(5, "\n\n", "n/a");
        let context = assembler.assemble(Ok("0123456789".to_string()), &EvidenceSet::empty());
        assert_eq!(context.summary, "01234");
    }

    #[test]
    fn test_summary_failure_uses_placeholder() {
        let context = ContextAssembler::default().assemble(
            Err(AppError::Dataset("boom".to_string())),
            &evidence(),
        );

        assert_eq!(context.summary, "Could not summarize CSV.");
        assert!(!context.summary_available);
        assert_eq!(context.evidence_count, 2);
    }

    #[test]
    fn test_empty_evidence() {
        let context = ContextAssembler::default().assemble(Ok(String::new()), &EvidenceSet::empty());
        assert!(context.evidence.is_empty());
        assert_eq!(context.evidence_count, 0);
    }
}
