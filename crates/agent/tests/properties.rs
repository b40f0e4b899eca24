//! Retrieval and refinement guarantees checked across many inputs.

mod common;

use common::*;
use insight_agent::{Context, Draft, DraftStatus, SelfRefinementLoop, Severity, StopReason};
use insight_agent::{Critique, Reviser};
use insight_core::AppResult;
use insight_knowledge::{fuse, ConceptRef, EvidenceChunk, EvidenceSet, Provenance};
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

fn chunk() -> impl Strategy<Value = EvidenceChunk> {
    // Few distinct ids and texts so duplicates are common
    (0u8..6, 0u8..6, 0u32..100).prop_map(|(id, text, score)| {
        let score = score as f32 / 100.0;
        EvidenceChunk::semantic(format!("c{}", id), format!("passage {}", text), score)
    })
}

fn chunks(max: usize) -> impl Strategy<Value = Vec<EvidenceChunk>> {
    prop::collection::vec(chunk(), 0..max)
}

fn graph_chunks() -> impl Strategy<Value = Vec<EvidenceChunk>> {
    chunks(4).prop_map(|chunks| {
        chunks
            .into_iter()
            .map(|c| c.with_provenance(Provenance::Graph))
            .collect()
    })
}

fn hints() -> impl Strategy<Value = Vec<ConceptRef>> {
    prop::collection::vec(0u8..8, 0..4)
        .prop_map(|ids| ids.into_iter().map(|id| ConceptRef::new(format!("c{}", id))).collect())
}

fn rank_of(set: &EvidenceSet, id: &str) -> Option<usize> {
    set.iter().position(|c| c.source_id == id)
}

fn empty_context() -> Context {
    Context {
        summary: String::new(),
        summary_available: false,
        evidence: String::new(),
        evidence_count: 0,
    }
}

struct Echo;

#[async_trait::async_trait]
impl Reviser for Echo {
    async fn revise(&self, _: &str, draft: &str, _: &Critique, _: &Context) -> AppResult<String> {
        Ok(format!("{} (revised)", draft))
    }
}

proptest! {
    #[test]
    fn test_fused_sets_are_unique_bounded_and_sorted(
        hints in hints(),
        semantic in chunks(12),
        hydrated in graph_chunks(),
        boost in 0.0f32..1.0,
        cap in 1usize..8,
    ) {
        let set = fuse(&hints, semantic, hydrated, boost, cap);

        prop_assert!(set.len() <= cap);

        let ids: HashSet<&str> = set.iter().map(|c| c.source_id.as_str()).collect();
        let texts: HashSet<&str> = set.iter().map(|c| c.content.as_str()).collect();
        prop_assert_eq!(ids.len(), set.len());
        prop_assert_eq!(texts.len(), set.len());

        for pair in set.chunks().windows(2) {
            prop_assert!(pair[0].score >= pair[1].score);
            if pair[0].score == pair[1].score {
                prop_assert!(pair[0].provenance.priority() >= pair[1].provenance.priority());
            }
        }
    }

    #[test]
    fn test_hint_never_lowers_rank(
        semantic in prop::collection::vec(chunk(), 1..12),
        pick in any::<prop::sample::Index>(),
        boost in 0.0f32..1.0,
    ) {
        let target = semantic[pick.index(semantic.len())].source_id.clone();

        let plain = fuse(&[], semantic.clone(), Vec::new(), boost, 20);
        let hinted = fuse(&[ConceptRef::new(target.clone())], semantic, Vec::new(), boost, 20);

        if let Some(before) = rank_of(&plain, &target) {
            let after = rank_of(&hinted, &target).expect("hinted chunk dropped");
            prop_assert!(after <= before, "rank {} -> {}", before, after);
            prop_assert_eq!(hinted.chunks()[after].provenance, Provenance::Both);
        }
    }

    #[test]
    fn test_equal_boost_never_reorders(semantic in chunks(12), boost in 0.0f32..1.0) {
        let all: Vec<ConceptRef> = semantic
            .iter()
            .map(|c| ConceptRef::new(c.source_id.clone()))
            .collect();

        let plain = fuse(&[], semantic.clone(), Vec::new(), boost, 20);
        let hinted = fuse(&all, semantic, Vec::new(), boost, 20);

        let plain_ids: Vec<&str> = plain.iter().map(|c| c.source_id.as_str()).collect();
        let hinted_ids: Vec<&str> = hinted.iter().map(|c| c.source_id.as_str()).collect();
        prop_assert_eq!(plain_ids, hinted_ids);
    }
}

#[test]
fn test_equal_boost_keeps_relative_order() {
    let set = fuse(
        &[ConceptRef::new("a"), ConceptRef::new("b")],
        vec![
            EvidenceChunk::semantic("b", "second", 0.6),
            EvidenceChunk::semantic("a", "first", 0.8),
        ],
        Vec::new(),
        0.05,
        5,
    );

    let ids: Vec<&str> = set.iter().map(|c| c.source_id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
}

#[test]
fn test_single_hinted_chunk_example() {
    let set = fuse(
        &[ConceptRef::new("blog-1")],
        vec![EvidenceChunk::semantic("blog-1", "Refresh ads weekly", 0.9)],
        Vec::new(),
        0.05,
        5,
    );

    assert_eq!(set.len(), 1);
    let chunk = &set.chunks()[0];
    assert_eq!(chunk.content, "Refresh ads weekly");
    assert_eq!(chunk.provenance, Provenance::Both);
    assert!((chunk.score - 0.95).abs() < 1e-6);
}

#[test]
fn test_no_hints_example() {
    let set = fuse(
        &[],
        vec![
            EvidenceChunk::semantic("x", "first", 0.8),
            EvidenceChunk::semantic("y", "second", 0.6),
        ],
        Vec::new(),
        0.05,
        5,
    );

    let scores: Vec<f32> = set.iter().map(|c| c.score).collect();
    assert_eq!(scores, vec![0.8, 0.6]);
    assert!(set.iter().all(|c| c.provenance == Provenance::Semantic));
}

#[tokio::test]
async fn test_refinement_terminates_for_every_bound() {
    for max in 0..8 {
        let critic = AlwaysIssue::new();
        let refinement = SelfRefinementLoop::new(critic.clone(), Arc::new(Echo), Severity::Low, max)
            .refine("draft", "q", &empty_context(), None)
            .await;

        assert!(critic.calls() <= max + 1);
        assert_eq!(refinement.revisions, max);
        assert_eq!(refinement.stop, StopReason::Exhausted);
    }
}

#[tokio::test]
async fn test_accepted_draft_is_fixed_point() {
    let refinement_loop =
        SelfRefinementLoop::new(AlwaysIssue::new(), Arc::new(Echo), Severity::Medium, 3);

    let mut draft = Draft::new("Refresh ads weekly.", EvidenceSet::empty());
    draft.status = DraftStatus::Accepted;

    let (again, refinement) = refinement_loop
        .refine_draft(draft.clone(), "q", &empty_context(), None)
        .await;
    assert_eq!(again.text, draft.text);
    assert_eq!(refinement.revisions, 0);
    assert!(refinement.iterations.is_empty());
}
