//! Evidence scoring and ranking rules.
//!
//! Kept free of I/O so the fusion arithmetic can be audited and tested on
//! its own.

use crate::types::{EvidenceChunk, Provenance};
use std::cmp::Ordering;

/// Replace NaN with zero so every score has a total order.
pub fn sanitize(score: f32) -> f32 {
    if score.is_nan() {
        0.0
    } else {
        score
    }
}

/// Score after provenance adjustment.
///
/// Only chunks confirmed by both the graph and semantic search are boosted.
/// The boost is additive, so two chunks boosted by the same amount keep
/// their relative order, and a non-negative boost never lowers a chunk.
pub fn adjusted_score(raw: f32, provenance: Provenance, boost: f32) -> f32 {
    let raw = sanitize(raw);
    match provenance {
        Provenance::Both => raw + boost.max(0.0),
        Provenance::Graph | Provenance::Semantic => raw,
    }
}

/// Evidence ordering: descending score, then provenance priority.
///
/// Equal elements compare `Equal`; callers rely on a stable sort to keep
/// discovery order as the final tie-break.
pub fn evidence_order(a: &EvidenceChunk, b: &EvidenceChunk) -> Ordering {
    sanitize(b.score)
        .total_cmp(&sanitize(a.score))
        .then_with(|| b.provenance.priority().cmp(&a.provenance.priority()))
}
