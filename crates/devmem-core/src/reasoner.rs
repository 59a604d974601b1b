//! The `Reasoner` capability: an optional LLM-backed confirmation step for
//! consolidation. Absence is the default; the consolidator's heuristic path
//! is not a fallback bolted onto a `NoOpReasoner`, it is the real path.

use crate::model::Confidence;

pub struct ConsolidationCandidate<'a> {
    pub primary_title: &'a str,
    pub primary_lesson: &'a str,
    pub duplicate_titles: Vec<&'a str>,
    pub avg_similarity: f64,
}

pub struct ReasonerPlan {
    pub confirmed: bool,
    pub merged_description: Option<String>,
    pub confidence_override: Option<Confidence>,
}

pub trait Reasoner: Send + Sync {
    fn confirm_duplicates(&self, candidate: &ConsolidationCandidate<'_>) -> Option<ReasonerPlan>;
}
