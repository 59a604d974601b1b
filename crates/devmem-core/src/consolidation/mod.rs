//! Duplicate detection and merging of near-duplicate learnings, run
//! periodically or on demand against both stores.

use std::sync::Arc;

use serde::Serialize;

use crate::embeddings::Embedder;
use crate::error::ConsolidationError;
use crate::model::{ChunkMetadata, Collection, Confidence, Learning};
use crate::reasoner::{ConsolidationCandidate, Reasoner};
use crate::search::vector::VectorIndex;
use crate::storage::Store;

const MIN_SIMILARITY_HEURISTIC: f64 = 0.90;
const MIN_SIMILARITY_WITH_REASONER: f64 = 0.85;

#[derive(Debug, Default, Clone, Serialize)]
pub struct ConsolidationReport {
    pub merged_count: usize,
    pub links_updated: usize,
    pub groups_considered: usize,
}

pub struct Consolidator {
    store: Arc<Store>,
    vectors: Arc<VectorIndex>,
    embedder: Arc<dyn Embedder>,
    reasoner: Option<Arc<dyn Reasoner>>,
    /// Vector collection namespace; see `QueryRouter::collection_prefix`.
    project_id: String,
}

struct Candidate {
    primary: Learning,
    duplicates: Vec<Learning>,
    #[allow(dead_code)]
    avg_similarity: f64,
}

impl Consolidator {
    pub fn new(
        store: Arc<Store>,
        vectors: Arc<VectorIndex>,
        embedder: Arc<dyn Embedder>,
        reasoner: Option<Arc<dyn Reasoner>>,
        project_id: String,
    ) -> Self {
        Self { store, vectors, embedder, reasoner, project_id }
    }

    pub fn run(&self, category: Option<&str>, dry_run: bool) -> Result<ConsolidationReport, ConsolidationError> {
        let min_similarity = if self.reasoner.is_some() { MIN_SIMILARITY_WITH_REASONER } else { MIN_SIMILARITY_HEURISTIC };

        let pending = self.store.unprocessed_learnings(category, 0)?;
        let mut processed_ids = Vec::new();
        let mut report = ConsolidationReport::default();

        for primary in pending {
            if processed_ids.contains(&primary.id) {
                continue;
            }

            let text = format!("{} {}", primary.title, primary.lesson);
            let query_vector = self.embedder.embed(&[text.clone()])?;
            let hits = self
                .vectors
                .query(&Collection::Learnings, &self.project_id, &query_vector[0], 10)?;

            let mut duplicates = Vec::new();
            let mut similarities = Vec::new();
            for hit in hits {
                if hit.id == primary.id || processed_ids.contains(&hit.id) {
                    continue;
                }
                let similarity = hit.similarity() as f64;
                if similarity < min_similarity {
                    continue;
                }
                if let Ok(learning) = self.store.get_learning(&hit.id) {
                    duplicates.push(learning);
                    similarities.push(similarity);
                }
            }

            processed_ids.push(primary.id.clone());
            for d in &duplicates {
                processed_ids.push(d.id.clone());
            }

            if duplicates.is_empty() {
                continue;
            }

            report.groups_considered += 1;
            let avg_similarity = similarities.iter().sum::<f64>() / similarities.len() as f64;
            let candidate = Candidate { primary, duplicates, avg_similarity };

            if !dry_run {
                let outcome = self.merge(&candidate)?;
                report.merged_count += outcome.merged_count;
                report.links_updated += outcome.links_updated;
            }
        }

        if !processed_ids.is_empty() && !dry_run {
            self.store.mark_processed(&processed_ids)?;
        }

        Ok(report)
    }

    /// Step 4–5 of the merge algorithm: pick `keep`, compute combined
    /// confidence/validations/description, then execute the single-
    /// transaction merge and re-embed the survivor.
    fn merge(&self, candidate: &Candidate) -> Result<crate::storage::MergeReport, ConsolidationError> {
        let mut all: Vec<&Learning> = std::iter::once(&candidate.primary).chain(candidate.duplicates.iter()).collect();
        all.sort_by(|a, b| {
            b.confidence
                .cmp(&a.confidence)
                .then(b.times_validated.cmp(&a.times_validated))
        });
        let keep = all[0];
        let mergees: Vec<&Learning> = all[1..].to_vec();

        let combined_validations: i64 = all.iter().map(|l| l.times_validated.max(1)).sum();
        let mut combined_confidence = Confidence::from_combined_validations(combined_validations);

        let mut merged_description = unique_descriptions(&all);

        if let Some(reasoner) = &self.reasoner {
            let candidate_view = ConsolidationCandidate {
                primary_title: &keep.title,
                primary_lesson: &keep.lesson,
                duplicate_titles: mergees.iter().map(|l| l.title.as_str()).collect(),
                avg_similarity: candidate.avg_similarity,
            };
            if let Some(plan) = reasoner.confirm_duplicates(&candidate_view) {
                if !plan.confirmed {
                    return Ok(crate::storage::MergeReport::default());
                }
                if let Some(desc) = plan.merged_description {
                    merged_description = desc;
                }
                if let Some(conf) = plan.confidence_override {
                    combined_confidence = conf;
                }
            }
        }

        let mergee_ids: Vec<String> = mergees.iter().map(|l| l.id.clone()).collect();
        let report = self.store.merge_learnings(
            &keep.id,
            &mergee_ids,
            &merged_description,
            combined_confidence,
            combined_validations,
        )?;

        for mergee in &mergees {
            let _ = self.vectors.delete_learning(&self.project_id, &mergee.id);
        }

        let vector = self.embedder.embed(&[merged_description.clone()])?;
        self.vectors.embed_learning(
            &self.project_id,
            &keep.id,
            &merged_description,
            &vector[0],
            ChunkMetadata { code_file_id: keep.id.clone(), chunk_index: 0, byte_start: 0, byte_end: merged_description.len(), ..Default::default() },
        )?;

        Ok(report)
    }
}

fn unique_descriptions(learnings: &[&Learning]) -> String {
    let mut seen = std::collections::HashSet::new();
    learnings
        .iter()
        .filter_map(|l| l.description.as_deref().or(Some(l.lesson.as_str())))
        .filter(|d| seen.insert(d.to_string()))
        .collect::<Vec<_>>()
        .join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::DeterministicHashEmbedder;
    use crate::model::Visibility;

    fn harness(project_id: &str) -> (Consolidator, Arc<Store>) {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let embedder: Arc<dyn Embedder> = Arc::new(DeterministicHashEmbedder::new(64));
        let vectors = Arc::new(VectorIndex::new(embedder.dimensions(), std::env::temp_dir().join("devmem-test-vectors")));
        let consolidator = Consolidator::new(store.clone(), vectors, embedder, None, project_id.to_string());
        (consolidator, store)
    }

    #[test]
    fn merges_near_duplicate_learnings() {
        let (consolidator, store) = harness("proj");

        let keep = store
            .create_learning(
                "performance",
                "Use bulk INSERT with BEGIN/COMMIT",
                None,
                None,
                "Batch writes in one transaction",
                None,
                None,
                None,
                Visibility::Private,
                None,
                None,
            )
            .unwrap();
        store.validate_learning(&keep).unwrap();
        store.validate_learning(&keep).unwrap();
        store.validate_learning(&keep).unwrap();

        let dup = store
            .create_learning(
                "performance",
                "Bulk insert is much faster",
                None,
                None,
                "Batch writes in one transaction",
                None,
                None,
                None,
                Visibility::Private,
                None,
                None,
            )
            .unwrap();
        store.validate_learning(&dup).unwrap();

        // Seed the vector index so the duplicate shows up as a near match.
        let vector = consolidator.embedder.embed(&["Use bulk INSERT with BEGIN/COMMIT Batch writes in one transaction".to_string()]).unwrap();
        consolidator
            .vectors
            .embed_learning("proj", &keep, "keep text", &vector[0], ChunkMetadata { code_file_id: keep.clone(), chunk_index: 0, byte_start: 0, byte_end: 1, ..Default::default() })
            .unwrap();
        consolidator
            .vectors
            .embed_learning("proj", &dup, "dup text", &vector[0], ChunkMetadata { code_file_id: dup.clone(), chunk_index: 0, byte_start: 0, byte_end: 1, ..Default::default() })
            .unwrap();

        let report = consolidator.run(Some("performance"), false).unwrap();
        assert_eq!(report.merged_count, 1);
        assert!(store.get_learning(&dup).is_err());
        let survivor = store.get_learning(&keep).unwrap();
        assert_eq!(survivor.confidence, Confidence::High);
    }
}
