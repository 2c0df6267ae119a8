use tracing::debug;

use super::{collapse, DisjointSet, SourceRanking};
use crate::config::NearDuplicateConfig;
use crate::models::{Candidate, DedupStage, DuplicateGroup, FeedItem};
use crate::similarity::{text_similarity, title_similarity};

fn both_present<'a>(a: &'a str, b: &'a str) -> Option<(&'a str, &'a str)> {
    (!a.trim().is_empty() && !b.trim().is_empty()).then_some((a, b))
}

/// Weighted similarity of two items in `[0, 1]`.
///
/// Title always counts. Summary and body excerpt count only when both items
/// carry one, and the weights are renormalized over what counted.
pub fn pair_similarity(a: &FeedItem, b: &FeedItem, config: &NearDuplicateConfig) -> f64 {
    let mut weighted = config.title_weight * title_similarity(&a.title, &b.title);
    let mut total = config.title_weight;

    if let Some((x, y)) = both_present(&a.summary, &b.summary) {
        weighted += config.summary_weight * text_similarity(x, y);
        total += config.summary_weight;
    }

    if let (Some(x), Some(y)) = (a.body_excerpt.as_deref(), b.body_excerpt.as_deref()) {
        if let Some((x, y)) = both_present(x, y) {
            weighted += config.body_weight * text_similarity(x, y);
            total += config.body_weight;
        }
    }

    if total <= 0.0 {
        return 0.0;
    }
    (weighted / total).clamp(0.0, 1.0)
}

/// Merges a topic's items whose pairwise similarity meets the threshold.
///
/// Merging is transitive: chains of matches end in one group even when the
/// ends of the chain would not match each other.
pub fn merge_near_duplicates(
    candidates: Vec<Candidate>,
    config: &NearDuplicateConfig,
    ranking: &SourceRanking,
) -> (Vec<Candidate>, Vec<DuplicateGroup>) {
    let mut set = DisjointSet::new(candidates.len());

    for i in 0..candidates.len() {
        for j in (i + 1)..candidates.len() {
            let score = pair_similarity(&candidates[i].item, &candidates[j].item, config);
            if score >= config.threshold && set.union(i, j) {
                debug!(
                    "Near duplicate - '{}' ~ '{}' (score: {:.2})",
                    candidates[i].item.title, candidates[j].item.title, score
                );
            }
        }
    }

    let components = set.components();
    collapse(candidates, components, DedupStage::NearDuplicate, ranking)
}
