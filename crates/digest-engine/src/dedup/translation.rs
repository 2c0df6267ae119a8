use tracing::debug;

use super::{collapse, DisjointSet, SourceRanking};
use crate::anchors::Anchors;
use crate::config::TranslationRules;
use crate::models::{Candidate, DedupStage, DuplicateGroup};

/// Both gates must pass: publication times within the window and enough
/// shared anchors. Undated items never match.
fn same_story(
    a: &Candidate,
    b: &Candidate,
    anchors_a: &Anchors,
    anchors_b: &Anchors,
    rules: &TranslationRules,
) -> bool {
    if a.item.source_name != b.item.source_name {
        return false;
    }

    let (Some(time_a), Some(time_b)) = (a.item.published_at, b.item.published_at) else {
        return false;
    };
    if (time_a - time_b).abs() > rules.window {
        return false;
    }

    anchors_a.shared_count(anchors_b) >= rules.min_shared_anchors
}

/// Merges same-source items that look like one story published in several
/// languages. Runs on near-duplicate survivors, so textual matches are
/// already gone.
pub fn merge_translations(
    candidates: Vec<Candidate>,
    rules: &TranslationRules,
    ranking: &SourceRanking,
) -> (Vec<Candidate>, Vec<DuplicateGroup>) {
    let anchors: Vec<Anchors> = candidates.iter().map(|c| Anchors::for_item(&c.item)).collect();
    let mut set = DisjointSet::new(candidates.len());

    for i in 0..candidates.len() {
        for j in (i + 1)..candidates.len() {
            if same_story(&candidates[i], &candidates[j], &anchors[i], &anchors[j], rules)
                && set.union(i, j)
            {
                debug!(
                    "Translation match - source={}, '{}' ~ '{}'",
                    candidates[i].item.source_name, candidates[i].item.title, candidates[j].item.title
                );
            }
        }
    }

    let components = set.components();
    collapse(candidates, components, DedupStage::Translation, ranking)
}
