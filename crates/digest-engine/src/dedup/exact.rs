use std::collections::HashMap;
use tracing::debug;

use super::{collapse, SourceRanking};
use crate::models::{Candidate, DedupStage, DuplicateGroup};

/// Collapses items sharing a canonical URL across every topic.
///
/// Must run over the whole pool before any per-topic stage: the surviving
/// instance decides which topic the story belongs to.
pub fn eliminate_exact_duplicates(
    candidates: Vec<Candidate>,
    ranking: &SourceRanking,
) -> (Vec<Candidate>, Vec<DuplicateGroup>) {
    let mut components: Vec<Vec<usize>> = Vec::new();
    {
        let mut slots: HashMap<&str, usize> = HashMap::new();
        for (index, candidate) in candidates.iter().enumerate() {
            // An item without a URL has nothing to be an exact duplicate of.
            if candidate.item.canonical_url.trim().is_empty() {
                components.push(vec![index]);
                continue;
            }
            let slot = *slots
                .entry(candidate.item.canonical_url.as_str())
                .or_insert_with(|| {
                    components.push(Vec::new());
                    components.len() - 1
                });
            components[slot].push(index);
        }
    }

    let total = candidates.len();
    let (survivors, groups) = collapse(candidates, components, DedupStage::Exact, ranking);

    debug!(
        "Exact dedup - candidates={}, survivors={}, groups={}",
        total,
        survivors.len(),
        groups.len()
    );

    (survivors, groups)
}
