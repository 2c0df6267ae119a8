use std::collections::BTreeSet;
use tracing::debug;

use crate::config::LocalityRules;
use crate::models::{Candidate, FeedItem};
use crate::similarity::normalize_text;

/// Score given to every item of a topic that is not locally scoped.
pub const NEUTRAL_SCORE: f64 = 1.0;

/// Local relevance of one item in `[0, 1]`.
///
/// A score supplied upstream wins over the computed one.
pub fn local_relevance(item: &FeedItem, rules: &LocalityRules) -> f64 {
    if let Some(score) = item.local_relevance_score {
        return if score.is_nan() { 0.0 } else { score.clamp(0.0, 1.0) };
    }

    let source_score = if is_local_source(item, rules) { 1.0 } else { 0.0 };
    let hits = keyword_hits(item, &rules.keywords);
    let keyword_score = (hits as f64 / rules.keyword_saturation.max(1) as f64).min(1.0);

    let score = rules.source_weight * source_score + rules.keyword_weight * keyword_score;
    score.clamp(0.0, 1.0)
}

fn is_local_source(item: &FeedItem, rules: &LocalityRules) -> bool {
    let name = item.source_name.trim().to_lowercase();
    let group = item.group_key().trim().to_lowercase();
    rules
        .local_sources
        .iter()
        .any(|local| *local == name || *local == group)
}

/// Distinct keywords found as whole words in title, summary or body.
fn keyword_hits(item: &FeedItem, keywords: &[String]) -> usize {
    let text = format!(" {} ", normalize_text(&item.full_text()));
    keywords
        .iter()
        .map(|k| normalize_text(k))
        .filter(|k| !k.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .filter(|k| text.contains(&format!(" {} ", k)))
        .count()
}

/// Scores a locally scoped topic and drops items below the minimum.
///
/// Returns the kept items, each carrying its score, and the number removed.
/// Topics without locality rules keep every item at the neutral score.
pub fn apply_relevance_filter(
    candidates: Vec<Candidate>,
    rules: Option<&LocalityRules>,
) -> (Vec<Candidate>, usize) {
    let Some(rules) = rules else {
        let neutral = candidates
            .into_iter()
            .map(|mut candidate| {
                candidate.item.local_relevance_score = Some(NEUTRAL_SCORE);
                candidate
            })
            .collect();
        return (neutral, 0);
    };

    let before = candidates.len();
    let kept: Vec<Candidate> = candidates
        .into_iter()
        .filter_map(|mut candidate| {
            let score = local_relevance(&candidate.item, rules);
            if score < rules.min_score {
                debug!(
                    "Dropped as not local - '{}' (score: {:.2}, min: {:.2})",
                    candidate.item.title, score, rules.min_score
                );
                return None;
            }
            candidate.item.local_relevance_score = Some(score);
            Some(candidate)
        })
        .collect();

    let removed = before - kept.len();
    (kept, removed)
}
