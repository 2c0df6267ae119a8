//! Per-topic ranking and diversity-capped selection.
//!
//! Selection runs in two bounded passes over one ranked list. The primary
//! pass accepts items greedily until their group or source is at its cap;
//! items skipped that way are kept for a backfill pass that tops the topic
//! up while still respecting the caps.

use std::collections::HashMap;
use tracing::debug;

use crate::config::{RankingWeights, TopicRules};
use crate::models::Candidate;

/// A candidate with its composite ranking score.
#[derive(Debug, Clone)]
pub struct Ranked {
    pub candidate: Candidate,
    pub score: f64,
}

/// Outcome of selecting one topic.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Accepted items in rank order.
    pub items: Vec<Candidate>,
    /// Eligible items left out by size or caps.
    pub not_selected: usize,
}

fn group_of(candidate: &Candidate) -> String {
    candidate.item.group_key().trim().to_lowercase()
}

fn source_of(candidate: &Candidate) -> String {
    candidate.item.source_name.trim().to_lowercase()
}

/// Orders candidates by composite score, highest first, then pool order.
///
/// The score mixes information density (relative to the densest item in the
/// topic), a bonus for groups with few candidates, and recency relative to
/// the topic's own time span.
pub fn rank_candidates(candidates: Vec<Candidate>, weights: &RankingWeights) -> Vec<Ranked> {
    let densities: Vec<usize> = candidates.iter().map(|c| c.item.information_density()).collect();
    let max_density = densities.iter().copied().max().unwrap_or(0);

    let mut group_sizes: HashMap<String, usize> = HashMap::new();
    for candidate in &candidates {
        *group_sizes.entry(group_of(candidate)).or_insert(0) += 1;
    }

    let timestamps: Vec<i64> = candidates
        .iter()
        .filter_map(|c| c.item.published_at.map(|t| t.timestamp()))
        .collect();
    let oldest = timestamps.iter().copied().min();
    let newest = timestamps.iter().copied().max();

    let mut ranked: Vec<Ranked> = candidates
        .into_iter()
        .zip(densities)
        .map(|(candidate, density)| {
            let density_signal = if max_density == 0 {
                0.0
            } else {
                density as f64 / max_density as f64
            };

            let group_size = group_sizes.get(&group_of(&candidate)).copied().unwrap_or(1);
            let diversity = 1.0 / group_size.max(1) as f64;

            let recency = match (candidate.item.published_at, oldest, newest) {
                (Some(t), Some(lo), Some(hi)) if hi > lo => (t.timestamp() - lo) as f64 / (hi - lo) as f64,
                (Some(_), Some(_), Some(_)) => 1.0,
                _ => 0.0,
            };

            let score = weights.density * density_signal
                + weights.diversity * diversity
                + weights.recency * recency;

            Ranked { candidate, score }
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.candidate.seq.cmp(&b.candidate.seq))
    });
    ranked
}

/// Per-group and per-source acceptance counters.
#[derive(Default)]
struct Capacity {
    groups: HashMap<String, usize>,
    sources: HashMap<String, usize>,
}

impl Capacity {
    fn admits(&self, candidate: &Candidate, group_limit: Option<usize>, source_limit: Option<usize>) -> bool {
        let group_ok = group_limit
            .map_or(true, |limit| self.groups.get(&group_of(candidate)).copied().unwrap_or(0) < limit);
        let source_ok = source_limit
            .map_or(true, |limit| self.sources.get(&source_of(candidate)).copied().unwrap_or(0) < limit);
        group_ok && source_ok
    }

    fn accept(&mut self, candidate: &Candidate) {
        *self.groups.entry(group_of(candidate)).or_insert(0) += 1;
        *self.sources.entry(source_of(candidate)).or_insert(0) += 1;
    }
}

/// Ranks a topic and picks up to `items_per_topic` items within the caps.
pub fn select_items(candidates: Vec<Candidate>, rules: &TopicRules, weights: &RankingWeights) -> Selection {
    let total = candidates.len();
    let target = rules.items_per_topic;
    let ranked = rank_candidates(candidates, weights);

    if rules.max_per_group.is_none() && rules.max_per_source.is_none() {
        let items: Vec<Candidate> = ranked.into_iter().take(target).map(|r| r.candidate).collect();
        let not_selected = total - items.len();
        return Selection { items, not_selected };
    }

    let mut capacity = Capacity::default();
    let mut accepted = vec![false; ranked.len()];
    let mut deferred = Vec::new();
    let mut count = 0;

    for (index, entry) in ranked.iter().enumerate() {
        if count == target {
            break;
        }
        if capacity.admits(&entry.candidate, rules.max_per_group, rules.max_per_source) {
            capacity.accept(&entry.candidate);
            accepted[index] = true;
            count += 1;
        } else {
            deferred.push(index);
        }
    }

    let primary = count;
    for index in deferred {
        if count == target {
            break;
        }
        let candidate = &ranked[index].candidate;
        if capacity.admits(candidate, rules.max_per_group, rules.max_per_source) {
            capacity.accept(candidate);
            accepted[index] = true;
            count += 1;
        }
    }

    if count > primary {
        debug!("Backfill added {} item(s) after primary pass of {}", count - primary, primary);
    }

    let items: Vec<Candidate> = ranked
        .into_iter()
        .zip(accepted)
        .filter_map(|(entry, kept)| kept.then_some(entry.candidate))
        .collect();
    let not_selected = total - items.len();

    Selection { items, not_selected }
}
