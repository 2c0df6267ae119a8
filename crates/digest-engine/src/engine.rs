use anyhow::{Context, Result};
use chrono::Weekday;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{ConfigWarning, DigestConfig, EngineSettings};
use crate::dedup::{eliminate_exact_duplicates, merge_near_duplicates, merge_translations};
use crate::models::{Candidate, CandidatePool, DuplicateGroup, SelectionResult, SelectionStats};
use crate::relevance::apply_relevance_filter;
use crate::selection::select_items;

/// Maximum number of topics evaluated at once by [`DigestEngine::run_concurrent`].
const MAX_CONCURRENT_TOPICS: usize = 8;

/// Everything one run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionReport {
    pub topics: Vec<SelectionResult>,
    #[serde(default)]
    pub warnings: Vec<ConfigWarning>,
}

impl SelectionReport {
    pub fn topic(&self, topic_id: &str) -> Option<&SelectionResult> {
        self.topics.iter().find(|t| t.topic_id == topic_id)
    }

    pub fn selected_count(&self) -> usize {
        self.topics.iter().map(|t| t.items.len()).sum()
    }
}

/// A topic's survivors of the cross-topic exact pass.
struct TopicInput {
    topic_id: String,
    candidates: Vec<Candidate>,
    exact_groups: Vec<DuplicateGroup>,
    stats: SelectionStats,
}

/// Runs the dedup and selection pipeline over candidate pools.
///
/// Holds only validated settings; every run starts from scratch.
pub struct DigestEngine {
    settings: Arc<EngineSettings>,
    warnings: Vec<ConfigWarning>,
    config: DigestConfig,
    weekday: Option<Weekday>,
}

impl DigestEngine {
    pub fn new(config: DigestConfig) -> Self {
        let (settings, warnings) = config.sanitize();
        for warning in &warnings {
            warn!("Config: {}", warning);
        }

        Self {
            settings: Arc::new(settings),
            warnings,
            config,
            weekday: None,
        }
    }

    /// Restricts runs to topics scheduled for `weekday`.
    pub fn for_weekday(mut self, weekday: Weekday) -> Self {
        self.weekday = Some(weekday);
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn warnings(&self) -> &[ConfigWarning] {
        &self.warnings
    }

    /// Evaluates every topic in pool order.
    pub fn run(&self, pool: &CandidatePool) -> SelectionReport {
        let topics = self
            .prepare(pool)
            .into_iter()
            .map(|input| evaluate_topic(&self.settings, input))
            .collect();

        self.report(topics)
    }

    /// Same result as [`DigestEngine::run`], with topics evaluated in
    /// parallel on the blocking thread pool.
    pub async fn run_concurrent(&self, pool: &CandidatePool) -> Result<SelectionReport> {
        let inputs = self.prepare(pool);

        let results: Vec<_> = stream::iter(inputs)
            .map(|input| {
                let settings = Arc::clone(&self.settings);
                let topic_id = input.topic_id.clone();
                async move {
                    tokio::task::spawn_blocking(move || evaluate_topic(&settings, input))
                        .await
                        .with_context(|| format!("Topic '{}' evaluation failed", topic_id))
                }
            })
            .buffered(MAX_CONCURRENT_TOPICS)
            .collect()
            .await;

        let topics = results.into_iter().collect::<Result<Vec<_>>>()?;
        Ok(self.report(topics))
    }

    fn report(&self, topics: Vec<SelectionResult>) -> SelectionReport {
        let report = SelectionReport {
            topics,
            warnings: self.warnings.clone(),
        };
        info!(
            "Selected {} item(s) across {} topic(s)",
            report.selected_count(),
            report.topics.len()
        );
        report
    }

    fn is_scheduled(&self, topic_id: &str) -> bool {
        self.weekday
            .map_or(true, |day| self.config.is_topic_active(topic_id, day))
    }

    /// Fills in configured source groups, runs the cross-topic exact pass and
    /// splits the survivors back into topics.
    fn prepare(&self, pool: &CandidatePool) -> Vec<TopicInput> {
        let mut order: Vec<String> = pool
            .topic_ids()
            .filter(|id| self.is_scheduled(id))
            .map(str::to_string)
            .collect();
        for topic in &self.config.topics {
            if !order.contains(&topic.id) && self.is_scheduled(&topic.id) {
                order.push(topic.id.clone());
            }
        }

        let mut candidates = pool.candidates();
        candidates.retain(|c| self.is_scheduled(&c.item.topic_id));
        for candidate in candidates.iter_mut() {
            let missing = candidate
                .item
                .source_group
                .as_deref()
                .map_or(true, |g| g.trim().is_empty());
            if missing {
                if let Some(group) = self.settings.configured_group(&candidate.item.source_name) {
                    candidate.item.source_group = Some(group.to_string());
                }
            }
        }

        let mut inputs: HashMap<String, TopicInput> = order
            .iter()
            .map(|id| {
                (
                    id.clone(),
                    TopicInput {
                        topic_id: id.clone(),
                        candidates: Vec::new(),
                        exact_groups: Vec::new(),
                        stats: SelectionStats::default(),
                    },
                )
            })
            .collect();

        for candidate in &candidates {
            if let Some(input) = inputs.get_mut(&candidate.item.topic_id) {
                input.stats.candidates += 1;
            }
        }

        let (survivors, groups) = eliminate_exact_duplicates(candidates, &self.settings.source_ranking);

        for candidate in survivors {
            if let Some(input) = inputs.get_mut(&candidate.item.topic_id) {
                input.candidates.push(candidate);
            }
        }
        for group in groups {
            if let Some(input) = inputs.get_mut(&group.survivor_topic) {
                input.exact_groups.push(group);
            }
        }

        order
            .iter()
            .filter_map(|id| inputs.remove(id))
            .map(|mut input| {
                input.stats.exact_removed = input.stats.candidates.saturating_sub(input.candidates.len());
                input
            })
            .collect()
    }
}

/// Per-topic stages after the exact pass.
fn evaluate_topic(settings: &EngineSettings, input: TopicInput) -> SelectionResult {
    let TopicInput {
        topic_id,
        candidates,
        exact_groups,
        mut stats,
    } = input;

    if candidates.is_empty() {
        debug!("Topic '{}' has no candidates", topic_id);
        return SelectionResult {
            topic_id,
            items: Vec::new(),
            groups: exact_groups,
            stats,
        };
    }

    let rules = settings.rules_for(&topic_id);
    let mut groups = exact_groups;

    let (candidates, near_groups) =
        merge_near_duplicates(candidates, &settings.near, &settings.source_ranking);
    stats.near_duplicate_removed = near_groups.iter().map(DuplicateGroup::removed_count).sum();
    groups.extend(near_groups);

    let (candidates, translation_groups) =
        merge_translations(candidates, &settings.translation, &settings.source_ranking);
    stats.translation_removed = translation_groups.iter().map(DuplicateGroup::removed_count).sum();
    groups.extend(translation_groups);

    let (candidates, relevance_removed) = apply_relevance_filter(candidates, rules.locality.as_ref());
    stats.relevance_removed = relevance_removed;

    let selection = select_items(candidates, rules, &settings.ranking);
    stats.not_selected = selection.not_selected;

    info!(
        "Topic '{}': {} candidate(s), {} selected (exact -{}, near -{}, translation -{}, relevance -{})",
        topic_id,
        stats.candidates,
        selection.items.len(),
        stats.exact_removed,
        stats.near_duplicate_removed,
        stats.translation_removed,
        stats.relevance_removed
    );

    SelectionResult {
        topic_id,
        items: selection.items.into_iter().map(|c| c.item).collect(),
        groups,
        stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TopicConfig;
    use crate::models::{FeedItem, TopicPool};

    #[test]
    fn stats_account_for_every_candidate() {
        let pool = CandidatePool::new(vec![
            TopicPool::new(
                "world",
                vec![
                    FeedItem::new("w1", "https://a.com/1", "Cyclone Gezani hits Madagascar coast", "A"),
                    FeedItem::new("w2", "https://b.com/1", "Cyclone Gezani strikes Madagascar coast", "B"),
                    FeedItem::new("w3", "https://c.com/1", "Parliament passes annual budget", "C"),
                ],
            ),
            TopicPool::new(
                "tech",
                vec![FeedItem::new("t1", "https://a.com/1?utm_source=rss", "Cyclone Gezani", "A")],
            ),
        ]);

        let report = DigestEngine::new(DigestConfig::default()).run(&pool);

        let world = report.topic("world").unwrap();
        assert_eq!(world.stats.candidates, 3);
        assert_eq!(world.stats.exact_removed, 0);
        assert_eq!(world.stats.near_duplicate_removed, 1);
        assert_eq!(world.items.len(), 2);

        let tech = report.topic("tech").unwrap();
        assert_eq!(tech.stats.exact_removed, 1);
        assert!(tech.items.is_empty());
        assert!(tech.groups.is_empty());
        assert_eq!(world.groups.len(), 2);
    }

    #[test]
    fn configured_group_applies_to_ungrouped_items() {
        let mut config = DigestConfig::default();
        config.max_items_per_source_group = Some(1);
        config.source_groups.insert("BBC World".into(), "BBC".into());
        config.source_groups.insert("BBC Business".into(), "BBC".into());

        let pool = CandidatePool::new(vec![TopicPool::new(
            "news",
            vec![
                FeedItem::new("1", "https://bbc.co.uk/1", "Rates held steady by central bank", "BBC World"),
                FeedItem::new("2", "https://bbc.co.uk/2", "Carmaker recalls electric models", "BBC Business"),
                FeedItem::new("3", "https://dw.com/3", "Flooding closes rail links", "DW"),
            ],
        )]);

        let report = DigestEngine::new(config).run(&pool);
        let news = report.topic("news").unwrap();
        assert_eq!(news.items.len(), 2);
        assert_eq!(news.items.iter().filter(|i| i.source_group.as_deref() == Some("BBC")).count(), 1);
    }

    #[test]
    fn weekday_filter_skips_unscheduled_topics() {
        let mut config = DigestConfig::default();
        let mut weekly = TopicConfig::new("weekly");
        weekly.frequency_days = Some(vec!["sat".into()]);
        config.topics.push(weekly);
        config.topics.push(TopicConfig::new("daily"));

        let pool = CandidatePool::new(vec![
            TopicPool::new("weekly", vec![FeedItem::new("a", "https://x.com/a", "Weekend reads", "S")]),
            TopicPool::new("extra", vec![FeedItem::new("b", "https://x.com/b", "Unconfigured", "S")]),
        ]);

        let engine = DigestEngine::new(config).for_weekday(Weekday::Mon);
        let report = engine.run(&pool);
        let ids: Vec<_> = report.topics.iter().map(|t| t.topic_id.as_str()).collect();
        assert_eq!(ids, vec!["extra", "daily"]);
        assert!(report.topic("daily").unwrap().items.is_empty());
    }

    #[test]
    fn warnings_are_carried_into_the_report() {
        let config = DigestConfig {
            max_items_per_source: Some(0),
            ..DigestConfig::default()
        };
        let report = DigestEngine::new(config).run(&CandidatePool::default());
        assert_eq!(report.warnings.len(), 1);
        assert!(report.topics.is_empty());
    }
}
