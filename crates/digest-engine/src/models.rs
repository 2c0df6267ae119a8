use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;

use crate::canonical::canonicalize_url;
use crate::similarity::word_tokens;

/// One story candidate as handed over by feed ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    pub id: String,
    pub url: String,
    /// Derived from `url` when the item enters a [`CandidatePool`].
    #[serde(default)]
    pub canonical_url: String,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_excerpt: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub published_at: Option<DateTime<Utc>>,
    pub source_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_group: Option<String>,
    #[serde(default)]
    pub topic_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entities: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numbers: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dates: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_relevance_score: Option<f64>,
    /// Lower ranks win survivor tie-breaks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_priority: Option<u32>,
}

impl FeedItem {
    pub fn new(
        id: impl Into<String>,
        url: impl Into<String>,
        title: impl Into<String>,
        source_name: impl Into<String>,
    ) -> Self {
        let url = url.into();
        Self {
            id: id.into(),
            canonical_url: canonicalize_url(&url),
            url,
            title: title.into(),
            summary: String::new(),
            body_excerpt: None,
            published_at: None,
            source_name: source_name.into(),
            source_group: None,
            topic_id: String::new(),
            entities: None,
            numbers: None,
            dates: None,
            local_relevance_score: None,
            source_priority: None,
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn with_body_excerpt(mut self, body: impl Into<String>) -> Self {
        self.body_excerpt = Some(body.into());
        self
    }

    pub fn with_published_at(mut self, published_at: DateTime<Utc>) -> Self {
        self.published_at = Some(published_at);
        self
    }

    pub fn with_source_group(mut self, group: impl Into<String>) -> Self {
        self.source_group = Some(group.into());
        self
    }

    pub fn with_source_priority(mut self, priority: u32) -> Self {
        self.source_priority = Some(priority);
        self
    }

    pub fn with_entities<I, S>(mut self, entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entities = Some(entities.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_numbers<I, S>(mut self, numbers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.numbers = Some(numbers.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_dates<I, S>(mut self, dates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dates = Some(dates.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_local_relevance_score(mut self, score: f64) -> Self {
        self.local_relevance_score = Some(score);
        self
    }

    /// The label diversity caps are counted against.
    pub fn group_key(&self) -> &str {
        match self.source_group.as_deref() {
            Some(group) if !group.trim().is_empty() => group,
            _ => &self.source_name,
        }
    }

    /// Number of distinct word tokens across title, summary and body excerpt.
    pub fn information_density(&self) -> usize {
        let mut tokens: BTreeSet<String> = word_tokens(&self.title).into_iter().collect();
        tokens.extend(word_tokens(&self.summary));
        if let Some(body) = &self.body_excerpt {
            tokens.extend(word_tokens(body));
        }
        tokens.len()
    }

    /// Title, summary and body excerpt joined for keyword and anchor scans.
    pub fn full_text(&self) -> String {
        let mut text = String::with_capacity(
            self.title.len() + self.summary.len() + self.body_excerpt.as_ref().map_or(0, String::len) + 2,
        );
        text.push_str(&self.title);
        text.push('\n');
        text.push_str(&self.summary);
        if let Some(body) = &self.body_excerpt {
            text.push('\n');
            text.push_str(body);
        }
        text
    }
}

/// A feed item tagged with its position in pool order.
///
/// The sequence index is the last tie-break in every ordering decision.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub seq: usize,
    pub item: FeedItem,
}

/// Candidates gathered for one topic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopicPool {
    pub topic_id: String,
    #[serde(default)]
    pub items: Vec<FeedItem>,
}

impl TopicPool {
    pub fn new(topic_id: impl Into<String>, items: Vec<FeedItem>) -> Self {
        Self {
            topic_id: topic_id.into(),
            items,
        }
    }
}

/// The full cross-topic candidate pool for one run.
#[derive(Debug, Clone, Default)]
pub struct CandidatePool {
    topics: Vec<TopicPool>,
}

impl CandidatePool {
    /// Builds a pool, merging repeated topic ids in first-seen order and
    /// deriving each item's canonical URL and topic.
    pub fn new(topics: Vec<TopicPool>) -> Self {
        let mut merged: Vec<TopicPool> = Vec::with_capacity(topics.len());

        for topic in topics {
            let index = match merged.iter().position(|t| t.topic_id == topic.topic_id) {
                Some(index) => index,
                None => {
                    merged.push(TopicPool::new(topic.topic_id.clone(), Vec::new()));
                    merged.len() - 1
                }
            };

            for mut item in topic.items {
                item.canonical_url = canonicalize_url(&item.url);
                item.topic_id = topic.topic_id.clone();
                merged[index].items.push(item);
            }
        }

        Self { topics: merged }
    }

    pub fn topics(&self) -> &[TopicPool] {
        &self.topics
    }

    pub fn topic_ids(&self) -> impl Iterator<Item = &str> {
        self.topics.iter().map(|t| t.topic_id.as_str())
    }

    pub fn len(&self) -> usize {
        self.topics.iter().map(|t| t.items.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops whole topics, e.g. those not scheduled for the run's weekday.
    pub fn retain_topics<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str) -> bool,
    {
        self.topics.retain(|t| keep(&t.topic_id));
    }

    /// Flattens the pool into sequence-indexed candidates.
    pub fn candidates(&self) -> Vec<Candidate> {
        self.topics
            .iter()
            .flat_map(|t| t.items.iter())
            .cloned()
            .enumerate()
            .map(|(seq, item)| Candidate { seq, item })
            .collect()
    }
}

/// Which stage formed a duplicate group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupStage {
    Exact,
    NearDuplicate,
    Translation,
}

/// Items judged to be the same story, with the one that was kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub stage: DedupStage,
    pub survivor_id: String,
    pub survivor_topic: String,
    /// Member ids in pool order, survivor included.
    pub member_ids: Vec<String>,
}

impl DuplicateGroup {
    pub fn removed_count(&self) -> usize {
        self.member_ids.len().saturating_sub(1)
    }
}

/// Per-topic removal counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionStats {
    pub candidates: usize,
    pub exact_removed: usize,
    pub near_duplicate_removed: usize,
    pub translation_removed: usize,
    pub relevance_removed: usize,
    /// Eligible items left out because of size or caps.
    pub not_selected: usize,
}

/// Final ordered items for one topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionResult {
    pub topic_id: String,
    pub items: Vec<FeedItem>,
    #[serde(default)]
    pub groups: Vec<DuplicateGroup>,
    #[serde(default)]
    pub stats: SelectionStats,
}

impl SelectionResult {
    pub fn empty(topic_id: impl Into<String>) -> Self {
        Self {
            topic_id: topic_id.into(),
            items: Vec::new(),
            groups: Vec::new(),
            stats: SelectionStats::default(),
        }
    }

    pub fn ids(&self) -> Vec<&str> {
        self.items.iter().map(|i| i.id.as_str()).collect()
    }
}

/// Accepts RFC 3339 or RFC 2822 timestamps; anything else becomes `None`.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_timestamp))
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    DateTime::parse_from_rfc2822(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
