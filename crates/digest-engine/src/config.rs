use anyhow::{Context, Result};
use chrono::{Duration, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::dedup::SourceRanking;

pub const CONFIG_ENV_VAR: &str = "DAILY_PAPER_CONFIG";
const APP_DIR: &str = "daily-paper";

/// Upper bound for `translation.window_minutes`: one year.
const MAX_WINDOW_MINUTES: i64 = 60 * 24 * 365;

/// Run configuration, usually loaded from `config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigestConfig {
    pub items_per_topic: i64,
    #[serde(default)]
    pub max_items_per_source: Option<i64>,
    #[serde(default)]
    pub max_items_per_source_group: Option<i64>,
    /// Source names, most trusted first. Used for survivor tie-breaks.
    #[serde(default)]
    pub source_priority: Vec<String>,
    /// Source name to group label, for items that arrive without a group.
    #[serde(default)]
    pub source_groups: BTreeMap<String, String>,
    #[serde(default)]
    pub near_duplicate: NearDuplicateConfig,
    #[serde(default)]
    pub translation: TranslationConfig,
    #[serde(default)]
    pub ranking: RankingWeights,
    #[serde(default)]
    pub topics: Vec<TopicConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NearDuplicateConfig {
    pub threshold: f64,
    pub title_weight: f64,
    pub summary_weight: f64,
    pub body_weight: f64,
}

impl Default for NearDuplicateConfig {
    fn default() -> Self {
        Self {
            threshold: 0.75,
            title_weight: 0.55,
            summary_weight: 0.30,
            body_weight: 0.15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    pub window_minutes: i64,
    pub min_shared_anchors: i64,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            window_minutes: 360,
            min_shared_anchors: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingWeights {
    pub density: f64,
    pub diversity: f64,
    pub recency: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            density: 0.60,
            diversity: 0.25,
            recency: 0.15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalityConfig {
    pub keywords: Vec<String>,
    /// Source names or group labels classified as local outlets.
    pub local_sources: Vec<String>,
    pub min_score: f64,
    pub source_weight: f64,
    pub keyword_weight: f64,
    /// Keyword hits needed for the full keyword score.
    pub keyword_saturation: i64,
}

impl Default for LocalityConfig {
    fn default() -> Self {
        Self {
            keywords: Vec::new(),
            local_sources: Vec::new(),
            min_score: 0.3,
            source_weight: 0.5,
            keyword_weight: 0.5,
            keyword_saturation: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicConfig {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub items_per_topic: Option<i64>,
    #[serde(default)]
    pub locally_scoped: bool,
    #[serde(default)]
    pub locality: LocalityConfig,
    /// Weekday names the topic runs on; every day when absent.
    #[serde(default)]
    pub frequency_days: Option<Vec<String>>,
}

impl TopicConfig {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            items_per_topic: None,
            locally_scoped: false,
            locality: LocalityConfig::default(),
            frequency_days: None,
        }
    }

    pub fn runs_on(&self, weekday: Weekday) -> bool {
        match &self.frequency_days {
            None => true,
            Some(days) => days.iter().filter_map(|d| parse_weekday(d)).any(|d| d == weekday),
        }
    }
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            items_per_topic: 5,
            max_items_per_source: None,
            max_items_per_source_group: None,
            source_priority: Vec::new(),
            source_groups: BTreeMap::new(),
            near_duplicate: NearDuplicateConfig::default(),
            translation: TranslationConfig::default(),
            ranking: RankingWeights::default(),
            topics: Vec::new(),
        }
    }
}

impl DigestConfig {
    /// Loads and validates a TOML config file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("Config file not found: {}", path.display());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: DigestConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config TOML from {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Rejects values no run can start with. Softer problems are left to
    /// [`DigestConfig::sanitize`].
    pub fn validate(&self) -> Result<()> {
        if self.items_per_topic < 1 {
            anyhow::bail!(
                "Config key 'items_per_topic' must be at least 1, got {}",
                self.items_per_topic
            );
        }

        let mut seen = HashSet::new();
        for (idx, topic) in self.topics.iter().enumerate() {
            if topic.id.trim().is_empty() {
                anyhow::bail!("Topic entry {} needs a non-empty 'id'", idx + 1);
            }
            if !seen.insert(topic.id.as_str()) {
                anyhow::bail!("Topic id '{}' is defined more than once", topic.id);
            }
            if let Some(items) = topic.items_per_topic {
                if items < 1 {
                    anyhow::bail!(
                        "Topic '{}' key 'items_per_topic' must be at least 1, got {}",
                        topic.id,
                        items
                    );
                }
            }
            if let Some(days) = &topic.frequency_days {
                if days.is_empty() {
                    anyhow::bail!("Topic '{}' key 'frequency_days' cannot be empty", topic.id);
                }
                for day in days {
                    if parse_weekday(day).is_none() {
                        anyhow::bail!(
                            "Topic '{}' has unsupported weekday '{}' in 'frequency_days'",
                            topic.id,
                            day
                        );
                    }
                }
            }
        }

        Ok(())
    }

    pub fn topic(&self, id: &str) -> Option<&TopicConfig> {
        self.topics.iter().find(|t| t.id == id)
    }

    /// Topics without configuration run every day.
    pub fn is_topic_active(&self, id: &str, weekday: Weekday) -> bool {
        self.topic(id).map_or(true, |t| t.runs_on(weekday))
    }

    pub fn active_topic_ids(&self, weekday: Weekday) -> Vec<&str> {
        self.topics
            .iter()
            .filter(|t| t.runs_on(weekday))
            .map(|t| t.id.as_str())
            .collect()
    }

    /// Config path: explicit argument, then `DAILY_PAPER_CONFIG`, then
    /// `<config dir>/daily-paper/config.toml`.
    pub fn resolve_path(explicit: Option<PathBuf>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            return Ok(path);
        }

        Self::try_load_dotenv();

        if let Ok(path) = env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                return Ok(PathBuf::from(path));
            }
        }

        let config_dir = dirs::config_dir().context(
            "Could not determine config directory.\n\n\
            Pass --config or set DAILY_PAPER_CONFIG to the path of your config.toml",
        )?;

        Ok(config_dir.join(APP_DIR).join("config.toml"))
    }

    fn try_load_dotenv() {
        // 1. Current directory (for development)
        if dotenvy::dotenv().is_ok() {
            return;
        }

        // 2. ~/.config/daily-paper/.env
        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join(APP_DIR).join(".env");
            if config_path.exists() && dotenvy::from_path(&config_path).is_ok() {
                return;
            }
        }

        // 3. ~/.env
        if let Some(home_dir) = dirs::home_dir() {
            let home_path = home_dir.join(".env");
            if home_path.exists() {
                let _ = dotenvy::from_path(&home_path);
            }
        }
    }

    /// Turns the raw config into engine settings, clamping or dropping
    /// invalid values. Never fails; every adjustment is reported.
    pub fn sanitize(&self) -> (EngineSettings, Vec<ConfigWarning>) {
        let mut warnings = Vec::new();

        let default_items = sanitize_items(self.items_per_topic, None, &mut warnings);
        let max_per_source = sanitize_cap("max_items_per_source", self.max_items_per_source, &mut warnings);
        let max_per_group = sanitize_cap(
            "max_items_per_source_group",
            self.max_items_per_source_group,
            &mut warnings,
        );

        let near = sanitize_near(&self.near_duplicate, &mut warnings);

        let raw_window = self.translation.window_minutes;
        let window_minutes = raw_window.clamp(0, MAX_WINDOW_MINUTES);
        if window_minutes != raw_window {
            warnings.push(ConfigWarning::ValueClamped {
                key: "translation.window_minutes".into(),
                value: raw_window as f64,
                clamped: window_minutes as f64,
            });
        }
        let min_shared_anchors = if self.translation.min_shared_anchors < 1 {
            warnings.push(ConfigWarning::ValueClamped {
                key: "translation.min_shared_anchors".into(),
                value: self.translation.min_shared_anchors as f64,
                clamped: 1.0,
            });
            1
        } else {
            self.translation.min_shared_anchors as usize
        };

        let ranking = RankingWeights {
            density: non_negative("ranking.density", self.ranking.density, RankingWeights::default().density, &mut warnings),
            diversity: non_negative("ranking.diversity", self.ranking.diversity, RankingWeights::default().diversity, &mut warnings),
            recency: non_negative("ranking.recency", self.ranking.recency, RankingWeights::default().recency, &mut warnings),
        };

        let mut topics = HashMap::new();
        for topic in &self.topics {
            let items_per_topic = match topic.items_per_topic {
                Some(items) => sanitize_items(items, Some(&topic.id), &mut warnings),
                None => default_items,
            };
            let locality = topic
                .locally_scoped
                .then(|| sanitize_locality(&topic.id, &topic.locality, &mut warnings));
            topics.insert(
                topic.id.clone(),
                TopicRules {
                    items_per_topic,
                    max_per_source,
                    max_per_group,
                    locality,
                },
            );
        }

        let settings = EngineSettings {
            near,
            translation: TranslationRules {
                window: Duration::try_minutes(window_minutes).unwrap_or_else(Duration::zero),
                min_shared_anchors,
            },
            ranking,
            source_ranking: SourceRanking::new(&self.source_priority),
            source_groups: self
                .source_groups
                .iter()
                .map(|(source, group)| (source.trim().to_lowercase(), group.clone()))
                .collect(),
            default_rules: TopicRules {
                items_per_topic: default_items,
                max_per_source,
                max_per_group,
                locality: None,
            },
            topics,
        };

        (settings, warnings)
    }
}

/// Validated values the engine runs on.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub near: NearDuplicateConfig,
    pub translation: TranslationRules,
    pub ranking: RankingWeights,
    pub source_ranking: SourceRanking,
    /// Keyed by lower-cased source name.
    pub source_groups: HashMap<String, String>,
    pub default_rules: TopicRules,
    pub topics: HashMap<String, TopicRules>,
}

impl EngineSettings {
    pub fn rules_for(&self, topic_id: &str) -> &TopicRules {
        self.topics.get(topic_id).unwrap_or(&self.default_rules)
    }

    pub fn configured_group(&self, source_name: &str) -> Option<&str> {
        self.source_groups
            .get(&source_name.trim().to_lowercase())
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TranslationRules {
    pub window: Duration,
    pub min_shared_anchors: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopicRules {
    pub items_per_topic: usize,
    pub max_per_source: Option<usize>,
    pub max_per_group: Option<usize>,
    /// Present only for locally scoped topics.
    pub locality: Option<LocalityRules>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalityRules {
    pub keywords: Vec<String>,
    pub local_sources: Vec<String>,
    pub min_score: f64,
    pub source_weight: f64,
    pub keyword_weight: f64,
    pub keyword_saturation: usize,
}

/// A configuration problem the engine worked around.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConfigWarning {
    CapIgnored { key: String, value: i64 },
    ItemsPerTopicRaised { topic: Option<String>, value: i64 },
    ValueClamped { key: String, value: f64, clamped: f64 },
    BodyWeightReduced { from: f64, to: f64, threshold: f64 },
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigWarning::CapIgnored { key, value } => {
                write!(f, "'{}' = {} is below 1; cap ignored", key, value)
            }
            ConfigWarning::ItemsPerTopicRaised { topic: Some(topic), value } => {
                write!(f, "topic '{}' items_per_topic = {} raised to 1", topic, value)
            }
            ConfigWarning::ItemsPerTopicRaised { topic: None, value } => {
                write!(f, "items_per_topic = {} raised to 1", value)
            }
            ConfigWarning::ValueClamped { key, value, clamped } => {
                write!(f, "'{}' = {} out of range; using {}", key, value, clamped)
            }
            ConfigWarning::BodyWeightReduced { from, to, threshold } => write!(
                f,
                "near_duplicate.body_weight {:.3} could match on body text alone at threshold {:.3}; reduced to {:.3}",
                from, threshold, to
            ),
        }
    }
}

const WEEKDAYS: &[(&str, Weekday)] = &[
    ("mon", Weekday::Mon),
    ("monday", Weekday::Mon),
    ("tue", Weekday::Tue),
    ("tues", Weekday::Tue),
    ("tuesday", Weekday::Tue),
    ("wed", Weekday::Wed),
    ("wednesday", Weekday::Wed),
    ("thu", Weekday::Thu),
    ("thur", Weekday::Thu),
    ("thurs", Weekday::Thu),
    ("thursday", Weekday::Thu),
    ("fri", Weekday::Fri),
    ("friday", Weekday::Fri),
    ("sat", Weekday::Sat),
    ("saturday", Weekday::Sat),
    ("sun", Weekday::Sun),
    ("sunday", Weekday::Sun),
];

pub fn parse_weekday(name: &str) -> Option<Weekday> {
    let name = name.trim().to_lowercase();
    WEEKDAYS.iter().find(|(n, _)| *n == name).map(|(_, d)| *d)
}

fn sanitize_items(value: i64, topic: Option<&str>, warnings: &mut Vec<ConfigWarning>) -> usize {
    if value < 1 {
        warnings.push(ConfigWarning::ItemsPerTopicRaised {
            topic: topic.map(str::to_string),
            value,
        });
        1
    } else {
        value as usize
    }
}

fn sanitize_cap(key: &str, value: Option<i64>, warnings: &mut Vec<ConfigWarning>) -> Option<usize> {
    match value {
        Some(cap) if cap < 1 => {
            warnings.push(ConfigWarning::CapIgnored {
                key: key.to_string(),
                value: cap,
            });
            None
        }
        Some(cap) => Some(cap as usize),
        None => None,
    }
}

fn unit_interval(key: &str, value: f64, fallback: f64, warnings: &mut Vec<ConfigWarning>) -> f64 {
    let clamped = if value.is_nan() { fallback } else { value.clamp(0.0, 1.0) };
    if clamped != value {
        warnings.push(ConfigWarning::ValueClamped {
            key: key.to_string(),
            value,
            clamped,
        });
    }
    clamped
}

fn non_negative(key: &str, value: f64, fallback: f64, warnings: &mut Vec<ConfigWarning>) -> f64 {
    let fixed = if !value.is_finite() {
        fallback
    } else {
        value.max(0.0)
    };
    if fixed != value {
        warnings.push(ConfigWarning::ValueClamped {
            key: key.to_string(),
            value,
            clamped: fixed,
        });
    }
    fixed
}

fn sanitize_near(raw: &NearDuplicateConfig, warnings: &mut Vec<ConfigWarning>) -> NearDuplicateConfig {
    let defaults = NearDuplicateConfig::default();
    let threshold = unit_interval("near_duplicate.threshold", raw.threshold, defaults.threshold, warnings);
    let title_weight = non_negative("near_duplicate.title_weight", raw.title_weight, defaults.title_weight, warnings);
    let summary_weight =
        non_negative("near_duplicate.summary_weight", raw.summary_weight, defaults.summary_weight, warnings);
    let mut body_weight = non_negative("near_duplicate.body_weight", raw.body_weight, defaults.body_weight, warnings);

    // Body text alone must never reach the threshold. Summaries drop out of
    // the score when either item lacks one, so title is the only guaranteed
    // counterweight.
    let total = title_weight + body_weight;
    if body_weight > 0.0 && body_weight / total >= threshold {
        let share = threshold / 2.0;
        let reduced = if title_weight > 0.0 {
            share * title_weight / (1.0 - share)
        } else {
            0.0
        };
        warnings.push(ConfigWarning::BodyWeightReduced {
            from: body_weight,
            to: reduced,
            threshold,
        });
        body_weight = reduced;
    }

    NearDuplicateConfig {
        threshold,
        title_weight,
        summary_weight,
        body_weight,
    }
}

fn sanitize_locality(
    topic_id: &str,
    raw: &LocalityConfig,
    warnings: &mut Vec<ConfigWarning>,
) -> LocalityRules {
    let defaults = LocalityConfig::default();
    let min_score = unit_interval(
        &format!("topics.{}.locality.min_score", topic_id),
        raw.min_score,
        defaults.min_score,
        warnings,
    );
    let source_weight = non_negative(
        &format!("topics.{}.locality.source_weight", topic_id),
        raw.source_weight,
        defaults.source_weight,
        warnings,
    );
    let keyword_weight = non_negative(
        &format!("topics.{}.locality.keyword_weight", topic_id),
        raw.keyword_weight,
        defaults.keyword_weight,
        warnings,
    );
    let keyword_saturation = if raw.keyword_saturation < 1 {
        warnings.push(ConfigWarning::ValueClamped {
            key: format!("topics.{}.locality.keyword_saturation", topic_id),
            value: raw.keyword_saturation as f64,
            clamped: 1.0,
        });
        1
    } else {
        raw.keyword_saturation as usize
    };

    // Weights are shares of the score; an all-zero pair falls back to defaults.
    let (source_weight, keyword_weight) = match source_weight + keyword_weight {
        sum if sum > 0.0 => (source_weight / sum, keyword_weight / sum),
        _ => (defaults.source_weight, defaults.keyword_weight),
    };

    LocalityRules {
        keywords: raw
            .keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect(),
        local_sources: raw
            .local_sources
            .iter()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect(),
        min_score,
        source_weight,
        keyword_weight,
        keyword_saturation,
    }
}
