use chrono::{DateTime, TimeZone, Utc};
use digest_engine::config::{LocalityConfig, TopicConfig};
use digest_engine::{CandidatePool, DedupStage, DigestConfig, DigestEngine, FeedItem, TopicPool};
use std::collections::HashMap;

fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 10, hour, 0, 0).unwrap()
}

fn sample_pool() -> CandidatePool {
    CandidatePool::new(vec![
        TopicPool::new(
            "world",
            vec![
                FeedItem::new("w1", "https://wire.com/storm?utm_source=rss", "Cyclone Gezani hits Madagascar coast", "Wire")
                    .with_summary("Thousands evacuated as Cyclone Gezani makes landfall in Madagascar")
                    .with_published_at(at(6)),
                FeedItem::new("w2", "https://daily.com/storm", "Cyclone Gezani strikes Madagascar coast", "Daily")
                    .with_summary("Thousands are evacuated as Cyclone Gezani makes landfall in Madagascar")
                    .with_published_at(at(7)),
                FeedItem::new("w3", "https://srf.ch/en/geneva", "Geneva talks: Macron and Scholz agree", "SRF")
                    .with_summary("Leaders agreed on 2,400 troops.")
                    .with_published_at(at(8)),
                FeedItem::new("w4", "https://srf.ch/de/genf", "Genfer Gespräche: Macron und Scholz einig", "SRF")
                    .with_summary("Die Staatschefs einigten sich auf 2.400 Soldaten.")
                    .with_published_at(at(9)),
                FeedItem::new("w5", "https://other.org/budget", "Parliament passes annual budget", "Other")
                    .with_summary("Lawmakers approved the spending plan late on Tuesday")
                    .with_published_at(at(10)),
            ],
        ),
        TopicPool::new(
            "local",
            vec![
                FeedItem::new("l1", "https://bz.ch/tram", "Tram line reopens in Basel", "bz Basel")
                    .with_published_at(at(5)),
                FeedItem::new("l2", "https://wire.com/peru", "Election results in Peru", "Wire")
                    .with_published_at(at(6)),
                FeedItem::new("l3", "https://wire.com/storm/", "Storm warning", "Wire"),
            ],
        ),
    ])
}

fn sample_config() -> DigestConfig {
    let mut local = TopicConfig::new("local");
    local.locally_scoped = true;
    local.locality = LocalityConfig {
        keywords: vec!["Basel".into()],
        local_sources: vec!["bz Basel".into()],
        ..LocalityConfig::default()
    };

    DigestConfig {
        items_per_topic: 3,
        topics: vec![TopicConfig::new("world"), local],
        ..DigestConfig::default()
    }
}

#[test]
fn full_pipeline_removes_each_kind_of_duplicate() {
    let report = DigestEngine::new(sample_config()).run(&sample_pool());

    let world = report.topic("world").unwrap();
    let stages: Vec<DedupStage> = world.groups.iter().map(|g| g.stage).collect();
    assert!(stages.contains(&DedupStage::Exact));
    assert!(stages.contains(&DedupStage::NearDuplicate));
    assert!(stages.contains(&DedupStage::Translation));
    assert_eq!(world.stats.near_duplicate_removed, 1);
    assert_eq!(world.stats.translation_removed, 1);
    assert_eq!(world.items.len(), 3);

    let local = report.topic("local").unwrap();
    assert_eq!(local.stats.exact_removed, 1);
    assert_eq!(local.stats.relevance_removed, 1);
    let ids: Vec<_> = local.items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["l1"]);
}

#[test]
fn every_selection_respects_size_and_caps() {
    let mut config = sample_config();
    config.max_items_per_source = Some(1);
    let report = DigestEngine::new(config).run(&sample_pool());

    for topic in &report.topics {
        assert!(topic.items.len() <= 3);
        let mut per_source: HashMap<&str, usize> = HashMap::new();
        for item in &topic.items {
            *per_source.entry(item.source_name.as_str()).or_insert(0) += 1;
        }
        assert!(per_source.values().all(|&n| n <= 1), "{:?}", per_source);
    }
}

#[test]
fn no_story_appears_twice_across_topics() {
    let report = DigestEngine::new(sample_config()).run(&sample_pool());
    let mut seen = std::collections::HashSet::new();
    for topic in &report.topics {
        for item in &topic.items {
            assert!(seen.insert(item.canonical_url.clone()), "{} selected twice", item.canonical_url);
        }
    }
}

#[test]
fn runs_are_deterministic() {
    let engine = DigestEngine::new(sample_config());
    let first = engine.run(&sample_pool());
    for _ in 0..3 {
        assert_eq!(engine.run(&sample_pool()), first);
    }
}

#[test]
fn empty_pool_gives_empty_topics() {
    let report = DigestEngine::new(sample_config()).run(&CandidatePool::default());
    let ids: Vec<_> = report.topics.iter().map(|t| t.topic_id.as_str()).collect();
    assert_eq!(ids, vec!["world", "local"]);
    assert!(report.topics.iter().all(|t| t.items.is_empty()));
}

#[tokio::test]
async fn concurrent_run_matches_serial_run() {
    let engine = DigestEngine::new(sample_config());
    let pool = sample_pool();

    let serial = engine.run(&pool);
    let concurrent = engine.run_concurrent(&pool).await.unwrap();

    assert_eq!(serial, concurrent);
}
