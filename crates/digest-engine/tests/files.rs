use chrono::{Utc, Weekday};
use digest_engine::io::PoolFile;
use digest_engine::{
    load_candidate_pool, load_selection, save_selection, DigestConfig, DigestEngine, FeedItem, TopicPool,
};
use std::fs;
use std::path::PathBuf;

fn example_config_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../config.example.toml")
}

#[test]
fn example_config_loads_without_warnings() {
    let config = DigestConfig::load(&example_config_path()).unwrap();
    assert_eq!(config.topics.len(), 4);

    let engine = DigestEngine::new(config.clone());
    assert!(engine.warnings().is_empty());
    assert_eq!(engine.settings().rules_for("basel").items_per_topic, 3);
    assert!(engine.settings().rules_for("basel").locality.is_some());

    assert_eq!(config.active_topic_ids(Weekday::Wed), vec!["world", "tech", "basel"]);
    assert_eq!(config.active_topic_ids(Weekday::Sat).len(), 4);
}

#[test]
fn default_config_survives_a_toml_round_trip() {
    let text = toml::to_string(&DigestConfig::default()).unwrap();
    let parsed: DigestConfig = toml::from_str(&text).unwrap();
    assert_eq!(parsed, DigestConfig::default());
}

#[test]
fn pool_to_selection_file() {
    let dir = tempfile::tempdir().unwrap();
    let pool_path = dir.path().join("pool.json");
    let output = dir.path().join("out").join("selection.json");

    let pool = PoolFile::new(vec![
        TopicPool::new(
            "world",
            vec![
                FeedItem::new("1", "https://a.com/x?fbclid=1", "Summit ends without deal", "A"),
                FeedItem::new("2", "https://a.com/x", "Summit ends without deal", "B"),
            ],
        ),
        TopicPool::new("weekend", vec![FeedItem::new("3", "https://b.com/y", "Long read", "C")]),
    ]);
    fs::write(&pool_path, serde_json::to_string_pretty(&pool).unwrap()).unwrap();

    let config = DigestConfig::load(&example_config_path()).unwrap();
    let engine = DigestEngine::new(config).for_weekday(Weekday::Mon);
    let report = engine.run(&load_candidate_pool(&pool_path).unwrap());
    save_selection(&report, &output, Utc::now()).unwrap();

    let selection = load_selection(&output).unwrap();
    let ids: Vec<_> = selection.topics.iter().map(|t| t.topic_id.as_str()).collect();
    assert_eq!(ids, vec!["world", "tech", "basel"]);
    assert_eq!(selection.topics[0].items.len(), 1);
    assert_eq!(selection.topics[0].stats.exact_removed, 1);
}

#[test]
fn malformed_timestamps_and_missing_fields_are_tolerated() {
    let dir = tempfile::tempdir().unwrap();
    let pool_path = dir.path().join("pool.json");
    fs::write(
        &pool_path,
        r#"{
  "version": "1.0",
  "topics": [
    { "topic_id": "world", "items": [
      { "id": "1", "url": "not a url", "title": "Odd item", "source_name": "S", "published_at": "last week" }
    ] }
  ]
}"#,
    )
    .unwrap();

    let pool = load_candidate_pool(&pool_path).unwrap();
    let report = DigestEngine::new(DigestConfig::default()).run(&pool);
    let world = report.topic("world").unwrap();
    assert_eq!(world.items.len(), 1);
    assert_eq!(world.items[0].canonical_url, "not a url");
    assert!(world.items[0].published_at.is_none());
}
