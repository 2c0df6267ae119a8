use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::ConfigWarning;
use crate::engine::SelectionReport;
use crate::models::{CandidatePool, SelectionResult, TopicPool};

pub const FILE_VERSION: &str = "1.0";

/// Candidate pool as written by feed ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolFile {
    pub version: String,
    #[serde(default)]
    pub generated_at: Option<String>,
    pub topics: Vec<TopicPool>,
}

impl PoolFile {
    pub fn new(topics: Vec<TopicPool>) -> Self {
        Self {
            version: FILE_VERSION.to_string(),
            generated_at: Some(Utc::now().to_rfc3339()),
            topics,
        }
    }
}

/// Selection handed over to summarization and rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionFile {
    pub version: String,
    pub created_at: String,
    pub topics: Vec<SelectionResult>,
    #[serde(default)]
    pub warnings: Vec<ConfigWarning>,
}

impl SelectionFile {
    pub fn from_report(report: SelectionReport, created_at: DateTime<Utc>) -> Self {
        Self {
            version: FILE_VERSION.to_string(),
            created_at: created_at.to_rfc3339(),
            topics: report.topics,
            warnings: report.warnings,
        }
    }
}

/// Get the default directory for storing selection files
pub fn get_default_selections_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_local_dir()
        .context("Could not determine local data directory")?
        .join("daily-paper")
        .join("selections");

    fs::create_dir_all(&data_dir).context("Failed to create selections directory")?;

    Ok(data_dir)
}

pub fn selection_filename(date: NaiveDate) -> String {
    format!("selection_{}.json", date.format("%Y-%m-%d"))
}

/// Load a candidate pool from a JSON file
pub fn load_candidate_pool(filepath: &Path) -> Result<CandidatePool> {
    if !filepath.exists() {
        anyhow::bail!("Candidate pool file not found: {}", filepath.display());
    }

    let content = fs::read_to_string(filepath)
        .with_context(|| format!("Failed to read candidate pool file: {}", filepath.display()))?;

    let data: PoolFile = serde_json::from_str(&content).with_context(|| {
        format!(
            "Failed to parse candidate pool JSON from {}. The file may be corrupted or not a valid pool file.",
            filepath.display()
        )
    })?;

    if data.version != FILE_VERSION {
        anyhow::bail!(
            "Unsupported candidate pool version: {}. Expected {}. Please regenerate the pool file.",
            data.version,
            FILE_VERSION
        );
    }

    Ok(CandidatePool::new(data.topics))
}

/// Save a selection report as JSON, creating parent directories as needed
pub fn save_selection(report: &SelectionReport, filepath: &Path, created_at: DateTime<Utc>) -> Result<PathBuf> {
    if let Some(parent) = filepath.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
    }

    let file = SelectionFile::from_report(report.clone(), created_at);
    let json = serde_json::to_string_pretty(&file).context("Failed to serialize selection")?;

    fs::write(filepath, json)
        .with_context(|| format!("Failed to write selection file: {}", filepath.display()))?;

    Ok(filepath.to_path_buf())
}

/// Load a previously written selection file
pub fn load_selection(filepath: &Path) -> Result<SelectionFile> {
    let content = fs::read_to_string(filepath)
        .with_context(|| format!("Failed to read selection file: {}", filepath.display()))?;

    let data: SelectionFile = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse selection JSON from {}", filepath.display()))?;

    if data.version != FILE_VERSION {
        anyhow::bail!(
            "Unsupported selection file version: {}. Expected {}.",
            data.version,
            FILE_VERSION
        );
    }

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FeedItem;

    #[test]
    fn selection_filename_uses_iso_date() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 3).unwrap();
        assert_eq!(selection_filename(date), "selection_2025-06-03.json");
    }

    #[test]
    fn pool_file_rejects_other_versions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pool.json");
        fs::write(&path, r#"{"version":"2.0","topics":[]}"#).unwrap();

        let err = load_candidate_pool(&path).unwrap_err();
        assert!(err.to_string().contains("Unsupported candidate pool version"));
    }

    #[test]
    fn pool_file_derives_canonical_urls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pool.json");
        let file = PoolFile::new(vec![TopicPool::new(
            "world",
            vec![FeedItem::new("1", "https://News.com/a?utm_source=x", "Story", "Wire")],
        )]);
        fs::write(&path, serde_json::to_string(&file).unwrap()).unwrap();

        let pool = load_candidate_pool(&path).unwrap();
        let candidates = pool.candidates();
        assert_eq!(candidates[0].item.canonical_url, "https://news.com/a");
        assert_eq!(candidates[0].item.topic_id, "world");
    }

    #[test]
    fn missing_pool_file_is_an_error() {
        let err = load_candidate_pool(Path::new("/no/such/pool.json")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn saved_selection_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("selection.json");
        let report = SelectionReport {
            topics: vec![SelectionResult::empty("world")],
            warnings: vec![ConfigWarning::CapIgnored {
                key: "max_items_per_source".into(),
                value: 0,
            }],
        };

        let written = save_selection(&report, &path, Utc::now()).unwrap();
        let loaded = load_selection(&written).unwrap();
        assert_eq!(loaded.version, FILE_VERSION);
        assert_eq!(loaded.topics, report.topics);
        assert_eq!(loaded.warnings, report.warnings);
    }
}
