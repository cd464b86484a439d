//! Durable record of one pull request's metadata, diff cache, and
//! analysis outcome.
//!
//! The store is an idempotent upsert keyed on (repo_name, pr_number):
//! re-delivered events overwrite the same document rather than
//! accumulating. Concurrent runs for the same key interleave at
//! whole-document granularity; the last write wins. There is no
//! compare-and-swap or sequencing token across duplicate deliveries.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

use reviewbot_core::{AbstractComment, CategoryScores, FixSuggestion};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Pending,
    NoDiff,
    Analyzed,
    Failed,
}

impl AnalysisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::Pending => "pending",
            AnalysisStatus::NoDiff => "no_diff",
            AnalysisStatus::Analyzed => "analyzed",
            AnalysisStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(AnalysisStatus::Pending),
            "no_diff" => Some(AnalysisStatus::NoDiff),
            "analyzed" => Some(AnalysisStatus::Analyzed),
            "failed" => Some(AnalysisStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestRecord {
    pub repo_name: String,
    pub pr_number: u64,
    pub title: String,
    pub author: String,
    /// Host-reported state: open, closed, or merged.
    pub state: String,
    pub html_url: String,
    pub diff_url: String,
    /// Cached diff text. Empty means "no file changes".
    pub diff_text: String,
    pub analysis_status: AnalysisStatus,
    pub score: Option<u8>,
    pub category_scores: CategoryScores,
    pub summary: String,
    pub comments: Vec<AbstractComment>,
    pub fix_suggestions: Vec<FixSuggestion>,
    pub review_posted: bool,
    pub review_id: Option<u64>,
    pub last_error: Option<String>,
    pub analyzed_at: Option<DateTime<Utc>>,
}

impl PullRequestRecord {
    pub fn new(repo_name: &str, pr_number: u64) -> Self {
        Self {
            repo_name: repo_name.to_string(),
            pr_number,
            title: String::new(),
            author: String::new(),
            state: "open".to_string(),
            html_url: String::new(),
            diff_url: String::new(),
            diff_text: String::new(),
            analysis_status: AnalysisStatus::Pending,
            score: None,
            category_scores: CategoryScores::default(),
            summary: String::new(),
            comments: Vec::new(),
            fix_suggestions: Vec::new(),
            review_posted: false,
            review_id: None,
            last_error: None,
            analyzed_at: None,
        }
    }
}

/// Whole-document upsert store keyed on (repo_name, pr_number).
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn upsert(&self, record: &PullRequestRecord) -> Result<()>;
    async fn get(&self, repo_name: &str, pr_number: u64) -> Result<Option<PullRequestRecord>>;
}

/// In-memory store for tests and ephemeral deployments.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<(String, u64), PullRequestRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn upsert(&self, record: &PullRequestRecord) -> Result<()> {
        let key = (record.repo_name.clone(), record.pr_number);
        self.records.write().await.insert(key, record.clone());
        Ok(())
    }

    async fn get(&self, repo_name: &str, pr_number: u64) -> Result<Option<PullRequestRecord>> {
        let key = (repo_name.to_string(), pr_number);
        Ok(self.records.read().await.get(&key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_is_idempotent_per_key() {
        let store = MemoryStore::new();

        let mut record = PullRequestRecord::new("owner/repo", 7);
        record.title = "first".to_string();
        store.upsert(&record).await.unwrap();

        record.title = "second".to_string();
        record.analysis_status = AnalysisStatus::Analyzed;
        store.upsert(&record).await.unwrap();

        assert_eq!(store.len().await, 1);
        let stored = store.get("owner/repo", 7).await.unwrap().unwrap();
        assert_eq!(stored.title, "second");
        assert_eq!(stored.analysis_status, AnalysisStatus::Analyzed);
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let store = MemoryStore::new();
        assert!(store.get("owner/repo", 1).await.unwrap().is_none());
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            AnalysisStatus::Pending,
            AnalysisStatus::NoDiff,
            AnalysisStatus::Analyzed,
            AnalysisStatus::Failed,
        ] {
            assert_eq!(AnalysisStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(AnalysisStatus::parse("unknown"), None);
    }
}
