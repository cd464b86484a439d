//! SQLite persistence for pull-request records.
//!
//! Scalar fields are stored as explicit columns; the analysis comment
//! and suggestion lists are stored as JSON columns since they are
//! opaque to queries. The schema version is tracked with SQLite's
//! `user_version` pragma.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::store::{AnalysisStatus, PullRequestRecord, RecordStore};

/// Current schema version. Increment when making schema changes and
/// add a migration in `run_migrations`.
const SCHEMA_VERSION: i32 = 1;

/// `rusqlite::Connection` is not `Sync`, so the connection lives
/// behind a `Mutex` and every operation runs inside
/// `tokio::task::spawn_blocking`.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite database at {:?}", path))?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().expect("mutex poisoned");

        let current_version: i32 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .context("Failed to read schema version")?;

        if current_version < SCHEMA_VERSION {
            run_migrations(&conn, current_version)?;
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)
                .context("Failed to update schema version")?;
        }

        Ok(())
    }
}

fn run_migrations(conn: &Connection, from_version: i32) -> Result<()> {
    if from_version < 1 {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS pull_requests (
                repo_name       TEXT NOT NULL,
                pr_number       INTEGER NOT NULL,
                title           TEXT NOT NULL,
                author          TEXT NOT NULL,
                state           TEXT NOT NULL,
                html_url        TEXT NOT NULL,
                diff_url        TEXT NOT NULL,
                diff_text       TEXT NOT NULL,
                analysis_status TEXT NOT NULL,
                score           INTEGER,
                category_scores TEXT NOT NULL,
                summary         TEXT NOT NULL,
                comments        TEXT NOT NULL,
                fix_suggestions TEXT NOT NULL,
                review_posted   INTEGER NOT NULL,
                review_id       INTEGER,
                last_error      TEXT,
                analyzed_at     TEXT,
                PRIMARY KEY (repo_name, pr_number)
            )",
            [],
        )
        .context("Failed to create pull_requests table")?;
    }

    Ok(())
}

fn upsert_blocking(conn: &Connection, record: &PullRequestRecord) -> Result<()> {
    let category_scores = serde_json::to_string(&record.category_scores)
        .context("Failed to serialize category scores")?;
    let comments =
        serde_json::to_string(&record.comments).context("Failed to serialize comments")?;
    let fix_suggestions = serde_json::to_string(&record.fix_suggestions)
        .context("Failed to serialize fix suggestions")?;

    conn.execute(
        "INSERT INTO pull_requests (
            repo_name, pr_number, title, author, state, html_url, diff_url,
            diff_text, analysis_status, score, category_scores, summary,
            comments, fix_suggestions, review_posted, review_id, last_error,
            analyzed_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
        ON CONFLICT (repo_name, pr_number) DO UPDATE SET
            title = excluded.title,
            author = excluded.author,
            state = excluded.state,
            html_url = excluded.html_url,
            diff_url = excluded.diff_url,
            diff_text = excluded.diff_text,
            analysis_status = excluded.analysis_status,
            score = excluded.score,
            category_scores = excluded.category_scores,
            summary = excluded.summary,
            comments = excluded.comments,
            fix_suggestions = excluded.fix_suggestions,
            review_posted = excluded.review_posted,
            review_id = excluded.review_id,
            last_error = excluded.last_error,
            analyzed_at = excluded.analyzed_at",
        params![
            record.repo_name,
            record.pr_number,
            record.title,
            record.author,
            record.state,
            record.html_url,
            record.diff_url,
            record.diff_text,
            record.analysis_status.as_str(),
            record.score,
            category_scores,
            record.summary,
            comments,
            fix_suggestions,
            record.review_posted,
            record.review_id,
            record.last_error,
            record.analyzed_at.map(|t| t.to_rfc3339()),
        ],
    )
    .context("Failed to upsert pull request record")?;

    Ok(())
}

fn get_blocking(
    conn: &Connection,
    repo_name: &str,
    pr_number: u64,
) -> Result<Option<PullRequestRecord>> {
    let row = conn
        .query_row(
            "SELECT title, author, state, html_url, diff_url, diff_text,
                    analysis_status, score, category_scores, summary, comments,
                    fix_suggestions, review_posted, review_id, last_error,
                    analyzed_at
             FROM pull_requests
             WHERE repo_name = ?1 AND pr_number = ?2",
            params![repo_name, pr_number],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, Option<u8>>(7)?,
                    row.get::<_, String>(8)?,
                    row.get::<_, String>(9)?,
                    row.get::<_, String>(10)?,
                    row.get::<_, String>(11)?,
                    row.get::<_, bool>(12)?,
                    row.get::<_, Option<u64>>(13)?,
                    row.get::<_, Option<String>>(14)?,
                    row.get::<_, Option<String>>(15)?,
                ))
            },
        )
        .optional()
        .context("Failed to query pull request record")?;

    let Some((
        title,
        author,
        state,
        html_url,
        diff_url,
        diff_text,
        status,
        score,
        category_scores,
        summary,
        comments,
        fix_suggestions,
        review_posted,
        review_id,
        last_error,
        analyzed_at,
    )) = row
    else {
        return Ok(None);
    };

    let analysis_status = AnalysisStatus::parse(&status)
        .ok_or_else(|| anyhow!("Unknown analysis status in database: {}", status))?;
    let analyzed_at = analyzed_at
        .map(|t| {
            DateTime::parse_from_rfc3339(&t)
                .map(|t| t.with_timezone(&Utc))
                .context("Failed to parse analyzed_at timestamp")
        })
        .transpose()?;

    Ok(Some(PullRequestRecord {
        repo_name: repo_name.to_string(),
        pr_number,
        title,
        author,
        state,
        html_url,
        diff_url,
        diff_text,
        analysis_status,
        score,
        category_scores: serde_json::from_str(&category_scores)
            .context("Failed to parse category scores")?,
        summary,
        comments: serde_json::from_str(&comments).context("Failed to parse comments")?,
        fix_suggestions: serde_json::from_str(&fix_suggestions)
            .context("Failed to parse fix suggestions")?,
        review_posted,
        review_id,
        last_error,
        analyzed_at,
    }))
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn upsert(&self, record: &PullRequestRecord) -> Result<()> {
        let conn = self.conn.clone();
        let record = record.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().expect("mutex poisoned");
            upsert_blocking(&conn, &record)
        })
        .await
        .context("spawn_blocking panicked")?
    }

    async fn get(&self, repo_name: &str, pr_number: u64) -> Result<Option<PullRequestRecord>> {
        let conn = self.conn.clone();
        let repo_name = repo_name.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().expect("mutex poisoned");
            get_blocking(&conn, &repo_name, pr_number)
        })
        .await
        .context("spawn_blocking panicked")?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reviewbot_core::{AbstractComment, CategoryScores, FixSuggestion};

    fn sample_record() -> PullRequestRecord {
        let mut record = PullRequestRecord::new("owner/repo", 42);
        record.title = "Add feature".to_string();
        record.author = "octocat".to_string();
        record.html_url = "https://example.test/owner/repo/pull/42".to_string();
        record.diff_url = "https://example.test/owner/repo/pull/42.diff".to_string();
        record.diff_text = "diff --git a/x b/x\n+line".to_string();
        record.analysis_status = AnalysisStatus::Analyzed;
        record.score = Some(72);
        record.category_scores = CategoryScores {
            lint: 80,
            bugs: 65,
            security: 90,
            performance: 55,
        };
        record.summary = "Mostly fine".to_string();
        record.comments = vec![AbstractComment {
            path: "x".to_string(),
            line: Some(1),
            body: "check".to_string(),
        }];
        record.fix_suggestions = vec![FixSuggestion {
            path: "x".to_string(),
            patch: "+fixed".to_string(),
        }];
        record.review_posted = true;
        record.review_id = Some(9001);
        record.analyzed_at = Some(Utc::now());
        record
    }

    #[tokio::test]
    async fn test_upsert_and_get_round_trip() {
        let store = SqliteStore::new_in_memory().expect("should create store");
        let record = sample_record();

        store.upsert(&record).await.unwrap();

        let loaded = store.get("owner/repo", 42).await.unwrap().unwrap();
        assert_eq!(loaded.title, record.title);
        assert_eq!(loaded.analysis_status, AnalysisStatus::Analyzed);
        assert_eq!(loaded.score, Some(72));
        assert_eq!(loaded.category_scores.security, 90);
        assert_eq!(loaded.comments.len(), 1);
        assert_eq!(loaded.fix_suggestions.len(), 1);
        assert_eq!(loaded.review_id, Some(9001));
        assert!(loaded.review_posted);
    }

    #[tokio::test]
    async fn test_second_upsert_overwrites_first() {
        let store = SqliteStore::new_in_memory().expect("should create store");

        let mut record = sample_record();
        store.upsert(&record).await.unwrap();

        record.analysis_status = AnalysisStatus::Failed;
        record.last_error = Some("analysis timed out".to_string());
        record.review_posted = false;
        store.upsert(&record).await.unwrap();

        let loaded = store.get("owner/repo", 42).await.unwrap().unwrap();
        assert_eq!(loaded.analysis_status, AnalysisStatus::Failed);
        assert_eq!(loaded.last_error.as_deref(), Some("analysis timed out"));
        assert!(!loaded.review_posted);
    }

    #[tokio::test]
    async fn test_persistence_survives_reload() {
        let temp_dir = std::env::temp_dir();
        let db_path = temp_dir.join(format!("test_reviewbot_{}.db", std::process::id()));
        let _ = std::fs::remove_file(&db_path);

        let record = sample_record();

        {
            let store = SqliteStore::new(&db_path).expect("should create store");
            store.upsert(&record).await.unwrap();
        }

        {
            let store = SqliteStore::new(&db_path).expect("should create store");
            let loaded = store.get("owner/repo", 42).await.unwrap().unwrap();
            assert_eq!(loaded.summary, record.summary);
            assert_eq!(loaded.analysis_status, AnalysisStatus::Analyzed);
        }

        let _ = std::fs::remove_file(&db_path);
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let store = SqliteStore::new_in_memory().expect("should create store");
        assert!(store.get("owner/repo", 1).await.unwrap().is_none());
    }
}
