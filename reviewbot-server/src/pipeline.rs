//! The diff-to-review pipeline, driven by inbound pull-request events.
//!
//! One event triggers one sequential run: assemble the diff, invoke
//! the analysis service, persist the outcome, and publish the review.
//! Every run ends in a deterministic terminal status on the stored
//! record, with one documented exception: when the host itself is
//! unreachable, nothing is written, so a re-delivered event can start
//! from a clean slate instead of stale metadata.
//!
//! Duplicate deliveries for the same pull request are not coalesced;
//! correctness relies on the store's upsert-by-key semantics (last
//! write wins per key).

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use reviewbot_core::{compose_review, map_comments, CategoryScores};

use crate::diff::DiffAssembler;
use crate::error::PipelineError;
use crate::github::HostApi;
use crate::oracle::Analyzer;
use crate::store::{AnalysisStatus, PullRequestRecord, RecordStore};

/// A normalized pull-request event, extracted from a webhook delivery.
#[derive(Debug, Clone)]
pub struct PullRequestEvent {
    pub repo_name: String,
    pub pr_number: u64,
    pub title: String,
    pub author: String,
    pub state: String,
    pub html_url: String,
    pub diff_url: String,
}

/// Terminal outcome of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// The change request has no analyzable file hunks.
    NoDiff,
    /// Analysis succeeded and the review was published.
    Published,
}

#[derive(Clone)]
pub struct AnalysisPipeline {
    host: Arc<dyn HostApi>,
    analyzer: Arc<dyn Analyzer>,
    store: Arc<dyn RecordStore>,
}

impl AnalysisPipeline {
    pub fn new(
        host: Arc<dyn HostApi>,
        analyzer: Arc<dyn Analyzer>,
        store: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            host,
            analyzer,
            store,
        }
    }

    /// Run the full pipeline for one event.
    ///
    /// Status transitions on the stored record:
    /// `pending -> {no_diff | analyzed | failed}`. A later event for
    /// the same (repo, number) re-enters `pending` and overwrites the
    /// document. Publish failure does not demote an `analyzed` record.
    pub async fn process(
        &self,
        event: &PullRequestEvent,
    ) -> Result<PipelineOutcome, PipelineError> {
        // Assemble the diff before touching the store: if the host is
        // unreachable we must not persist metadata without a clear
        // status.
        let diff = DiffAssembler::new(self.host.as_ref())
            .fetch(&event.repo_name, event.pr_number)
            .await?;

        let mut record = self
            .store
            .get(&event.repo_name, event.pr_number)
            .await
            .map_err(PipelineError::Store)?
            .unwrap_or_else(|| PullRequestRecord::new(&event.repo_name, event.pr_number));

        apply_event_metadata(&mut record, event);
        record.diff_text = diff.clone();

        if diff.is_empty() {
            info!(
                "PR #{} in {} has no diff, skipping analysis",
                event.pr_number, event.repo_name
            );
            record.analysis_status = AnalysisStatus::NoDiff;
            record.analyzed_at = Some(Utc::now());
            self.store
                .upsert(&record)
                .await
                .map_err(PipelineError::Store)?;
            return Ok(PipelineOutcome::NoDiff);
        }

        // Base metadata and cached diff land before the analysis call;
        // the status is left as it was.
        self.store
            .upsert(&record)
            .await
            .map_err(PipelineError::Store)?;

        let result = match self
            .analyzer
            .analyze(&event.repo_name, event.pr_number, &diff)
            .await
        {
            Ok(result) => result,
            Err(e) => {
                // A replayed event may be overwriting a previously
                // successful run; clear its results so the document
                // stays coherent with the failed status.
                let detail = format!("{:#}", e);
                record.analysis_status = AnalysisStatus::Failed;
                record.score = None;
                record.category_scores = CategoryScores::default();
                record.summary.clear();
                record.comments.clear();
                record.fix_suggestions.clear();
                record.review_posted = false;
                record.review_id = None;
                record.analyzed_at = None;
                record.last_error = Some(detail.clone());
                self.store
                    .upsert(&record)
                    .await
                    .map_err(PipelineError::Store)?;
                return Err(PipelineError::OracleUnavailable(detail));
            }
        };

        record.analysis_status = AnalysisStatus::Analyzed;
        record.score = Some(result.score);
        record.category_scores = result.categories;
        record.summary = result.summary.clone();
        record.comments = result.comments.clone();
        record.fix_suggestions = result.fix_suggestions.clone();
        record.last_error = None;
        record.analyzed_at = Some(Utc::now());
        record.review_posted = false;
        record.review_id = None;
        self.store
            .upsert(&record)
            .await
            .map_err(PipelineError::Store)?;

        // Publish. Analysis success is independent of publish success:
        // a failure here leaves the record analyzed with
        // review_posted = false.
        let review_id = match self.publish(event, &result).await {
            Ok(id) => id,
            Err(e) => {
                warn!(
                    "Failed to publish review for PR #{} in {}: {}",
                    event.pr_number, event.repo_name, e
                );
                return Err(PipelineError::PublishFailed(format!("{:#}", e)));
            }
        };

        record.review_posted = true;
        record.review_id = Some(review_id);
        self.store
            .upsert(&record)
            .await
            .map_err(PipelineError::Store)?;

        info!(
            "Published review {} for PR #{} in {}",
            review_id, event.pr_number, event.repo_name
        );
        Ok(PipelineOutcome::Published)
    }

    async fn publish(
        &self,
        event: &PullRequestEvent,
        result: &reviewbot_core::AnalysisResult,
    ) -> anyhow::Result<u64> {
        let files = self
            .host
            .pull_request_files(&event.repo_name, event.pr_number)
            .await?;

        let mapped = map_comments(&files, &result.comments);
        let payload = compose_review(result, mapped);

        self.host
            .create_review(&event.repo_name, event.pr_number, &payload)
            .await
    }
}

fn apply_event_metadata(record: &mut PullRequestRecord, event: &PullRequestEvent) {
    record.title = event.title.clone();
    record.author = event.author.clone();
    record.state = event.state.clone();
    record.html_url = event.html_url.clone();
    record.diff_url = event.diff_url.clone();
}
