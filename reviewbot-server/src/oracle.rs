//! Client for the external analysis service.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::info;

use reviewbot_core::AnalysisResult;

/// Upper bound on one analysis call. Long enough for a large diff;
/// expiry is treated the same as connection refusal.
const ANALYZE_TIMEOUT: Duration = Duration::from_secs(30);

/// The analysis oracle: an opaque `analyze(diff) -> AnalysisResult`
/// function, behind a trait so pipeline tests can count calls.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, repo_name: &str, pr_number: u64, diff: &str)
        -> Result<AnalysisResult>;
}

#[derive(Debug, Serialize)]
struct AnalyzeRequest<'a> {
    repo_name: &'a str,
    pr_number: u64,
    diff: &'a str,
}

#[derive(Clone)]
pub struct AnalysisClient {
    client: Client,
    base_url: String,
}

impl AnalysisClient {
    pub fn new(base_url: String) -> Self {
        let client = Client::builder()
            .user_agent("reviewbot/0.1.0")
            .build()
            .expect("Failed to create HTTP client");

        Self { client, base_url }
    }
}

#[async_trait]
impl Analyzer for AnalysisClient {
    async fn analyze(
        &self,
        repo_name: &str,
        pr_number: u64,
        diff: &str,
    ) -> Result<AnalysisResult> {
        let url = format!("{}/analyze", self.base_url);

        info!(
            "Requesting analysis for PR #{} in {} ({} diff bytes)",
            pr_number,
            repo_name,
            diff.len()
        );

        let response = self
            .client
            .post(&url)
            .timeout(ANALYZE_TIMEOUT)
            .json(&AnalyzeRequest {
                repo_name,
                pr_number,
                diff,
            })
            .send()
            .await
            .context("Failed to send analyze request")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .context("Failed to read error response body")?;
            return Err(anyhow!(
                "Analysis service error: {} - {}",
                status,
                error_text
            ));
        }

        let result: AnalysisResult = response
            .json()
            .await
            .context("Failed to parse analysis response")?;

        info!(
            "Analysis complete for PR #{}: score {}, {} comments",
            pr_number,
            result.score,
            result.comments.len()
        );

        Ok(result)
    }
}
